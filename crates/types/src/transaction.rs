//! Transactions as the consensus layer sees them.
//!
//! Consensus treats transactions as opaque, fee-bearing scripts: it
//! orders them, hashes them, and carries them through the checkpoint.
//! Execution semantics live elsewhere.

use crate::hash::{hash256, UInt160, UInt256};
use crate::witness::Witness;
use dbft_encoding::{varint, Decode, Encode, Error};
use bytes::{Buf, BufMut};

/// Largest transaction script accepted from the wire.
pub const MAX_TRANSACTION_SCRIPT: usize = 64 * 1024;

/// A transaction under consensus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Format version; currently always 0.
    pub version: u8,
    /// Sender-chosen replay discriminator.
    pub nonce: u32,
    /// Script hash of the paying account.
    pub sender: UInt160,
    /// Fee burned for execution.
    pub system_fee: u64,
    /// Fee paid to the network for relay priority.
    pub network_fee: u64,
    /// Last block index at which this transaction may be included.
    pub valid_until_block: u32,
    /// Execution payload.
    pub script: Vec<u8>,
    /// Sender authorization; absent while unsigned.
    pub witness: Option<Witness>,
}

impl Transaction {
    /// Transaction hash: `hash256` over the unsigned encoding.
    pub fn hash(&self) -> UInt256 {
        let mut data = Vec::with_capacity(self.unsigned_size());
        self.write_unsigned(&mut data);
        hash256(&data)
    }

    fn unsigned_size(&self) -> usize {
        1 + 4 + UInt160::LEN + 8 + 8 + 4 + varint::bytes_size(self.script.len())
    }

    fn write_unsigned(&self, buf: &mut impl BufMut) {
        self.version.write(buf);
        self.nonce.write(buf);
        self.sender.write(buf);
        self.system_fee.write(buf);
        self.network_fee.write(buf);
        self.valid_until_block.write(buf);
        varint::write_bytes(buf, &self.script);
    }
}

impl Encode for Transaction {
    fn encoded_size(&self) -> usize {
        self.unsigned_size()
            + 1
            + self.witness.as_ref().map_or(0, Encode::encoded_size)
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.write_unsigned(buf);
        match &self.witness {
            Some(witness) => {
                buf.put_u8(1);
                witness.write(buf);
            }
            None => buf.put_u8(0),
        }
    }
}

impl Decode for Transaction {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let version = u8::read(buf)?;
        if version != 0 {
            return Err(Error::InvalidData("transaction version"));
        }
        let nonce = u32::read(buf)?;
        let sender = UInt160::read(buf)?;
        let system_fee = u64::read(buf)?;
        let network_fee = u64::read(buf)?;
        let valid_until_block = u32::read(buf)?;
        let script = varint::read_bytes(buf, MAX_TRANSACTION_SCRIPT as u64)?;
        let witness = match u8::read(buf)? {
            0 => None,
            1 => Some(Witness::read(buf)?),
            other => return Err(Error::InvalidTag(other, "transaction witness")),
        };
        Ok(Self {
            version,
            nonce,
            sender,
            system_fee,
            network_fee,
            valid_until_block,
            script,
            witness,
        })
    }
}
