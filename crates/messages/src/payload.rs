//! The signed envelope every consensus message travels in.

use crate::message::ConsensusMessage;
use dbft_encoding::{Decode, Encode, Error};
use dbft_types::{hash256, PublicKey, UInt256, Witness, MAX_VALIDATORS};
use bytes::{Buf, BufMut};

/// Envelope coordinates shared by every payload of a consensus round.
///
/// Carried separately so recovery reconstruction can mint payloads
/// without holding a full context.
#[derive(Debug, Clone, Copy)]
pub struct PayloadEnvelope<'a> {
    /// Payload format version.
    pub version: u32,
    /// Hash of the parent block.
    pub prev_hash: UInt256,
    /// Height being agreed on.
    pub block_index: u32,
    /// The validator set for this height, in slot order.
    pub validators: &'a [PublicKey],
}

/// A consensus message wrapped with its origin and witness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusPayload {
    /// Payload format version.
    pub version: u32,
    /// Hash of the parent block.
    pub prev_hash: UInt256,
    /// Height being agreed on.
    pub block_index: u32,
    /// Slot of the sending validator.
    pub validator_index: u16,
    /// The message itself.
    pub message: ConsensusMessage,
    /// The sender's signature witness; absent when signing failed and
    /// the payload must not be broadcast.
    pub witness: Option<Witness>,
}

impl ConsensusPayload {
    /// The bytes a validator signs: the unsigned envelope encoding.
    pub fn sign_data(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.unsigned_size());
        self.write_unsigned(&mut buf);
        buf
    }

    /// Payload hash: `hash256` over the unsigned encoding.
    pub fn hash(&self) -> UInt256 {
        hash256(&self.sign_data())
    }

    /// Whether the wallet produced a witness for this payload.
    pub fn is_signed(&self) -> bool {
        self.witness.is_some()
    }

    fn unsigned_size(&self) -> usize {
        4 + UInt256::LEN + 4 + 2 + self.message.encoded_size()
    }

    fn write_unsigned(&self, buf: &mut impl BufMut) {
        self.version.write(buf);
        self.prev_hash.write(buf);
        self.block_index.write(buf);
        self.validator_index.write(buf);
        self.message.write(buf);
    }
}

impl Encode for ConsensusPayload {
    fn encoded_size(&self) -> usize {
        self.unsigned_size() + 1 + self.witness.as_ref().map_or(0, Encode::encoded_size)
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

impl Decode for ConsensusPayload {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let version = u32::read(buf)?;
        let prev_hash = UInt256::read(buf)?;
        let block_index = u32::read(buf)?;
        let validator_index = u16::read(buf)?;
        if validator_index as usize >= MAX_VALIDATORS {
            return Err(Error::InvalidData("validator index"));
        }
        let message = ConsensusMessage::read(buf)?;
        let witness = match u8::read(buf)? {
            0 => None,
            1 => Some(Witness::read(buf)?),
            other => return Err(Error::InvalidTag(other, "payload witness")),
        };
        Ok(Self {
            version,
            prev_hash,
            block_index,
            validator_index,
            message,
            witness,
        })
    }
}
