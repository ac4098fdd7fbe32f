//! The primary's block proposal.

use dbft_encoding::{varint, Decode, Encode, Error};
use dbft_types::{UInt256, MAX_TRANSACTIONS_PER_BLOCK};
use bytes::{Buf, BufMut};

/// The primary's proposal: a timestamp, a block nonce, and the ordered
/// transaction set for this height, by hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareRequest {
    /// View the proposal was made in.
    pub view_number: u8,
    /// Proposed block timestamp, milliseconds.
    pub timestamp: u64,
    /// Proposed block nonce.
    pub nonce: u64,
    /// Ordered transaction hashes chosen by the primary.
    pub transaction_hashes: Vec<UInt256>,
}

impl Encode for PrepareRequest {
    fn encoded_size(&self) -> usize {
        1 + 8
            + 8
            + varint::size(self.transaction_hashes.len() as u64)
            + self.transaction_hashes.len() * UInt256::LEN
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.view_number.write(buf);
        self.timestamp.write(buf);
        self.nonce.write(buf);
        varint::write(buf, self.transaction_hashes.len() as u64);
        for hash in &self.transaction_hashes {
            hash.write(buf);
        }
    }
}

impl Decode for PrepareRequest {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let view_number = u8::read(buf)?;
        let timestamp = u64::read(buf)?;
        let nonce = u64::read(buf)?;
        let count = varint::read(buf, MAX_TRANSACTIONS_PER_BLOCK as u64)?;
        let mut transaction_hashes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            transaction_hashes.push(UInt256::read(buf)?);
        }
        Ok(Self {
            view_number,
            timestamp,
            nonce,
            transaction_hashes,
        })
    }
}
