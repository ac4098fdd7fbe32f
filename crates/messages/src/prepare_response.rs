//! A backup's endorsement of the primary's proposal.

use dbft_encoding::{Decode, Encode, Error};
use dbft_types::UInt256;
use bytes::{Buf, BufMut};

/// Endorses the PrepareRequest payload identified by `preparation_hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareResponse {
    /// View the endorsement applies to.
    pub view_number: u8,
    /// Hash of the primary's PrepareRequest payload.
    pub preparation_hash: UInt256,
}

impl Encode for PrepareResponse {
    fn encoded_size(&self) -> usize {
        1 + UInt256::LEN
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.view_number.write(buf);
        self.preparation_hash.write(buf);
    }
}

impl Decode for PrepareResponse {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            view_number: u8::read(buf)?,
            preparation_hash: UInt256::read(buf)?,
        })
    }
}
