//! A validator's signature over the proposed block header.

use dbft_encoding::{Decode, Encode, Error};
use dbft_types::Signature;
use bytes::{Buf, BufMut};

/// Broadcast once endorsements prove a quorum is reachable. The
/// signature covers the block header and is the validator's
/// irrevocable contribution to the block witness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// View the commitment was made in. Commits from other views do not
    /// count toward assembly.
    pub view_number: u8,
    /// Header signature.
    pub signature: Signature,
}

impl Encode for Commit {
    fn encoded_size(&self) -> usize {
        1 + Signature::LEN
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.view_number.write(buf);
        self.signature.write(buf);
    }
}

impl Decode for Commit {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            view_number: u8::read(buf)?,
            signature: Signature::read(buf)?,
        })
    }
}
