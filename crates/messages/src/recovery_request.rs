//! Solicitation for recovery messages.

use dbft_encoding::{Decode, Encode, Error};
use bytes::{Buf, BufMut};

/// Asks peers to respond with a [`RecoveryMessage`](crate::RecoveryMessage)
/// reconstructing their consensus view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryRequest {
    /// The requester's current view.
    pub view_number: u8,
    /// Wall-clock time of the request, milliseconds.
    pub timestamp: u64,
}

impl Encode for RecoveryRequest {
    fn encoded_size(&self) -> usize {
        1 + 8
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.view_number.write(buf);
        self.timestamp.write(buf);
    }
}

impl Decode for RecoveryRequest {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            view_number: u8::read(buf)?,
            timestamp: u64::read(buf)?,
        })
    }
}
