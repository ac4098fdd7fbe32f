//! Request to abandon the current view.

use dbft_encoding::{Decode, Encode, Error};
use bytes::{Buf, BufMut};

/// Why a validator wants to leave its view.
///
/// Reason codes are diagnostic: they travel on the wire so operators can
/// see *why* the network is rotating primaries, but no protocol rule
/// branches on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChangeViewReason {
    /// The view timed out without a block.
    Timeout = 0x0,
    /// Joining a view change the rest of the network already agreed on.
    ChangeAgreement = 0x1,
    /// The primary proposed transactions this node could not resolve.
    TxNotFound = 0x2,
    /// A proposed transaction was rejected by local policy.
    TxRejectedByPolicy = 0x3,
    /// A proposed transaction failed verification.
    TxInvalid = 0x4,
    /// The assembled block was rejected by local policy.
    BlockRejectedByPolicy = 0x5,
}

impl Encode for ChangeViewReason {
    fn encoded_size(&self) -> usize {
        1
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(*self as u8);
    }
}

impl Decode for ChangeViewReason {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        match u8::read(buf)? {
            0x0 => Ok(Self::Timeout),
            0x1 => Ok(Self::ChangeAgreement),
            0x2 => Ok(Self::TxNotFound),
            0x3 => Ok(Self::TxRejectedByPolicy),
            0x4 => Ok(Self::TxInvalid),
            0x5 => Ok(Self::BlockRejectedByPolicy),
            other => Err(Error::InvalidTag(other, "change view reason")),
        }
    }
}

/// A validator's vote to move from `view_number` to the next view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeView {
    /// The view being abandoned.
    pub view_number: u8,
    /// Wall-clock time of the request, milliseconds.
    pub timestamp: u64,
    /// Diagnostic reason code.
    pub reason: ChangeViewReason,
}

impl ChangeView {
    /// The view this request asks the network to move to.
    pub fn new_view_number(&self) -> u8 {
        self.view_number.wrapping_add(1)
    }
}

impl Encode for ChangeView {
    fn encoded_size(&self) -> usize {
        1 + 8 + 1
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.view_number.write(buf);
        self.timestamp.write(buf);
        self.reason.write(buf);
    }
}

impl Decode for ChangeView {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            view_number: u8::read(buf)?,
            timestamp: u64::read(buf)?,
            reason: ChangeViewReason::read(buf)?,
        })
    }
}
