//! The tagged union of consensus messages.

use crate::change_view::ChangeView;
use crate::commit::Commit;
use crate::prepare_request::PrepareRequest;
use crate::prepare_response::PrepareResponse;
use crate::recovery::RecoveryMessage;
use crate::recovery_request::RecoveryRequest;
use dbft_encoding::{Decode, Encode, Error};
use bytes::{Buf, BufMut};

/// Wire discriminants for [`ConsensusMessage`]. Fixed by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    ChangeView = 0x00,
    PrepareRequest = 0x20,
    PrepareResponse = 0x21,
    Commit = 0x30,
    RecoveryRequest = 0x40,
    RecoveryMessage = 0x41,
}

/// One of the six consensus messages.
///
/// The source protocol models this as a polymorphic base class; a tagged
/// union lets predicates and factories pattern-match instead of
/// downcasting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsensusMessage {
    ChangeView(ChangeView),
    PrepareRequest(PrepareRequest),
    PrepareResponse(PrepareResponse),
    Commit(Commit),
    RecoveryRequest(RecoveryRequest),
    RecoveryMessage(RecoveryMessage),
}

impl ConsensusMessage {
    /// The wire discriminant.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::ChangeView(_) => MessageKind::ChangeView,
            Self::PrepareRequest(_) => MessageKind::PrepareRequest,
            Self::PrepareResponse(_) => MessageKind::PrepareResponse,
            Self::Commit(_) => MessageKind::Commit,
            Self::RecoveryRequest(_) => MessageKind::RecoveryRequest,
            Self::RecoveryMessage(_) => MessageKind::RecoveryMessage,
        }
    }

    /// The view this message was produced in.
    pub fn view_number(&self) -> u8 {
        match self {
            Self::ChangeView(m) => m.view_number,
            Self::PrepareRequest(m) => m.view_number,
            Self::PrepareResponse(m) => m.view_number,
            Self::Commit(m) => m.view_number,
            Self::RecoveryRequest(m) => m.view_number,
            Self::RecoveryMessage(m) => m.view_number,
        }
    }

    /// The inner ChangeView, if that is what this is.
    pub fn as_change_view(&self) -> Option<&ChangeView> {
        match self {
            Self::ChangeView(m) => Some(m),
            _ => None,
        }
    }

    /// The inner PrepareRequest, if that is what this is.
    pub fn as_prepare_request(&self) -> Option<&PrepareRequest> {
        match self {
            Self::PrepareRequest(m) => Some(m),
            _ => None,
        }
    }

    /// The inner PrepareResponse, if that is what this is.
    pub fn as_prepare_response(&self) -> Option<&PrepareResponse> {
        match self {
            Self::PrepareResponse(m) => Some(m),
            _ => None,
        }
    }

    /// The inner Commit, if that is what this is.
    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            Self::Commit(m) => Some(m),
            _ => None,
        }
    }
}

impl Encode for ConsensusMessage {
    fn encoded_size(&self) -> usize {
        1 + match self {
            Self::ChangeView(m) => m.encoded_size(),
            Self::PrepareRequest(m) => m.encoded_size(),
            Self::PrepareResponse(m) => m.encoded_size(),
            Self::Commit(m) => m.encoded_size(),
            Self::RecoveryRequest(m) => m.encoded_size(),
            Self::RecoveryMessage(m) => m.encoded_size(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.kind() as u8);
        match self {
            Self::ChangeView(m) => m.write(buf),
            Self::PrepareRequest(m) => m.write(buf),
            Self::PrepareResponse(m) => m.write(buf),
            Self::Commit(m) => m.write(buf),
            Self::RecoveryRequest(m) => m.write(buf),
            Self::RecoveryMessage(m) => m.write(buf),
        }
    }
}

impl Decode for ConsensusMessage {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        match u8::read(buf)? {
            0x00 => Ok(Self::ChangeView(ChangeView::read(buf)?)),
            0x20 => Ok(Self::PrepareRequest(PrepareRequest::read(buf)?)),
            0x21 => Ok(Self::PrepareResponse(PrepareResponse::read(buf)?)),
            0x30 => Ok(Self::Commit(Commit::read(buf)?)),
            0x40 => Ok(Self::RecoveryRequest(RecoveryRequest::read(buf)?)),
            0x41 => Ok(Self::RecoveryMessage(RecoveryMessage::read(buf)?)),
            other => Err(Error::InvalidTag(other, "consensus message")),
        }
    }
}
