//! Wire messages for the consensus protocol.
//!
//! Every consensus message travels inside a [`ConsensusPayload`]
//! envelope that names the height, the sending validator, and carries
//! the sender's witness. The message body is a tagged union of the six
//! protocol messages; the binary layouts here are fixed by the protocol
//! and must stay bit-compatible with peers.

mod change_view;
mod commit;
mod message;
mod payload;
mod prepare_request;
mod prepare_response;
mod recovery;
mod recovery_request;

pub use change_view::{ChangeView, ChangeViewReason};
pub use commit::Commit;
pub use message::{ConsensusMessage, MessageKind};
pub use payload::{ConsensusPayload, PayloadEnvelope};
pub use prepare_request::PrepareRequest;
pub use prepare_response::PrepareResponse;
pub use recovery::{ChangeViewCompact, CommitCompact, PreparationCompact, RecoveryMessage};
pub use recovery_request::RecoveryRequest;
