//! Recovery bundle: one node's consensus view, compacted for a peer.
//!
//! A recovery message re-packages the payloads a node holds so a lagging
//! peer can rebuild them. Witness data travels in *compact* form (only
//! the invocation script) because the verification script is derivable
//! from the validator set every node already has.
//!
//! The bundle is deliberately asymmetric:
//!
//! - at most `M` change-view compacts travel (they are only evidence
//!   that a view change was justified),
//! - *all* preparation compacts travel (they are the quorum being
//!   reconstructed),
//! - commit compacts travel only if the sender itself committed; a node
//!   that has not committed must not present others' commits as if
//!   certified.

use crate::change_view::{ChangeView, ChangeViewReason};
use crate::commit::Commit;
use crate::message::ConsensusMessage;
use crate::payload::{ConsensusPayload, PayloadEnvelope};
use crate::prepare_request::PrepareRequest;
use crate::prepare_response::PrepareResponse;
use dbft_encoding::{varint, Decode, Encode, Error};
use dbft_types::{signature_script, Signature, UInt256, Witness, MAX_VALIDATORS};
use bytes::{Buf, BufMut};

/// Largest compact invocation script: a single signature push.
const MAX_COMPACT_INVOCATION: usize = 1024;

/// Compact form of a stored ChangeView payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeViewCompact {
    /// Slot of the validator that sent the change view.
    pub validator_index: u16,
    /// The view the validator was leaving.
    pub original_view_number: u8,
    /// Timestamp from the original message.
    pub timestamp: u64,
    /// Reason from the original message.
    pub reason: ChangeViewReason,
    /// Invocation script of the original payload witness.
    pub invocation: Vec<u8>,
}

impl Encode for ChangeViewCompact {
    fn encoded_size(&self) -> usize {
        2 + 1 + 8 + 1 + varint::bytes_size(self.invocation.len())
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.validator_index.write(buf);
        self.original_view_number.write(buf);
        self.timestamp.write(buf);
        self.reason.write(buf);
        varint::write_bytes(buf, &self.invocation);
    }
}

impl Decode for ChangeViewCompact {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            validator_index: u16::read(buf)?,
            original_view_number: u8::read(buf)?,
            timestamp: u64::read(buf)?,
            reason: ChangeViewReason::read(buf)?,
            invocation: varint::read_bytes(buf, MAX_COMPACT_INVOCATION as u64)?,
        })
    }
}

/// Compact form of a stored preparation payload (request or response).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparationCompact {
    /// Slot of the validator that prepared.
    pub validator_index: u16,
    /// Invocation script of the original payload witness.
    pub invocation: Vec<u8>,
}

impl Encode for PreparationCompact {
    fn encoded_size(&self) -> usize {
        2 + varint::bytes_size(self.invocation.len())
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.validator_index.write(buf);
        varint::write_bytes(buf, &self.invocation);
    }
}

impl Decode for PreparationCompact {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            validator_index: u16::read(buf)?,
            invocation: varint::read_bytes(buf, MAX_COMPACT_INVOCATION as u64)?,
        })
    }
}

/// Compact form of a stored Commit payload.
///
/// Unlike the other compacts this carries its own view number: commits
/// survive view changes in the sender's state, and the receiver must
/// know which view each signature belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitCompact {
    /// View the commit was made in.
    pub view_number: u8,
    /// Slot of the committing validator.
    pub validator_index: u16,
    /// The header signature.
    pub signature: Signature,
    /// Invocation script of the original payload witness.
    pub invocation: Vec<u8>,
}

impl Encode for CommitCompact {
    fn encoded_size(&self) -> usize {
        1 + 2 + Signature::LEN + varint::bytes_size(self.invocation.len())
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.view_number.write(buf);
        self.validator_index.write(buf);
        self.signature.write(buf);
        varint::write_bytes(buf, &self.invocation);
    }
}

impl Decode for CommitCompact {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            view_number: u8::read(buf)?,
            validator_index: u16::read(buf)?,
            signature: Signature::read(buf)?,
            invocation: varint::read_bytes(buf, MAX_COMPACT_INVOCATION as u64)?,
        })
    }
}

/// The recovery bundle itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecoveryMessage {
    /// The sender's current view.
    pub view_number: u8,
    /// Up to `M` change-view compacts from prior views.
    pub change_views: Vec<ChangeViewCompact>,
    /// The full proposal, if the sender holds the transaction list.
    pub prepare_request: Option<PrepareRequest>,
    /// When `prepare_request` is absent: the preparation hash elected by
    /// plurality over the sender's PrepareResponses.
    pub preparation_hash: Option<UInt256>,
    /// All non-empty preparation slots, compacted.
    pub preparations: Vec<PreparationCompact>,
    /// Commit compacts; empty unless the sender committed.
    pub commits: Vec<CommitCompact>,
}

impl RecoveryMessage {
    /// Rebuild full ChangeView payloads from the compacts.
    ///
    /// Compacts referencing slots outside the validator set are skipped;
    /// they cannot carry a verifiable witness.
    pub fn change_view_payloads(&self, env: &PayloadEnvelope<'_>) -> Vec<ConsensusPayload> {
        self.change_views
            .iter()
            .filter_map(|compact| {
                let verification = verification_for(env, compact.validator_index)?;
                Some(ConsensusPayload {
                    version: env.version,
                    prev_hash: env.prev_hash,
                    block_index: env.block_index,
                    validator_index: compact.validator_index,
                    message: ConsensusMessage::ChangeView(ChangeView {
                        view_number: compact.original_view_number,
                        timestamp: compact.timestamp,
                        reason: compact.reason,
                    }),
                    witness: Some(Witness::new(compact.invocation.clone(), verification)),
                })
            })
            .collect()
    }

    /// Rebuild the primary's PrepareRequest payload, if this bundle has
    /// the transaction list. The witness invocation comes from the
    /// primary's preparation compact.
    pub fn prepare_request_payload(
        &self,
        env: &PayloadEnvelope<'_>,
        primary_index: u16,
    ) -> Option<ConsensusPayload> {
        let request = self.prepare_request.clone()?;
        let invocation = self
            .preparations
            .iter()
            .find(|compact| compact.validator_index == primary_index)
            .map(|compact| compact.invocation.clone());
        let witness = match (invocation, verification_for(env, primary_index)) {
            (Some(invocation), Some(verification)) => {
                Some(Witness::new(invocation, verification))
            }
            _ => None,
        };
        Some(ConsensusPayload {
            version: env.version,
            prev_hash: env.prev_hash,
            block_index: env.block_index,
            validator_index: primary_index,
            message: ConsensusMessage::PrepareRequest(request),
            witness,
        })
    }

    /// Rebuild PrepareResponse payloads for every non-primary compact,
    /// endorsing `preparation_hash`.
    pub fn prepare_response_payloads(
        &self,
        env: &PayloadEnvelope<'_>,
        preparation_hash: UInt256,
        primary_index: u16,
    ) -> Vec<ConsensusPayload> {
        self.preparations
            .iter()
            .filter(|compact| compact.validator_index != primary_index)
            .filter_map(|compact| {
                let verification = verification_for(env, compact.validator_index)?;
                Some(ConsensusPayload {
                    version: env.version,
                    prev_hash: env.prev_hash,
                    block_index: env.block_index,
                    validator_index: compact.validator_index,
                    message: ConsensusMessage::PrepareResponse(PrepareResponse {
                        view_number: self.view_number,
                        preparation_hash,
                    }),
                    witness: Some(Witness::new(compact.invocation.clone(), verification)),
                })
            })
            .collect()
    }

    /// Rebuild Commit payloads from the compacts.
    pub fn commit_payloads(&self, env: &PayloadEnvelope<'_>) -> Vec<ConsensusPayload> {
        self.commits
            .iter()
            .filter_map(|compact| {
                let verification = verification_for(env, compact.validator_index)?;
                Some(ConsensusPayload {
                    version: env.version,
                    prev_hash: env.prev_hash,
                    block_index: env.block_index,
                    validator_index: compact.validator_index,
                    message: ConsensusMessage::Commit(Commit {
                        view_number: compact.view_number,
                        signature: compact.signature,
                    }),
                    witness: Some(Witness::new(compact.invocation.clone(), verification)),
                })
            })
            .collect()
    }
}

fn verification_for(env: &PayloadEnvelope<'_>, validator_index: u16) -> Option<Vec<u8>> {
    env.validators
        .get(validator_index as usize)
        .map(signature_script)
}

impl Encode for RecoveryMessage {
    fn encoded_size(&self) -> usize {
        let mut size = 1;
        size += varint::size(self.change_views.len() as u64);
        size += self.change_views.iter().map(Encode::encoded_size).sum::<usize>();
        size += 1;
        if let Some(request) = &self.prepare_request {
            size += request.encoded_size();
        } else {
            size += varint::bytes_size(self.preparation_hash.map_or(0, |_| UInt256::LEN));
        }
        size += varint::size(self.preparations.len() as u64);
        size += self.preparations.iter().map(Encode::encoded_size).sum::<usize>();
        size += varint::size(self.commits.len() as u64);
        size += self.commits.iter().map(Encode::encoded_size).sum::<usize>();
        size
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.view_number.write(buf);
        varint::write(buf, self.change_views.len() as u64);
        for compact in &self.change_views {
            compact.write(buf);
        }
        match &self.prepare_request {
            Some(request) => {
                buf.put_u8(1);
                request.write(buf);
            }
            None => {
                buf.put_u8(0);
                match &self.preparation_hash {
                    Some(hash) => varint::write_bytes(buf, hash.as_bytes()),
                    None => varint::write(buf, 0),
                }
            }
        }
        varint::write(buf, self.preparations.len() as u64);
        for compact in &self.preparations {
            compact.write(buf);
        }
        varint::write(buf, self.commits.len() as u64);
        for compact in &self.commits {
            compact.write(buf);
        }
    }
}

impl Decode for RecoveryMessage {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let view_number = u8::read(buf)?;
        let change_views = read_vec(buf, MAX_VALIDATORS as u64)?;
        let (prepare_request, preparation_hash) = match u8::read(buf)? {
            1 => (Some(PrepareRequest::read(buf)?), None),
            0 => {
                let bytes = varint::read_bytes(buf, UInt256::LEN as u64)?;
                let hash = match bytes.len() {
                    0 => None,
                    UInt256::LEN => {
                        let mut out = [0u8; UInt256::LEN];
                        out.copy_from_slice(&bytes);
                        Some(UInt256::from_bytes(out))
                    }
                    _ => return Err(Error::InvalidData("preparation hash length")),
                };
                (None, hash)
            }
            other => return Err(Error::InvalidTag(other, "prepare request flag")),
        };
        let preparations = read_vec(buf, MAX_VALIDATORS as u64)?;
        let commits = read_vec(buf, MAX_VALIDATORS as u64)?;
        Ok(Self {
            view_number,
            change_views,
            prepare_request,
            preparation_hash,
            preparations,
            commits,
        })
    }
}

fn read_vec<T: Decode>(buf: &mut impl Buf, max: u64) -> Result<Vec<T>, Error> {
    let count = varint::read(buf, max)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(T::read(buf)?);
    }
    Ok(out)
}
