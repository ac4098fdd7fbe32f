//! Outbound payload construction.
//!
//! Every factory method stamps the current view, wraps the message in a
//! payload envelope, asks the wallet for a witness, stores the result in
//! this node's slot, and returns it. Watch-only nodes get `None`.
//!
//! Signing failures do not escape: the payload comes back *unsigned*
//! (`is_signed()` is false) and the service decides whether to log and
//! drop it. The core never broadcasts, so it never needs to refuse.

use crate::context::ConsensusContext;
use dbft_messages::{
    ChangeView, ChangeViewCompact, ChangeViewReason, Commit, CommitCompact, ConsensusMessage,
    ConsensusPayload, PrepareRequest, PrepareResponse, PreparationCompact, RecoveryMessage,
    RecoveryRequest,
};
use dbft_types::{signature_invocation, signature_script, Transaction, UInt256, Witness};
use rand::Rng;
use std::collections::HashMap;
use tracing::debug;

impl ConsensusContext {
    /// Wrap `message` in a signed envelope from this node.
    ///
    /// Returns `None` when watch-only. A wallet failure yields the
    /// payload unsigned.
    fn make_signed_payload(&mut self, message: ConsensusMessage) -> Option<ConsensusPayload> {
        if self.watch_only() {
            return None;
        }
        let mut payload = ConsensusPayload {
            version: self.block.version,
            prev_hash: self.block.prev_hash,
            block_index: self.block.index,
            validator_index: self.my_index as u16,
            message,
            witness: None,
        };
        self.sign_payload(&mut payload);
        Some(payload)
    }

    fn sign_payload(&self, payload: &mut ConsensusPayload) {
        let Some(key_pair) = &self.key_pair else {
            return;
        };
        let public_key = key_pair.public_key();
        if let Ok(signature) = self.wallet.sign(&payload.sign_data(), &public_key) {
            payload.witness = Some(Witness::new(
                signature_invocation(&signature),
                signature_script(&public_key),
            ));
        }
    }

    /// Build, store, and return a ChangeView asking for the next view.
    pub fn make_change_view(&mut self, reason: ChangeViewReason) -> Option<ConsensusPayload> {
        let message = ConsensusMessage::ChangeView(ChangeView {
            view_number: self.view_number,
            timestamp: self.clock.now_ms(),
            reason,
        });
        let payload = self.make_signed_payload(message)?;
        debug!(
            index = self.block.index,
            view = self.view_number,
            reason = ?reason,
            "change view requested"
        );
        self.change_view_payloads[self.my_index as usize] = Some(payload.clone());
        Some(payload)
    }

    /// Build, store, and return this primary's proposal.
    ///
    /// Draws the block nonce, pulls verified transactions from the
    /// memory pool through the policy plugins, fixes the transaction
    /// hashes, and stamps a timestamp strictly after the parent's.
    ///
    /// # Panics
    ///
    /// Panics when called by a non-primary or before `reset(0)`; both
    /// are service programming errors.
    pub fn make_prepare_request(&mut self) -> Option<ConsensusPayload> {
        assert!(
            self.is_primary(),
            "make_prepare_request is a primary-only operation"
        );
        let nonce: u64 = self.rng.gen();

        let (transactions, min_timestamp) = {
            let snapshot = self
                .snapshot
                .as_deref()
                .expect("reset(0) must precede make_prepare_request");
            let mut transactions = snapshot.sorted_verified_transactions();
            for policy in &self.policies {
                transactions = policy.filter_for_block(transactions);
            }
            transactions.truncate(self.config.max_transactions_per_block);
            let min_timestamp = snapshot
                .header(&self.block.prev_hash)
                .map_or(0, |header| header.timestamp + 1);
            (transactions, min_timestamp)
        };

        let hashes: Vec<UInt256> = transactions.iter().map(Transaction::hash).collect();
        let by_hash: HashMap<UInt256, Transaction> = hashes
            .iter()
            .copied()
            .zip(transactions)
            .collect();
        self.transaction_hashes = Some(hashes.clone());
        self.transactions = Some(by_hash);

        // Strictly monotone timestamps: never at or before the parent,
        // even under clock skew.
        self.block.timestamp = self.clock.now_ms().max(min_timestamp);
        self.block.consensus_data.nonce = nonce;

        let message = ConsensusMessage::PrepareRequest(PrepareRequest {
            view_number: self.view_number,
            timestamp: self.block.timestamp,
            nonce,
            transaction_hashes: hashes,
        });
        let payload = self.make_signed_payload(message)?;
        debug!(
            index = self.block.index,
            view = self.view_number,
            timestamp = self.block.timestamp,
            transactions = self.transaction_hashes.as_ref().map_or(0, Vec::len),
            "prepare request built"
        );
        self.preparation_payloads[self.my_index as usize] = Some(payload.clone());
        Some(payload)
    }

    /// Build, store, and return this backup's endorsement of the
    /// primary's proposal. `None` until a PrepareRequest payload is in
    /// the primary slot.
    pub fn make_prepare_response(&mut self) -> Option<ConsensusPayload> {
        let primary_slot = self.block.consensus_data.primary_index as usize;
        let preparation_hash = self.preparation_payloads.get(primary_slot)?.as_ref()?.hash();
        let message = ConsensusMessage::PrepareResponse(PrepareResponse {
            view_number: self.view_number,
            preparation_hash,
        });
        let payload = self.make_signed_payload(message)?;
        self.preparation_payloads[self.my_index as usize] = Some(payload.clone());
        Some(payload)
    }

    /// Build, store, and return this node's commit: a signature over the
    /// materialized block header.
    ///
    /// Idempotent: once a commit exists it is returned unchanged, so a
    /// restarted or re-driven service can never produce two conflicting
    /// header signatures at one height.
    pub fn make_commit(&mut self) -> Option<ConsensusPayload> {
        if self.watch_only() {
            return None;
        }
        let slot = self.my_index as usize;
        if let Some(existing) = &self.commit_payloads[slot] {
            return Some(existing.clone());
        }

        let key_pair = self.key_pair.clone()?;
        let header_bytes = self.ensure_header()?.header_bytes();
        let message = ConsensusMessage::Commit(Commit {
            view_number: self.view_number,
            signature: key_pair.sign(&header_bytes),
        });
        let payload = self.make_signed_payload(message)?;
        debug!(
            index = self.block.index,
            view = self.view_number,
            "commit signed"
        );
        self.commit_payloads[slot] = Some(payload.clone());
        Some(payload)
    }

    /// Build and return a request for peers' recovery messages.
    pub fn make_recovery_request(&mut self) -> Option<ConsensusPayload> {
        let message = ConsensusMessage::RecoveryRequest(RecoveryRequest {
            view_number: self.view_number,
            timestamp: self.clock.now_ms(),
        });
        self.make_signed_payload(message)
    }

    /// Build and return a recovery bundle reconstructing this node's
    /// consensus view for a peer.
    ///
    /// At most `M` change-view compacts travel, but *all* preparation
    /// compacts do: change views are merely evidence, preparations are
    /// the quorum being reconstructed. Commits are included only when
    /// this node itself committed; a node that has not must not present
    /// others' commits as if certified.
    pub fn make_recovery_message(&mut self) -> Option<ConsensusPayload> {
        let change_views: Vec<ChangeViewCompact> = self
            .last_change_view_payloads
            .iter()
            .flatten()
            .filter_map(|payload| {
                let cv = payload.message.as_change_view()?;
                Some(ChangeViewCompact {
                    validator_index: payload.validator_index,
                    original_view_number: cv.view_number,
                    timestamp: cv.timestamp,
                    reason: cv.reason,
                    invocation: invocation_of(payload),
                })
            })
            .take(self.quorum())
            .collect();

        let (prepare_request, preparation_hash) = if let Some(hashes) = &self.transaction_hashes {
            // We hold the transaction list: ship the proposal itself,
            // rebuilt from context state.
            let request = PrepareRequest {
                view_number: self.view_number,
                timestamp: self.block.timestamp,
                nonce: self.block.consensus_data.nonce,
                transaction_hashes: hashes.clone(),
            };
            (Some(request), None)
        } else {
            (None, self.plurality_preparation_hash())
        };

        let preparations: Vec<PreparationCompact> = self
            .preparation_payloads
            .iter()
            .flatten()
            .map(|payload| PreparationCompact {
                validator_index: payload.validator_index,
                invocation: invocation_of(payload),
            })
            .collect();

        let commits: Vec<CommitCompact> = if self.commit_sent() {
            self.commit_payloads
                .iter()
                .flatten()
                .filter_map(|payload| {
                    let commit = payload.message.as_commit()?;
                    Some(CommitCompact {
                        view_number: commit.view_number,
                        validator_index: payload.validator_index,
                        signature: commit.signature,
                        invocation: invocation_of(payload),
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        let message = ConsensusMessage::RecoveryMessage(RecoveryMessage {
            view_number: self.view_number,
            change_views,
            prepare_request,
            preparation_hash,
            preparations,
            commits,
        });
        self.make_signed_payload(message)
    }

    /// The preparation hash most endorsed by current PrepareResponses.
    /// Ties resolve to the hash first seen in slot order, which is
    /// deterministic across nodes observing the same slots.
    fn plurality_preparation_hash(&self) -> Option<UInt256> {
        let mut tally: Vec<(UInt256, usize)> = Vec::new();
        for payload in self.preparation_payloads.iter().flatten() {
            let Some(response) = payload.message.as_prepare_response() else {
                continue;
            };
            match tally
                .iter_mut()
                .find(|(hash, _)| *hash == response.preparation_hash)
            {
                Some((_, count)) => *count += 1,
                None => tally.push((response.preparation_hash, 1)),
            }
        }
        let mut best: Option<(UInt256, usize)> = None;
        for (hash, count) in tally {
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((hash, count));
            }
        }
        best.map(|(hash, _)| hash)
    }
}

fn invocation_of(payload: &ConsensusPayload) -> Vec<u8> {
    payload
        .witness
        .as_ref()
        .map(|witness| witness.invocation.clone())
        .unwrap_or_default()
}
