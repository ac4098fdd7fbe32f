//! The consensus context: state model, predicates, reset, and assembly.

use crate::clock::Clock;
use crate::config::ConsensusConfig;
use crate::ledger::{Ledger, LedgerSnapshot};
use crate::wallet::Wallet;
use crate::policy::PolicyPlugin;
use dbft_messages::ConsensusPayload;
use dbft_storage::Store;
use dbft_types::{
    consensus_address, max_faulty, merkle_root, multisig_script, quorum, signature_invocation,
    Block, KeyPair, PublicKey, Transaction, UInt256, Witness,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Deterministic primary rotation.
///
/// A pure function of the block index, the view number, and the
/// validator-set size, so every honest node elects the same primary for
/// the same `(index, view)`.
pub fn primary_index(block_index: u32, view_number: u8, validator_count: usize) -> u32 {
    let n = validator_count as i64;
    let p = (block_index as i64 - view_number as i64) % n;
    ((p + n) % n) as u32
}

/// The per-height, per-view consensus state of one validator.
///
/// Owned by a single service actor; see the crate docs for the
/// concurrency contract. Payload slot arrays are public because the
/// service records verified inbound payloads into them directly; every
/// predicate recomputes from the arrays on each call, so there is no
/// cached state to invalidate.
///
/// # State Machine Flow
///
/// 1. `reset(0)` → bind to a new height, acquire the ledger snapshot
/// 2. primary calls `make_prepare_request`, backups respond
/// 3. on quorum of preparations, `make_commit`
/// 4. on `M` commits in the current view, `create_block`
/// 5. on timeout, `make_change_view`; `reset(v)` once the network agrees
pub struct ConsensusContext {
    // ═══════════════════════════════════════════════════════════════════════════
    // Block in progress
    // ═══════════════════════════════════════════════════════════════════════════
    /// The block under construction.
    pub block: Block,

    /// Current view at this height; 0 after `reset(0)`, monotonically
    /// non-decreasing until the height completes.
    pub view_number: u8,

    /// The validator set for this height, in slot order. Fixed between
    /// `reset(0)` calls.
    pub validators: Vec<PublicKey>,

    /// This node's slot in `validators`, or -1 when watch-only.
    pub my_index: i32,

    /// Ordered transaction hashes from the PrepareRequest; `None` until
    /// a proposal exists in this view.
    pub transaction_hashes: Option<Vec<UInt256>>,

    /// Full transactions covering exactly `transaction_hashes`.
    pub transactions: Option<HashMap<UInt256, Transaction>>,

    // ═══════════════════════════════════════════════════════════════════════════
    // Per-validator payload slots
    // ═══════════════════════════════════════════════════════════════════════════
    /// PrepareRequest in the primary's slot, PrepareResponses elsewhere.
    pub preparation_payloads: Vec<Option<ConsensusPayload>>,

    /// One Commit per validator that committed. Survives view changes;
    /// assembly filters by view.
    pub commit_payloads: Vec<Option<ConsensusPayload>>,

    /// Latest ChangeView per validator.
    pub change_view_payloads: Vec<Option<ConsensusPayload>>,

    /// ChangeViews preserved from prior views as recovery evidence.
    pub last_change_view_payloads: Vec<Option<ConsensusPayload>>,

    /// Per-validator highest block index seen; -1 before any message.
    /// Allocated once and deliberately never reset across heights.
    pub last_seen_message: Vec<i64>,

    // ═══════════════════════════════════════════════════════════════════════════
    // Collaborators
    // ═══════════════════════════════════════════════════════════════════════════
    pub(crate) snapshot: Option<Box<dyn LedgerSnapshot>>,
    pub(crate) key_pair: Option<KeyPair>,
    pub(crate) ledger: Arc<dyn Ledger>,
    pub(crate) wallet: Arc<dyn Wallet>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) policies: Vec<Box<dyn PolicyPlugin>>,
    pub(crate) clock: Arc<dyn Clock>,
    /// Nonce source. Not a CSPRNG and does not need to be: block safety
    /// rests on signatures, the nonce only breaks proposal symmetry.
    pub(crate) rng: ChaCha8Rng,
    pub(crate) config: ConsensusConfig,
}

impl ConsensusContext {
    /// Create a context bound to its collaborators.
    ///
    /// The context is unusable until the first [`reset`](Self::reset)
    /// with view 0 binds it to a height.
    pub fn new(
        ledger: Arc<dyn Ledger>,
        wallet: Arc<dyn Wallet>,
        store: Arc<dyn Store>,
        policies: Vec<Box<dyn PolicyPlugin>>,
        clock: Arc<dyn Clock>,
        config: ConsensusConfig,
    ) -> Self {
        let rng = ChaCha8Rng::from_entropy();
        Self::with_rng(ledger, wallet, store, policies, clock, config, rng)
    }

    /// Like [`new`](Self::new) with an explicit nonce RNG, for
    /// deterministic simulation.
    pub fn with_rng(
        ledger: Arc<dyn Ledger>,
        wallet: Arc<dyn Wallet>,
        store: Arc<dyn Store>,
        policies: Vec<Box<dyn PolicyPlugin>>,
        clock: Arc<dyn Clock>,
        config: ConsensusConfig,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            block: Block::skeleton(UInt256::ZERO, 0, dbft_types::UInt160::ZERO),
            view_number: 0,
            validators: Vec::new(),
            my_index: -1,
            transaction_hashes: None,
            transactions: None,
            preparation_payloads: Vec::new(),
            commit_payloads: Vec::new(),
            change_view_payloads: Vec::new(),
            last_change_view_payloads: Vec::new(),
            last_seen_message: Vec::new(),
            snapshot: None,
            key_pair: None,
            ledger,
            wallet,
            store,
            policies,
            clock,
            rng,
            config,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    /// The ledger snapshot for this height. `None` before the first
    /// `reset(0)`.
    pub fn snapshot(&self) -> Option<&dyn LedgerSnapshot> {
        self.snapshot.as_deref()
    }

    /// This node's signing key, when it is a validator this height.
    pub fn key_pair(&self) -> Option<&KeyPair> {
        self.key_pair.as_ref()
    }

    /// `F`: tolerated Byzantine validators for this height's set.
    pub fn max_faulty(&self) -> usize {
        max_faulty(self.validators.len())
    }

    /// `M`: signatures forming a quorum for this height's set.
    pub fn quorum(&self) -> usize {
        quorum(self.validators.len())
    }

    /// The primary slot for a given view at the current height.
    pub fn primary_for(&self, view_number: u8) -> u32 {
        primary_index(self.block.index, view_number, self.validators.len())
    }

    fn primary_slot(&self) -> usize {
        self.block.consensus_data.primary_index as usize
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Predicates
    // ═══════════════════════════════════════════════════════════════════════════
    //
    // All predicates are fresh reads over the payload arrays. Nothing
    // here may cache: the service mutates the arrays between calls.

    /// This node proposes in the current view.
    pub fn is_primary(&self) -> bool {
        self.my_index >= 0 && self.my_index as u32 == self.block.consensus_data.primary_index
    }

    /// This node validates but does not propose in the current view.
    pub fn is_backup(&self) -> bool {
        self.my_index >= 0 && !self.is_primary()
    }

    /// This node is not a validator this height.
    pub fn watch_only(&self) -> bool {
        self.my_index < 0
    }

    /// Number of validators that have committed (any view).
    pub fn count_committed(&self) -> usize {
        self.commit_payloads.iter().flatten().count()
    }

    /// Number of validators not seen at the current height.
    pub fn count_failed(&self) -> usize {
        let threshold = self.block.index as i64 - 1;
        (0..self.validators.len())
            .filter(|&i| self.last_seen_message.get(i).copied().unwrap_or(-1) < threshold)
            .count()
    }

    /// A PrepareRequest for this view exists (ours or the primary's).
    pub fn request_sent_or_received(&self) -> bool {
        self.preparation_payloads
            .get(self.primary_slot())
            .is_some_and(Option::is_some)
    }

    /// This node has prepared in the current view.
    pub fn response_sent(&self) -> bool {
        !self.watch_only() && self.preparation_payloads[self.my_index as usize].is_some()
    }

    /// This node has committed at this height.
    pub fn commit_sent(&self) -> bool {
        !self.watch_only() && self.commit_payloads[self.my_index as usize].is_some()
    }

    /// The block for this height has been assembled.
    pub fn block_sent(&self) -> bool {
        self.block.transactions.is_some()
    }

    /// This node has asked to leave the current view.
    pub fn view_changing(&self) -> bool {
        if self.watch_only() {
            return false;
        }
        self.change_view_payloads[self.my_index as usize]
            .as_ref()
            .and_then(|payload| payload.message.as_change_view())
            .is_some_and(|cv| cv.new_view_number() > self.view_number)
    }

    /// Whether inbound payloads should be refused while changing view.
    ///
    /// Once more than `F` nodes have committed or gone silent, refusing
    /// payloads can stall the network or split views, so the node keeps
    /// accepting even while it wants out.
    pub fn not_accepting_payloads_due_to_view_changing(&self) -> bool {
        self.view_changing() && !self.more_than_f_nodes_committed_or_lost()
    }

    /// More than `F` validators are committed or unreachable.
    pub fn more_than_f_nodes_committed_or_lost(&self) -> bool {
        self.count_committed() + self.count_failed() > self.max_faulty()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Reset / view change
    // ═══════════════════════════════════════════════════════════════════════════

    /// Begin a height (`view_number == 0`) or bump the view within one.
    ///
    /// A height start releases the previous ledger snapshot, acquires a
    /// fresh one, rebuilds the block skeleton and validator set, and
    /// rediscovers this node's slot. A view bump keeps all of that and
    /// only rotates the primary, but first preserves every ChangeView
    /// that justified reaching `view_number` as recovery evidence.
    pub fn reset(&mut self, view_number: u8) {
        if view_number == 0 {
            // Drop the old snapshot before acquiring: the ledger may
            // refuse two live snapshots.
            self.snapshot = None;
            let snapshot = self.ledger.snapshot();

            let validators = snapshot.next_block_validators();
            self.block = Block::skeleton(
                snapshot.current_hash(),
                snapshot.height() + 1,
                consensus_address(&validators),
            );
            self.block.version = self.config.version;
            self.validators = validators;

            let n = self.validators.len();
            self.my_index = -1;
            self.key_pair = None;
            self.change_view_payloads = vec![None; n];
            self.last_change_view_payloads = vec![None; n];
            self.commit_payloads = vec![None; n];
            if self.last_seen_message.is_empty() {
                self.last_seen_message = vec![-1; n];
            }

            for (slot, validator) in self.validators.iter().enumerate() {
                let Some(account) = self.wallet.account(validator) else {
                    continue;
                };
                if let Some(key_pair) = account.key_pair {
                    self.my_index = slot as i32;
                    self.key_pair = Some(key_pair);
                    break;
                }
            }
            self.snapshot = Some(snapshot);
        } else {
            // Keep the ChangeViews that justified reaching this view or
            // beyond; anything older is no longer evidence.
            self.last_change_view_payloads = self
                .change_view_payloads
                .iter()
                .map(|slot| {
                    slot.as_ref()
                        .filter(|payload| {
                            payload
                                .message
                                .as_change_view()
                                .is_some_and(|cv| cv.new_view_number() >= view_number)
                        })
                        .cloned()
                })
                .collect();
        }

        self.view_number = view_number;
        self.block.consensus_data.primary_index = self.primary_for(view_number);
        self.block.merkle_root = UInt256::ZERO;
        self.block.timestamp = 0;
        self.block.transactions = None;
        self.transaction_hashes = None;
        self.transactions = None;
        self.preparation_payloads = vec![None; self.validators.len()];
        if self.my_index >= 0 {
            let slot = self.my_index as usize;
            // The liveness array outlives heights; a grown validator set
            // extends it without touching existing evidence.
            if slot >= self.last_seen_message.len() {
                self.last_seen_message.resize(slot + 1, -1);
            }
            self.last_seen_message[slot] = self.block.index as i64;
        }

        debug!(
            index = self.block.index,
            view = self.view_number,
            primary = self.block.consensus_data.primary_index,
            my_index = self.my_index,
            "context reset"
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Header and block assembly
    // ═══════════════════════════════════════════════════════════════════════════

    /// Materialize the block header by computing the Merkle root over
    /// the consensus data and the proposed transaction hashes.
    ///
    /// Returns `None` until a proposal fixes the transaction hashes.
    /// Idempotent: repeated calls keep the first computed root.
    pub fn ensure_header(&mut self) -> Option<&Block> {
        let hashes = self.transaction_hashes.as_ref()?;
        if self.block.merkle_root.is_zero() {
            let mut leaves = Vec::with_capacity(1 + hashes.len());
            leaves.push(self.block.consensus_data.hash());
            leaves.extend_from_slice(hashes);
            self.block.merkle_root = merkle_root(&leaves);
        }
        Some(&self.block)
    }

    /// Assemble the witnessed block from `M` commits of the current view.
    ///
    /// Walks validators in slot order collecting header signatures from
    /// commits whose view matches, stopping at `M`, and installs the
    /// M-of-N multisig witness plus the transactions in proposal order.
    ///
    /// # Panics
    ///
    /// Panics if called without a proposal or with fewer than `M`
    /// current-view commits; the service must check `count_committed`
    /// against `M` (restricted to the current view) first.
    pub fn create_block(&mut self) -> Block {
        self.ensure_header()
            .expect("create_block requires a proposal with transaction hashes");

        let m = self.quorum();
        let mut invocation = Vec::with_capacity(m * 65);
        let mut collected = 0usize;
        for slot in self.commit_payloads.iter() {
            if collected == m {
                break;
            }
            let Some(payload) = slot else { continue };
            let Some(commit) = payload.message.as_commit() else {
                continue;
            };
            if commit.view_number != self.view_number {
                continue;
            }
            invocation.extend_from_slice(&signature_invocation(&commit.signature));
            collected += 1;
        }
        assert!(
            collected == m,
            "create_block requires {m} commits in view {}, found {collected}",
            self.view_number
        );

        let transactions = self
            .transactions
            .as_ref()
            .expect("transactions accompany transaction hashes");
        let ordered: Vec<Transaction> = self
            .transaction_hashes
            .as_ref()
            .expect("checked by ensure_header")
            .iter()
            .map(|hash| {
                transactions
                    .get(hash)
                    .cloned()
                    .expect("transactions cover every proposed hash")
            })
            .collect();

        self.block.witness = Some(Witness::new(
            invocation,
            multisig_script(m, &self.validators),
        ));
        self.block.transactions = Some(ordered);

        debug!(
            index = self.block.index,
            view = self.view_number,
            hash = %self.block.hash(),
            commits = collected,
            "block assembled"
        );
        self.block.clone()
    }
}
