//! End-to-end tests for the consensus context: height lifecycle, view
//! changes, block assembly, recovery bundles, and checkpointing.

use dbft_consensus::test_utils::{
    test_context, test_context_with_wallet, test_transaction, validator_keys, ManualClock,
    MemoryLedger, MemoryWallet,
};
use dbft_consensus::{primary_index, ConsensusContext, Header};
use dbft_messages::{
    ChangeView, ChangeViewReason, Commit, ConsensusMessage, ConsensusPayload,
};
use dbft_storage::{MemoryStore, Store};
use dbft_types::{
    consensus_address, hash256, signature_invocation, signature_script, verify_multisig_witness,
    KeyPair, Transaction, UInt256, Witness,
};
use proptest::prelude::*;
use std::sync::Arc;
use tracing_test::traced_test;

struct TestChain {
    keys: Vec<KeyPair>,
    ledger: Arc<MemoryLedger>,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
}

fn chain(n: usize) -> TestChain {
    let keys = validator_keys(n);
    let validators = keys.iter().map(KeyPair::public_key).collect();
    TestChain {
        keys,
        ledger: Arc::new(MemoryLedger::new(validators)),
        store: Arc::new(MemoryStore::new()),
        clock: Arc::new(ManualClock::new(1_000_000)),
    }
}

impl TestChain {
    /// A context for validator `slot`, already bound to the height.
    fn node(&self, slot: usize) -> ConsensusContext {
        let mut ctx = test_context(
            &self.keys,
            Some(slot),
            self.ledger.clone(),
            self.store.clone(),
            self.clock.clone(),
        );
        ctx.reset(0);
        ctx
    }

    fn watcher(&self) -> ConsensusContext {
        let mut ctx = test_context(
            &self.keys,
            None,
            self.ledger.clone(),
            self.store.clone(),
            self.clock.clone(),
        );
        ctx.reset(0);
        ctx
    }

    /// A payload as validator `slot` would have signed and sent it.
    fn signed_payload(
        &self,
        ctx: &ConsensusContext,
        slot: usize,
        message: ConsensusMessage,
    ) -> ConsensusPayload {
        let mut payload = ConsensusPayload {
            version: ctx.block.version,
            prev_hash: ctx.block.prev_hash,
            block_index: ctx.block.index,
            validator_index: slot as u16,
            message,
            witness: None,
        };
        let signature = self.keys[slot].sign(&payload.sign_data());
        payload.witness = Some(Witness::new(
            signature_invocation(&signature),
            signature_script(&self.keys[slot].public_key()),
        ));
        payload
    }

    /// A commit from validator `slot` over the context's current header.
    fn commit_from(&self, ctx: &mut ConsensusContext, slot: usize) -> ConsensusPayload {
        let header_bytes = ctx
            .ensure_header()
            .expect("commit requires a proposal")
            .header_bytes();
        let message = ConsensusMessage::Commit(Commit {
            view_number: ctx.view_number,
            signature: self.keys[slot].sign(&header_bytes),
        });
        self.signed_payload(ctx, slot, message)
    }

    /// A change view from validator `slot` leaving `from_view`.
    fn change_view_from(
        &self,
        ctx: &ConsensusContext,
        slot: usize,
        from_view: u8,
    ) -> ConsensusPayload {
        let message = ConsensusMessage::ChangeView(ChangeView {
            view_number: from_view,
            timestamp: 7,
            reason: ChangeViewReason::Timeout,
        });
        self.signed_payload(ctx, slot, message)
    }
}

// Slot 1 is the primary for block index 1 at view 0: (1 - 0) mod N = 1.
const PRIMARY: usize = 1;
const BACKUP: usize = 0;

// ═══════════════════════════════════════════════════════════════════════════
// Height start and roles
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_reset_binds_height() {
    let chain = chain(7);
    let ctx = chain.node(0);

    assert_eq!(ctx.view_number, 0);
    assert_eq!(ctx.block.index, 1);
    assert_eq!(ctx.block.prev_hash, chain.ledger.current_hash());
    assert_eq!(ctx.validators.len(), 7);
    assert_eq!(ctx.my_index, 0);
    // Every payload array spans the validator set.
    for len in [
        ctx.preparation_payloads.len(),
        ctx.commit_payloads.len(),
        ctx.change_view_payloads.len(),
        ctx.last_change_view_payloads.len(),
        ctx.last_seen_message.len(),
    ] {
        assert_eq!(len, 7);
    }
    assert!(ctx.preparation_payloads.iter().all(Option::is_none));
    assert!(ctx.commit_payloads.iter().all(Option::is_none));
    assert!(ctx.transaction_hashes.is_none());
    assert!(ctx.transactions.is_none());
    assert!(ctx.snapshot().is_some());

    let validators: Vec<_> = chain.keys.iter().map(KeyPair::public_key).collect();
    assert_eq!(ctx.block.next_consensus, consensus_address(&validators));

    // Our own liveness slot is stamped with the height under agreement.
    assert_eq!(ctx.last_seen_message[0], 1);
}

#[test]
fn test_quorum_math() {
    for (n, f, m) in [(1usize, 0, 1), (4, 1, 3), (7, 2, 5)] {
        let ctx = chain(n).node(0);
        assert_eq!(ctx.max_faulty(), f, "F for n={n}");
        assert_eq!(ctx.quorum(), m, "M for n={n}");
    }
}

#[test]
fn test_roles_at_view_zero() {
    let chain = chain(4);
    let primary = chain.node(PRIMARY);
    assert!(primary.is_primary());
    assert!(!primary.is_backup());
    assert!(!primary.watch_only());

    let backup = chain.node(BACKUP);
    assert!(backup.is_backup());
    assert!(!backup.is_primary());
}

#[test]
fn test_watch_only_node() {
    let chain = chain(4);
    let mut watcher = chain.watcher();

    assert_eq!(watcher.my_index, -1);
    assert!(watcher.watch_only());
    assert!(!watcher.is_primary());
    assert!(!watcher.is_backup());
    assert!(!watcher.response_sent());
    assert!(!watcher.commit_sent());
    assert!(!watcher.view_changing());
    assert!(watcher.key_pair().is_none());

    // The factory refuses to mint payloads for a non-validator.
    assert!(watcher.make_change_view(ChangeViewReason::Timeout).is_none());
    assert!(watcher.make_commit().is_none());
    assert!(watcher.make_recovery_request().is_none());
}

#[test]
fn test_last_seen_survives_heights() {
    let chain = chain(4);
    let mut ctx = chain.node(0);
    ctx.last_seen_message[2] = 1;
    ctx.last_seen_message[3] = -1;

    // The chain advances; a new height begins.
    let tip = hash256(b"block-1");
    chain.ledger.set_tip(
        tip,
        Header {
            index: 1,
            timestamp: 123,
            prev_hash: chain.ledger.current_hash(),
        },
    );
    ctx.reset(0);

    assert_eq!(ctx.block.index, 2);
    // Evidence about other validators is deliberately preserved.
    assert_eq!(ctx.last_seen_message[2], 1);
    assert_eq!(ctx.last_seen_message[3], -1);
    // Our own slot tracks the new height.
    assert_eq!(ctx.last_seen_message[0], 2);
}

// ═══════════════════════════════════════════════════════════════════════════
// Prepare request / response
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_prepare_request_fixes_proposal() {
    let chain = chain(4);
    chain
        .ledger
        .set_mempool(vec![test_transaction(1), test_transaction(2)]);
    let mut primary = chain.node(PRIMARY);

    let payload = primary.make_prepare_request().expect("primary can propose");
    assert!(payload.is_signed());

    let hashes = primary.transaction_hashes.as_ref().unwrap();
    assert_eq!(hashes.len(), 2);
    let transactions = primary.transactions.as_ref().unwrap();
    assert_eq!(transactions.len(), 2);
    assert!(hashes.iter().all(|h| transactions.contains_key(h)));

    // The proposal is stored in the primary's own slot.
    assert!(primary.request_sent_or_received());
    assert!(primary.response_sent());
    assert_eq!(
        primary.preparation_payloads[PRIMARY].as_ref().unwrap().hash(),
        payload.hash()
    );

    let request = payload.message.as_prepare_request().unwrap();
    assert_eq!(request.transaction_hashes, *hashes);
    assert_eq!(request.timestamp, primary.block.timestamp);
    assert_eq!(request.nonce, primary.block.consensus_data.nonce);
}

#[test]
fn test_prepare_request_timestamp_monotonicity() {
    let chain = chain(4);
    // Parent claims timestamp 1000.
    chain.ledger.insert_header(
        chain.ledger.current_hash(),
        Header {
            index: 0,
            timestamp: 1_000,
            prev_hash: UInt256::ZERO,
        },
    );

    // Local clock lags the parent: proposal lands at parent + 1.
    chain.clock.set(500);
    let mut primary = chain.node(PRIMARY);
    primary.make_prepare_request().unwrap();
    assert_eq!(primary.block.timestamp, 1_001);

    // Local clock is ahead: proposal uses it as-is.
    chain.clock.set(2_000);
    primary.reset(0);
    primary.make_prepare_request().unwrap();
    assert_eq!(primary.block.timestamp, 2_000);
}

#[test]
#[should_panic(expected = "primary-only")]
fn test_prepare_request_requires_primary() {
    let chain = chain(4);
    let mut backup = chain.node(BACKUP);
    backup.make_prepare_request();
}

#[test]
fn test_prepare_response_requires_request() {
    let chain = chain(4);
    let mut backup = chain.node(BACKUP);
    assert!(backup.make_prepare_response().is_none());
    assert!(!backup.response_sent());
}

#[traced_test]
#[test]
fn test_prepare_response_endorses_request() {
    let chain = chain(4);
    chain.ledger.set_mempool(vec![test_transaction(9)]);

    let mut primary = chain.node(PRIMARY);
    let request = primary.make_prepare_request().unwrap();

    // The service delivers the request to a backup.
    let mut backup = chain.node(BACKUP);
    backup.preparation_payloads[PRIMARY] = Some(request.clone());
    assert!(backup.request_sent_or_received());

    let response = backup.make_prepare_response().unwrap();
    assert!(response.is_signed());
    assert!(backup.response_sent());
    assert_eq!(
        response
            .message
            .as_prepare_response()
            .unwrap()
            .preparation_hash,
        request.hash()
    );
}

#[test]
fn test_policy_plugins_compose_in_order() {
    use dbft_consensus::{MaxTransactionsPolicy, PolicyPlugin};

    // An even-nonce filter ahead of a count cap: order matters.
    struct EvenNoncesOnly;
    impl PolicyPlugin for EvenNoncesOnly {
        fn filter_for_block(&self, transactions: Vec<Transaction>) -> Vec<Transaction> {
            transactions
                .into_iter()
                .filter(|tx| tx.nonce % 2 == 0)
                .collect()
        }
    }

    let chain = chain(4);
    chain
        .ledger
        .set_mempool((0..6).map(test_transaction).collect());
    let mut primary = test_context_with_wallet(
        MemoryWallet::new(vec![chain.keys[PRIMARY].clone()]),
        chain.ledger.clone(),
        chain.store.clone(),
        chain.clock.clone(),
        vec![
            Box::new(EvenNoncesOnly),
            Box::new(MaxTransactionsPolicy { limit: 2 }),
        ],
    );
    primary.reset(0);
    primary.make_prepare_request().unwrap();

    let hashes = primary.transaction_hashes.as_ref().unwrap();
    let expected: Vec<UInt256> = [0u32, 2]
        .iter()
        .map(|&n| test_transaction(n).hash())
        .collect();
    assert_eq!(*hashes, expected);
}

// ═══════════════════════════════════════════════════════════════════════════
// Commit and assembly
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_commit_requires_proposal() {
    let chain = chain(4);
    let mut backup = chain.node(BACKUP);
    assert!(backup.make_commit().is_none());
}

#[traced_test]
#[test]
fn test_commit_is_idempotent() {
    let chain = chain(4);
    chain.ledger.set_mempool(vec![test_transaction(1)]);
    let mut primary = chain.node(PRIMARY);
    primary.make_prepare_request().unwrap();

    let first = primary.make_commit().unwrap();
    let second = primary.make_commit().unwrap();
    assert_eq!(first, second);
    assert_eq!(
        dbft_encoding::Encode::encode_to_vec(&first),
        dbft_encoding::Encode::encode_to_vec(&second)
    );
    assert!(primary.commit_sent());
    assert_eq!(primary.count_committed(), 1);
}

#[test]
fn test_ensure_header_is_idempotent() {
    let chain = chain(4);
    chain
        .ledger
        .set_mempool(vec![test_transaction(1), test_transaction(2)]);
    let mut primary = chain.node(PRIMARY);

    assert!(primary.ensure_header().is_none(), "no proposal yet");
    primary.make_prepare_request().unwrap();

    let root = primary.ensure_header().unwrap().merkle_root;
    assert!(!root.is_zero());
    assert_eq!(primary.ensure_header().unwrap().merkle_root, root);

    // The root covers the consensus data hash followed by the proposal.
    let mut leaves = vec![primary.block.consensus_data.hash()];
    leaves.extend_from_slice(primary.transaction_hashes.as_ref().unwrap());
    assert_eq!(root, dbft_types::merkle_root(&leaves));
}

#[traced_test]
#[test]
fn test_block_assembly_with_quorum() {
    let chain = chain(4);
    chain
        .ledger
        .set_mempool(vec![test_transaction(5), test_transaction(6)]);
    let mut primary = chain.node(PRIMARY);
    primary.make_prepare_request().unwrap();

    // Commits land from validators 0, 2, 3: exactly M = 3, and not the
    // primary itself, exercising slot-order collection.
    for slot in [0usize, 2, 3] {
        let commit = chain.commit_from(&mut primary, slot);
        primary.commit_payloads[slot] = Some(commit);
    }
    assert_eq!(primary.count_committed(), 3);

    let block = primary.create_block();
    assert!(primary.block_sent());

    // The witness must validate against the M-of-N multisig contract.
    let witness = block.witness.as_ref().unwrap();
    assert!(verify_multisig_witness(witness, &block.header_bytes()));

    // Transactions appear in proposal order.
    let hashes: Vec<UInt256> = block
        .transactions
        .as_ref()
        .unwrap()
        .iter()
        .map(Transaction::hash)
        .collect();
    assert_eq!(hashes, *primary.transaction_hashes.as_ref().unwrap());
}

#[test]
#[should_panic(expected = "commits in view")]
fn test_block_assembly_requires_quorum() {
    let chain = chain(4);
    chain.ledger.set_mempool(vec![test_transaction(5)]);
    let mut primary = chain.node(PRIMARY);
    primary.make_prepare_request().unwrap();

    let commit = chain.commit_from(&mut primary, 0);
    primary.commit_payloads[0] = Some(commit);
    primary.create_block();
}

#[test]
#[should_panic(expected = "commits in view")]
fn test_block_assembly_ignores_stale_view_commits() {
    let chain = chain(4);
    chain.ledger.set_mempool(vec![test_transaction(5)]);
    let mut primary = chain.node(PRIMARY);
    primary.make_prepare_request().unwrap();

    // Three commits, but one claims a different view: only two count.
    for slot in [0usize, 2] {
        let commit = chain.commit_from(&mut primary, slot);
        primary.commit_payloads[slot] = Some(commit);
    }
    let mut stale = chain.commit_from(&mut primary, 3);
    if let ConsensusMessage::Commit(commit) = &mut stale.message {
        commit.view_number = 9;
    }
    primary.commit_payloads[3] = Some(stale);

    assert_eq!(primary.count_committed(), 3);
    primary.create_block();
}

// ═══════════════════════════════════════════════════════════════════════════
// View change
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_change_view_factory() {
    let chain = chain(4);
    let mut ctx = chain.node(BACKUP);
    assert!(!ctx.view_changing());

    let payload = ctx.make_change_view(ChangeViewReason::Timeout).unwrap();
    let cv = payload.message.as_change_view().unwrap();
    assert_eq!(cv.view_number, 0);
    assert_eq!(cv.new_view_number(), 1);
    assert_eq!(cv.timestamp, chain.clock.now_ms());
    assert!(ctx.view_changing());
}

#[test]
fn test_view_bump_preserves_evidence() {
    let chain = chain(4);
    let mut ctx = chain.node(BACKUP);

    // Validators request new views [3, 2, 4, 2] (as new_view_number).
    for (slot, target) in [(0usize, 3u8), (1, 2), (2, 4), (3, 2)] {
        let payload = chain.change_view_from(&ctx, slot, target - 1);
        ctx.change_view_payloads[slot] = Some(payload);
    }

    ctx.reset(3);
    assert_eq!(ctx.view_number, 3);

    // Only requests targeting view >= 3 survive as evidence.
    let survivors: Vec<bool> = ctx
        .last_change_view_payloads
        .iter()
        .map(Option::is_some)
        .collect();
    assert_eq!(survivors, vec![true, false, true, false]);
    for payload in ctx.last_change_view_payloads.iter().flatten() {
        let cv = payload.message.as_change_view().unwrap();
        assert!(cv.new_view_number() >= 3);
    }

    // The view bump cleared the proposal state and rotated the primary.
    assert!(ctx.preparation_payloads.iter().all(Option::is_none));
    assert!(ctx.transaction_hashes.is_none());
    assert_eq!(
        ctx.block.consensus_data.primary_index,
        primary_index(ctx.block.index, 3, 4)
    );
    // The snapshot is not reacquired and the slot is unchanged.
    assert!(ctx.snapshot().is_some());
    assert_eq!(ctx.my_index, BACKUP as i32);
}

#[test]
fn test_not_accepting_payloads_while_changing_view() {
    let chain = chain(4);
    let mut ctx = chain.node(BACKUP);
    ctx.make_change_view(ChangeViewReason::Timeout).unwrap();

    // F = 1: with nobody committed or lost beyond F, stop accepting.
    // count_failed counts validators never seen at this height; mark
    // everyone else as alive first.
    for slot in 0..4 {
        ctx.last_seen_message[slot] = ctx.block.index as i64;
    }
    assert!(ctx.view_changing());
    assert!(!ctx.more_than_f_nodes_committed_or_lost());
    assert!(ctx.not_accepting_payloads_due_to_view_changing());

    // Two validators go silent: refusing payloads would stall the
    // network, so the node accepts again even while changing view.
    ctx.last_seen_message[2] = -1;
    ctx.last_seen_message[3] = -1;
    assert_eq!(ctx.count_failed(), 2);
    assert!(ctx.more_than_f_nodes_committed_or_lost());
    assert!(!ctx.not_accepting_payloads_due_to_view_changing());
}

#[test]
fn test_committed_plus_failed_definition() {
    let chain = chain(7);
    chain.ledger.set_mempool(vec![test_transaction(1)]);
    let mut primary = chain.node(PRIMARY);
    primary.make_prepare_request().unwrap();

    for slot in 0..7 {
        primary.last_seen_message[slot] = primary.block.index as i64;
    }
    assert_eq!(primary.count_failed(), 0);

    // Two committed plus one lost exceeds F = 2.
    primary.make_commit().unwrap();
    let commit = chain.commit_from(&mut primary, 2);
    primary.commit_payloads[2] = Some(commit);
    primary.last_seen_message[5] = -1;

    assert_eq!(primary.count_committed(), 2);
    assert_eq!(primary.count_failed(), 1);
    assert!(primary.more_than_f_nodes_committed_or_lost());
}

// ═══════════════════════════════════════════════════════════════════════════
// Recovery
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_recovery_message_shape() {
    let chain = chain(4);
    chain.ledger.set_mempool(vec![test_transaction(1)]);

    // Slot 0 is the primary for view 1 at index 1: (1 - 1) mod 4 = 0.
    // Evidence first: all four validators asked to leave view 0.
    let mut ctx = chain.node(0);
    for slot in 0..4 {
        let payload = chain.change_view_from(&ctx, slot, 0);
        ctx.change_view_payloads[slot] = Some(payload);
    }
    ctx.reset(1);
    assert!(ctx.is_primary());
    ctx.make_prepare_request().unwrap();
    ctx.make_commit().unwrap();
    let other_commit = chain.commit_from(&mut ctx, 2);
    ctx.commit_payloads[2] = Some(other_commit);

    let payload = ctx.make_recovery_message().unwrap();
    let ConsensusMessage::RecoveryMessage(recovery) = &payload.message else {
        panic!("expected a recovery message");
    };

    // At most M change-view compacts travel, all preparations do, and
    // commits travel because this node committed.
    assert_eq!(recovery.view_number, 1);
    assert_eq!(recovery.change_views.len(), ctx.quorum());
    assert!(recovery.prepare_request.is_some());
    assert!(recovery.preparation_hash.is_none());
    assert_eq!(recovery.preparations.len(), 1);
    assert_eq!(recovery.commits.len(), 2);

    // The bundle survives the wire.
    let encoded = dbft_encoding::Encode::encode_to_vec(&payload);
    let decoded = <ConsensusPayload as dbft_encoding::Decode>::decode_all(&encoded).unwrap();
    assert_eq!(decoded, payload);
}

#[test]
fn test_recovery_message_withholds_commits_when_not_committed() {
    let chain = chain(4);
    chain.ledger.set_mempool(vec![test_transaction(1)]);
    let mut primary = chain.node(PRIMARY);
    primary.make_prepare_request().unwrap();

    // Another validator committed, but this node did not: presenting
    // that commit would claim a certification we cannot stand behind.
    let commit = chain.commit_from(&mut primary, 2);
    primary.commit_payloads[2] = Some(commit);

    let payload = primary.make_recovery_message().unwrap();
    let ConsensusMessage::RecoveryMessage(recovery) = &payload.message else {
        panic!("expected a recovery message");
    };
    assert!(!primary.commit_sent());
    assert!(recovery.commits.is_empty());
}

#[test]
fn test_recovery_message_elects_preparation_hash_by_plurality() {
    let chain = chain(7);
    let mut backup = chain.node(BACKUP);

    // No transaction list: the node only holds responses. Hash `a` is
    // endorsed twice, `b` once.
    let a = hash256(b"proposal-a");
    let b = hash256(b"proposal-b");
    for (slot, hash) in [(2usize, a), (4, b), (5, a)] {
        let message = ConsensusMessage::PrepareResponse(dbft_messages::PrepareResponse {
            view_number: 0,
            preparation_hash: hash,
        });
        let payload = chain.signed_payload(&backup, slot, message);
        backup.preparation_payloads[slot] = Some(payload);
    }

    let payload = backup.make_recovery_message().unwrap();
    let ConsensusMessage::RecoveryMessage(recovery) = &payload.message else {
        panic!("expected a recovery message");
    };
    assert!(recovery.prepare_request.is_none());
    assert_eq!(recovery.preparation_hash, Some(a));
    assert_eq!(recovery.preparations.len(), 3);
}

// ═══════════════════════════════════════════════════════════════════════════
// Signing failures
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_wallet_failure_yields_unsigned_payload() {
    let chain = chain(4);
    let mut ctx = test_context_with_wallet(
        MemoryWallet::with_signing_disabled(vec![chain.keys[BACKUP].clone()]),
        chain.ledger.clone(),
        chain.store.clone(),
        chain.clock.clone(),
        Vec::new(),
    );
    ctx.reset(0);
    assert_eq!(ctx.my_index, BACKUP as i32, "account discovery still works");

    // No escaping error: the payload comes back unsigned and is still
    // stored, and the service decides what to do with it.
    let payload = ctx.make_change_view(ChangeViewReason::Timeout).unwrap();
    assert!(!payload.is_signed());
    assert!(ctx.change_view_payloads[BACKUP].is_some());
}

// ═══════════════════════════════════════════════════════════════════════════
// Checkpointing
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_checkpoint_round_trip() {
    let chain = chain(4);
    chain
        .ledger
        .set_mempool(vec![test_transaction(1), test_transaction(2)]);
    let mut original = chain.node(PRIMARY);
    original.make_prepare_request().unwrap();
    original.make_commit().unwrap();
    let commit = chain.commit_from(&mut original, 2);
    original.commit_payloads[2] = Some(commit);
    let change_view = chain.change_view_from(&original, 3, 0);
    original.change_view_payloads[3] = Some(change_view);
    original.save();

    let mut restored = chain.node(PRIMARY);
    assert!(restored.load(), "checkpoint must restore at the same height");

    assert_eq!(restored.view_number, original.view_number);
    assert_eq!(restored.block.version, original.block.version);
    assert_eq!(restored.block.index, original.block.index);
    assert_eq!(restored.block.timestamp, original.block.timestamp);
    assert_eq!(restored.block.next_consensus, original.block.next_consensus);
    assert_eq!(restored.block.consensus_data, original.block.consensus_data);
    assert_eq!(restored.transaction_hashes, original.transaction_hashes);
    assert_eq!(restored.transactions, original.transactions);
    assert_eq!(restored.preparation_payloads, original.preparation_payloads);
    assert_eq!(restored.commit_payloads, original.commit_payloads);
    assert_eq!(restored.change_view_payloads, original.change_view_payloads);
    assert_eq!(
        restored.last_change_view_payloads,
        original.last_change_view_payloads
    );

    // The restored node is still the same validator and still committed.
    assert_eq!(restored.my_index, original.my_index);
    assert!(restored.commit_sent());
}

#[test]
fn test_load_without_checkpoint() {
    let chain = chain(4);
    let mut ctx = chain.node(0);
    assert!(!ctx.load());
}

#[traced_test]
#[test]
fn test_corrupt_checkpoint_is_discarded() {
    let chain = chain(4);
    let mut ctx = chain.node(PRIMARY);
    ctx.save();

    // Truncate the record: load must fail softly, never panic.
    let mut bytes = chain.store.get(0xf4, b"").unwrap();
    bytes.truncate(bytes.len() / 2);
    chain.store.put_sync(0xf4, b"", &bytes);
    assert!(!ctx.load());

    // Garbage record, same story.
    chain.store.put_sync(0xf4, b"", &[0xff; 7]);
    assert!(!ctx.load());
}

#[test]
fn test_stale_checkpoint_is_discarded() {
    let chain = chain(4);
    let mut ctx = chain.node(PRIMARY);
    chain.ledger.set_mempool(vec![test_transaction(1)]);
    ctx.make_prepare_request().unwrap();
    ctx.save();

    // The chain moves on before the node restarts: the persisted state
    // applies to height 1, the node now works on height 2.
    chain.ledger.set_tip(
        hash256(b"block-1"),
        Header {
            index: 1,
            timestamp: 50,
            prev_hash: chain.ledger.current_hash(),
        },
    );
    assert!(!ctx.load());
    assert_eq!(ctx.block.index, 2, "context is cold at the new height");
}

// ═══════════════════════════════════════════════════════════════════════════
// Primary election
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn prop_primary_index_in_range(
        index in any::<u32>(),
        view in any::<u8>(),
        n in 1usize..=1024,
    ) {
        let p = primary_index(index, view, n);
        prop_assert!((p as usize) < n);
        let expected = (((index as i64 - view as i64) % n as i64 + n as i64) % n as i64) as u32;
        prop_assert_eq!(p, expected);
    }
}
