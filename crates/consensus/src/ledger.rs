//! Narrow view of the blockchain ledger.
//!
//! The context never touches chain storage directly. It acquires a
//! [`LedgerSnapshot`] at the start of each height and reads everything
//! through it, so the whole round observes one consistent parent state.

use dbft_types::{PublicKey, Transaction, UInt256};

/// Header facts the context needs about an existing block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Chain height of the block.
    pub index: u32,
    /// Block timestamp, milliseconds.
    pub timestamp: u64,
    /// Hash of the parent block.
    pub prev_hash: UInt256,
}

/// A read-consistent view of the ledger at the current chain tip.
///
/// Held from `reset(0)` until the context is dropped or the next
/// `reset(0)` replaces it.
pub trait LedgerSnapshot: Send {
    /// Hash of the current tip block.
    fn current_hash(&self) -> UInt256;

    /// Height of the current tip block.
    fn height(&self) -> u32;

    /// Look up a header by block hash.
    fn header(&self, hash: &UInt256) -> Option<Header>;

    /// The validator set that will sign the block under construction.
    fn next_block_validators(&self) -> Vec<PublicKey>;

    /// Verified transactions from the memory pool, in relay-priority
    /// order.
    fn sorted_verified_transactions(&self) -> Vec<Transaction>;
}

/// Source of [`LedgerSnapshot`]s.
pub trait Ledger: Send + Sync {
    /// Acquire a snapshot of the current tip.
    fn snapshot(&self) -> Box<dyn LedgerSnapshot>;
}
