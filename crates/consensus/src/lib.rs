//! The dBFT consensus context.
//!
//! This crate implements the per-height, per-view state machine a
//! validator maintains while agreeing on the next block. The
//! [`ConsensusContext`] aggregate fuses:
//!
//! - the **state model**: the block in progress, per-validator payload
//!   slots, and cross-view evidence
//! - **predicates** the surrounding service drives its decisions with
//! - the **message factory** that builds, signs, and stores outbound
//!   payloads
//! - the **block assembler** that folds a commit quorum into a witnessed
//!   block
//! - **reset / view change** handling that preserves safety evidence
//! - the **checkpoint codec** that makes the whole thing crash-durable
//!
//! # What this crate is not
//!
//! There is no networking, no timers, and no dispatch loop here. The
//! context is owned by a single service actor that feeds payloads in,
//! reads predicates, and asks for outbound messages; all I/O beyond the
//! checkpoint store is that service's job.
//!
//! # Concurrency
//!
//! The context is not internally synchronized. Every operation is
//! synchronous; blocking only happens transitively in the store, the
//! wallet, or snapshot acquisition.

mod checkpoint;
mod clock;
mod config;
mod context;
mod factory;
mod ledger;
mod policy;
mod wallet;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use checkpoint::CHECKPOINT_PREFIX;
pub use clock::{Clock, SystemClock};
pub use config::ConsensusConfig;
pub use context::{primary_index, ConsensusContext};
pub use ledger::{Header, Ledger, LedgerSnapshot};
pub use policy::{MaxTransactionsPolicy, PolicyPlugin};
pub use wallet::{Wallet, WalletAccount, WalletError};
