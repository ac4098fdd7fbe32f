//! Foundation types for dBFT consensus.
//!
//! This crate provides the types used throughout the consensus
//! implementation:
//!
//! - **Digests**: [`UInt160`], [`UInt256`] and the protocol hash functions
//! - **Cryptography**: ECDSA keys and signatures ([`KeyPair`], [`PublicKey`],
//!   [`Signature`])
//! - **Chain entities**: [`Block`], [`Transaction`], [`ConsensusData`],
//!   [`Witness`]
//! - **Validator-set math**: fault/quorum thresholds, multisig contracts,
//!   the consensus address
//!
//! # Design Philosophy
//!
//! This crate is the foundation layer: it depends only on the codec and
//! the cryptography stack, never on the message or consensus crates.
//! Everything here is plain data with deterministic encodings.

mod block;
mod crypto;
mod hash;
mod merkle;
mod transaction;
mod validator;
mod witness;

pub use block::{Block, ConsensusData};
pub use crypto::{CryptoError, KeyPair, PublicKey, Signature};
pub use hash::{hash160, hash256, HexError, UInt160, UInt256};
pub use merkle::merkle_root;
pub use transaction::{Transaction, MAX_TRANSACTION_SCRIPT};
pub use validator::{
    consensus_address, max_faulty, multisig_script, parse_multisig_script,
    parse_signature_script, quorum, signature_invocation, signature_script,
    verify_multisig_witness, verify_signature_witness, MAX_VALIDATORS,
};
pub use witness::{Witness, MAX_INVOCATION_SCRIPT, MAX_VERIFICATION_SCRIPT};

/// Upper bound on transactions a primary may propose in one block.
///
/// Shared by the mempool filter in the prepare-request factory and by
/// every decoder that reads a transaction list from untrusted bytes.
pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 512;
