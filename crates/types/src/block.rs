//! The block under construction and its consensus data.

use crate::hash::{hash256, UInt160, UInt256};
use crate::transaction::Transaction;
use crate::witness::Witness;
use dbft_encoding::{Decode, Encode, Error};
use bytes::{Buf, BufMut};

/// Primary-supplied data committed into the block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsensusData {
    /// Index of the validator that proposed this block.
    pub primary_index: u32,
    /// Random value mixed in by the primary.
    pub nonce: u64,
}

impl ConsensusData {
    /// Hash of the fixed-size encoding; the first Merkle leaf.
    pub fn hash(&self) -> UInt256 {
        hash256(&self.encode_to_vec())
    }
}

impl Encode for ConsensusData {
    fn encoded_size(&self) -> usize {
        4 + 8
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.primary_index.write(buf);
        self.nonce.write(buf);
    }
}

impl Decode for ConsensusData {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            primary_index: u32::read(buf)?,
            nonce: u64::read(buf)?,
        })
    }
}

/// The block a consensus round agrees on.
///
/// During a round most fields are in flux: the Merkle root stays zero
/// until the transaction hashes are known, and `transactions` /
/// `witness` are only installed by final assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block format version.
    pub version: u32,
    /// Hash of the parent block.
    pub prev_hash: UInt256,
    /// Merkle root over consensus data and transaction hashes; zero
    /// until computed.
    pub merkle_root: UInt256,
    /// Proposal time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Chain height of this block (parent height + 1).
    pub index: u32,
    /// Multisig address of the validator set signing the *next* block;
    /// zero when unset.
    pub next_consensus: UInt160,
    /// Primary index and nonce.
    pub consensus_data: ConsensusData,
    /// Full transactions; `None` until the block is assembled.
    pub transactions: Option<Vec<Transaction>>,
    /// The M-of-N witness; `None` until quorum signatures are collected.
    pub witness: Option<Witness>,
}

impl Block {
    /// A skeleton for a fresh height: everything zero except linkage.
    pub fn skeleton(prev_hash: UInt256, index: u32, next_consensus: UInt160) -> Self {
        Self {
            version: 0,
            prev_hash,
            merkle_root: UInt256::ZERO,
            timestamp: 0,
            index,
            next_consensus,
            consensus_data: ConsensusData::default(),
            transactions: None,
            witness: None,
        }
    }

    /// The unsigned header encoding: what commit signatures cover and
    /// what the block hash is computed from.
    pub fn header_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 32 + 32 + 8 + 4 + 20 + 12);
        self.version.write(&mut buf);
        self.prev_hash.write(&mut buf);
        self.merkle_root.write(&mut buf);
        self.timestamp.write(&mut buf);
        self.index.write(&mut buf);
        self.next_consensus.write(&mut buf);
        self.consensus_data.write(&mut buf);
        buf
    }

    /// Block hash: `hash256` of the header.
    pub fn hash(&self) -> UInt256 {
        hash256(&self.header_bytes())
    }
}
