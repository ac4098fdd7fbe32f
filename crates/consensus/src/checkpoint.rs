//! Crash-durable checkpointing of the consensus context.
//!
//! The context serializes to a single record at `(0xf4, ∅)` in the
//! node's store. The format is deterministic (§ the codec crate) and
//! self-describing enough to be rejected when it does not match the
//! chain: a persisted record for another height or format version is
//! *discarded*, never applied.
//!
//! A corrupt or stale checkpoint must never block startup: `load`
//! converts every decode failure into "no saved state".

use crate::context::ConsensusContext;
use dbft_encoding::{varint, Decode, Encode, Error};
use dbft_messages::ConsensusPayload;
use dbft_types::{
    ConsensusData, Transaction, UInt160, UInt256, MAX_TRANSACTIONS_PER_BLOCK, MAX_VALIDATORS,
};
use bytes::Buf;
use tracing::{debug, info, warn};

/// Store prefix of the single checkpoint record.
pub const CHECKPOINT_PREFIX: u8 = 0xf4;

impl ConsensusContext {
    /// Exact size of [`serialize`](Self::serialize)'s output.
    pub fn serialized_size(&self) -> usize {
        let mut size = 4 + 4 + 8 + UInt160::LEN + self.block.consensus_data.encoded_size() + 1;
        size += 4 + self.transaction_hashes.as_ref().map_or(0, |h| h.len() * UInt256::LEN);
        let transactions = self.ordered_transactions();
        size += varint::size(transactions.len() as u64);
        size += transactions.iter().map(|tx| tx.encoded_size()).sum::<usize>();
        for slots in [
            &self.preparation_payloads,
            &self.commit_payloads,
            &self.change_view_payloads,
            &self.last_change_view_payloads,
        ] {
            size += slots_size(slots);
        }
        size
    }

    /// Deterministic encoding of the context.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        self.block.version.write(&mut buf);
        self.block.index.write(&mut buf);
        self.block.timestamp.write(&mut buf);
        self.block.next_consensus.write(&mut buf);
        self.block.consensus_data.write(&mut buf);
        self.view_number.write(&mut buf);

        match &self.transaction_hashes {
            Some(hashes) => {
                (hashes.len() as u32).write(&mut buf);
                for hash in hashes {
                    hash.write(&mut buf);
                }
            }
            None => 0u32.write(&mut buf),
        }

        // Transactions travel in proposal order so the record is
        // byte-stable regardless of map iteration order.
        let transactions = self.ordered_transactions();
        varint::write(&mut buf, transactions.len() as u64);
        for tx in transactions {
            tx.write(&mut buf);
        }

        for slots in [
            &self.preparation_payloads,
            &self.commit_payloads,
            &self.change_view_payloads,
            &self.last_change_view_payloads,
        ] {
            write_slots(&mut buf, slots);
        }
        buf
    }

    /// Rebuild this context from a checkpoint record.
    ///
    /// Starts from `reset(0)` so the block skeleton, validators, and
    /// snapshot reflect the *current* ledger; the record must then agree
    /// on format version and height or it is rejected.
    pub fn deserialize(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.reset(0);
        let mut buf = bytes;

        let version = u32::read(&mut buf)?;
        if version != self.block.version {
            return Err(Error::InvalidData("checkpoint version"));
        }
        let index = u32::read(&mut buf)?;
        if index != self.block.index {
            return Err(Error::InvalidData("checkpoint height"));
        }

        self.block.timestamp = u64::read(&mut buf)?;
        self.block.next_consensus = UInt160::read(&mut buf)?;
        self.block.consensus_data = ConsensusData::read(&mut buf)?;
        self.view_number = u8::read(&mut buf)?;

        let hash_count = u32::read(&mut buf)? as usize;
        if hash_count > MAX_TRANSACTIONS_PER_BLOCK {
            return Err(Error::LengthTooLarge {
                got: hash_count as u64,
                max: MAX_TRANSACTIONS_PER_BLOCK as u64,
            });
        }
        self.transaction_hashes = if hash_count == 0 {
            None
        } else {
            let mut hashes = Vec::with_capacity(hash_count);
            for _ in 0..hash_count {
                hashes.push(UInt256::read(&mut buf)?);
            }
            Some(hashes)
        };

        let tx_count = varint::read(&mut buf, MAX_TRANSACTIONS_PER_BLOCK as u64)?;
        let mut transactions = std::collections::HashMap::with_capacity(tx_count as usize);
        for _ in 0..tx_count {
            let tx = Transaction::read(&mut buf)?;
            transactions.insert(tx.hash(), tx);
        }
        self.transactions = self.transaction_hashes.as_ref().map(|_| transactions);

        self.preparation_payloads = read_slots(&mut buf)?;
        self.commit_payloads = read_slots(&mut buf)?;
        self.change_view_payloads = read_slots(&mut buf)?;
        self.last_change_view_payloads = read_slots(&mut buf)?;
        Ok(())
    }

    /// Restore the last persisted state, if one exists and applies.
    ///
    /// Returns whether the caller may resume from the restored state.
    /// Every failure mode (absent record, corrupt bytes, record for a
    /// different height) yields `false` and a cold, freshly reset
    /// context; none of them is fatal.
    pub fn load(&mut self) -> bool {
        let Some(bytes) = self.store.get(CHECKPOINT_PREFIX, b"") else {
            debug!("no consensus checkpoint found");
            return false;
        };
        match self.deserialize(&bytes) {
            Ok(()) => {
                info!(
                    index = self.block.index,
                    view = self.view_number,
                    "consensus checkpoint restored"
                );
                true
            }
            Err(error) => {
                warn!(%error, "discarding unusable consensus checkpoint");
                false
            }
        }
    }

    /// Durably persist the current state.
    pub fn save(&self) {
        let bytes = self.serialize();
        self.store.put_sync(CHECKPOINT_PREFIX, b"", &bytes);
        debug!(
            index = self.block.index,
            view = self.view_number,
            bytes = bytes.len(),
            "consensus checkpoint saved"
        );
    }

    /// The held transactions in proposal order.
    fn ordered_transactions(&self) -> Vec<&Transaction> {
        match (&self.transaction_hashes, &self.transactions) {
            (Some(hashes), Some(transactions)) => {
                hashes.iter().filter_map(|hash| transactions.get(hash)).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn slots_size(slots: &[Option<ConsensusPayload>]) -> usize {
    varint::size(slots.len() as u64)
        + slots
            .iter()
            .map(|slot| 1 + slot.as_ref().map_or(0, Encode::encoded_size))
            .sum::<usize>()
}

fn write_slots(buf: &mut Vec<u8>, slots: &[Option<ConsensusPayload>]) {
    varint::write(buf, slots.len() as u64);
    for slot in slots {
        match slot {
            Some(payload) => {
                1u8.write(buf);
                payload.write(buf);
            }
            None => 0u8.write(buf),
        }
    }
}

fn read_slots(buf: &mut impl Buf) -> Result<Vec<Option<ConsensusPayload>>, Error> {
    let count = varint::read(buf, MAX_VALIDATORS as u64)?;
    let mut slots = Vec::with_capacity(count as usize);
    for _ in 0..count {
        match u8::read(buf)? {
            0 => slots.push(None),
            1 => slots.push(Some(ConsensusPayload::read(buf)?)),
            other => return Err(Error::InvalidTag(other, "payload slot")),
        }
    }
    Ok(slots)
}
