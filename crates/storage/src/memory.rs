//! In-memory store for tests and simulation.

use crate::{storage_key, Store};
use parking_lot::Mutex;
use std::collections::HashMap;

/// A [`Store`] backed by a map. "Durability" is process lifetime, which
/// is exactly what deterministic tests want.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, prefix: u8, key: &[u8]) -> Option<Vec<u8>> {
        self.records.lock().get(&storage_key(prefix, key)).cloned()
    }

    fn put_sync(&self, prefix: u8, key: &[u8], value: &[u8]) {
        self.records
            .lock()
            .insert(storage_key(prefix, key), value.to_vec());
    }
}
