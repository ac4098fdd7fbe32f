//! RocksDB-backed store.
//!
//! All operations are synchronous blocking I/O. Callers in async
//! contexts should use `spawn_blocking` if needed.

use crate::{storage_key, Store};
use rocksdb::{Options, WriteOptions, DB};
use std::path::Path;
use tracing::warn;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(String),
}

/// A [`Store`] backed by RocksDB.
pub struct RocksDbStore {
    db: DB,
}

impl RocksDbStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path).map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Self { db })
    }
}

impl Store for RocksDbStore {
    fn get(&self, prefix: u8, key: &[u8]) -> Option<Vec<u8>> {
        match self.db.get(storage_key(prefix, key)) {
            Ok(value) => value,
            Err(e) => {
                // A read error must look like an absent record: a corrupt
                // store is never allowed to block startup.
                warn!(prefix = prefix, error = %e, "store read failed");
                None
            }
        }
    }

    /// # Panics
    ///
    /// Panics if the write cannot be made durable. A checkpoint the node
    /// believes persisted but did not survive a crash can violate
    /// consensus safety after restart, so storage failure here must stop
    /// the node rather than be acknowledged.
    fn put_sync(&self, prefix: u8, key: &[u8], value: &[u8]) {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        self.db
            .put_opt(storage_key(prefix, key), value, &write_opts)
            .expect("checkpoint persistence failed - cannot continue safely");
    }
}
