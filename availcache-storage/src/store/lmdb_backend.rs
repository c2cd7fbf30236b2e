//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a persistent,
//! memory-mapped store that several processes on one host can share.
//!
//! # Value Format
//!
//! Each value is stored as `[deadline: 8 bytes LE i64][json value]`, where
//! the deadline is a Unix timestamp in seconds and `0` means "never expires".
//!
//! # Atomicity
//!
//! LMDB admits a single writer at a time, across threads and processes.
//! `add` performs its existence check and its write inside one write
//! transaction, which is what makes it a usable lock primitive.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use availcache_core::{Clock, StorageError, SystemClock};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use serde_json::Value;

use super::traits::{CacheStore, StoreResult};

/// Length of the deadline prefix.
const DEADLINE_LEN: usize = 8;

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for StorageError {
    fn from(e: LmdbStoreError) -> Self {
        match e {
            LmdbStoreError::Serialization(reason) => StorageError::Serialization { reason },
            LmdbStoreError::Deserialization(reason) => StorageError::Deserialization { reason },
            LmdbStoreError::EnvOpen(reason) | LmdbStoreError::DbOpen(reason) => {
                StorageError::Unavailable { reason }
            }
            other => StorageError::TransactionFailed {
                reason: other.to_string(),
            },
        }
    }
}

fn txn_err(e: heed::Error) -> LmdbStoreError {
    LmdbStoreError::Transaction(e.to_string())
}

/// A decoded LMDB value.
struct StoredValue {
    deadline: i64,
    value: Value,
}

impl StoredValue {
    fn is_live(&self, now: i64) -> bool {
        self.deadline == 0 || now < self.deadline
    }
}

fn encode_value(value: &Value, ttl_minutes: u64, now: i64) -> Result<Vec<u8>, LmdbStoreError> {
    let deadline = if ttl_minutes > 0 {
        let ttl_secs = i64::try_from(ttl_minutes.saturating_mul(60)).unwrap_or(i64::MAX);
        now.saturating_add(ttl_secs)
    } else {
        0
    };

    let value_bytes =
        serde_json::to_vec(value).map_err(|e| LmdbStoreError::Serialization(e.to_string()))?;

    let mut full_bytes = Vec::with_capacity(DEADLINE_LEN + value_bytes.len());
    full_bytes.extend_from_slice(&deadline.to_le_bytes());
    full_bytes.extend_from_slice(&value_bytes);
    Ok(full_bytes)
}

fn decode_value(bytes: &[u8]) -> Result<StoredValue, LmdbStoreError> {
    if bytes.len() < DEADLINE_LEN {
        return Err(LmdbStoreError::Deserialization(format!(
            "value too short: {} bytes",
            bytes.len()
        )));
    }

    let deadline_bytes: [u8; DEADLINE_LEN] = bytes[0..DEADLINE_LEN]
        .try_into()
        .map_err(|_| LmdbStoreError::Deserialization("Invalid deadline".into()))?;
    let value = serde_json::from_slice(&bytes[DEADLINE_LEN..])
        .map_err(|e| LmdbStoreError::Deserialization(e.to_string()))?;

    Ok(StoredValue {
        deadline: i64::from_le_bytes(deadline_bytes),
        value,
    })
}

/// LMDB-backed cache store.
///
/// # Example
///
/// ```ignore
/// use availcache_storage::{CacheStore, LmdbStore};
///
/// let store = LmdbStore::new("/var/cache/availcache", 100)?;
/// store.put("report_l1_cache", serde_json::json!({"rows": 3}), 10).await?;
/// ```
pub struct LmdbStore {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    /// Time source for deadlines.
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LmdbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbStore")
            .field("path", &self.env.path())
            .finish_non_exhaustive()
    }
}

impl LmdbStore {
    /// Open (or create) an LMDB store reading the system clock.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        Self::with_clock(path, max_size_mb, Arc::new(SystemClock))
    }

    /// Open (or create) an LMDB store that evaluates deadlines against `clock`.
    pub fn with_clock<P: AsRef<Path>>(
        path: P,
        max_size_mb: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit().map_err(txn_err)?;

        Ok(Self { env, db, clock })
    }

    fn read_live(
        &self,
        txn: &RoTxn<'_>,
        key: &str,
        now: i64,
    ) -> Result<Option<StoredValue>, LmdbStoreError> {
        match self.db.get(txn, key.as_bytes()).map_err(txn_err)? {
            Some(bytes) => {
                let stored = decode_value(bytes)?;
                Ok(stored.is_live(now).then_some(stored))
            }
            None => Ok(None),
        }
    }

    /// Number of entries physically present, expired ones included.
    pub fn len(&self) -> Result<u64, LmdbStoreError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        self.db.len(&rtxn).map_err(txn_err)
    }

    pub fn is_empty(&self) -> Result<bool, LmdbStoreError> {
        Ok(self.len()? == 0)
    }

    /// Delete expired and undecodable entries, returning how many were removed.
    pub fn purge_expired(&self) -> Result<u64, LmdbStoreError> {
        let now = self.clock.unix_timestamp();

        let stale_keys: Vec<Vec<u8>> = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            let iter = self.db.iter(&rtxn).map_err(txn_err)?;
            let mut keys = Vec::new();
            for result in iter {
                let (key, bytes) = result.map_err(txn_err)?;
                let dead = decode_value(bytes).map_or(true, |stored| !stored.is_live(now));
                if dead {
                    keys.push(key.to_vec());
                }
            }
            keys
        };

        if stale_keys.is_empty() {
            return Ok(0);
        }

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let mut removed = 0;
        for key in &stale_keys {
            if self.db.delete(&mut wtxn, key).map_err(txn_err)? {
                removed += 1;
            }
        }
        wtxn.commit().map_err(txn_err)?;

        Ok(removed)
    }
}

#[async_trait]
impl CacheStore for LmdbStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let now = self.clock.unix_timestamp();
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let stored = self.read_live(&rtxn, key, now)?;
        Ok(stored.map(|stored| stored.value))
    }

    async fn add(&self, key: &str, value: Value, ttl_minutes: u64) -> StoreResult<bool> {
        let now = self.clock.unix_timestamp();
        let full_bytes = encode_value(&value, ttl_minutes, now)?;

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;

        // An undecodable entry cannot hold a lock; let the add overwrite it.
        let occupied = match self.read_live(&wtxn, key, now) {
            Ok(existing) => existing.is_some(),
            Err(LmdbStoreError::Deserialization(_)) => false,
            Err(e) => return Err(e.into()),
        };
        if occupied {
            wtxn.abort();
            return Ok(false);
        }

        self.db
            .put(&mut wtxn, key.as_bytes(), &full_bytes)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;

        Ok(true)
    }

    async fn put(&self, key: &str, value: Value, ttl_minutes: u64) -> StoreResult<()> {
        let now = self.clock.unix_timestamp();
        let full_bytes = encode_value(&value, ttl_minutes, now)?;

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &full_bytes)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;

        Ok(())
    }

    async fn forget(&self, key: &str) -> StoreResult<bool> {
        let now = self.clock.unix_timestamp();
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;

        let was_live = match self.read_live(&wtxn, key, now) {
            Ok(existing) => existing.is_some(),
            Err(LmdbStoreError::Deserialization(_)) => false,
            Err(e) => return Err(e.into()),
        };
        self.db.delete(&mut wtxn, key.as_bytes()).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;

        Ok(was_live)
    }
}
