//! Single-slot persistent storage medium.
//!
//! The document database persists its entire state as one serialized blob
//! under one fixed key — the local stand-in for a browser's storage slot.
//! There is no partial write: every `store` overwrites the whole value,
//! and every `load` returns the whole value.
//!
//! Backed by RocksDB with the blob LZ4-compressed at rest. A missing or
//! corrupt value degrades silently to "empty" rather than erroring; the
//! only errors surfaced are storage-medium failures.

use std::path::{Path, PathBuf};

use rocksdb::{DBWithThreadMode, Options, SingleThreaded, WriteOptions};

/// The one key the whole database lives under.
const SLOT_KEY: &[u8] = b"parlor_db_v1";

/// Slot configuration.
#[derive(Debug, Clone)]
pub struct SlotConfig {
    /// Database directory path
    pub path: PathBuf,
    /// Enable fsync on every write (default: false)
    pub sync_writes: bool,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("parlor_data"),
            sync_writes: false,
        }
    }
}

impl SlotConfig {
    /// Create config for testing (temp directory, no fsync).
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sync_writes: false,
        }
    }
}

/// Storage errors.
///
/// "Not found" and "no match" are normal return values elsewhere in this
/// crate, never errors; these variants cover the storage medium and the
/// snapshot codec only.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// RocksDB internal error
    Database(String),
    /// Snapshot could not be serialized
    Serialization(String),
    /// Snapshot could not be deserialized
    Deserialization(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {e}"),
            StoreError::Serialization(e) => write!(f, "Serialization error: {e}"),
            StoreError::Deserialization(e) => write!(f, "Deserialization error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// The shared persistent key-value slot.
pub struct StorageSlot {
    db: DBWithThreadMode<SingleThreaded>,
    config: SlotConfig,
}

impl StorageSlot {
    /// Open the slot at the configured path, creating it if missing.
    pub fn open(config: SlotConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_keep_log_file_num(5);

        let db = DBWithThreadMode::<SingleThreaded>::open(&opts, &config.path)?;
        Ok(Self { db, config })
    }

    /// Load the full blob, or `None` when the slot is empty or its value
    /// cannot be decompressed (corruption degrades to empty, not error).
    pub fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match self.db.get(SLOT_KEY)? {
            Some(compressed) => match lz4_flex::decompress_size_prepended(&compressed) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) => {
                    log::warn!("slot value corrupt, treating as empty: {e}");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Overwrite the slot with a full blob (LZ4 compressed at rest).
    pub fn store(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let compressed = lz4_flex::compress_prepend_size(bytes);
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db.put_opt(SLOT_KEY, &compressed, &write_opts)?;
        Ok(())
    }

    /// Whether the slot holds no value at all.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.db.get(SLOT_KEY)?.is_none())
    }

    /// Write raw bytes to the slot without compression.
    ///
    /// Only useful for exercising the corruption path in tests.
    #[doc(hidden)]
    pub fn store_raw(&self, bytes: &[u8]) -> Result<(), StoreError> {
        self.db.put(SLOT_KEY, bytes)?;
        Ok(())
    }

    /// Database directory path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }
}
