//! Full-snapshot document database over the persistent slot.
//!
//! The entire database is one JSON object, collection name → ordered
//! array of documents, persisted as a single value:
//!
//! ```text
//! { "rooms": [ {...}, {...} ] }
//! ```
//!
//! Every read materializes a full deserialization of this snapshot and
//! every write serializes and overwrites it whole. Two writers racing on
//! the same slot therefore resolve last-writer-wins — an intentional
//! property of the emulation, acceptable at human-paced contention.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collection::Collection;
use crate::slot::{SlotConfig, StorageSlot, StoreError};

/// The seeded collection present in every fresh database.
const SEED_COLLECTION: &str = "rooms";

/// The whole persisted state: collection name → documents in insertion
/// order. No uniqueness constraints, no generated ids, no version field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(flatten)]
    collections: BTreeMap<String, Vec<Value>>,
}

impl Snapshot {
    /// The empty database shape, `{"rooms": []}`.
    pub fn seeded() -> Self {
        let mut collections = BTreeMap::new();
        collections.insert(SEED_COLLECTION.to_string(), Vec::new());
        Self { collections }
    }

    /// Documents of a collection, in insertion order.
    pub fn documents(&self, name: &str) -> &[Value] {
        self.collections.get(name).map_or(&[], Vec::as_slice)
    }

    /// Mutable documents of a collection, created empty if absent.
    pub fn documents_mut(&mut self, name: &str) -> &mut Vec<Value> {
        self.collections.entry(name.to_string()).or_default()
    }

    /// Collection names present in the snapshot.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    fn encode(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}

/// Handle to the document database.
///
/// Cheap to clone; clones share the same underlying slot. Constructed
/// explicitly by the application root and torn down by dropping — no
/// global instance.
#[derive(Clone)]
pub struct DocumentDb {
    slot: Arc<StorageSlot>,
}

impl DocumentDb {
    /// Open the database, seeding `{"rooms": []}` when the slot is empty.
    pub fn open(config: SlotConfig) -> Result<Self, StoreError> {
        let slot = StorageSlot::open(config)?;
        let db = Self { slot: Arc::new(slot) };
        if db.slot.is_empty()? {
            db.persist_snapshot(&Snapshot::seeded())?;
            log::info!("seeded empty database at {}", db.slot.path().display());
        }
        Ok(db)
    }

    /// Load the full snapshot.
    ///
    /// A missing or unparseable value degrades to the empty database —
    /// callers are written against never-throwing "not found" behavior.
    pub fn load_snapshot(&self) -> Result<Snapshot, StoreError> {
        match self.slot.load()? {
            Some(bytes) => Ok(Snapshot::decode(&bytes).unwrap_or_else(|e| {
                log::warn!("snapshot unparseable, starting empty: {e}");
                Snapshot::seeded()
            })),
            None => Ok(Snapshot::seeded()),
        }
    }

    /// Serialize and overwrite the full snapshot.
    pub fn persist_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.slot.store(&snapshot.encode()?)
    }

    /// A typed view over one collection.
    pub fn collection<T>(&self, name: impl Into<String>) -> Collection<T>
    where
        T: Serialize + DeserializeOwned,
    {
        Collection::new(self.clone(), name.into())
    }

    /// Database directory path.
    pub fn path(&self) -> &Path {
        self.slot.path()
    }
}
