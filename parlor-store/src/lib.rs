//! # parlor-store — local document database emulation
//!
//! A minimal stand-in for the document database a room-based real-time
//! app would normally reach over the network. The entire database is one
//! JSON snapshot in a single persistent slot; collections offer
//! Mongo-style equality queries and `$set`/`$push`/`$pull` updates:
//!
//! ```text
//! Collection<T>::find_one / insert_one / update_one
//!        │
//!        ▼
//! DocumentDb ── Snapshot { "rooms": [...] }
//!        │
//!        ▼
//! StorageSlot ── RocksDB (one key, LZ4 at rest)
//! ```
//!
//! ## Modules
//!
//! - [`slot`] — the single-key persistent medium
//! - [`db`] — full-snapshot load/persist and collection access
//! - [`query`] — equality queries and update operators
//! - [`collection`] — the typed async operation surface
//!
//! Failures are values: "not found" is `None`, "no match" is `false`, and
//! a corrupt slot degrades to the empty database. Only storage-medium and
//! serde failures surface as [`StoreError`].

pub mod collection;
pub mod db;
pub mod query;
pub mod slot;

// Re-exports for convenience
pub use collection::Collection;
pub use db::{DocumentDb, Snapshot};
pub use query::{Query, Update};
pub use slot::{SlotConfig, StorageSlot, StoreError};
