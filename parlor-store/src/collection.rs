//! Typed collection view: `find_one` / `insert_one` / `update_one`.
//!
//! The async signatures mirror a network-backed database driver even
//! though the medium is local and synchronous — every operation completes
//! within a single turn and never suspends mid-mutation. There is no
//! cross-operation transaction: each call is its own load-mutate-persist
//! cycle against the shared slot.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::DocumentDb;
use crate::query::{Query, Update};
use crate::slot::StoreError;

/// A named, ordered collection of documents of one type.
///
/// The store imposes no primary key and no uniqueness constraint; a
/// document is identified only by whatever fields the caller queries on.
pub struct Collection<T> {
    db: DocumentDb,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub(crate) fn new(db: DocumentDb, name: String) -> Self {
        Self {
            db,
            name,
            _marker: PhantomData,
        }
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First document matching the query, in insertion order.
    ///
    /// "Not found" is a normal `None`, never an error.
    pub async fn find_one(&self, query: &Query) -> Result<Option<T>, StoreError> {
        let snapshot = self.db.load_snapshot()?;
        for doc in snapshot.documents(&self.name) {
            if query.matches(doc) {
                let typed = serde_json::from_value(doc.clone())
                    .map_err(|e| StoreError::Deserialization(e.to_string()))?;
                return Ok(Some(typed));
            }
        }
        Ok(None)
    }

    /// Append a document and persist the full snapshot.
    ///
    /// Returns the document unchanged — no generated identifiers.
    pub async fn insert_one(&self, doc: T) -> Result<T, StoreError> {
        let value = serde_json::to_value(&doc)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut snapshot = self.db.load_snapshot()?;
        snapshot.documents_mut(&self.name).push(value);
        self.db.persist_snapshot(&snapshot)?;
        log::debug!("inserted document into {}", self.name);
        Ok(doc)
    }

    /// Apply update operators to the first matching document.
    ///
    /// Returns `false` without mutation when nothing matches; otherwise
    /// applies `$set`, `$push`, `$pull` in that order, persists the full
    /// snapshot, and returns `true`.
    pub async fn update_one(&self, query: &Query, update: &Update) -> Result<bool, StoreError> {
        let mut snapshot = self.db.load_snapshot()?;

        let index = snapshot
            .documents(&self.name)
            .iter()
            .position(|doc| query.matches(doc));
        let Some(index) = index else {
            return Ok(false);
        };

        update.apply(&mut snapshot.documents_mut(&self.name)[index]);
        self.db.persist_snapshot(&snapshot)?;
        log::debug!("updated document {index} in {}", self.name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::SlotConfig;
    use serde::Deserialize;
    use serde_json::json;
    use std::path::{Path, PathBuf};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Room {
        code: String,
        host_id: String,
        participants: Vec<serde_json::Value>,
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "parlor_test_collection_{name}_{}",
            std::process::id()
        ))
    }

    fn cleanup(path: &Path) {
        let _ = std::fs::remove_dir_all(path);
    }

    fn room(code: &str, host: &str) -> Room {
        Room {
            code: code.into(),
            host_id: host.into(),
            participants: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_find_one_on_empty_collection() {
        let path = temp_path("empty");
        cleanup(&path);
        let db = DocumentDb::open(SlotConfig::for_testing(&path)).unwrap();
        let rooms = db.collection::<Room>("rooms");

        assert_eq!(rooms.find_one(&Query::new()).await.unwrap(), None);

        drop(rooms);
        drop(db);
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_insert_returns_document_unchanged() {
        let path = temp_path("insert");
        cleanup(&path);
        let db = DocumentDb::open(SlotConfig::for_testing(&path)).unwrap();
        let rooms = db.collection::<Room>("rooms");

        let input = room("ABC", "u1");
        let returned = rooms.insert_one(input.clone()).await.unwrap();
        assert_eq!(returned, input);

        drop(rooms);
        drop(db);
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_find_one_empty_query_returns_first_inserted() {
        let path = temp_path("first");
        cleanup(&path);
        let db = DocumentDb::open(SlotConfig::for_testing(&path)).unwrap();
        let rooms = db.collection::<Room>("rooms");

        rooms.insert_one(room("FIRST", "u1")).await.unwrap();
        rooms.insert_one(room("SECOND", "u2")).await.unwrap();

        let found = rooms.find_one(&Query::new()).await.unwrap().unwrap();
        assert_eq!(found.code, "FIRST");

        drop(rooms);
        drop(db);
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_find_one_by_field() {
        let path = temp_path("by_field");
        cleanup(&path);
        let db = DocumentDb::open(SlotConfig::for_testing(&path)).unwrap();
        let rooms = db.collection::<Room>("rooms");

        rooms.insert_one(room("AAA", "u1")).await.unwrap();
        rooms.insert_one(room("BBB", "u2")).await.unwrap();

        let query = Query::new().field("code", json!("BBB"));
        let found = rooms.find_one(&query).await.unwrap().unwrap();
        assert_eq!(found.host_id, "u2");

        let none = rooms
            .find_one(&Query::new().field("code", json!("ZZZ")))
            .await
            .unwrap();
        assert_eq!(none, None);

        drop(rooms);
        drop(db);
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_update_one_no_match_returns_false() {
        let path = temp_path("no_match");
        cleanup(&path);
        let db = DocumentDb::open(SlotConfig::for_testing(&path)).unwrap();
        let rooms = db.collection::<Room>("rooms");

        rooms.insert_one(room("ABC", "u1")).await.unwrap();

        let updated = rooms
            .update_one(
                &Query::new().field("code", json!("XYZ")),
                &Update::new().set("hostId", json!("u9")),
            )
            .await
            .unwrap();
        assert!(!updated);

        // No mutation happened.
        let unchanged = rooms.find_one(&Query::new()).await.unwrap().unwrap();
        assert_eq!(unchanged.host_id, "u1");

        drop(rooms);
        drop(db);
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_update_one_first_match_only() {
        let path = temp_path("first_match");
        cleanup(&path);
        let db = DocumentDb::open(SlotConfig::for_testing(&path)).unwrap();
        let rooms = db.collection::<Room>("rooms");

        rooms.insert_one(room("DUP", "u1")).await.unwrap();
        rooms.insert_one(room("DUP", "u2")).await.unwrap();

        let updated = rooms
            .update_one(
                &Query::new().field("code", json!("DUP")),
                &Update::new().set("hostId", json!("changed")),
            )
            .await
            .unwrap();
        assert!(updated);

        let snapshot = db.load_snapshot().unwrap();
        let docs = snapshot.documents("rooms");
        assert_eq!(docs[0]["hostId"], "changed");
        assert_eq!(docs[1]["hostId"], "u2");

        drop(rooms);
        drop(db);
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_update_push_and_pull_participants() {
        let path = temp_path("push_pull");
        cleanup(&path);
        let db = DocumentDb::open(SlotConfig::for_testing(&path)).unwrap();
        let rooms = db.collection::<Room>("rooms");

        rooms.insert_one(room("ABC", "u1")).await.unwrap();
        let query = Query::new().field("code", json!("ABC"));

        rooms
            .update_one(
                &query,
                &Update::new().push("participants", json!({"id": "p1", "name": "alice"})),
            )
            .await
            .unwrap();
        rooms
            .update_one(
                &query,
                &Update::new().push("participants", json!({"id": "p2", "name": "bob"})),
            )
            .await
            .unwrap();

        let joined = rooms.find_one(&query).await.unwrap().unwrap();
        assert_eq!(joined.participants.len(), 2);

        rooms
            .update_one(&query, &Update::new().pull("participants", json!({"id": "p1"})))
            .await
            .unwrap();

        let after = rooms.find_one(&query).await.unwrap().unwrap();
        assert_eq!(after.participants.len(), 1);
        assert_eq!(after.participants[0]["id"], "p2");

        drop(rooms);
        drop(db);
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_untyped_collection() {
        // Documents are opaque; Value works as the document type.
        let path = temp_path("untyped");
        cleanup(&path);
        let db = DocumentDb::open(SlotConfig::for_testing(&path)).unwrap();
        let anything = db.collection::<serde_json::Value>("misc");

        anything.insert_one(json!({"kind": "note", "n": 1})).await.unwrap();
        let found = anything
            .find_one(&Query::new().field("kind", json!("note")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["n"], 1);

        drop(anything);
        drop(db);
        cleanup(&path);
    }
}
