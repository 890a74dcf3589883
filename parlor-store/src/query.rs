//! Equality queries and update operators over JSON documents.
//!
//! A [`Query`] is a conjunction of strict-equality checks over exactly the
//! fields it names — no ranges, no regex, no nested paths. An [`Update`]
//! carries up to three operators applied in a fixed order:
//! `$set`, then `$push`, then `$pull`.
//!
//! Both types serialize to the familiar wire shapes
//! (`{"code": "ABC"}`, `{"$set": {...}, "$push": {...}}`), and only ever
//! inspect fields the caller explicitly named — documents themselves stay
//! opaque.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A partial query: field name → value the document must equal.
///
/// Fields absent from the query are unconstrained; the empty query
/// matches every document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(Map<String, Value>);

impl Query {
    /// The empty query (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain a field to equal `value`.
    pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Whether the query constrains nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Strict-equality conjunction over the query's keys.
    ///
    /// A field missing from the document never matches, even against a
    /// `null` constraint.
    pub fn matches(&self, doc: &Value) -> bool {
        if self.0.is_empty() {
            return true;
        }
        let Some(obj) = doc.as_object() else {
            return false;
        };
        self.0.iter().all(|(key, want)| obj.get(key) == Some(want))
    }
}

impl From<Map<String, Value>> for Query {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// A partial update: `$set`, `$push`, and `$pull` operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Shallow-merged into the document, overwriting existing values.
    #[serde(rename = "$set", default, skip_serializing_if = "Option::is_none")]
    pub set: Option<Map<String, Value>>,
    /// Appended to array-valued fields; other fields are ignored.
    #[serde(rename = "$push", default, skip_serializing_if = "Option::is_none")]
    pub push: Option<Map<String, Value>>,
    /// Removes elements of array-valued fields by `id` equality; a
    /// condition without an `id` field leaves the array untouched.
    #[serde(rename = "$pull", default, skip_serializing_if = "Option::is_none")]
    pub pull: Option<Map<String, Value>>,
}

impl Update {
    /// An update with no operators (applies as a no-op).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `$set` entry.
    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.set.get_or_insert_with(Map::new).insert(key.into(), value);
        self
    }

    /// Add a `$push` entry.
    pub fn push(mut self, key: impl Into<String>, value: Value) -> Self {
        self.push.get_or_insert_with(Map::new).insert(key.into(), value);
        self
    }

    /// Add a `$pull` entry. `condition` should carry an `id` field;
    /// anything else is ignored at application time.
    pub fn pull(mut self, key: impl Into<String>, condition: Value) -> Self {
        self.pull.get_or_insert_with(Map::new).insert(key.into(), condition);
        self
    }

    /// Whether no operator is present.
    pub fn is_empty(&self) -> bool {
        self.set.is_none() && self.push.is_none() && self.pull.is_none()
    }

    /// Apply the operators to a document, in the fixed order
    /// `$set` → `$push` → `$pull`. Non-object documents are untouched.
    pub fn apply(&self, doc: &mut Value) {
        let Some(obj) = doc.as_object_mut() else {
            return;
        };

        if let Some(set) = &self.set {
            for (key, value) in set {
                obj.insert(key.clone(), value.clone());
            }
        }

        if let Some(push) = &self.push {
            for (key, value) in push {
                // Only sequence-valued fields grow; anything else is
                // silently ignored.
                if let Some(Value::Array(items)) = obj.get_mut(key) {
                    items.push(value.clone());
                }
            }
        }

        if let Some(pull) = &self.pull {
            for (key, condition) in pull {
                // Only id-based pulls are supported; no general
                // predicate matching.
                let Some(id) = condition.get("id") else {
                    continue;
                };
                if let Some(Value::Array(items)) = obj.get_mut(key) {
                    items.retain(|el| el.get("id") != Some(id));
                }
            }
        }
    }
}
