//! Search-engine side representation of a flattened document.

use serde::{Deserialize, Serialize};

/// One leaf of a flattened document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatPair {
    pub path: String,
    pub value: String,
}

impl FlatPair {
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// A monitored (database, collection) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub db_name: String,
    pub coll_name: String,
}

impl SourceRef {
    pub fn new(db_name: impl Into<String>, coll_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            coll_name: coll_name.into(),
        }
    }
}

/// The document body written to the search engine.
///
/// `update_version` must never regress across successive writes of the same id.
/// A deleted source document is kept as a tombstone (`deleted: true`, no
/// pairs) so that the version survives the delete; tombstones are invisible
/// to search and counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedDocument {
    pub flat: Vec<FlatPair>,
    pub update_version: i64,
    pub update_at: i64,
    pub update_at_time_zone: i32,
    pub source: SourceRef,
    #[serde(default)]
    pub deleted: bool,
}

impl IndexedDocument {
    /// Tombstone recording that the source document was deleted at `update_version`.
    pub fn tombstone(
        update_version: i64,
        update_at: i64,
        update_at_time_zone: i32,
        source: SourceRef,
    ) -> Self {
        Self {
            flat: Vec::new(),
            update_version,
            update_at,
            update_at_time_zone,
            source,
            deleted: true,
        }
    }
}

/// Opaque optimistic-concurrency token issued by the search engine for the
/// last write of a document (`_seq_no` / `_primary_term` in Elasticsearch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeqToken {
    pub seq_no: u64,
    pub primary_term: u64,
}

/// A document as currently stored in the search engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHit {
    pub id: String,
    pub document: IndexedDocument,
    pub token: SeqToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let doc = IndexedDocument {
            flat: vec![FlatPair::new("name", "abc")],
            update_version: 3,
            update_at: 1_700_000_000_000,
            update_at_time_zone: -5,
            source: SourceRef::new("app", "users"),
            deleted: false,
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["flat"][0]["path"], "name");
        assert_eq!(json["flat"][0]["value"], "abc");
        assert_eq!(json["updateVersion"], 3);
        assert_eq!(json["updateAtTimeZone"], -5);
        assert_eq!(json["source"]["dbName"], "app");
        assert_eq!(json["source"]["collName"], "users");
        assert_eq!(json["deleted"], false);
    }

    #[test]
    fn test_documents_without_deleted_flag_are_live() {
        let doc: IndexedDocument = serde_json::from_value(serde_json::json!({
            "flat": [],
            "updateVersion": 1,
            "updateAt": 0,
            "updateAtTimeZone": 0,
            "source": {"dbName": "app", "collName": "users"}
        }))
        .unwrap();
        assert!(!doc.deleted);

        let tombstone = IndexedDocument::tombstone(4, 0, 0, SourceRef::new("app", "users"));
        assert!(tombstone.deleted);
        assert!(tombstone.flat.is_empty());
        assert_eq!(tombstone.update_version, 4);
    }
}
