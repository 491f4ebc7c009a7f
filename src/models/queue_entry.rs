//! Queue ledger entries tracking per-document indexing progress.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Indexing status of a queue entry, stored as an integer on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    /// `indexVersion == updateVersion`; the search engine holds the latest content.
    Indexed,
    /// A write (or tombstone) has not reached the search engine yet.
    PendingIndex,
}

impl QueueStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Indexed => 0,
            Self::PendingIndex => -1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Indexed),
            -1 => Some(Self::PendingIndex),
            _ => None,
        }
    }
}

impl Serialize for QueueStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for QueueStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = i32::deserialize(deserializer)?;
        QueueStatus::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown queue status {}", code)))
    }
}

/// Address of a queue entry: database + collection + document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueKey {
    pub db: String,
    pub collection: String,
    pub doc_id: String,
}

impl QueueKey {
    pub fn new(db: impl Into<String>, collection: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            collection: collection.into(),
            doc_id: doc_id.into(),
        }
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}/{}", self.db, self.collection, self.doc_id)
    }
}

/// One ledger row per monitored document.
///
/// Entries are never removed, only tombstoned, so any race can be resolved by
/// re-reading the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub doc_id: String,
    pub collection: String,
    pub mongo_id: String,
    pub update_version: i64,
    pub index_version: i64,
    pub status: QueueStatus,
    /// Creation time in epoch milliseconds
    pub create_at: i64,
    pub create_at_time_zone: Option<i32>,
    /// Last write time in epoch milliseconds
    pub update_at: i64,
    pub update_at_time_zone: Option<i32>,
    pub is_deleted: bool,
}

impl QueueEntry {
    /// Entry for a document's first write: version 1, pending.
    pub fn first_write(
        collection: impl Into<String>,
        doc_id: impl Into<String>,
        mongo_id: impl Into<String>,
        now_ms: i64,
        tz: Option<i32>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            collection: collection.into(),
            mongo_id: mongo_id.into(),
            update_version: 1,
            index_version: 0,
            status: QueueStatus::PendingIndex,
            create_at: now_ms,
            create_at_time_zone: tz,
            update_at: now_ms,
            update_at_time_zone: tz,
            is_deleted: false,
        }
    }

    pub fn key(&self, db: &str) -> QueueKey {
        QueueKey::new(db, self.collection.clone(), self.doc_id.clone())
    }

    /// Record another write: exactly one version step, pending, not deleted.
    pub fn bump(&mut self, now_ms: i64, tz: Option<i32>) {
        self.update_version += 1;
        self.status = QueueStatus::PendingIndex;
        self.is_deleted = false;
        self.update_at = now_ms;
        self.update_at_time_zone = tz;
    }

    /// Record a deletion as a pending tombstone.
    pub fn tombstone(&mut self, now_ms: i64, tz: Option<i32>) {
        self.bump(now_ms, tz);
        self.is_deleted = true;
    }

    /// Compare-and-set: mark indexed only if no newer write raced in.
    pub fn try_mark_indexed(&mut self, committed_version: i64) -> bool {
        if self.update_version != committed_version {
            return false;
        }
        self.index_version = committed_version;
        self.status = QueueStatus::Indexed;
        true
    }

    /// Forget indexing progress so a full rebuild reprocesses the entry.
    pub fn reset_for_rebuild(&mut self) {
        self.index_version = 0;
        self.status = QueueStatus::PendingIndex;
    }

    pub fn is_pending(&self) -> bool {
        self.status == QueueStatus::PendingIndex
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> QueueEntry {
        QueueEntry::first_write("users", "u1", "m1", 1_000, Some(2))
    }

    #[test]
    fn test_first_write_is_pending_v1() {
        let e = entry();
        assert_eq!(e.update_version, 1);
        assert_eq!(e.index_version, 0);
        assert!(e.is_pending());
        assert!(!e.is_deleted);
    }

    #[test]
    fn test_bump_increments_by_one_regardless_of_status() {
        let mut e = entry();
        assert!(e.try_mark_indexed(1));
        e.bump(2_000, Some(2));
        assert_eq!(e.update_version, 2);
        assert!(e.is_pending());
        assert_eq!(e.update_at, 2_000);

        e.bump(3_000, None);
        assert_eq!(e.update_version, 3);
        assert!(e.is_pending());
    }

    #[test]
    fn test_bump_clears_tombstone() {
        let mut e = entry();
        e.tombstone(2_000, None);
        assert!(e.is_deleted);
        assert_eq!(e.update_version, 2);
        e.bump(3_000, None);
        assert!(!e.is_deleted);
    }

    #[test]
    fn test_try_mark_indexed_rejects_stale_version() {
        let mut e = entry();
        e.bump(2_000, None);
        assert!(!e.try_mark_indexed(1));
        assert!(e.is_pending());
        assert_eq!(e.index_version, 0);

        assert!(e.try_mark_indexed(2));
        assert_eq!(e.status, QueueStatus::Indexed);
        assert_eq!(e.index_version, 2);
    }

    #[test]
    fn test_wire_format() {
        let e = entry();
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["docId"], "u1");
        assert_eq!(json["mongoId"], "m1");
        assert_eq!(json["updateVersion"], 1);
        assert_eq!(json["indexVersion"], 0);
        assert_eq!(json["status"], -1);
        assert_eq!(json["createAtTimeZone"], 2);
        assert_eq!(json["isDeleted"], false);

        let back: QueueEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn test_unknown_status_code_rejected() {
        assert!(serde_json::from_str::<QueueStatus>("3").is_err());
        assert_eq!(
            serde_json::from_str::<QueueStatus>("0").unwrap(),
            QueueStatus::Indexed
        );
    }
}
