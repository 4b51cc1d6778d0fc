/// Backing-engine interface for tidemark.
///
/// The conditions store does not own storage; it issues read/write/commit
/// requests to a backing engine behind the [`ConditionsBackend`] trait.
/// This module defines that trait, the engine-side record layout, and the
/// safe cursor abstraction used to enumerate a folder.
///
/// Engines differ in how honest their transactions are: some auto-commit,
/// making `begin_*`/`commit`/`abort` advisory no-ops. Each implementation
/// documents which behavior it provides; the store never assumes rollback.
use crate::types::{Timestamp, ValidityInterval};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A failure reported by the backing engine.
///
/// The store wraps these into `CondError::BackingStore` with the operation
/// name and folder attached, so engine-specific diagnostics never surface
/// raw to callers.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct BackendError {
    /// The engine's own diagnostic
    pub message: String,
}

impl BackendError {
    /// Create a backend error from any displayable diagnostic.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type alias for backing-engine operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Engine-assigned identity of a committed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Generate a fresh object id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A record as submitted to the engine by a write.
///
/// The engine assigns the insertion time and object id at commit; the
/// caller only supplies validity, description and payload.
#[derive(Debug, Clone)]
pub struct NewRecord {
    /// Validity window of the record
    pub interval: ValidityInterval,
    /// Stored description, already composed as `"<type>: <free text>"`
    pub description: String,
    /// Opaque encoded payload
    pub payload: Vec<u8>,
}

/// A record as reported back by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// First timestamp (inclusive) at which the record is valid
    pub since: Timestamp,
    /// First timestamp (exclusive) at which the record is no longer valid
    pub till: Timestamp,
    /// Engine-assigned commit timestamp, distinct from the validity window
    pub insertion_time: Timestamp,
    /// Stored description, `"<type>: <free text>"`
    pub description: String,
    /// Opaque encoded payload
    pub payload: Vec<u8>,
}

impl StoredRecord {
    /// The record's validity window as an interval value.
    pub fn interval(&self) -> ValidityInterval {
        ValidityInterval {
            since: self.since,
            till: self.till,
        }
    }
}

/// A lazy, finite, non-restartable cursor over one folder's records.
///
/// The protocol is "current, then advance": read the record under the
/// cursor with [`current`](Self::current), then step with
/// [`advance`](Self::advance), which yields the next record or `None` once
/// exhausted. An exhausted cursor keeps returning `None`; it never loops
/// and never re-materializes an engine-side record it already produced.
///
/// The store drives a cursor to exhaustion exactly once per `find_all` call
/// and releases it by drop, on every exit path.
pub trait RecordCursor: Send {
    /// The record currently under the cursor, or `None` if exhausted.
    fn current(&mut self) -> BackendResult<Option<StoredRecord>>;

    /// Advance and return the next record, or `None` once exhausted.
    fn advance(&mut self) -> BackendResult<Option<StoredRecord>>;
}

/// The transactional backing engine consumed by the conditions store.
///
/// One handle per store instance; the store issues each write as a single
/// `begin_write`/`commit` pair and calls `abort` when a write fails. The
/// empty tag and `"HEAD"` both denote the live (untagged) view of a folder.
pub trait ConditionsBackend: Send + Sync {
    /// The engine's self-reported name, if it exposes one.
    ///
    /// Optional capability used only for provenance stamping (`DBName`).
    fn name(&self) -> Option<String>;

    /// Check whether a folder exists.
    fn folder_exists(&self, folder: &str) -> BackendResult<bool>;

    /// Create a folder.
    ///
    /// `parent_tag` and `base_tag` seed the folder from existing tagged
    /// content; empty strings mean a fresh, empty folder. `time_based`
    /// declares interval-indexed records.
    fn create_folder(
        &self,
        folder: &str,
        parent_tag: &str,
        base_tag: &str,
        time_based: bool,
    ) -> BackendResult<()>;

    /// Begin a read transaction.
    fn begin_read(&self) -> BackendResult<()>;

    /// Begin a write transaction.
    fn begin_write(&self) -> BackendResult<()>;

    /// Commit the current transaction.
    fn commit(&self) -> BackendResult<()>;

    /// Abort the current transaction.
    fn abort(&self) -> BackendResult<()>;

    /// Store a record in a folder, assigning its insertion time and id.
    fn put_object(&self, folder: &str, record: NewRecord) -> BackendResult<ObjectId>;

    /// Find the record under `tag` whose interval contains `timestamp`.
    ///
    /// Returns at most one record. If several overlapping records match,
    /// the first one the engine reports wins; overlap resolution belongs to
    /// the caller via tags.
    fn get_object_at(
        &self,
        folder: &str,
        timestamp: Timestamp,
        tag: &str,
    ) -> BackendResult<Option<StoredRecord>>;

    /// Open a cursor over every record visible under `tag`.
    ///
    /// No iteration order is guaranteed; callers needing order must sort.
    fn iterate_objects(&self, folder: &str, tag: &str) -> BackendResult<Box<dyn RecordCursor>>;

    /// Create tag metadata. Tags are immutable once created.
    fn create_tag(&self, tag: &str, description: &str) -> BackendResult<()>;

    /// Bind a folder's current contents to a tag (snapshot copy).
    fn bind_folder_to_tag(&self, folder: &str, tag: &str) -> BackendResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_record_interval() {
        let record = StoredRecord {
            since: 100,
            till: 200,
            insertion_time: 999,
            description: "Gains: run12".to_string(),
            payload: vec![1, 2, 3],
        };

        assert!(record.interval().contains(150));
        assert!(!record.interval().contains(200));
    }

    #[test]
    fn test_object_ids_are_unique() {
        assert_ne!(ObjectId::generate(), ObjectId::generate());
    }
}
