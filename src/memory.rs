/// In-memory backing engine for tidemark.
///
/// [`MemoryBackend`] is the reference implementation of
/// [`ConditionsBackend`]: folders and tag snapshots live in `DashMap`s, so
/// it is thread-safe and needs no configuration. It is the default engine
/// for tests and for embedding the store without external storage.
///
/// # Transaction semantics
///
/// This engine auto-commits: every `put_object` is durable (in memory) the
/// moment it returns, and `begin_*`/`commit`/`abort` are advisory no-ops.
/// Callers must not rely on rollback of failed writes against this backend.
///
/// # Tag semantics
///
/// `bind_folder_to_tag` copies the folder's current record list, so a tag
/// is a true snapshot: writes made after tagging never show up under the
/// tag (copy semantics, not a moving pointer).
use crate::backend::{
    BackendError, BackendResult, ConditionsBackend, NewRecord, ObjectId, RecordCursor,
    StoredRecord,
};
use crate::types::{self, Timestamp};
use dashmap::DashMap;

/// Resolve the tag argument: empty means the live `"HEAD"` view.
fn is_live_view(tag: &str) -> bool {
    tag.is_empty() || tag == "HEAD"
}

/// In-memory, thread-safe conditions backend.
pub struct MemoryBackend {
    /// Engine name reported for provenance stamping
    name: String,
    /// Live records per folder, in insertion order
    folders: DashMap<String, Vec<StoredRecord>>,
    /// Tag descriptions, keyed by tag name
    tags: DashMap<String, String>,
    /// Snapshot record lists, keyed by (folder, tag)
    tag_views: DashMap<(String, String), Vec<StoredRecord>>,
}

impl MemoryBackend {
    /// Create a backend with the default engine name.
    pub fn new() -> Self {
        Self::with_name("tidemark-memory")
    }

    /// Create a backend reporting a custom engine name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            folders: DashMap::new(),
            tags: DashMap::new(),
            tag_views: DashMap::new(),
        }
    }

    /// Fetch the record list visible under `tag`, cloned out of the maps.
    ///
    /// A missing folder reads as empty under the live view; an unknown tag
    /// is an error, while a known tag never bound to this folder reads as
    /// empty.
    fn records_under_tag(&self, folder: &str, tag: &str) -> BackendResult<Vec<StoredRecord>> {
        if is_live_view(tag) {
            return Ok(self
                .folders
                .get(folder)
                .map(|records| records.clone())
                .unwrap_or_default());
        }

        if !self.tags.contains_key(tag) {
            return Err(BackendError::new(format!("unknown tag '{}'", tag)));
        }

        Ok(self
            .tag_views
            .get(&(folder.to_string(), tag.to_string()))
            .map(|records| records.clone())
            .unwrap_or_default())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionsBackend for MemoryBackend {
    fn name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn folder_exists(&self, folder: &str) -> BackendResult<bool> {
        Ok(self.folders.contains_key(folder))
    }

    fn create_folder(
        &self,
        folder: &str,
        _parent_tag: &str,
        _base_tag: &str,
        _time_based: bool,
    ) -> BackendResult<()> {
        // Idempotent; seeding from parent/base tags is not supported here
        self.folders.entry(folder.to_string()).or_default();
        Ok(())
    }

    fn begin_read(&self) -> BackendResult<()> {
        Ok(())
    }

    fn begin_write(&self) -> BackendResult<()> {
        Ok(())
    }

    fn commit(&self) -> BackendResult<()> {
        Ok(())
    }

    fn abort(&self) -> BackendResult<()> {
        Ok(())
    }

    fn put_object(&self, folder: &str, record: NewRecord) -> BackendResult<ObjectId> {
        let stored = StoredRecord {
            since: record.interval.since,
            till: record.interval.till,
            insertion_time: types::now(),
            description: record.description,
            payload: record.payload,
        };

        self.folders
            .entry(folder.to_string())
            .or_default()
            .push(stored);

        Ok(ObjectId::generate())
    }

    fn get_object_at(
        &self,
        folder: &str,
        timestamp: Timestamp,
        tag: &str,
    ) -> BackendResult<Option<StoredRecord>> {
        let records = self.records_under_tag(folder, tag)?;

        // First reported record wins when intervals overlap
        Ok(records
            .into_iter()
            .find(|record| record.interval().contains(timestamp)))
    }

    fn iterate_objects(&self, folder: &str, tag: &str) -> BackendResult<Box<dyn RecordCursor>> {
        let records = self.records_under_tag(folder, tag)?;
        Ok(Box::new(MemoryCursor {
            records,
            position: 0,
        }))
    }

    fn create_tag(&self, tag: &str, description: &str) -> BackendResult<()> {
        if self.tags.contains_key(tag) {
            return Err(BackendError::new(format!(
                "tag '{}' already exists and tags are immutable",
                tag
            )));
        }

        self.tags.insert(tag.to_string(), description.to_string());
        Ok(())
    }

    fn bind_folder_to_tag(&self, folder: &str, tag: &str) -> BackendResult<()> {
        if !self.tags.contains_key(tag) {
            return Err(BackendError::new(format!("unknown tag '{}'", tag)));
        }

        let snapshot = self
            .folders
            .get(folder)
            .map(|records| records.clone())
            .ok_or_else(|| BackendError::new(format!("unknown folder '{}'", folder)))?;

        self.tag_views
            .insert((folder.to_string(), tag.to_string()), snapshot);
        Ok(())
    }
}

/// Cursor over a cloned-out record list.
///
/// Materializes each record once: `current` reads under the position,
/// `advance` steps forward. Past the end both keep returning `None`.
struct MemoryCursor {
    records: Vec<StoredRecord>,
    position: usize,
}

impl RecordCursor for MemoryCursor {
    fn current(&mut self) -> BackendResult<Option<StoredRecord>> {
        Ok(self.records.get(self.position).cloned())
    }

    fn advance(&mut self) -> BackendResult<Option<StoredRecord>> {
        self.position = self.position.saturating_add(1);
        Ok(self.records.get(self.position).cloned())
    }
}
