/// The conditions store: interval-aware read/write/tag operations.
///
/// A [`ConditionsStore`] is bound to one folder of one backing engine, with
/// a fixed open mode. Writes encode the collection through a serializer
/// resolved from the registry and submit it inside a single engine
/// transaction; reads decode matching records and stamp provenance
/// metadata onto them before returning.
///
/// # Example
///
/// ```ignore
/// let backend = Arc::new(MemoryBackend::new());
/// let registry = Arc::new(SerializerRegistry::new());
/// registry.register("Gains", || Box::new(JsonSerializer::new()));
///
/// let store = ConditionsStore::open(backend, registry, "calib", OpenMode::ReadWrite)?;
/// store.store(ValidityInterval::new(100, 200)?, gains, "run12")?;
///
/// if let Some(collection) = store.find_at(150, "")? {
///     println!("valid since {:?}", collection.parameter("DBSince"));
/// }
/// ```
use crate::backend::{BackendError, ConditionsBackend, NewRecord, StoredRecord};
use crate::error::{CondError, CondResult};
use crate::registry::SerializerRegistry;
use crate::types::{self, CondCollection, OpenMode, Timestamp, ValidityInterval};
use std::sync::Arc;

/// Provenance key: record validity start, `[raw nanos, date string]`.
pub const DB_SINCE: &str = "DBSince";
/// Provenance key: record validity end, `[raw nanos, date string]`.
pub const DB_TILL: &str = "DBTill";
/// Provenance key: wall-clock time of the query, `[raw nanos, date string]`.
pub const DB_QUERY_TIME: &str = "DBQueryTime";
/// Provenance key: engine-assigned commit time, `[raw nanos, date string]`.
pub const DB_INSERTION_TIME: &str = "DBInsertionTime";
/// Provenance key: resolved tag name (`"HEAD"` for the live view).
pub const DB_TAG: &str = "DBTag";
/// Provenance key: folder the record was read from.
pub const DB_FOLDER: &str = "DBFolder";
/// Provenance key: backing engine's self-reported name.
pub const DB_NAME: &str = "DBName";

/// A conditions store bound to one folder and open mode.
///
/// All operations are synchronous and block until the backing engine
/// responds. The store issues each write as its own engine transaction;
/// whether `commit`/`abort` are genuinely atomic depends on the engine
/// (the bundled [`MemoryBackend`](crate::memory::MemoryBackend)
/// auto-commits, making them advisory).
///
/// For concurrent use against a single engine handle, keep one in-flight
/// operation per store instance; the store adds no finer-grained locking.
pub struct ConditionsStore {
    backend: Arc<dyn ConditionsBackend>,
    registry: Arc<SerializerRegistry>,
    folder: String,
    mode: OpenMode,
    /// Engine name cached at open, for provenance stamping only
    store_name: String,
}

impl ConditionsStore {
    /// Open a store on `folder` with the given mode.
    ///
    /// Verifies the engine connection with an (advisory) read transaction
    /// and caches the engine's name for provenance. In `ReadWrite` mode the
    /// folder is created, empty and untagged, if it does not exist yet.
    pub fn open(
        backend: Arc<dyn ConditionsBackend>,
        registry: Arc<SerializerRegistry>,
        folder: impl Into<String>,
        mode: OpenMode,
    ) -> CondResult<Self> {
        let folder = folder.into();
        let store_name = backend.name().unwrap_or_default();

        let wrap = |e: BackendError| CondError::BackingStore {
            operation: "open".to_string(),
            folder: folder.clone(),
            message: e.to_string(),
        };

        backend.begin_read().map_err(wrap)?;
        backend.commit().map_err(wrap)?;

        tracing::info!(
            store = %store_name,
            folder = %folder,
            ?mode,
            "connected to backing store"
        );

        if mode == OpenMode::ReadWrite {
            backend.begin_write().map_err(wrap)?;
            if !backend.folder_exists(&folder).map_err(wrap)? {
                tracing::info!(folder = %folder, "folder does not exist, creating it");
                backend.create_folder(&folder, "", "", true).map_err(wrap)?;
            }
            backend.commit().map_err(wrap)?;
        }

        Ok(Self {
            backend,
            registry,
            folder,
            mode,
            store_name,
        })
    }

    /// The folder this store is bound to.
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// The fixed open mode of this store.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// The backing engine's name as cached at open (empty if unavailable).
    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// Store a collection with the given validity interval.
    ///
    /// The collection is encoded via a serializer resolved from the
    /// registry by its type name, and submitted to the engine with the
    /// description `"<type>: <description>"` so the type can be recovered
    /// from the description alone on read.
    ///
    /// Fails with `NotInUpdateMode` on a read-only store and with
    /// `NoSerializerRegistered` for an unregistered type; in both cases no
    /// engine write is attempted. On a put failure the transaction is
    /// aborted (best effort; auto-committing engines cannot roll back).
    pub fn store(
        &self,
        interval: ValidityInterval,
        collection: CondCollection,
        description: &str,
    ) -> CondResult<()> {
        self.require_update_mode("store")?;

        let type_name = collection.type_name().to_string();
        let payload = {
            let mut serializer = self.registry.resolve(&type_name).ok_or_else(|| {
                CondError::NoSerializerRegistered {
                    type_name: type_name.clone(),
                }
            })?;
            serializer.bind(collection);
            serializer.encode()?
            // serializer dropped here, releasing it on success and error alike
        };

        let db_description = format!("{}: {}", type_name, description);

        self.backend
            .begin_write()
            .map_err(|e| self.backing("store", e))?;

        let record = NewRecord {
            interval,
            description: db_description,
            payload,
        };
        match self.backend.put_object(&self.folder, record) {
            Ok(object_id) => {
                self.backend
                    .commit()
                    .map_err(|e| self.backing("store", e))?;
                tracing::debug!(
                    folder = %self.folder,
                    type_name = %type_name,
                    %object_id,
                    since = interval.since,
                    till = interval.till,
                    "stored collection"
                );
                Ok(())
            }
            Err(e) => {
                // Best-effort rollback; the put failure is the real error
                if let Err(abort_err) = self.backend.abort() {
                    tracing::warn!(
                        folder = %self.folder,
                        error = %abort_err,
                        "abort after failed put also failed"
                    );
                }
                Err(self.backing("store", e))
            }
        }
    }

    /// Find the collection valid at `timestamp` under `tag`.
    ///
    /// The empty tag resolves to `"HEAD"`, the live view. Absence is
    /// `Ok(None)`, not an error. A returned collection carries the full
    /// provenance parameter set (`DBSince`, `DBTill`, `DBQueryTime`,
    /// `DBInsertionTime`, `DBTag`, `DBFolder`, `DBName`).
    pub fn find_at(&self, timestamp: Timestamp, tag: &str) -> CondResult<Option<CondCollection>> {
        self.backend
            .begin_read()
            .map_err(|e| self.backing("find_at", e))?;

        let record = self
            .backend
            .get_object_at(&self.folder, timestamp, tag)
            .map_err(|e| self.backing("find_at", e))?;

        match record {
            None => {
                tracing::debug!(
                    folder = %self.folder,
                    timestamp,
                    tag = %resolve_tag(tag),
                    "no record valid at timestamp"
                );
                Ok(None)
            }
            Some(record) => Ok(Some(self.collection_from_record(&record, tag)?)),
        }
    }

    /// Enumerate every collection visible under `tag`, ascending by since.
    ///
    /// The engine's iteration order is not trusted; results are always
    /// sorted by validity start before returning.
    pub fn find_all(&self, tag: &str) -> CondResult<Vec<CondCollection>> {
        self.backend
            .begin_read()
            .map_err(|e| self.backing("find_all", e))?;

        let mut cursor = self
            .backend
            .iterate_objects(&self.folder, tag)
            .map_err(|e| self.backing("find_all", e))?;

        // Drive the cursor with the current-then-advance protocol, exactly
        // once. The cursor is released by drop on every exit path.
        let mut decoded: Vec<(Timestamp, CondCollection)> = Vec::new();
        let mut record = cursor.current().map_err(|e| self.backing("find_all", e))?;
        while let Some(current) = record {
            let collection = self.collection_from_record(&current, tag)?;
            decoded.push((current.since, collection));
            record = cursor.advance().map_err(|e| self.backing("find_all", e))?;
        }

        decoded.sort_by_key(|(since, _)| *since);
        Ok(decoded
            .into_iter()
            .map(|(_, collection)| collection)
            .collect())
    }

    /// Snapshot the folder's current contents under a new tag.
    ///
    /// Creates the tag metadata with `description`, then binds the folder
    /// to it. The resulting view is frozen: later writes to the folder do
    /// not appear under the tag.
    pub fn tag_folder(&self, tag: &str, description: &str) -> CondResult<()> {
        self.require_update_mode("tag_folder")?;

        self.backend
            .begin_write()
            .map_err(|e| self.backing("tag_folder", e))?;

        let result = self
            .backend
            .create_tag(tag, description)
            .and_then(|_| self.backend.bind_folder_to_tag(&self.folder, tag));

        match result {
            Ok(()) => {
                self.backend
                    .commit()
                    .map_err(|e| self.backing("tag_folder", e))?;
                tracing::info!(folder = %self.folder, tag = %tag, "tagged folder");
                Ok(())
            }
            Err(e) => {
                if let Err(abort_err) = self.backend.abort() {
                    tracing::warn!(
                        folder = %self.folder,
                        error = %abort_err,
                        "abort after failed tagging also failed"
                    );
                }
                Err(self.backing("tag_folder", e))
            }
        }
    }

    /// Decode an engine record and stamp provenance onto the collection.
    fn collection_from_record(
        &self,
        record: &StoredRecord,
        tag: &str,
    ) -> CondResult<CondCollection> {
        // Recover the type from the description prefix: "<type>: <text>"
        let (type_name, _) =
            record
                .description
                .split_once(':')
                .ok_or_else(|| CondError::MalformedRecord {
                    description: record.description.clone(),
                })?;

        let mut collection = {
            let mut serializer = self.registry.resolve(type_name).ok_or_else(|| {
                CondError::NoSerializerRegistered {
                    type_name: type_name.to_string(),
                }
            })?;
            serializer.decode(&record.payload)?;
            serializer
                .take_collection()
                .ok_or_else(|| CondError::Serialization {
                    type_name: type_name.to_string(),
                    reason: "serializer produced no collection after decode".to_string(),
                })?
            // serializer dropped here
        };

        collection.set_parameter(DB_SINCE, timestamp_pair(record.since));
        collection.set_parameter(DB_TILL, timestamp_pair(record.till));
        collection.set_parameter(DB_QUERY_TIME, timestamp_pair(types::now()));
        collection.set_parameter(DB_INSERTION_TIME, timestamp_pair(record.insertion_time));
        collection.set_parameter(DB_TAG, vec![resolve_tag(tag).to_string()]);
        collection.set_parameter(DB_FOLDER, vec![self.folder.clone()]);
        collection.set_parameter(DB_NAME, vec![self.store_name.clone()]);

        Ok(collection)
    }

    fn require_update_mode(&self, operation: &str) -> CondResult<()> {
        if self.mode != OpenMode::ReadWrite {
            return Err(CondError::NotInUpdateMode {
                operation: operation.to_string(),
                folder: self.folder.clone(),
            });
        }
        Ok(())
    }

    fn backing(&self, operation: &str, error: BackendError) -> CondError {
        CondError::BackingStore {
            operation: operation.to_string(),
            folder: self.folder.clone(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Debug for ConditionsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionsStore")
            .field("folder", &self.folder)
            .field("mode", &self.mode)
            .field("store_name", &self.store_name)
            .finish()
    }
}

/// The empty tag denotes the default `"HEAD"` view.
fn resolve_tag(tag: &str) -> &str {
    if tag.is_empty() { "HEAD" } else { tag }
}

/// Two-element provenance value: raw timestamp plus human-readable date.
fn timestamp_pair(timestamp: Timestamp) -> Vec<String> {
    vec![timestamp.to_string(), types::date_string(timestamp)]
}
