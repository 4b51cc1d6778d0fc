//! # Tidemark - Time-Versioned Conditions Store
//!
//! Tidemark manages **time-versioned condition records**: named collections
//! of domain data whose validity is bounded by a half-open interval
//! `[since, till)`, organized into folders and addressable through named
//! snapshot tags. Write a record with an explicit validity window; later ask
//! for "the record valid at time T" or "everything visible under tag X, in
//! validity order".
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tidemark::prelude::*;
//!
//! fn main() -> CondResult<()> {
//!     // Register a serializer for each collection type
//!     let registry = Arc::new(SerializerRegistry::new());
//!     registry.register("Gains", || Box::new(JsonSerializer::new()));
//!
//!     // Open a store bound to one folder
//!     let backend = Arc::new(MemoryBackend::new());
//!     let store = ConditionsStore::open(backend, registry, "calib", OpenMode::ReadWrite)?;
//!
//!     // Store a record valid over [100, 200)
//!     let gains = CondCollection::new("Gains", json!({"channels": [1.5, 2.5]}));
//!     store.store(ValidityInterval::new(100, 200)?, gains, "run12")?;
//!
//!     // Point lookup: which record is valid at t = 150?
//!     if let Some(found) = store.find_at(150, "")? {
//!         println!("since = {:?}", found.parameter("DBSince"));
//!     }
//!
//!     // Freeze the folder's current contents under a tag
//!     store.tag_folder("v1", "first production cut")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Tidemark is built on three seams:
//!
//! 1. **Conditions Store** ([`store`]) - interval-aware store / point-lookup
//!    / listing / tagging operations against one folder, with provenance
//!    stamping on every decoded record.
//! 2. **Serializer Registry** ([`registry`], [`serializer`]) - dispatch from
//!    a collection type name to a fresh, single-use encoder/decoder.
//! 3. **Backing Engine** ([`backend`]) - the transactional storage the
//!    store issues requests to; [`memory`] provides the bundled in-memory
//!    implementation, and external engines plug in behind the same trait.
//!
//! ## Concurrency
//!
//! Every operation is synchronous and blocks until the backing engine
//! responds. The registry and the in-memory backend are thread-safe; a
//! store instance is safest with one in-flight operation at a time.
//!
//! ## What absence means
//!
//! A `find_at` miss is `Ok(None)`, never an error. Errors are reserved for
//! mode violations, serializer dispatch misses, malformed records and
//! backing-engine failures - see [`CondError`].

mod error;
mod types;

// Serialization seam
pub mod registry;
pub mod serializer;

// Backing engine seam
pub mod backend;
pub mod memory;

// The store itself
pub mod store;

// Public API exports
pub use error::{CondError, CondResult};
pub use types::{
    CondCollection, FOREVER, OpenMode, TIMESTAMP_MIN, Timestamp, ValidityInterval, date_string,
    now,
};

pub use registry::{SerializerFactory, SerializerRegistry};
pub use serializer::{CollectionSerializer, JsonSerializer};

pub use backend::{
    BackendError, BackendResult, ConditionsBackend, NewRecord, ObjectId, RecordCursor,
    StoredRecord,
};
pub use memory::MemoryBackend;

pub use store::{
    ConditionsStore, DB_FOLDER, DB_INSERTION_TIME, DB_NAME, DB_QUERY_TIME, DB_SINCE, DB_TAG,
    DB_TILL,
};

// Re-export commonly used external types for convenience
pub use serde_json::{Value as JsonValue, json};

/// Prelude module for convenient imports.
///
/// Import everything you need with:
/// ```ignore
/// use tidemark::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backend::{ConditionsBackend, StoredRecord};
    pub use crate::error::{CondError, CondResult};
    pub use crate::memory::MemoryBackend;
    pub use crate::registry::SerializerRegistry;
    pub use crate::serializer::{CollectionSerializer, JsonSerializer};
    pub use crate::store::ConditionsStore;
    pub use crate::types::{CondCollection, FOREVER, OpenMode, Timestamp, ValidityInterval};
    pub use serde_json::{Value as JsonValue, json};
}
