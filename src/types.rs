/// Common types used throughout tidemark.
///
/// This module defines the core data model: timestamps, half-open validity
/// intervals, the store's open mode, and the in-memory collection object
/// that serializers bind to. These types are simple, immutable value types.
use crate::error::{CondError, CondResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// A point in time, in nanoseconds since the Unix epoch.
///
/// Timestamps are plain monotonically comparable integers; the store never
/// does calendar arithmetic on them. Human-readable renderings only appear
/// in provenance metadata.
pub type Timestamp = i64;

/// The earliest representable timestamp.
pub const TIMESTAMP_MIN: Timestamp = i64::MIN;

/// Sentinel meaning "valid indefinitely" when used as an interval's `till`.
pub const FOREVER: Timestamp = i64::MAX;

/// Render a raw timestamp as a human-readable UTC date string.
///
/// Used for the second element of the two-element provenance lists
/// (`DBSince`, `DBTill`, ...).
pub fn date_string(timestamp: Timestamp) -> String {
    let datetime: DateTime<Utc> = DateTime::from_timestamp_nanos(timestamp);
    datetime.format("%Y-%m-%d %H:%M:%S%.9f UTC").to_string()
}

/// The current wall-clock time as a raw [`Timestamp`].
pub fn now() -> Timestamp {
    // Nanosecond timestamps saturate in 2262; clamp instead of panicking.
    Utc::now().timestamp_nanos_opt().unwrap_or(FOREVER)
}

/// A half-open validity time range `[since, till)`.
///
/// A record with this interval is the current one for every query timestamp
/// `t` with `since <= t < till`. Use [`FOREVER`] as `till` for open-ended
/// validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidityInterval {
    /// First timestamp (inclusive) at which the record is valid
    pub since: Timestamp,
    /// First timestamp (exclusive) at which the record is no longer valid
    pub till: Timestamp,
}

impl ValidityInterval {
    /// Create a validity interval, enforcing `since < till`.
    pub fn new(since: Timestamp, till: Timestamp) -> CondResult<Self> {
        if since >= till {
            return Err(CondError::InvalidInterval { since, till });
        }
        Ok(Self { since, till })
    }

    /// Create an open-ended interval `[since, FOREVER)`.
    ///
    /// `since` must be earlier than [`FOREVER`]; `open_ended(FOREVER)`
    /// would be the empty interval `[FOREVER, FOREVER)`.
    pub fn open_ended(since: Timestamp) -> Self {
        debug_assert!(since < FOREVER, "open-ended interval must start before FOREVER");
        Self {
            since,
            till: FOREVER,
        }
    }

    /// Check whether a query timestamp falls inside `[since, till)`.
    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.since <= timestamp && timestamp < self.till
    }
}

/// The fixed open mode of a conditions store.
///
/// The mode is chosen at open time and immutable for the lifetime of the
/// store instance. Writes (`store`, `tag_folder`) require `ReadWrite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenMode {
    /// Queries only; any write fails with `NotInUpdateMode`
    ReadOnly,
    /// Queries and writes; the folder is created on open if absent
    ReadWrite,
}

/// An in-memory conditions collection.
///
/// This is the domain object that flows through the store: callers hand one
/// to `store()`, and `find_at`/`find_all` return decoded ones. The store
/// treats `elements` as opaque; only the type name takes part in serializer
/// dispatch.
///
/// `parameters` holds string-list annotations. On read, the store stamps
/// provenance entries (`DBSince`, `DBTill`, `DBTag`, ...) here so downstream
/// consumers can audit where a collection came from without re-querying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondCollection {
    /// The collection type name used for serializer dispatch (e.g. "Gains")
    pub type_name: String,
    /// The domain payload, opaque to the store
    pub elements: JsonValue,
    /// String-list parameters, including provenance metadata after a read
    pub parameters: BTreeMap<String, Vec<String>>,
}

impl CondCollection {
    /// Create a collection with the given type name and payload.
    pub fn new(type_name: impl Into<String>, elements: JsonValue) -> Self {
        Self {
            type_name: type_name.into(),
            elements,
            parameters: BTreeMap::new(),
        }
    }

    /// Get the collection type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Get the domain payload.
    pub fn elements(&self) -> &JsonValue {
        &self.elements
    }

    /// Set a string-list parameter, replacing any previous values.
    pub fn set_parameter(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.parameters.insert(key.into(), values);
    }

    /// Get a parameter's values, if set.
    pub fn parameter(&self, key: &str) -> Option<&[String]> {
        self.parameters.get(key).map(Vec::as_slice)
    }

    /// Get a parameter's first value, if set.
    ///
    /// Convenient for single-valued entries such as `DBTag` or `DBFolder`,
    /// and for the raw-timestamp element of the two-element time entries.
    pub fn parameter_value(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}
