/// Error types for tidemark operations.
///
/// This module provides the error taxonomy for the conditions store. All
/// errors are well-typed and carry enough context (operation, folder, type
/// name) to diagnose a failure without knowledge of the backing engine.
///
/// Note that "no record valid at this time" is NOT an error: `find_at`
/// returns `Ok(None)` for an empty result. Errors are reserved for mode
/// violations, dispatch misses, corrupt records and engine failures.
use thiserror::Error;

/// The main error type for conditions store operations.
///
/// All fallible operations in tidemark return `Result<T, CondError>`.
#[derive(Error, Debug)]
pub enum CondError {
    /// A write was attempted on a store opened in read-only mode
    #[error("operation '{operation}' on folder '{folder}' requires a store opened in update mode")]
    NotInUpdateMode {
        /// The operation that was refused
        operation: String,
        /// The folder the store is bound to
        folder: String,
    },

    /// No serializer factory is registered for the collection type
    #[error("no serializer registered for collection type '{type_name}'")]
    NoSerializerRegistered {
        /// The collection type that failed to resolve
        type_name: String,
    },

    /// A stored description could not be split into a type prefix
    #[error("malformed record description '{description}': missing ':' type separator")]
    MalformedRecord {
        /// The offending stored description
        description: String,
    },

    /// Encoding or decoding a collection payload failed
    #[error("serialization failed for collection type '{type_name}': {reason}")]
    Serialization {
        /// The collection type being encoded or decoded
        type_name: String,
        /// Description of the failure
        reason: String,
    },

    /// A validity interval violates `since < till`
    #[error("invalid validity interval: since {since} must be earlier than till {till}")]
    InvalidInterval {
        /// The lower interval bound
        since: i64,
        /// The upper interval bound
        till: i64,
    },

    /// The backing engine reported a failure
    #[error("backing store failure during '{operation}' on folder '{folder}': {message}")]
    BackingStore {
        /// The store operation that was in flight
        operation: String,
        /// The folder the store is bound to
        folder: String,
        /// The engine's own diagnostic
        message: String,
    },
}

/// Result type alias for tidemark operations.
///
/// This is a convenience alias for `Result<T, CondError>` that makes
/// function signatures more concise throughout the codebase.
pub type CondResult<T> = Result<T, CondError>;
