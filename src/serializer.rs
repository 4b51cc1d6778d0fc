/// Collection serializers for tidemark.
///
/// A serializer translates one [`CondCollection`] to and from the opaque
/// byte payload stored by the backing engine. Serializers are stateful and
/// single-use: a fresh instance is resolved from the
/// [`SerializerRegistry`](crate::registry::SerializerRegistry) for every
/// encode or decode, bound to exactly one collection, and dropped when the
/// call returns. Drop is the release point, so resources are freed on every
/// exit path including errors.
///
/// # Example
///
/// ```ignore
/// let mut serializer = JsonSerializer::new();
/// serializer.bind(collection);
/// let payload = serializer.encode()?;
///
/// let mut serializer = JsonSerializer::new();
/// serializer.decode(&payload)?;
/// let collection = serializer.take_collection().unwrap();
/// ```
use crate::error::{CondError, CondResult};
use crate::types::CondCollection;

/// Type-specific encoder/decoder between a collection and its byte payload.
///
/// Implementations hold at most one bound collection at a time. `encode`
/// consumes the bound collection; `decode` replaces it with the decoded one,
/// retrievable once via [`take_collection`](Self::take_collection).
pub trait CollectionSerializer: Send {
    /// Bind the collection to encode.
    fn bind(&mut self, collection: CondCollection);

    /// Encode the bound collection into a byte payload.
    ///
    /// Fails with `CondError::Serialization` if no collection is bound or
    /// the payload cannot be produced.
    fn encode(&mut self) -> CondResult<Vec<u8>>;

    /// Decode a byte payload, replacing any bound collection.
    fn decode(&mut self, bytes: &[u8]) -> CondResult<()>;

    /// Take the decoded collection out of the serializer.
    ///
    /// Returns `None` if no successful `decode` (or `bind`) happened, or if
    /// the collection was already taken.
    fn take_collection(&mut self) -> Option<CondCollection>;
}

/// JSON serializer for conditions collections.
///
/// Encodes the full collection (type name, elements, parameters) as JSON
/// via serde. This is the built-in general-purpose serializer; domain types
/// with bespoke wire formats register their own implementations.
#[derive(Debug, Default)]
pub struct JsonSerializer {
    collection: Option<CondCollection>,
}

impl JsonSerializer {
    /// Create a fresh, unbound serializer.
    pub fn new() -> Self {
        Self { collection: None }
    }
}

impl CollectionSerializer for JsonSerializer {
    fn bind(&mut self, collection: CondCollection) {
        self.collection = Some(collection);
    }

    fn encode(&mut self) -> CondResult<Vec<u8>> {
        let collection = self
            .collection
            .take()
            .ok_or_else(|| CondError::Serialization {
                type_name: String::new(),
                reason: "encode called with no collection bound".to_string(),
            })?;

        serde_json::to_vec(&collection).map_err(|e| CondError::Serialization {
            type_name: collection.type_name.clone(),
            reason: e.to_string(),
        })
    }

    fn decode(&mut self, bytes: &[u8]) -> CondResult<()> {
        let collection: CondCollection =
            serde_json::from_slice(bytes).map_err(|e| CondError::Serialization {
                type_name: String::new(),
                reason: format!("failed to decode JSON payload: {}", e),
            })?;

        self.collection = Some(collection);
        Ok(())
    }

    fn take_collection(&mut self) -> Option<CondCollection> {
        self.collection.take()
    }
}
