/// Serializer registry for tidemark.
///
/// The registry maps a collection type name to a factory producing a fresh
/// serializer for that type. It replaces the classic process-wide singleton
/// with an explicitly constructed value: build one, share it via `Arc`, and
/// hand it to every [`ConditionsStore`](crate::store::ConditionsStore) that
/// needs it. Registration and resolution are safe to call concurrently.
///
/// # Example
///
/// ```ignore
/// let registry = Arc::new(SerializerRegistry::new());
/// registry.register("Gains", || Box::new(JsonSerializer::new()));
///
/// let serializer = registry.resolve("Gains").expect("registered above");
/// ```
use crate::serializer::CollectionSerializer;
use dashmap::DashMap;
use std::sync::Arc;

/// Factory producing an independent serializer instance per call.
pub type SerializerFactory = Arc<dyn Fn() -> Box<dyn CollectionSerializer> + Send + Sync>;

/// Registry dispatching collection type names to serializer factories.
///
/// Later registration for the same type name overwrites the earlier one.
/// Every [`resolve`](Self::resolve) call invokes the factory, so callers
/// never observe a shared or previously-used serializer instance.
#[derive(Default)]
pub struct SerializerRegistry {
    factories: DashMap<String, SerializerFactory>,
}

impl SerializerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    /// Register a serializer factory for a collection type name.
    ///
    /// Unconditionally overwrites any factory previously registered for the
    /// same type name.
    pub fn register<F>(&self, type_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn CollectionSerializer> + Send + Sync + 'static,
    {
        self.factories.insert(type_name.into(), Arc::new(factory));
    }

    /// Resolve a fresh serializer for a collection type name.
    ///
    /// Returns `None` if no factory is registered for the type. Each call
    /// yields an independent, unbound serializer.
    pub fn resolve(&self, type_name: &str) -> Option<Box<dyn CollectionSerializer>> {
        let factory = self.factories.get(type_name)?;
        Some((**factory)())
    }

    /// Check whether a factory is registered for a type name.
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// List all registered type names, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .factories
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        types.sort();
        types
    }
}

impl std::fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("registered_types", &self.registered_types())
            .finish()
    }
}
