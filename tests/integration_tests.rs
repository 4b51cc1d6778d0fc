/// Integration tests for tidemark.
///
/// These tests verify the end-to-end behavior of the conditions store:
/// interval validity, tag snapshot isolation, mode gating (including that
/// refused writes never touch the backing engine), and provenance stamping.
use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicUsize, Ordering};
use tidemark::{
    BackendResult, CondCollection, CondError, ConditionsBackend, ConditionsStore, DB_SINCE,
    DB_TAG, DB_TILL, JsonSerializer, MemoryBackend, NewRecord, ObjectId, OpenMode, RecordCursor,
    SerializerRegistry, StoredRecord, Timestamp, ValidityInterval, json,
};

static TRACING: Once = Once::new();

/// Install the fmt subscriber once so store logs show up under
/// `--nocapture`, filtered through `RUST_LOG`.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn registry_with_gains() -> Arc<SerializerRegistry> {
    init_tracing();
    let registry = Arc::new(SerializerRegistry::new());
    registry.register("Gains", || Box::new(JsonSerializer::new()));
    registry
}

fn interval(since: Timestamp, till: Timestamp) -> ValidityInterval {
    ValidityInterval::new(since, till).unwrap()
}

fn open_memory_store(mode: OpenMode) -> ConditionsStore {
    ConditionsStore::open(
        Arc::new(MemoryBackend::new()),
        registry_with_gains(),
        "calib",
        mode,
    )
    .unwrap()
}

#[test]
fn test_end_to_end_calibration_scenario() {
    let store = open_memory_store(OpenMode::ReadWrite);

    let payload_a = CondCollection::new("Gains", json!({"run": "A", "channels": [1.0, 2.0]}));
    let payload_b = CondCollection::new("Gains", json!({"run": "B", "channels": [1.1, 2.1]}));

    store.store(interval(100, 200), payload_a, "run12").unwrap();
    store.store(interval(200, 300), payload_b, "run13").unwrap();

    // t = 150 falls in [100, 200): payload A, stamped with its validity
    let found = store.find_at(150, "").unwrap().unwrap();
    assert_eq!(found.elements()["run"], "A");
    assert_eq!(found.parameter_value(DB_SINCE), Some("100"));
    assert_eq!(found.parameter(DB_TILL).unwrap()[0], "200");

    // t = 250 falls in [200, 300): payload B
    let found = store.find_at(250, "").unwrap().unwrap();
    assert_eq!(found.elements()["run"], "B");

    // t = 350 is past every interval: absent, not an error
    assert!(store.find_at(350, "").unwrap().is_none());
}

#[test]
fn test_stored_record_visible_across_full_window() {
    let store = open_memory_store(OpenMode::ReadWrite);
    let gains = CondCollection::new("Gains", json!(42));
    store.store(interval(100, 200), gains, "window").unwrap();

    for t in [100, 101, 150, 199] {
        assert!(store.find_at(t, "").unwrap().is_some(), "t = {}", t);
    }
    for t in [0, 99, 200, 201, 1_000_000] {
        assert!(store.find_at(t, "").unwrap().is_none(), "t = {}", t);
    }
}

#[test]
fn test_find_all_orders_by_since_regardless_of_insertion() {
    let store = open_memory_store(OpenMode::ReadWrite);

    for since in [300, 100, 200] {
        let gains = CondCollection::new("Gains", json!({"since": since}));
        store
            .store(interval(since, since + 50), gains, "shuffled")
            .unwrap();
    }

    let all = store.find_all("").unwrap();
    assert_eq!(all.len(), 3);
    let sinces: Vec<i64> = all
        .iter()
        .map(|c| c.parameter_value(DB_SINCE).unwrap().parse().unwrap())
        .collect();
    assert_eq!(sinces, vec![100, 200, 300]);
}

#[test]
fn test_tag_snapshot_is_isolated_from_later_writes() {
    let store = open_memory_store(OpenMode::ReadWrite);

    let before = CondCollection::new("Gains", json!("before"));
    store.store(interval(0, 100), before, "pre-tag").unwrap();

    store.tag_folder("v1", "first cut").unwrap();

    let after = CondCollection::new("Gains", json!("after"));
    store.store(interval(100, 200), after, "post-tag").unwrap();

    // The tag reflects exactly the folder's contents at tagging time
    let tagged = store.find_all("v1").unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].elements(), &json!("before"));
    assert_eq!(tagged[0].parameter_value(DB_TAG), Some("v1"));

    // The live view sees both
    assert_eq!(store.find_all("").unwrap().len(), 2);
    assert_eq!(store.find_all("HEAD").unwrap().len(), 2);
}

#[test]
fn test_tag_folder_read_only_is_refused() {
    let store = open_memory_store(OpenMode::ReadOnly);

    let result = store.tag_folder("v1", "first cut");
    assert!(matches!(result, Err(CondError::NotInUpdateMode { .. })));
}

/// Backing-engine test double that refuses every mutation and counts how
/// often the store attempted one. Reads behave as an empty engine.
struct MutationRefusingBackend {
    mutations: AtomicUsize,
}

impl MutationRefusingBackend {
    fn new() -> Self {
        Self {
            mutations: AtomicUsize::new(0),
        }
    }

    fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn refuse<T>(&self) -> BackendResult<T> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Err(tidemark::BackendError::new("mutation refused by test double"))
    }
}

struct EmptyCursor;

impl RecordCursor for EmptyCursor {
    fn current(&mut self) -> BackendResult<Option<StoredRecord>> {
        Ok(None)
    }

    fn advance(&mut self) -> BackendResult<Option<StoredRecord>> {
        Ok(None)
    }
}

impl ConditionsBackend for MutationRefusingBackend {
    fn name(&self) -> Option<String> {
        None
    }

    fn folder_exists(&self, _folder: &str) -> BackendResult<bool> {
        Ok(true)
    }

    fn create_folder(
        &self,
        _folder: &str,
        _parent_tag: &str,
        _base_tag: &str,
        _time_based: bool,
    ) -> BackendResult<()> {
        self.refuse()
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

    fn put_object(&self, _folder: &str, _record: NewRecord) -> BackendResult<ObjectId> {
        self.refuse()
    }

    fn get_object_at(
        &self,
        _folder: &str,
        _timestamp: Timestamp,
        _tag: &str,
    ) -> BackendResult<Option<StoredRecord>> {
        Ok(None)
    }

    fn iterate_objects(&self, _folder: &str, _tag: &str) -> BackendResult<Box<dyn RecordCursor>> {
        Ok(Box::new(EmptyCursor))
    }

    fn create_tag(&self, _tag: &str, _description: &str) -> BackendResult<()> {
        self.refuse()
    }

    fn bind_folder_to_tag(&self, _folder: &str, _tag: &str) -> BackendResult<()> {
        self.refuse()
    }
}

#[test]
fn test_read_only_store_never_touches_the_engine() {
    let backend = Arc::new(MutationRefusingBackend::new());
    let store = ConditionsStore::open(
        Arc::clone(&backend) as Arc<dyn ConditionsBackend>,
        registry_with_gains(),
        "calib",
        OpenMode::ReadOnly,
    )
    .unwrap();

    let gains = CondCollection::new("Gains", json!(1));
    let result = store.store(interval(0, 10), gains, "refused");
    assert!(matches!(result, Err(CondError::NotInUpdateMode { .. })));

    let result = store.tag_folder("v1", "refused");
    assert!(matches!(result, Err(CondError::NotInUpdateMode { .. })));

    assert_eq!(backend.mutation_count(), 0);
}

#[test]
fn test_unregistered_type_never_touches_the_engine() {
    init_tracing();
    let backend = Arc::new(MutationRefusingBackend::new());
    let store = ConditionsStore::open(
        Arc::clone(&backend) as Arc<dyn ConditionsBackend>,
        Arc::new(SerializerRegistry::new()),
        "calib",
        OpenMode::ReadWrite,
    )
    .unwrap();

    let gains = CondCollection::new("Gains", json!(1));
    let result = store.store(interval(0, 10), gains, "no serializer");
    assert!(matches!(
        result,
        Err(CondError::NoSerializerRegistered { .. })
    ));

    assert_eq!(backend.mutation_count(), 0);
}

#[test]
fn test_failed_put_surfaces_as_backing_store_error() {
    let backend = Arc::new(MutationRefusingBackend::new());
    let store = ConditionsStore::open(
        backend as Arc<dyn ConditionsBackend>,
        registry_with_gains(),
        "calib",
        OpenMode::ReadWrite,
    )
    .unwrap();

    let gains = CondCollection::new("Gains", json!(1));
    let result = store.store(interval(0, 10), gains, "engine down");
    match result {
        Err(CondError::BackingStore {
            operation, folder, ..
        }) => {
            assert_eq!(operation, "store");
            assert_eq!(folder, "calib");
        }
        other => panic!("expected BackingStore error, got {:?}", other),
    }
}

#[test]
fn test_shared_backend_reader_sees_writer_commits() {
    let backend = Arc::new(MemoryBackend::new());
    let registry = registry_with_gains();

    let writer = ConditionsStore::open(
        Arc::clone(&backend) as Arc<dyn ConditionsBackend>,
        Arc::clone(&registry),
        "calib",
        OpenMode::ReadWrite,
    )
    .unwrap();

    let reader = ConditionsStore::open(
        backend as Arc<dyn ConditionsBackend>,
        registry,
        "calib",
        OpenMode::ReadOnly,
    )
    .unwrap();

    let gains = CondCollection::new("Gains", json!({"v": 7}));
    writer.store(interval(50, 60), gains, "shared").unwrap();

    let found = reader.find_at(55, "").unwrap().unwrap();
    assert_eq!(found.elements(), &json!({"v": 7}));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// For any valid window and probe time, find_at returns the record
        /// exactly when the probe falls inside [since, till).
        #[test]
        fn find_at_matches_interval_containment(
            since in -1_000_000i64..1_000_000,
            width in 1i64..1_000_000,
            probe in -2_000_000i64..2_000_000,
        ) {
            let till = since + width;
            let store = open_memory_store(OpenMode::ReadWrite);
            let gains = CondCollection::new("Gains", json!({"since": since}));
            store.store(interval(since, till), gains, "prop").unwrap();

            let found = store.find_at(probe, "").unwrap();
            let expected = since <= probe && probe < till;
            prop_assert_eq!(found.is_some(), expected);
        }
    }
}
