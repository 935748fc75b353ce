//! Integration tests for avro-bandwidth
//!
//! These run full scans against containers written to temporary directories
//! or held in memory.

use apache_avro::types::Value;
use apache_avro::Schema;
use avro_bandwidth::adapter::{record_field, ChannelSink};
use avro_bandwidth::error::{AdaptError, ScanError, TransportError};
use avro_bandwidth::extract::{extract_double, extract_string};
use avro_bandwidth::ocf::{Codec, ContainerReader, ContainerWriter};
use avro_bandwidth::pipeline::read_container_dir;
use avro_bandwidth::scanner::{ScanOptions, Scanner};
use avro_bandwidth::store::{
    enumerate, LocalStore, MemoryStore, ObjectDescriptor, ObjectStore, ObjectStream,
};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

const EVENT_SCHEMA: &str = r#"{
    "type": "record",
    "name": "Event",
    "fields": [
        {"name": "seq", "type": "long"},
        {"name": "kind", "type": ["null", "string"]},
        {"name": "weight", "type": ["null", "double"]}
    ]
}"#;

fn schema() -> Schema {
    Schema::parse_str(EVENT_SCHEMA).unwrap()
}

fn event(seq: i64) -> Value {
    let (kind, weight) = if seq % 3 == 0 {
        (Value::Union(0, Box::new(Value::Null)), Value::Union(0, Box::new(Value::Null)))
    } else {
        (
            Value::Union(1, Box::new(Value::String(format!("kind-{}", seq % 3)))),
            Value::Union(1, Box::new(Value::Double(seq as f64))),
        )
    };
    Value::Record(vec![
        ("seq".to_string(), Value::Long(seq)),
        ("kind".to_string(), kind),
        ("weight".to_string(), weight),
    ])
}

fn encode(records: i64, codec: Codec) -> Vec<u8> {
    let schema = schema();
    let mut writer = ContainerWriter::new(&schema, Vec::new())
        .codec(codec)
        .block_size(64);
    for seq in 0..records {
        writer.append(event(seq)).unwrap();
    }
    writer.finish().unwrap()
}

fn write_object(root: &Path, container: &str, name: &str, bytes: &[u8]) {
    let path = root.join(container).join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn options(workers: usize, buffer_size: usize) -> ScanOptions {
    ScanOptions {
        worker_count: workers,
        buffer_size,
        report_interval: Duration::from_millis(25),
    }
}

#[test]
fn test_local_scan_end_to_end() {
    let dir = tempdir().unwrap();
    let mut expected = 0u64;
    for i in 0..24i64 {
        let records = 50 + i * 13;
        expected += records as u64;
        let codec = if i % 2 == 0 { Codec::Deflate } else { Codec::Null };
        write_object(
            dir.path(),
            "events",
            &format!("2024/01/part-{i:04}.avro"),
            &encode(records, codec),
        );
    }
    write_object(dir.path(), "events", "2024/01/_SUCCESS", b"");

    let store = Arc::new(LocalStore::new(dir.path()));
    let objects = enumerate(store.as_ref(), "events", "2024/", |name| name.ends_with(".avro"))
        .unwrap();
    assert_eq!(objects.len(), 24);

    let total_size: u64 = objects.iter().map(|o| o.size).sum();
    for (workers, buffer_size) in [(1, 0), (4, 8192), (8, 1)] {
        let scanner = Scanner::new(store.clone(), objects.clone(), options(workers, buffer_size))
            .unwrap();
        let summary = scanner.run().unwrap();

        assert_eq!(summary.records, expected);
        assert_eq!(summary.objects_completed, 24);
        assert_eq!(summary.objects_abandoned, 0);
        assert_eq!(summary.bytes, total_size);
    }
}

#[test]
fn test_enumerate_filter_and_prefix() {
    let dir = tempdir().unwrap();
    for name in ["a/x.avro", "a/y.json", "ab/z.avro", "b/w.avro"] {
        write_object(dir.path(), "bucket", name, b"data");
    }

    let store = LocalStore::new(dir.path());
    let found = enumerate(&store, "bucket", "a", |name| name.ends_with(".avro")).unwrap();
    let names: Vec<_> = found.iter().map(|o| o.object.as_str()).collect();
    assert_eq!(names, vec!["a/x.avro", "ab/z.avro"]);
}

#[test]
fn test_apache_avro_writer_interop() {
    let schema = schema();
    let mut writer = apache_avro::Writer::new(&schema, Vec::new());
    for seq in 0..500 {
        writer.append(event(seq)).unwrap();
    }
    let bytes = writer.into_inner().unwrap();

    let records: Vec<Value> = ContainerReader::new(bytes.as_slice())
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(records, (0..500).map(event).collect::<Vec<_>>());
}

#[test]
fn test_apache_avro_reader_interop() {
    let bytes = encode(300, Codec::Deflate);
    let reader = apache_avro::Reader::new(bytes.as_slice()).unwrap();
    let records: Vec<Value> = reader.map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 300);
    assert_eq!(records[7], event(7));
}

#[test]
fn test_apache_avro_snappy_interop() {
    let schema = schema();
    let mut writer =
        apache_avro::Writer::with_codec(&schema, Vec::new(), apache_avro::Codec::Snappy);
    for seq in 0..250 {
        writer.append(event(seq)).unwrap();
    }
    let bytes = writer.into_inner().unwrap();

    let mut reader = ContainerReader::new(bytes.as_slice()).unwrap();
    assert_eq!(reader.codec(), Codec::Snappy);
    let records: Vec<Value> = reader.by_ref().map(|r| r.unwrap()).collect();
    assert_eq!(records, (0..250).map(event).collect::<Vec<_>>());

    let ours = encode(250, Codec::Snappy);
    let decoded: Vec<Value> = apache_avro::Reader::new(ours.as_slice())
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(decoded, records);
}

#[test]
fn test_pipeline_with_extractors() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("export-0.avro"), encode(6, Codec::Null)).unwrap();
    fs::write(dir.path().join("export-1.avro"), encode(3, Codec::Deflate)).unwrap();
    fs::write(dir.path().join("ignored.avro"), encode(100, Codec::Null)).unwrap();

    let adapter = |v: &Value| -> Result<(String, f64), AdaptError> {
        let kind = extract_string(record_field(v, "kind")).unwrap_or_default();
        let weight = extract_double(record_field(v, "weight")).unwrap_or(0.0);
        Ok((kind, weight))
    };

    let (tx, rx) = crossbeam_channel::unbounded();
    let sent = read_container_dir(dir.path(), "export-", &adapter, &tx).unwrap();
    assert_eq!(sent, 9);

    let items: Vec<(String, f64)> = rx.try_iter().collect();
    assert_eq!(items[0], (String::new(), 0.0));
    assert_eq!(items[1], ("kind-1".to_string(), 1.0));
    assert_eq!(items[5], ("kind-2".to_string(), 5.0));
    assert_eq!(items[8], ("kind-2".to_string(), 2.0));
}

#[test]
fn test_scan_with_channel_consumer() {
    let mut store = MemoryStore::new();
    for i in 0..10 {
        store.insert("c", format!("{i}.avro"), encode(100, Codec::Deflate));
    }
    let objects = store.list("c", "").unwrap();

    let (tx, rx) = crossbeam_channel::unbounded();
    let sink = ChannelSink::new(
        |v: &Value| -> Result<i64, AdaptError> {
            match record_field(v, "seq") {
                Some(Value::Long(seq)) => Ok(*seq),
                _ => Err(AdaptError::MissingField("seq".into())),
            }
        },
        tx,
    );

    let summary = Scanner::new(Arc::new(store), objects, options(3, 4096))
        .unwrap()
        .with_consumer(Arc::new(sink))
        .run()
        .unwrap();

    assert_eq!(summary.records, 1000);
    let mut seqs: Vec<i64> = rx.try_iter().collect();
    assert_eq!(seqs.len(), 1000);
    seqs.sort_unstable();
    assert_eq!(seqs[0], 0);
    assert_eq!(seqs[999], 99);
}

#[test]
fn test_corrupt_objects_are_skipped() {
    let dir = tempdir().unwrap();
    write_object(dir.path(), "c", "0-good.avro", &encode(40, Codec::Null));
    write_object(dir.path(), "c", "1-magic.avro", b"PAR1 not avro at all");
    let mut truncated = encode(200, Codec::Null);
    truncated.truncate(truncated.len() - 3);
    write_object(dir.path(), "c", "2-truncated.avro", &truncated);
    write_object(dir.path(), "c", "3-good.avro", &encode(60, Codec::Deflate));

    let store = Arc::new(LocalStore::new(dir.path()));
    let objects = store.list("c", "").unwrap();
    let summary = Scanner::new(store, objects, options(2, 0))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(summary.objects_completed, 2);
    assert_eq!(summary.objects_abandoned, 2);
    // Truncated object keeps its three intact blocks of 64
    assert_eq!(summary.records, 40 + 60 + 192);
}

#[test]
fn test_transport_failure_is_fatal() {
    let dir = tempdir().unwrap();
    for i in 0..20 {
        write_object(dir.path(), "c", &format!("{i:02}.avro"), &encode(10, Codec::Null));
    }

    let store = Arc::new(LocalStore::new(dir.path()));
    let mut objects = store.list("c", "").unwrap();
    objects.insert(5, ObjectDescriptor::new("c", "vanished.avro", 100));

    let err = Scanner::new(store, objects, options(2, 0))
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(
        err,
        ScanError::Transport(TransportError::NotFound { ref object, .. }) if object == "vanished.avro"
    ));
}

/// Store whose opens are slow and counted
struct SlowStore {
    inner: MemoryStore,
    opens: AtomicUsize,
    delay: Duration,
}

impl ObjectStore for SlowStore {
    fn list(
        &self,
        container: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectDescriptor>, avro_bandwidth::error::EnumerationError> {
        self.inner.list(container, prefix)
    }

    fn open(
        &self,
        object: &ObjectDescriptor,
        shutdown: &AtomicBool,
    ) -> Result<ObjectStream, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.inner.open(object, shutdown)
    }
}

#[test]
fn test_cancellation_stops_promptly() {
    let mut inner = MemoryStore::new();
    let bytes = encode(20, Codec::Null);
    for i in 0..1000 {
        inner.insert("c", format!("{i:04}.avro"), bytes.clone());
    }
    let objects = inner.list("c", "").unwrap();

    let store = Arc::new(SlowStore {
        inner,
        opens: AtomicUsize::new(0),
        delay: Duration::from_millis(5),
    });

    let scanner = Scanner::new(store.clone(), objects, options(4, 0)).unwrap();
    let shutdown = scanner.shutdown_flag();

    let canceller = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            shutdown.store(true, Ordering::SeqCst);
            (store.opens.load(Ordering::SeqCst), Instant::now())
        })
    };

    let result = scanner.run();
    let finished = Instant::now();
    let (opens_at_cancel, cancelled_at) = canceller.join().unwrap();

    match result {
        Err(ScanError::Interrupted { records, .. }) => {
            assert!(records < 1000 * 20);
        }
        other => panic!("expected Interrupted, got {other:?}"),
    }

    // Each worker may be inside at most one open when the flag flips
    let total_opens = store.opens.load(Ordering::SeqCst);
    assert!(
        total_opens <= opens_at_cancel + 4,
        "{total_opens} opens, {opens_at_cancel} at cancel"
    );
    assert!(total_opens < 1000);
    assert!(finished.duration_since(cancelled_at) < Duration::from_secs(1));
}
