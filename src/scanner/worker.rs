//! Scan worker threads
//!
//! Each worker:
//! - Claims the next object index from the shared counter
//! - Opens the object through the store
//! - Optionally attaches its own read buffer
//! - Decodes every record and bumps its counter slot
//! - Hands records to the consumer, if one is attached
//!
//! Errors are graded by severity. A failed open stops the whole scan; a
//! corrupt container only abandons that object.

use crate::adapter::RecordConsumer;
use crate::error::{ConsumeError, ObjectOutcome, ScanError, ScanResult, WorkerError};
use crate::ocf::ContainerReader;
use crate::scanner::buffer::{CountingReader, ReadBuffer};
use crate::scanner::claim::ClaimCounter;
use crate::store::{ObjectDescriptor, ObjectStore};
use crossbeam_utils::CachePadded;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Counters written by a single worker
#[derive(Debug, Default)]
pub struct WorkerCounters {
    /// Records decoded
    pub records: AtomicU64,

    /// Bytes read from object streams
    pub bytes: AtomicU64,

    /// Objects read to the end
    pub objects_completed: AtomicU64,

    /// Objects given up on after a format or adapter error
    pub objects_abandoned: AtomicU64,
}

impl WorkerCounters {
    #[inline]
    fn record_one(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    fn record_completed(&self) {
        self.objects_completed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_abandoned(&self) {
        self.objects_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            records: self.records.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            objects_completed: self.objects_completed.load(Ordering::Relaxed),
            objects_abandoned: self.objects_abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of one or more counter slots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub records: u64,
    pub bytes: u64,
    pub objects_completed: u64,
    pub objects_abandoned: u64,
}

impl std::ops::Add for CounterSnapshot {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            records: self.records + other.records,
            bytes: self.bytes + other.bytes,
            objects_completed: self.objects_completed + other.objects_completed,
            objects_abandoned: self.objects_abandoned + other.objects_abandoned,
        }
    }
}

/// One cache-padded counter slot per worker
#[derive(Debug)]
pub struct CounterSlots {
    slots: Box<[CachePadded<WorkerCounters>]>,
}

impl CounterSlots {
    pub fn new(workers: usize) -> Self {
        Self {
            slots: (0..workers)
                .map(|_| CachePadded::new(WorkerCounters::default()))
                .collect(),
        }
    }

    /// Slot owned by worker `id`
    pub fn slot(&self, id: usize) -> &WorkerCounters {
        &self.slots[id]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn total_records(&self) -> u64 {
        self.slots
            .iter()
            .map(|s| s.records.load(Ordering::Relaxed))
            .sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.slots
            .iter()
            .map(|s| s.bytes.load(Ordering::Relaxed))
            .sum()
    }

    /// Sum of every slot
    pub fn totals(&self) -> CounterSnapshot {
        self.slots
            .iter()
            .map(|s| s.snapshot())
            .fold(CounterSnapshot::default(), |acc, s| acc + s)
    }
}

/// Everything a worker shares with the coordinator
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub store: Arc<dyn ObjectStore>,
    pub objects: Arc<[ObjectDescriptor]>,
    pub claims: Arc<ClaimCounter>,
    pub counters: Arc<CounterSlots>,
    pub consumer: Option<Arc<dyn RecordConsumer>>,
    pub shutdown: Arc<AtomicBool>,

    /// Read buffer capacity; 0 reads the stream directly
    pub buffer_size: usize,
}

/// A running scan worker
pub(crate) struct Worker {
    id: usize,
    handle: Option<JoinHandle<ScanResult<()>>>,
}

impl Worker {
    /// Spawn a named worker thread
    pub fn spawn(id: usize, ctx: WorkerContext) -> Result<Self, WorkerError> {
        let handle = thread::Builder::new()
            .name(format!("scan-worker-{id}"))
            .spawn(move || worker_loop(id, ctx))
            .map_err(|e| WorkerError::SpawnFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> ScanResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        match handle.join() {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Worker thread panicked".into());
                Err(WorkerError::Panicked {
                    id: self.id,
                    message,
                }
                .into())
            }
        }
    }
}

/// Main worker loop
fn worker_loop(id: usize, ctx: WorkerContext) -> ScanResult<()> {
    info!(worker = id, "Worker started");

    let counters = ctx.counters.slot(id);
    let mut buffer = (ctx.buffer_size > 0).then(|| ReadBuffer::new(ctx.buffer_size));

    while !ctx.shutdown.load(Ordering::Relaxed) {
        let Some(index) = ctx.claims.claim() else {
            break;
        };
        let object = &ctx.objects[index];

        info!(
            worker = id,
            container = %object.container,
            object = %object.object,
            "Opening object"
        );

        let stream = match ctx.store.open(object, &ctx.shutdown) {
            Ok(stream) => stream,
            Err(e) if ctx.shutdown.load(Ordering::Relaxed) => {
                debug!(worker = id, object = %object, error = %e, "Open abandoned during shutdown");
                break;
            }
            Err(e) => {
                error!(
                    worker = id,
                    container = %object.container,
                    object = %object.object,
                    error = %e,
                    "Failed to open object"
                );
                ctx.shutdown.store(true, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let counted = CountingReader::new(stream, &counters.bytes);
        let outcome = match buffer.as_mut() {
            Some(buffer) => process_object(id, object, buffer.attach(counted), counters, &ctx)?,
            None => process_object(id, object, counted, counters, &ctx)?,
        };

        match outcome {
            ObjectOutcome::Completed { records } => {
                counters.record_completed();
                debug!(worker = id, object = %object, records, "Object completed");
            }
            ObjectOutcome::Abandoned { records, reason } => {
                counters.record_abandoned();
                warn!(worker = id, object = %object, records, reason = %reason, "Object abandoned");
            }
            ObjectOutcome::Cancelled { records } => {
                debug!(worker = id, object = %object, records, "Object cancelled");
                break;
            }
        }
    }

    let totals = counters.snapshot();
    info!(
        worker = id,
        records = totals.records,
        objects = totals.objects_completed,
        abandoned = totals.objects_abandoned,
        "Worker finished"
    );

    Ok(())
}

/// Decode one object to the end, or until shutdown or a per-object error
///
/// Only a closed consumer is returned as `Err`; format and adapter failures
/// become `ObjectOutcome::Abandoned`.
fn process_object<R: Read>(
    worker_id: usize,
    object: &ObjectDescriptor,
    stream: R,
    counters: &WorkerCounters,
    ctx: &WorkerContext,
) -> ScanResult<ObjectOutcome> {
    let mut reader = match ContainerReader::new(stream) {
        Ok(reader) => reader,
        Err(e) => {
            error!(
                worker = worker_id,
                container = %object.container,
                object = %object.object,
                error = %e,
                "Failed to read container header"
            );
            return Ok(ObjectOutcome::Abandoned {
                records: 0,
                reason: e.to_string(),
            });
        }
    };

    let mut records = 0u64;

    while let Some(item) = reader.next() {
        if ctx.shutdown.load(Ordering::Relaxed) {
            return Ok(ObjectOutcome::Cancelled { records });
        }

        let record = match item {
            Ok(record) => record,
            Err(e) => {
                error!(
                    worker = worker_id,
                    container = %object.container,
                    object = %object.object,
                    blocks = reader.blocks_read(),
                    record = records,
                    error = %e,
                    "Failed to read record"
                );
                return Ok(ObjectOutcome::Abandoned {
                    records,
                    reason: e.to_string(),
                });
            }
        };

        counters.record_one();
        records += 1;

        let Some(consumer) = &ctx.consumer else {
            continue;
        };
        match consumer.consume(record, &ctx.shutdown) {
            Ok(()) => {}
            Err(ConsumeError::Adapt(e)) => {
                error!(
                    worker = worker_id,
                    container = %object.container,
                    object = %object.object,
                    record = records - 1,
                    error = %e,
                    "Failed to adapt record"
                );
                return Ok(ObjectOutcome::Abandoned {
                    records,
                    reason: e.to_string(),
                });
            }
            Err(ConsumeError::Closed) => {
                error!(worker = worker_id, object = %object, "Record sink closed");
                ctx.shutdown.store(true, Ordering::SeqCst);
                return Err(ScanError::ChannelClosed);
            }
            Err(ConsumeError::Cancelled) => {
                return Ok(ObjectOutcome::Cancelled { records });
            }
        }
    }

    Ok(ObjectOutcome::Completed { records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocf::fixtures::container;
    use crate::ocf::Codec;
    use crate::store::MemoryStore;

    fn context(store: MemoryStore, buffer_size: usize) -> WorkerContext {
        let objects: Arc<[ObjectDescriptor]> = store.list("c", "").unwrap().into();
        WorkerContext {
            store: Arc::new(store),
            claims: Arc::new(ClaimCounter::new(objects.len())),
            objects,
            counters: Arc::new(CounterSlots::new(1)),
            consumer: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            buffer_size,
        }
    }

    #[test]
    fn test_counter_slots() {
        let slots = CounterSlots::new(3);
        slots.slot(0).record_one();
        slots.slot(2).record_one();
        slots.slot(2).record_completed();
        slots.slot(1).record_abandoned();
        slots.slot(1).bytes.fetch_add(100, Ordering::Relaxed);

        assert_eq!(slots.len(), 3);
        assert_eq!(slots.total_records(), 2);
        assert_eq!(slots.total_bytes(), 100);
        assert_eq!(
            slots.totals(),
            CounterSnapshot {
                records: 2,
                bytes: 100,
                objects_completed: 1,
                objects_abandoned: 1,
            }
        );
    }

    #[test]
    fn test_worker_loop_counts_records_and_bytes() {
        let mut store = MemoryStore::new();
        let a = container(10, 4, Codec::Null);
        let b = container(5, 4, Codec::Deflate);
        let total_bytes = (a.len() + b.len()) as u64;
        store.insert("c", "a.avro", a);
        store.insert("c", "b.avro", b);

        for buffer_size in [0, 7, 64 * 1024] {
            let ctx = context(store.clone(), buffer_size);
            worker_loop(0, ctx.clone()).unwrap();

            let totals = ctx.counters.totals();
            assert_eq!(totals.records, 15);
            assert_eq!(totals.bytes, total_bytes);
            assert_eq!(totals.objects_completed, 2);
            assert_eq!(totals.objects_abandoned, 0);
        }
    }

    #[test]
    fn test_process_object_abandons_bad_magic() {
        let mut store = MemoryStore::new();
        store.insert("c", "bad.avro", b"not a container".to_vec());
        let ctx = context(store, 0);

        let outcome = process_object(
            0,
            &ctx.objects[0],
            &b"not a container"[..],
            ctx.counters.slot(0),
            &ctx,
        )
        .unwrap();
        assert!(matches!(outcome, ObjectOutcome::Abandoned { records: 0, .. }));
    }

    #[test]
    fn test_process_object_keeps_partial_count() {
        let mut bytes = container(30, 10, Codec::Null);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        let mut store = MemoryStore::new();
        store.insert("c", "corrupt.avro", bytes.clone());
        let ctx = context(store, 0);

        let outcome =
            process_object(0, &ctx.objects[0], bytes.as_slice(), ctx.counters.slot(0), &ctx)
                .unwrap();
        assert_eq!(outcome.records(), 20);
        assert!(!outcome.is_complete());
        assert_eq!(ctx.counters.total_records(), 20);
    }

    #[test]
    fn test_process_object_stops_on_shutdown() {
        let bytes = container(10, 5, Codec::Null);
        let mut store = MemoryStore::new();
        store.insert("c", "a.avro", bytes.clone());
        let ctx = context(store, 0);
        ctx.shutdown.store(true, Ordering::SeqCst);

        let outcome =
            process_object(0, &ctx.objects[0], bytes.as_slice(), ctx.counters.slot(0), &ctx)
                .unwrap();
        assert!(matches!(outcome, ObjectOutcome::Cancelled { records: 0 }));
    }

    #[test]
    fn test_open_failure_is_fatal() {
        let mut store = MemoryStore::new();
        store.insert("c", "a.avro", container(3, 3, Codec::Null));
        let mut ctx = context(store, 0);
        // Listed, but missing from the store that serves it
        ctx.store = Arc::new(MemoryStore::new());

        let err = worker_loop(0, ctx.clone()).unwrap_err();
        assert!(matches!(err, ScanError::Transport(_)));
        assert!(ctx.shutdown.load(Ordering::SeqCst));
    }

    #[test]
    fn test_join_reports_panic() {
        let handle = thread::spawn(|| -> ScanResult<()> { panic!("boom") });
        let worker = Worker {
            id: 3,
            handle: Some(handle),
        };
        match worker.join() {
            Err(ScanError::Worker(WorkerError::Panicked { id, message })) => {
                assert_eq!(id, 3);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
