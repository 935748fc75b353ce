//! Scan coordinator - owns the worker pool for one scan
//!
//! The coordinator is responsible for:
//! - Validating the scan options
//! - Creating the claim counter and per-worker counters
//! - Starting the throughput aggregator and the workers
//! - Joining everything and deciding the final result

use crate::adapter::RecordConsumer;
use crate::error::{ConfigError, ScanError, ScanResult};
use crate::scanner::claim::ClaimCounter;
use crate::scanner::throughput::{Aggregator, ProgressCallback, ThroughputSample, REPORT_INTERVAL};
use crate::scanner::worker::{CounterSlots, Worker, WorkerContext};
use crate::store::{enumerate, ObjectDescriptor, ObjectStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Upper bound on worker threads
pub const MAX_WORKERS: usize = 512;

/// Tunables for a scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Number of worker threads
    pub worker_count: usize,

    /// Per-worker read buffer capacity; 0 disables buffering
    pub buffer_size: usize,

    /// Aggregation period
    pub report_interval: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            worker_count: 1,
            buffer_size: 0,
            report_interval: REPORT_INTERVAL,
        }
    }
}

/// Result of a completed scan
#[derive(Debug, Clone)]
pub struct ScanSummary {
    /// Records decoded across all objects
    pub records: u64,

    /// Bytes read from object streams
    pub bytes: u64,

    /// Objects read to the end
    pub objects_completed: u64,

    /// Objects abandoned after a format or adapter error
    pub objects_abandoned: u64,

    /// Wall time of the scan
    pub duration: Duration,

    /// Last smoothed rate, if the aggregator ticked at least once
    pub smoothed_rate: Option<f64>,
}

impl ScanSummary {
    /// Average records per second over the whole scan
    pub fn records_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.records as f64 / secs
        } else {
            0.0
        }
    }

    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }
}

/// Runs a concurrent scan over a fixed list of objects
pub struct Scanner {
    store: Arc<dyn ObjectStore>,
    objects: Arc<[ObjectDescriptor]>,
    options: ScanOptions,
    consumer: Option<Arc<dyn RecordConsumer>>,
    shutdown: Arc<AtomicBool>,
}

impl Scanner {
    /// Create a scanner
    pub fn new(
        store: Arc<dyn ObjectStore>,
        objects: impl Into<Arc<[ObjectDescriptor]>>,
        options: ScanOptions,
    ) -> Result<Self, ConfigError> {
        if options.worker_count == 0 || options.worker_count > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: options.worker_count,
                max: MAX_WORKERS,
            });
        }
        if options.report_interval.is_zero() {
            return Err(ConfigError::InvalidReportInterval {
                interval: options.report_interval,
            });
        }

        Ok(Self {
            store,
            objects: objects.into(),
            options,
            consumer: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// List `container` under `prefix`, keep the names `filter` accepts, and
    /// build a scanner over them
    pub fn from_listing<F>(
        store: Arc<dyn ObjectStore>,
        container: &str,
        prefix: &str,
        filter: F,
        options: ScanOptions,
    ) -> ScanResult<Self>
    where
        F: Fn(&str) -> bool,
    {
        let objects = enumerate(store.as_ref(), container, prefix, filter)?;
        Ok(Self::new(store, objects, options)?)
    }

    /// Hand every decoded record to `consumer`
    pub fn with_consumer(mut self, consumer: Arc<dyn RecordConsumer>) -> Self {
        self.consumer = Some(consumer);
        self
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn objects(&self) -> &[ObjectDescriptor] {
        &self.objects
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Run the scan to completion
    pub fn run(&self) -> ScanResult<ScanSummary> {
        self.run_inner(None)
    }

    /// Run the scan, calling `progress_callback` on every aggregation tick
    pub fn run_with_progress<F>(&self, progress_callback: F) -> ScanResult<ScanSummary>
    where
        F: Fn(&ThroughputSample) + Send + 'static,
    {
        self.run_inner(Some(Box::new(progress_callback)))
    }

    fn run_inner(&self, on_sample: Option<ProgressCallback>) -> ScanResult<ScanSummary> {
        let start = Instant::now();
        let worker_count = self.options.worker_count;

        info!(
            objects = self.objects.len(),
            workers = worker_count,
            buffer_size = self.options.buffer_size,
            "Starting scan"
        );

        let counters = Arc::new(CounterSlots::new(worker_count));
        let ctx = WorkerContext {
            store: Arc::clone(&self.store),
            objects: Arc::clone(&self.objects),
            claims: Arc::new(ClaimCounter::new(self.objects.len())),
            counters: Arc::clone(&counters),
            consumer: self.consumer.clone(),
            shutdown: Arc::clone(&self.shutdown),
            buffer_size: self.options.buffer_size,
        };

        let aggregator = Aggregator::spawn(
            Arc::clone(&counters),
            self.options.report_interval,
            start,
            on_sample,
        )?;

        let mut workers = Vec::with_capacity(worker_count);
        let mut first_error: Option<ScanError> = None;

        for id in 0..worker_count {
            match Worker::spawn(id, ctx.clone()) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    // Unwind the workers already running
                    self.shutdown.store(true, Ordering::SeqCst);
                    first_error = Some(e.into());
                    break;
                }
            }
        }

        for worker in workers {
            let id = worker.id();
            if let Err(e) = worker.join() {
                warn!(worker = id, error = %e, "Worker failed");
                first_error.get_or_insert(e);
            }
        }

        let smoothed_rate = aggregator.stop();
        let duration = start.elapsed();
        let totals = counters.totals();

        if let Some(e) = first_error {
            return Err(e);
        }

        if self.shutdown.load(Ordering::SeqCst) {
            warn!(
                records = totals.records,
                duration_secs = duration.as_secs_f64(),
                "Scan interrupted"
            );
            return Err(ScanError::Interrupted {
                records: totals.records,
                duration,
            });
        }

        info!(
            records = totals.records,
            bytes = totals.bytes,
            objects = totals.objects_completed,
            abandoned = totals.objects_abandoned,
            duration_secs = duration.as_secs_f64(),
            "Scan completed"
        );

        Ok(ScanSummary {
            records: totals.records,
            bytes: totals.bytes,
            objects_completed: totals.objects_completed,
            objects_abandoned: totals.objects_abandoned,
            duration,
            smoothed_rate,
        })
    }
}
