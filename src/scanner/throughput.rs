//! Periodic throughput aggregation
//!
//! Once per interval the aggregator sums every worker's counter slot and
//! derives two record rates:
//!
//! ```text
//! instantaneous = (total - previous_total) / elapsed_secs
//! smoothed      = instantaneous                              (first tick)
//!               = 0.9 * smoothed + 0.1 * instantaneous       (afterwards)
//! ```
//!
//! The counters are only read, never reset, so the aggregator can run
//! alongside the workers without coordination.

use crate::scanner::worker::CounterSlots;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, select, tick, Sender};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Default aggregation period
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Weight of the previous smoothed rate
pub const EWMA_HISTORY_WEIGHT: f64 = 0.9;

/// Weight of the newest instantaneous rate
pub const EWMA_SAMPLE_WEIGHT: f64 = 0.1;

/// Callback invoked with every sample
pub type ProgressCallback = Box<dyn Fn(&ThroughputSample) + Send>;

/// One aggregation tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputSample {
    pub timestamp: DateTime<Utc>,

    /// Records decoded since the scan started
    pub total_records: u64,

    /// Records decoded since the previous tick
    pub new_records: u64,

    /// Records per second over the last tick
    pub instantaneous_rate: f64,

    /// Exponentially weighted records per second
    pub smoothed_rate: f64,

    /// Bytes read since the scan started
    pub total_bytes: u64,

    /// Bytes per second over the last tick
    pub byte_rate: f64,
}

/// Rate computation, separate from the thread that drives it
#[derive(Debug)]
pub struct ThroughputMeter {
    last_records: u64,
    last_bytes: u64,
    last_tick: Instant,
    smoothed: Option<f64>,
}

impl ThroughputMeter {
    pub fn new(start: Instant) -> Self {
        Self {
            last_records: 0,
            last_bytes: 0,
            last_tick: start,
            smoothed: None,
        }
    }

    /// Fold in the current counter totals observed at `now`
    pub fn observe(&mut self, total_records: u64, total_bytes: u64, now: Instant) -> ThroughputSample {
        let elapsed = now.saturating_duration_since(self.last_tick).as_secs_f64();
        let new_records = total_records.saturating_sub(self.last_records);
        let new_bytes = total_bytes.saturating_sub(self.last_bytes);

        let per_sec = |n: u64| if elapsed > 0.0 { n as f64 / elapsed } else { 0.0 };
        let instantaneous_rate = per_sec(new_records);
        let byte_rate = per_sec(new_bytes);

        let smoothed_rate = match self.smoothed {
            None => instantaneous_rate,
            Some(prev) => EWMA_HISTORY_WEIGHT * prev + EWMA_SAMPLE_WEIGHT * instantaneous_rate,
        };

        self.smoothed = Some(smoothed_rate);
        self.last_records = total_records;
        self.last_bytes = total_bytes;
        self.last_tick = now;

        ThroughputSample {
            timestamp: Utc::now(),
            total_records,
            new_records,
            instantaneous_rate,
            smoothed_rate,
            total_bytes,
            byte_rate,
        }
    }

    /// Smoothed rate as of the last tick, if there has been one
    pub fn smoothed_rate(&self) -> Option<f64> {
        self.smoothed
    }
}

/// Background thread running a [`ThroughputMeter`] on a fixed period
pub struct Aggregator {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<Option<f64>>>,
}

impl Aggregator {
    /// Start ticking every `interval`, measuring from `start`
    pub fn spawn(
        counters: Arc<CounterSlots>,
        interval: Duration,
        start: Instant,
        on_sample: Option<ProgressCallback>,
    ) -> io::Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("throughput".into())
            .spawn(move || {
                let ticker = tick(interval);
                let mut meter = ThroughputMeter::new(start);

                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let sample = meter.observe(
                                counters.total_records(),
                                counters.total_bytes(),
                                Instant::now(),
                            );
                            info!(
                                total_records = sample.total_records,
                                new_records = sample.new_records,
                                records_per_sec = sample.instantaneous_rate as u64,
                                ewma_records_per_sec = sample.smoothed_rate as u64,
                                total_bytes = sample.total_bytes,
                                bytes_per_sec = sample.byte_rate as u64,
                                "Throughput"
                            );
                            if let Some(callback) = &on_sample {
                                callback(&sample);
                            }
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }

                meter.smoothed_rate()
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop the thread and return the final smoothed rate
    pub fn stop(mut self) -> Option<f64> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<f64> {
        // Disconnecting wakes the select
        drop(self.stop.take());

        let handle = self.handle.take()?;
        match handle.join() {
            Ok(rate) => rate,
            Err(_) => {
                warn!("Throughput aggregator panicked");
                None
            }
        }
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
