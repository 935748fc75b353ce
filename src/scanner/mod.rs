//! Concurrent container scanning
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!                 │           Scanner            │
//!                 │  Arc<[ObjectDescriptor]>     │
//!                 │  ClaimCounter (fetch_add)    │
//!                 └──────────────┬───────────────┘
//!                                │ claim()
//!       ┌────────────────────────┼────────────────────────┐
//!       │                        │                        │
//! ┌─────▼─────┐            ┌─────▼─────┐            ┌─────▼─────┐
//! │  Worker 0 │            │  Worker 1 │            │  Worker N │
//! │ open      │            │ open      │            │ open      │
//! │ decode    │            │ decode    │            │ decode    │
//! │ count     │            │ count     │            │ count     │
//! └─────┬─────┘            └─────┬─────┘            └─────┬─────┘
//!       │  CachePadded<WorkerCounters>, one slot each     │
//!       └────────────────────────┼────────────────────────┘
//!                                │ load (every tick)
//!                       ┌────────▼────────┐
//!                       │   Aggregator    │
//!                       │ instant + EWMA  │
//!                       └─────────────────┘
//! ```

pub mod buffer;
pub mod claim;
pub mod coordinator;
pub mod throughput;
pub mod worker;

pub use buffer::ReadBuffer;
pub use claim::ClaimCounter;
pub use coordinator::{ScanOptions, ScanSummary, Scanner, MAX_WORKERS};
pub use throughput::{
    ThroughputMeter, ThroughputSample, EWMA_HISTORY_WEIGHT, EWMA_SAMPLE_WEIGHT, REPORT_INTERVAL,
};
pub use worker::{CounterSlots, CounterSnapshot, WorkerCounters};
