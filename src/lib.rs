//! avro-bandwidth - Concurrent Avro Container Scanner
//!
//! Measures how fast a corpus of Avro object container files can be streamed
//! and decoded. A fixed pool of worker threads pulls objects from a shared
//! claim counter, decodes every record, and a background aggregator reports
//! instantaneous and smoothed records per second.
//!
//! # Features
//!
//! - **Streaming Decoder**: Block-at-a-time container reader with sync marker
//!   verification and `null`/`deflate`/`snappy` codecs.
//!
//! - **Dynamic Work Distribution**: One atomic counter hands each object to
//!   exactly one worker; fast workers simply claim more.
//!
//! - **Contention-Free Counters**: Each worker writes its own cache-padded
//!   counter slot; the aggregator only reads.
//!
//! - **Pluggable Storage**: Objects come from any [`store::ObjectStore`]; a
//!   local filesystem store ships with the crate.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        ObjectStore                              │
//! │             list(container, prefix) / open(object)              │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Worker Threads                             │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐         ┌─────────┐      │
//! │  │Worker 0 │  │Worker 1 │  │Worker 2 │  ...    │Worker N │      │
//! │  │ decode  │  │ decode  │  │ decode  │         │ decode  │      │
//! │  └────┬────┘  └────┬────┘  └────┬────┘         └────┬────┘      │
//! │       └────────────┴─────┬──────┴───────────────────┘           │
//! │                          ▼                                      │
//! │            ┌──────────────────────────┐                         │
//! │            │  Per-worker counters     │──► Aggregator (1/s)     │
//! │            └──────────────────────────┘                         │
//! │                          │ optional                             │
//! │                          ▼                                      │
//! │            RecordAdapter ──► channel                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Scan every object under events/2024/ with 16 workers
//! avro-bandwidth --root /data --path events/2024/ -t 16
//!
//! # Only .avro objects, 4 MiB read buffer per worker, JSON logs
//! avro-bandwidth --root /data --path events/ --filter '\.avro$' -b 4MiB --log-format json
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod extract;
pub mod ocf;
pub mod pipeline;
pub mod progress;
pub mod scanner;
pub mod store;

pub use adapter::{ChannelSink, RecordAdapter, RecordConsumer};
pub use config::{CliArgs, LogFormat, ScanConfig};
pub use error::{ScanError, ScanResult};
pub use ocf::{ContainerReader, ContainerWriter};
pub use scanner::{ScanOptions, ScanSummary, Scanner};
pub use store::{LocalStore, ObjectDescriptor, ObjectStore};
