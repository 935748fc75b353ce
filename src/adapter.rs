//! Record adapter boundary
//!
//! The scanner decodes generic `Value` records. Turning those into a
//! caller-specific structure happens behind two small traits:
//!
//! - [`RecordAdapter`] converts one decoded record into a typed item
//! - [`RecordConsumer`] takes ownership of a record inside a worker
//!
//! [`ChannelSink`] glues them together: adapt, then send down a crossbeam
//! channel. An adapter failure abandons the current object; a disconnected
//! receiver stops the scan. A full bounded channel is waited on in short
//! slices so a raised shutdown flag still gets through.

use crate::error::{AdaptError, ConsumeError};
use crate::extract::type_tag;
use apache_avro::types::Value;
use crossbeam_channel::{SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How long a blocked send waits before rechecking the shutdown flag
pub const SEND_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Converts a decoded record into a typed item
pub trait RecordAdapter: Send + Sync {
    type Item: Send;

    fn adapt(&self, record: &Value) -> Result<Self::Item, AdaptError>;
}

impl<F, T> RecordAdapter for F
where
    F: Fn(&Value) -> Result<T, AdaptError> + Send + Sync,
    T: Send,
{
    type Item = T;

    fn adapt(&self, record: &Value) -> Result<T, AdaptError> {
        self(record)
    }
}

/// Receives every decoded record from the scan workers
///
/// Called concurrently from all workers, so implementations must be
/// thread-safe. An implementation that can block must return
/// `ConsumeError::Cancelled` soon after `shutdown` is raised.
pub trait RecordConsumer: Send + Sync {
    fn consume(&self, record: Value, shutdown: &AtomicBool) -> Result<(), ConsumeError>;
}

/// Adapts records and forwards the items to a channel
pub struct ChannelSink<A: RecordAdapter> {
    adapter: A,
    sender: Sender<A::Item>,
}

impl<A: RecordAdapter> ChannelSink<A> {
    pub fn new(adapter: A, sender: Sender<A::Item>) -> Self {
        Self { adapter, sender }
    }
}

impl<A: RecordAdapter> RecordConsumer for ChannelSink<A> {
    fn consume(&self, record: Value, shutdown: &AtomicBool) -> Result<(), ConsumeError> {
        let mut item = self.adapter.adapt(&record)?;
        loop {
            match self.sender.send_timeout(item, SEND_POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Disconnected(_)) => return Err(ConsumeError::Closed),
                Err(SendTimeoutError::Timeout(returned)) => {
                    if shutdown.load(Ordering::Relaxed) {
                        return Err(ConsumeError::Cancelled);
                    }
                    item = returned;
                }
            }
        }
    }
}

/// Look up a field of a decoded record by name
///
/// Returns `None` for a missing field and for non-record values, which the
/// extractors report as `NilValue`.
pub fn record_field<'a>(record: &'a Value, name: &str) -> Option<&'a Value> {
    match record {
        Value::Record(fields) => fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value),
        _ => None,
    }
}

/// Like [`record_field`], but a missing field or a non-record input is an error
pub fn require_field<'a>(record: &'a Value, name: &str) -> Result<&'a Value, AdaptError> {
    if !matches!(record, Value::Record(_)) {
        return Err(AdaptError::NotARecord(type_tag(record)));
    }
    record_field(record, name).ok_or_else(|| AdaptError::MissingField(name.to_string()))
}
