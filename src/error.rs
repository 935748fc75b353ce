//! Error types for avro-bandwidth
//!
//! This module defines the error hierarchy for a scan:
//! - Transport errors (an object stream could not be opened)
//! - Container format errors (header or block corruption)
//! - Tagged-union extraction errors raised inside record adapters
//! - Enumeration and configuration errors
//! - Worker thread errors
//!
//! Severity matters here. A transport failure aborts the whole scan, while a
//! format failure only abandons the object being decoded. `ScanError` is what
//! crosses the coordinator boundary; everything below it is recoverable or
//! fatal depending on where it is raised.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for a scan
#[derive(Error, Debug)]
pub enum ScanError {
    /// An object stream could not be opened
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Listing the source corpus failed
    #[error("Enumeration error: {0}")]
    Enumeration(#[from] EnumerationError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cancelled before every object was claimed
    #[error("Scan interrupted after {records} records ({:.1}s)", .duration.as_secs_f64())]
    Interrupted { records: u64, duration: Duration },

    /// Record sink closed while workers were still producing
    #[error("Record channel closed unexpectedly")]
    ChannelClosed,
}

/// Errors opening an object stream
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Object could not be opened
    #[error("Failed to open '{container}/{object}': {reason}")]
    OpenFailed {
        container: String,
        object: String,
        reason: String,
    },

    /// Object does not exist
    #[error("Object not found: '{container}/{object}'")]
    NotFound { container: String, object: String },

    /// Object name escapes its container
    #[error("Invalid object name '{object}': {reason}")]
    InvalidObject { object: String, reason: String },

    /// Open abandoned because the scan is shutting down
    #[error("Open of '{container}/{object}' cancelled")]
    Cancelled { container: String, object: String },
}

/// Container format errors
///
/// Raised by the container reader; recoverable at object granularity.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The stream does not start with `Obj\x01`
    #[error("Not an Avro container: bad magic {found:02x?}")]
    BadMagic { found: [u8; 4] },

    /// Header metadata has no `avro.schema` entry
    #[error("Container header has no schema")]
    MissingSchema,

    /// Embedded schema failed to parse
    #[error("Invalid embedded schema: {0}")]
    InvalidSchema(String),

    /// Header names a codec this reader does not implement
    #[error("Unsupported codec '{0}'")]
    UnsupportedCodec(String),

    /// Header metadata could not be parsed
    #[error("Invalid header metadata: {0}")]
    InvalidMetadata(String),

    /// Stream ended inside a header or block
    #[error("Unexpected end of stream while reading {context}")]
    UnexpectedEof { context: &'static str },

    /// Negative count or length
    #[error("Invalid {context}: {value}")]
    InvalidLength { context: &'static str, value: i64 },

    /// Variable-length integer longer than ten bytes
    #[error("Variable-length integer overflow while reading {context}")]
    VarintOverflow { context: &'static str },

    /// Sync marker after a block does not match the header
    #[error("Corrupt container: sync marker mismatch after block {block}")]
    SyncMismatch { block: u64 },

    /// Block payload failed to decompress
    #[error("Failed to decompress block {block}: {reason}")]
    Decompress { block: u64, reason: String },

    /// A record failed to decode against the schema
    #[error("Failed to decode record {record} in block {block}: {reason}")]
    Datum {
        block: u64,
        record: u64,
        reason: String,
    },

    /// Block payload has bytes left after its last record
    #[error("Block {block} has {remaining} trailing bytes")]
    TrailingBytes { block: u64, remaining: u64 },

    /// A record failed to encode against the schema
    #[error("Failed to encode record: {0}")]
    Encode(String),

    /// Underlying stream error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FormatError {
    /// Map a read error, keeping early EOF distinct from other I/O failures
    pub(crate) fn from_read(err: std::io::Error, context: &'static str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            FormatError::UnexpectedEof { context }
        } else {
            FormatError::Io(err)
        }
    }
}

/// Tagged-union leaf extraction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// Value was absent or null
    #[error("item was nil")]
    NilValue,

    /// Value is an internal node of the record tree, not a union leaf
    #[error("item was not an avro leaf")]
    NotLeaf,

    /// Union branch does not carry the expected tag
    #[error("item was `{got}`, not `{want}`")]
    TagMismatch { got: String, want: String },

    /// Mapping had no entries
    #[error("item map was empty")]
    EmptyLeaf,
}

/// Errors raised by a record adapter
#[derive(Error, Debug)]
pub enum AdaptError {
    /// A field failed tagged-union extraction
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Record lacks a required field
    #[error("Missing field '{0}'")]
    MissingField(String),

    /// Input was not a record
    #[error("Expected a record, found `{0}`")]
    NotARecord(&'static str),

    /// Adapter-specific failure
    #[error("{0}")]
    Invalid(String),
}

/// Errors handing a record to a consumer
#[derive(Error, Debug)]
pub enum ConsumeError {
    /// Adapter rejected the record; abandons the current object
    #[error("Adapter failed: {0}")]
    Adapt(#[from] AdaptError),

    /// Sink is gone; fatal to the scan
    #[error("Record sink closed")]
    Closed,

    /// Shutdown was raised while waiting on a full sink
    #[error("Record hand-off cancelled")]
    Cancelled,
}

/// Errors listing the source corpus
#[derive(Error, Debug)]
pub enum EnumerationError {
    /// Container does not exist
    #[error("Container not found: '{container}'")]
    ContainerNotFound { container: String },

    /// Listing a directory failed
    #[error("Failed to list '{path}': {reason}")]
    ListFailed { path: PathBuf, reason: String },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Aggregation period must be positive
    #[error("Invalid report interval {interval:?}: must be greater than zero")]
    InvalidReportInterval { interval: Duration },

    /// Neither container + prefix nor path was supplied
    #[error("Required parameters container and prefix, or path, must be set")]
    MissingSource,

    /// Source path could not be parsed
    #[error("Invalid source path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Name filter failed to compile
    #[error("Invalid filter '{pattern}': {reason}")]
    InvalidFilter { pattern: String, reason: String },

    /// Buffer size could not be parsed
    #[error("Invalid buffer size '{value}': {reason}")]
    InvalidBufferSize { value: String, reason: String },

    /// Store root is missing or not a directory
    #[error("Invalid root '{path}': {reason}")]
    InvalidRoot { path: PathBuf, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Thread could not be spawned
    #[error("Failed to spawn worker {id}: {reason}")]
    SpawnFailed { id: usize, reason: String },
}

/// Errors from the sequential read-into-channel helpers
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Source file could not be opened or listed
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Container decoding failed
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Adapter rejected a row
    #[error("Failed to convert row {rownum}: {source}")]
    Adapt {
        rownum: u64,
        #[source]
        source: AdaptError,
    },

    /// Destination channel closed
    #[error("Destination channel closed")]
    ChannelClosed,
}

/// Result type alias for ScanError
pub type ScanResult<T> = std::result::Result<T, ScanError>;

/// Result type alias for FormatError
pub type FormatResult<T> = std::result::Result<T, FormatError>;

/// Result type alias for PipelineError
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Represents the outcome of scanning a single object
#[derive(Debug)]
pub enum ObjectOutcome {
    /// Every record in the object was decoded
    Completed { records: u64 },

    /// Decoding stopped early; counted records stay counted
    Abandoned { records: u64, reason: String },

    /// Shutdown observed between records
    Cancelled { records: u64 },
}

impl ObjectOutcome {
    /// Returns true if the whole object was read
    pub fn is_complete(&self) -> bool {
        matches!(self, ObjectOutcome::Completed { .. })
    }

    /// Records counted from this object
    pub fn records(&self) -> u64 {
        match self {
            ObjectOutcome::Completed { records }
            | ObjectOutcome::Abandoned { records, .. }
            | ObjectOutcome::Cancelled { records } => *records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_conversion() {
        let err = TransportError::NotFound {
            container: "bucket".into(),
            object: "part-0001.avro".into(),
        };
        let scan_err: ScanError = err.into();
        assert!(matches!(scan_err, ScanError::Transport(_)));

        let scan_err: ScanError = EnumerationError::ContainerNotFound {
            container: "bucket".into(),
        }
        .into();
        assert_eq!(
            scan_err.to_string(),
            "Enumeration error: Container not found: 'bucket'"
        );
    }

    #[test]
    fn test_extract_error_messages() {
        let err = ExtractError::TagMismatch {
            got: "long".into(),
            want: "string".into(),
        };
        assert_eq!(err.to_string(), "item was `long`, not `string`");
        assert_eq!(ExtractError::NilValue.to_string(), "item was nil");
    }

    #[test]
    fn test_eof_mapping() {
        let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert!(matches!(
            FormatError::from_read(eof, "sync marker"),
            FormatError::UnexpectedEof { context: "sync marker" }
        ));

        let other = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(
            FormatError::from_read(other, "magic"),
            FormatError::Io(_)
        ));
    }

    #[test]
    fn test_object_outcome_records() {
        let outcome = ObjectOutcome::Abandoned {
            records: 12,
            reason: "corrupt".into(),
        };
        assert!(!outcome.is_complete());
        assert_eq!(outcome.records(), 12);
        assert!(ObjectOutcome::Completed { records: 3 }.is_complete());
    }
}
