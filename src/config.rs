//! Configuration types for avro-bandwidth
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Source path and buffer size parsing

use crate::error::ConfigError;
use crate::scanner::{ScanOptions, MAX_WORKERS, REPORT_INTERVAL};
use clap::{Parser, ValueEnum};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Regex for `[file://]container[/prefix]`
static SOURCE_PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:file://)?([^/:]+)(?:/(.*))?$").expect("Invalid source path regex")
});

/// Regex for sizes with a base-2 unit suffix, e.g. `64KiB`, `4MB`
static BUFFER_SIZE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*([KMGTPE]i?)?B$").expect("Invalid buffer size regex")
});

/// Measure read throughput of Avro object container files
#[derive(Parser, Debug, Clone)]
#[command(
    name = "avro-bandwidth",
    version,
    about = "Measure read throughput of Avro object container files",
    long_about = "Streams every Avro container under a container prefix with a pool of worker \
                  threads, decodes each record, and reports records per second once a second \
                  (instantaneous and exponentially smoothed).",
    after_help = "EXAMPLES:\n    \
        avro-bandwidth --root /data --container events --prefix 2024/01/ -t 16\n    \
        avro-bandwidth --root /data --path events/2024/ --filter '\\.avro$' -b 4MiB\n    \
        SCAN_ROOT=/data SCAN_PATH=events/ avro-bandwidth --log-format json"
)]
pub struct CliArgs {
    /// Directory holding one subdirectory per container
    #[arg(long, env = "SCAN_ROOT", default_value = ".", value_name = "DIR")]
    pub root: PathBuf,

    /// Container holding the source data
    #[arg(long, env = "SCAN_CONTAINER", value_name = "NAME")]
    pub container: Option<String>,

    /// Object name prefix within the container
    #[arg(long, env = "SCAN_PREFIX", value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Container and prefix in one: [file://]container/prefix
    #[arg(long, env = "SCAN_PATH", value_name = "PATH")]
    pub path: Option<String>,

    /// Only scan objects whose name matches this regex
    #[arg(long, env = "SCAN_FILTER", value_name = "REGEX")]
    pub filter: Option<String>,

    /// Number of worker threads
    #[arg(short = 't', long, default_value_t = 1, value_name = "NUM")]
    pub threads: usize,

    /// Per-worker read buffer (bytes, or units like 64KiB, 4MB)
    #[arg(short = 'b', long, value_name = "SIZE")]
    pub buffer_size: Option<String>,

    /// Output format of the log
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Default)]
    pub log_format: LogFormat,

    /// Verbose logging (level=DEBUG)
    #[arg(short = 'v', long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Quiet logging (level=WARN)
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl CliArgs {
    /// Level applied to this crate's log targets
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, colored when stderr is a terminal
    #[default]
    Default,
    /// Human-readable, never colored
    Text,
    /// Human-readable, always colored
    Color,
    /// One JSON object per line
    Json,
}

/// Container and prefix parsed from `--path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePath {
    pub container: String,
    pub prefix: String,
}

impl SourcePath {
    /// Parse `[file://]container[/prefix]`
    pub fn parse(path: &str) -> Result<Self, ConfigError> {
        let caps = SOURCE_PATH_REGEX
            .captures(path)
            .ok_or_else(|| ConfigError::InvalidPath {
                path: path.to_string(),
                reason: "expected [file://]container/prefix".to_string(),
            })?;

        let container = caps[1].to_string();
        if container == "." || container == ".." {
            return Err(ConfigError::InvalidPath {
                path: path.to_string(),
                reason: format!("'{container}' is not a container name"),
            });
        }

        Ok(Self {
            container,
            prefix: caps.get(2).map_or("", |m| m.as_str()).to_string(),
        })
    }
}

/// Parse a buffer size: a plain byte count, or a count with a base-2 unit
///
/// `KB` and `KiB` both mean 1024 bytes.
pub fn parse_buffer_size(value: &str) -> Result<usize, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidBufferSize {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = value.trim();
    if let Ok(bytes) = trimmed.parse::<usize>() {
        return Ok(bytes);
    }

    let caps = BUFFER_SIZE_REGEX
        .captures(trimmed)
        .ok_or_else(|| invalid("expected a byte count or a size like 64KiB"))?;

    let count: usize = caps[1].parse().map_err(|_| invalid("count out of range"))?;
    let shift = match caps.get(2).map(|m| m.as_str().trim_end_matches('i')) {
        None => 0,
        Some("K") => 10,
        Some("M") => 20,
        Some("G") => 30,
        Some("T") => 40,
        Some("P") => 50,
        Some("E") => 60,
        Some(_) => return Err(invalid("unknown unit")),
    };

    1usize
        .checked_shl(shift)
        .and_then(|unit| count.checked_mul(unit))
        .ok_or_else(|| invalid("size out of range"))
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Store root directory
    pub root: PathBuf,

    /// Container to scan
    pub container: String,

    /// Object name prefix
    pub prefix: String,

    /// Compiled name filter
    pub filter: Option<Regex>,

    /// Number of worker threads
    pub worker_count: usize,

    /// Per-worker read buffer; 0 reads unbuffered
    pub buffer_size: usize,

    pub log_format: LogFormat,

    /// Debug logging
    pub verbose: bool,

    /// Warnings and errors only
    pub quiet: bool,
}

impl ScanConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        // --path wins over --container/--prefix
        let (container, prefix) = match (&args.path, &args.container, &args.prefix) {
            (Some(path), _, _) => {
                let source = SourcePath::parse(path)?;
                (source.container, source.prefix)
            }
            (None, Some(container), Some(prefix)) => (container.clone(), prefix.clone()),
            _ => return Err(ConfigError::MissingSource),
        };

        if args.threads == 0 || args.threads > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.threads,
                max: MAX_WORKERS,
            });
        }

        let filter = args
            .filter
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidFilter {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let buffer_size = args
            .buffer_size
            .as_deref()
            .map(parse_buffer_size)
            .transpose()?
            .unwrap_or(0);

        if !args.root.is_dir() {
            return Err(ConfigError::InvalidRoot {
                path: args.root.clone(),
                reason: "not an existing directory".to_string(),
            });
        }

        Ok(Self {
            root: args.root,
            container,
            prefix,
            filter,
            worker_count: args.threads,
            buffer_size,
            log_format: args.log_format,
            verbose: args.verbose,
            quiet: args.quiet,
        })
    }

    /// Check if an object name passes the filter
    pub fn is_included(&self, name: &str) -> bool {
        self.filter.as_ref().map_or(true, |re| re.is_match(name))
    }

    /// Scanner options for this configuration
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            worker_count: self.worker_count,
            buffer_size: self.buffer_size,
            report_interval: REPORT_INTERVAL,
        }
    }
}
