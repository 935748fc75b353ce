//! Sequential decode-adapt-send helpers
//!
//! For callers that want every record of a container converted and pushed
//! into a channel on the current thread, without the scan machinery. The
//! first failure stops the read; rows sent before it stay sent.

use crate::adapter::RecordAdapter;
use crate::error::{PipelineError, PipelineResult};
use crate::ocf::ContainerReader;
use crossbeam_channel::Sender;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, error};

/// Decode `source`, adapt each record, and send it to `destination`
///
/// Returns the number of rows sent.
pub fn read_container<R, A>(
    source: R,
    adapter: &A,
    destination: &Sender<A::Item>,
) -> PipelineResult<u64>
where
    R: Read,
    A: RecordAdapter,
{
    let reader = ContainerReader::new(source).inspect_err(|e| {
        error!(error = %e, "Failed to initialize container reader");
    })?;

    let mut rownum = 0u64;
    for item in reader {
        let record = item.inspect_err(|e| {
            error!(rownum, error = %e, "Failed to read item");
        })?;

        let message = adapter.adapt(&record).map_err(|source| {
            error!(rownum, error = %source, "Failed to convert");
            PipelineError::Adapt { rownum, source }
        })?;

        destination
            .send(message)
            .map_err(|_| PipelineError::ChannelClosed)?;
        rownum += 1;
    }

    Ok(rownum)
}

/// Read one local container file into `destination`
pub fn read_container_file<A: RecordAdapter>(
    path: &Path,
    adapter: &A,
    destination: &Sender<A::Item>,
) -> PipelineResult<u64> {
    let file = File::open(path).map_err(|source| {
        error!(filename = %path.display(), error = %source, "Failed to open source file");
        PipelineError::Io {
            path: path.to_path_buf(),
            source,
        }
    })?;

    read_container(BufReader::new(file), adapter, destination).inspect_err(|e| {
        error!(filename = %path.display(), error = %e, "Failed to process container");
    })
}

/// Read every file in `dir` whose name starts with `prefix`, in name order
///
/// Subdirectories are not descended into. Returns the total rows sent.
pub fn read_container_dir<A: RecordAdapter>(
    dir: &Path,
    prefix: &str,
    adapter: &A,
    destination: &Sender<A::Item>,
) -> PipelineResult<u64> {
    let io_err = |source| PipelineError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| {
        error!(directory = %dir.display(), prefix, error = %e, "Failed to read source directory");
        io_err(e)
    })? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(prefix) {
            files.push((name, entry.path()));
        }
    }
    files.sort();

    let mut total = 0;
    for (name, path) in files {
        debug!(directory = %dir.display(), file = %name, "Processing");
        total += read_container_file(&path, adapter, destination).inspect_err(|e| {
            error!(directory = %dir.display(), file = %name, error = %e, "Container read failed");
        })?;
    }

    Ok(total)
}
