//! Local filesystem object store
//!
//! Layout under the root:
//!
//! ```text
//! <root>/
//!   <container>/
//!     <object path...>
//! ```
//!
//! Object names are the `/`-joined path relative to the container directory,
//! and prefixes match the way bucket prefixes do: as plain string prefixes,
//! not path components. `logs/2024` matches `logs/2024-01/a.avro`.

use super::{ObjectDescriptor, ObjectStore, ObjectStream};
use crate::error::{EnumerationError, TransportError};
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

/// Serves containers as directories under a root
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, container: &str) -> Option<PathBuf> {
        if container.is_empty() {
            return Some(self.root.clone());
        }
        is_relative_name(container).then(|| self.root.join(container))
    }
}

/// True if `name` stays below its base directory
fn is_relative_name(name: &str) -> bool {
    Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

/// Whether a directory at `rel` (no trailing slash) may hold names starting with `prefix`
fn may_contain(rel: &str, prefix: &str) -> bool {
    let dir = format!("{rel}/");
    dir.starts_with(prefix) || prefix.starts_with(&dir)
}

impl ObjectStore for LocalStore {
    fn list(
        &self,
        container: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectDescriptor>, EnumerationError> {
        let base = self
            .container_dir(container)
            .filter(|dir| dir.is_dir())
            .ok_or_else(|| EnumerationError::ContainerNotFound {
                container: container.to_string(),
            })?;

        let list_failed = |path: &Path, e: io::Error| EnumerationError::ListFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let mut objects = Vec::new();
        let mut pending = vec![(base, String::new())];

        while let Some((dir, rel)) = pending.pop() {
            trace!(dir = %dir.display(), "Listing directory");

            for entry in fs::read_dir(&dir).map_err(|e| list_failed(&dir, e))? {
                let entry = entry.map_err(|e| list_failed(&dir, e))?;
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                let name = if rel.is_empty() {
                    name
                } else {
                    format!("{rel}/{name}")
                };

                let path = entry.path();
                // Follows symlinks
                let metadata = fs::metadata(&path).map_err(|e| list_failed(&path, e))?;

                if metadata.is_dir() {
                    if may_contain(&name, prefix) {
                        pending.push((path, name));
                    }
                } else if metadata.is_file() && name.starts_with(prefix) {
                    objects.push(ObjectDescriptor::new(container, name, metadata.len()));
                }
            }
        }

        objects.sort_by(|a, b| a.object.cmp(&b.object));
        Ok(objects)
    }

    fn open(
        &self,
        object: &ObjectDescriptor,
        shutdown: &AtomicBool,
    ) -> Result<ObjectStream, TransportError> {
        if shutdown.load(Ordering::Relaxed) {
            return Err(TransportError::Cancelled {
                container: object.container.clone(),
                object: object.object.clone(),
            });
        }

        if !is_relative_name(&object.object) {
            return Err(TransportError::InvalidObject {
                object: object.object.clone(),
                reason: "must be a relative path without '..'".into(),
            });
        }
        let dir = self
            .container_dir(&object.container)
            .ok_or_else(|| TransportError::InvalidObject {
                object: object.to_string(),
                reason: "container escapes the store root".into(),
            })?;

        match File::open(dir.join(&object.object)) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(TransportError::NotFound {
                container: object.container.clone(),
                object: object.object.clone(),
            }),
            Err(e) => Err(TransportError::OpenFailed {
                container: object.container.clone(),
                object: object.object.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
