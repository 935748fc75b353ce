//! In-memory object store
//!
//! Serves objects from shared byte slices. Used by tests and benchmarks, and
//! handy for scanning data that is already resident.

use super::{ObjectDescriptor, ObjectStore, ObjectStream};
use crate::error::{EnumerationError, TransportError};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Container name → object name → bytes
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    containers: BTreeMap<String, BTreeMap<String, Arc<[u8]>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an object
    pub fn insert(
        &mut self,
        container: impl Into<String>,
        object: impl Into<String>,
        data: Vec<u8>,
    ) {
        self.containers
            .entry(container.into())
            .or_default()
            .insert(object.into(), Arc::from(data));
    }

    /// Number of objects across all containers
    pub fn len(&self) -> usize {
        self.containers.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryStore {
    fn list(
        &self,
        container: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectDescriptor>, EnumerationError> {
        let objects =
            self.containers
                .get(container)
                .ok_or_else(|| EnumerationError::ContainerNotFound {
                    container: container.to_string(),
                })?;

        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, data)| ObjectDescriptor::new(container, name.as_str(), data.len() as u64))
            .collect())
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

        let data = self
            .containers
            .get(&object.container)
            .and_then(|objects| objects.get(&object.object))
            .ok_or_else(|| TransportError::NotFound {
                container: object.container.clone(),
                object: object.object.clone(),
            })?;

        Ok(Box::new(Cursor::new(Arc::clone(data))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_list_by_prefix() {
        let mut store = MemoryStore::new();
        store.insert("c", "a/1", vec![1]);
        store.insert("c", "a/2", vec![1, 2]);
        store.insert("c", "ab", vec![1, 2, 3]);
        store.insert("c", "b/1", Vec::new());

        let listed = store.list("c", "a").unwrap();
        let names: Vec<_> = listed.iter().map(|o| o.object.as_str()).collect();
        assert_eq!(names, vec!["a/1", "a/2", "ab"]);
        assert_eq!(listed[2].size, 3);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_open_reads_bytes() {
        let mut store = MemoryStore::new();
        store.insert("c", "obj", b"payload".to_vec());
        let shutdown = AtomicBool::new(false);

        let mut stream = store
            .open(&ObjectDescriptor::new("c", "obj", 7), &shutdown)
            .unwrap();
        let mut buf = String::new();
        stream.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "payload");
    }

    #[test]
    fn test_open_errors() {
        let mut store = MemoryStore::new();
        store.insert("c", "obj", vec![0]);
        let shutdown = AtomicBool::new(false);

        assert!(matches!(
            store.open(&ObjectDescriptor::new("c", "nope", 0), &shutdown),
            Err(TransportError::NotFound { .. })
        ));

        shutdown.store(true, Ordering::Relaxed);
        assert!(matches!(
            store.open(&ObjectDescriptor::new("c", "obj", 1), &shutdown),
            Err(TransportError::Cancelled { .. })
        ));
    }
}
