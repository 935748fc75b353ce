//! Object storage backends
//!
//! A scan needs two things from storage: a listing of the objects under a
//! container prefix, and a byte stream per object. Both sit behind
//! [`ObjectStore`] so the scanner never knows where bytes come from.
//!
//! ```text
//! enumerate(store, container, prefix, filter)
//!     │
//!     ├── store.list()      → every object under the prefix
//!     └── filter(name)      → keep / skip (logged)
//!           │
//!           ▼
//!     Vec<ObjectDescriptor> → Scanner → workers call store.open()
//! ```

mod local;
mod memory;
mod types;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use types::ObjectDescriptor;

use crate::error::{EnumerationError, TransportError};
use humansize::{format_size, BINARY};
use std::io::Read;
use std::sync::atomic::AtomicBool;
use tracing::{debug, info};

/// Byte stream for one object; closed on drop
pub type ObjectStream = Box<dyn Read + Send>;

/// A source of objects: listing plus per-object streams
pub trait ObjectStore: Send + Sync {
    /// List every object in `container` whose name starts with `prefix`
    fn list(&self, container: &str, prefix: &str)
        -> Result<Vec<ObjectDescriptor>, EnumerationError>;

    /// Open a stream over one object
    ///
    /// Implementations that block should give up once `shutdown` is set.
    fn open(
        &self,
        object: &ObjectDescriptor,
        shutdown: &AtomicBool,
    ) -> Result<ObjectStream, TransportError>;
}

/// List a container prefix and keep the objects whose name passes `filter`
pub fn enumerate<F>(
    store: &dyn ObjectStore,
    container: &str,
    prefix: &str,
    filter: F,
) -> Result<Vec<ObjectDescriptor>, EnumerationError>
where
    F: Fn(&str) -> bool,
{
    let listed = store.list(container, prefix)?;
    let mut found = Vec::with_capacity(listed.len());
    let mut total_size = 0u64;

    for object in listed {
        if filter(&object.object) {
            debug!(
                container = %object.container,
                name = %object.object,
                size = object.size,
                "Found object"
            );
            total_size += object.size;
            found.push(object);
        } else {
            info!(
                container = %object.container,
                name = %object.object,
                "Skipping object because of name filter"
            );
        }
    }

    info!(
        objects = found.len(),
        total_size,
        total = %format_size(total_size, BINARY),
        "All objects found"
    );

    Ok(found)
}
