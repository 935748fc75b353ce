//! Object identity types

use std::fmt;

/// One stored object to be scanned
///
/// Produced by enumeration before the scan starts and never mutated after.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectDescriptor {
    /// Container (bucket, top-level directory) holding the object
    pub container: String,

    /// Object name within the container, `/`-separated
    pub object: String,

    /// Size in bytes as reported by the listing
    pub size: u64,
}

impl ObjectDescriptor {
    pub fn new(container: impl Into<String>, object: impl Into<String>, size: u64) -> Self {
        Self {
            container: container.into(),
            object: object.into(),
            size,
        }
    }
}

impl fmt::Display for ObjectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.object)
    }
}
