//! Lock-free work distribution
//!
//! Every worker claims the next object index from one shared counter. Each
//! in-range index is handed out exactly once; once the counter passes the end
//! of the object list every claim comes back empty.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared claim counter over `len` objects
#[derive(Debug)]
pub struct ClaimCounter {
    /// Next index to hand out; keeps growing past `len`
    next: AtomicUsize,
    len: usize,
}

impl ClaimCounter {
    pub fn new(len: usize) -> Self {
        Self {
            next: AtomicUsize::new(0),
            len,
        }
    }

    /// Claim the next unprocessed index, or `None` when all are taken
    #[inline]
    pub fn claim(&self) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        (index < self.len).then_some(index)
    }

    /// Total claims made so far, including ones past the end
    pub fn issued(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True once every index has been claimed
    pub fn is_exhausted(&self) -> bool {
        self.issued() >= self.len
    }
}
