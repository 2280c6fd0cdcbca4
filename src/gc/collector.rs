//! Mark-sweep garbage collector
//!
//! The collector works in two phases:
//! 1. Mark: traverse every object reachable from the roots
//! 2. Sweep: free the rest, bumping slot generations
//!
//! Roots are supplied by the runtime: context realms, global lexical
//! bindings, module namespaces and the externally held handles in the
//! [`RootSet`]. Collection only happens when no engine code is on the stack,
//! so interpreter temporaries never need to be rooted.

use std::collections::HashMap;

use super::allocator::{GcRef, Heap};

/// Reference counts of handles held outside the heap
#[derive(Default)]
pub struct RootSet {
    counts: HashMap<GcRef, usize>,
}

impl RootSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one external reference
    pub fn add(&mut self, r: GcRef) {
        *self.counts.entry(r).or_insert(0) += 1;
    }

    /// Drop one external reference
    ///
    /// # Panics
    /// If the reference is not held (a double release).
    pub fn release(&mut self, r: GcRef) {
        match self.counts.get_mut(&r) {
            Some(n) if *n > 1 => *n -= 1,
            Some(_) => {
                self.counts.remove(&r);
            }
            None => panic!("protocol violation: released unheld handle {:?}", r),
        }
    }

    /// Number of external references to `r`
    pub fn count(&self, r: GcRef) -> usize {
        self.counts.get(&r).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = GcRef> + '_ {
        self.counts.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Statistics of one collection
#[derive(Debug, Clone, Copy)]
pub struct GcStats {
    pub marked: usize,
    pub freed: usize,
    pub bytes_after: usize,
}

/// Run a full collection
pub fn collect(heap: &mut Heap, roots: impl IntoIterator<Item = GcRef>) -> GcStats {
    let mut worklist: Vec<GcRef> = roots.into_iter().collect();
    let mut marked = 0;
    let mut children = Vec::new();

    while let Some(r) = worklist.pop() {
        if !heap.mark(r) {
            continue;
        }
        marked += 1;
        children.clear();
        heap.get(r).trace(&mut children);
        worklist.extend_from_slice(&children);
    }

    let freed = heap.sweep();
    GcStats {
        marked,
        freed,
        bytes_after: heap.bytes_used(),
    }
}
