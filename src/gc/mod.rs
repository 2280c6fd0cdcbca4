//! Garbage collector module
//!
//! Objects are owned by a per-runtime slot heap and reclaimed by a tracing
//! mark-sweep collector. Tracing (rather than reference counting inside the
//! engine) handles cycles between closures, scopes and prototypes.

mod allocator;
mod collector;

pub use allocator::{DEFAULT_GC_THRESHOLD, GcRef, Heap};
pub use collector::{GcStats, RootSet};

impl Heap {
    /// Run garbage collection from the given roots
    pub fn collect(&mut self, roots: impl IntoIterator<Item = GcRef>) -> GcStats {
        collector::collect(self, roots)
    }
}
