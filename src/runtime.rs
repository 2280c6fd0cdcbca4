//! Runtime handle
//!
//! A [`Runtime`] is one isolated engine instance: its own heap, atom table
//! and limits. Contexts created from it share those but not their globals.
//! Nothing here is process-wide, so independent runtimes can coexist.

use std::rc::Rc;

use log::{debug, warn};

use crate::context::Context;
use crate::engine::{DEFAULT_MAX_STACK_DEPTH, JSContext, JSRuntime};
use crate::gc::{DEFAULT_GC_THRESHOLD, GcStats};

/// Limits applied to a runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Upper bound on engine heap bytes; None is unlimited
    pub memory_limit: Option<usize>,
    /// Maximum nesting of JavaScript, native and host calls
    pub max_stack_depth: usize,
    /// Bytes allocated between automatic collections
    pub gc_threshold: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            memory_limit: None,
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            gc_threshold: DEFAULT_GC_THRESHOLD,
        }
    }
}

impl RuntimeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    pub fn max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    pub fn gc_threshold(mut self, bytes: usize) -> Self {
        self.gc_threshold = bytes;
        self
    }
}

/// Heap statistics of a runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub live_objects: usize,
    /// Approximate bytes held by live objects
    pub heap_bytes: usize,
    /// Interned property names
    pub atoms: usize,
    /// Distinct objects currently held by host Values
    pub host_roots: usize,
    pub contexts: usize,
}

/// Isolated engine instance
///
/// Release every [`Context`] before the runtime. Dropping a runtime while
/// contexts are alive is reported with a warning; the engine state is kept
/// until the last context goes away.
pub struct Runtime {
    inner: Rc<JSRuntime>,
}

impl Runtime {
    pub fn new() -> Runtime {
        Runtime::with_options(&RuntimeOptions::default())
    }

    pub fn with_options(options: &RuntimeOptions) -> Runtime {
        let inner = JSRuntime::new();
        {
            let mut heap = inner.heap.borrow_mut();
            heap.memory_limit = options.memory_limit;
            heap.gc_threshold = options.gc_threshold;
        }
        inner.max_depth.set(options.max_stack_depth);
        Runtime { inner }
    }

    /// Create an independent execution environment
    pub fn new_context(&self) -> Context {
        Context::from_inner(JSContext::new(&self.inner))
    }

    pub fn set_memory_limit(&self, limit: Option<usize>) {
        self.inner.heap.borrow_mut().memory_limit = limit;
    }

    pub fn set_max_stack_depth(&self, depth: usize) {
        self.inner.max_depth.set(depth);
    }

    pub fn set_gc_threshold(&self, bytes: usize) {
        self.inner.heap.borrow_mut().gc_threshold = bytes;
    }

    /// Collect garbage now
    ///
    /// Returns None if refused because engine code is running, which happens
    /// when called from inside a host function.
    pub fn run_gc(&self) -> Option<GcStats> {
        self.inner.run_gc()
    }

    pub fn memory_usage(&self) -> MemoryUsage {
        let heap = self.inner.heap.borrow();
        MemoryUsage {
            live_objects: heap.live_objects(),
            heap_bytes: heap.bytes_used(),
            atoms: self.inner.atoms.borrow().len(),
            host_roots: self.inner.roots.borrow().len(),
            contexts: self.inner.live_contexts(),
        }
    }

    /// Release the runtime
    pub fn free(self) {}
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        let live = self.inner.live_contexts();
        if live > 0 {
            warn!(
                "runtime {} released with {} live context(s)",
                self.inner.id(),
                live
            );
        } else {
            debug!("runtime {} released", self.inner.id());
        }
    }
}
