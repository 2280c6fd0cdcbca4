//! Slot heap
//!
//! Objects live in a vector of slots addressed by index. Every slot carries
//! a generation counter that is bumped when its object is swept, so a handle
//! that outlives its object is detected instead of silently aliasing a new
//! one. Freed slots are recycled through a free list.

use std::fmt;

use crate::object::JSObject;

/// Generation-checked heap handle
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcRef {
    index: u32,
    generation: u32,
}

impl GcRef {
    #[inline]
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        GcRef { index, generation }
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for GcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    marked: bool,
    size: usize,
    object: Option<JSObject>,
}

/// Default number of bytes allocated between automatic collections
pub const DEFAULT_GC_THRESHOLD: usize = 256 * 1024;

/// Object heap
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    /// Approximate bytes held by live objects
    bytes: usize,
    /// Bytes allocated since the last collection
    allocated_since_gc: usize,
    /// Bytes between automatic collections
    pub gc_threshold: usize,
    /// Upper bound on `bytes` for engine-side allocation
    pub memory_limit: Option<usize>,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            bytes: 0,
            allocated_since_gc: 0,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            memory_limit: None,
        }
    }

    /// Allocate an object, ignoring the memory limit
    pub fn alloc(&mut self, object: JSObject) -> GcRef {
        let size = object.approx_size();
        self.bytes += size;
        self.allocated_since_gc += size;
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            slot.marked = false;
            slot.size = size;
            return GcRef::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            marked: false,
            size,
            object: Some(object),
        });
        GcRef::new(index, 0)
    }

    /// Check whether an allocation of `size` bytes stays within the limit
    #[inline]
    pub fn fits(&self, size: usize) -> bool {
        match self.memory_limit {
            Some(limit) => self.bytes + size <= limit,
            None => true,
        }
    }

    /// Check whether enough has been allocated to warrant a collection
    #[inline]
    pub fn should_collect(&self) -> bool {
        cfg!(feature = "debug-gc") || self.allocated_since_gc >= self.gc_threshold
    }

    /// Resolve a handle, or None if its object is gone
    #[inline]
    pub fn try_get(&self, r: GcRef) -> Option<&JSObject> {
        let slot = self.slots.get(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.object.as_ref()
    }

    /// Resolve a handle
    ///
    /// # Panics
    /// On a stale handle: that is a rooting bug, not a script error.
    #[inline]
    pub fn get(&self, r: GcRef) -> &JSObject {
        match self.try_get(r) {
            Some(obj) => obj,
            None => panic!("protocol violation: stale object handle {:?}", r),
        }
    }

    /// Resolve a handle mutably
    #[inline]
    pub fn get_mut(&mut self, r: GcRef) -> &mut JSObject {
        let slot = self
            .slots
            .get_mut(r.index as usize)
            .filter(|s| s.generation == r.generation);
        match slot.and_then(|s| s.object.as_mut()) {
            Some(obj) => obj,
            None => panic!("protocol violation: stale object handle {:?}", r),
        }
    }

    /// Set the mark bit; returns true if it was clear
    pub(super) fn mark(&mut self, r: GcRef) -> bool {
        match self.slots.get_mut(r.index as usize) {
            Some(slot) if slot.generation == r.generation && slot.object.is_some() => {
                !std::mem::replace(&mut slot.marked, true)
            }
            _ => false,
        }
    }

    /// Free every unmarked object and clear marks; returns the number freed
    pub(super) fn sweep(&mut self) -> usize {
        let mut freed = 0;
        let mut bytes = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.object.is_none() {
                continue;
            }
            if slot.marked {
                slot.marked = false;
                if let Some(obj) = &slot.object {
                    slot.size = obj.approx_size();
                }
                bytes += slot.size;
            } else {
                slot.object = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                freed += 1;
            }
        }
        self.live -= freed;
        self.bytes = bytes;
        self.allocated_since_gc = 0;
        freed
    }

    /// Number of live objects
    pub fn live_objects(&self) -> usize {
        self.live
    }

    /// Approximate bytes held by live objects
    pub fn bytes_used(&self) -> usize {
        self.bytes
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectClass;

    fn plain() -> JSObject {
        JSObject::new(ObjectClass::Ordinary, None)
    }

    #[test]
    fn test_alloc_and_get() {
        let mut heap = Heap::new();
        let a = heap.alloc(plain());
        let b = heap.alloc(plain());
        assert_ne!(a, b);
        assert_eq!(heap.live_objects(), 2);
        assert!(heap.try_get(a).is_some());
        assert!(heap.bytes_used() > 0);
    }

    #[test]
    fn test_sweep_invalidates_handles() {
        let mut heap = Heap::new();
        let a = heap.alloc(plain());
        let b = heap.alloc(plain());
        heap.mark(b);
        assert_eq!(heap.sweep(), 1);
        assert!(heap.try_get(a).is_none());
        assert!(heap.try_get(b).is_some());

        // The slot is reused under a new generation
        let c = heap.alloc(plain());
        assert_eq!(c.index(), a.index());
        assert_ne!(c.generation(), a.generation());
        assert!(heap.try_get(a).is_none());
    }

    #[test]
    #[should_panic(expected = "protocol violation")]
    fn test_stale_get_panics() {
        let mut heap = Heap::new();
        let a = heap.alloc(plain());
        heap.sweep();
        heap.get(a);
    }

    #[test]
    fn test_memory_limit() {
        let mut heap = Heap::new();
        assert!(heap.fits(1 << 30));
        heap.memory_limit = Some(1024);
        assert!(heap.fits(512));
        assert!(!heap.fits(4096));
    }
}
