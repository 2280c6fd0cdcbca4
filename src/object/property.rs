//! Property table
//!
//! Own properties are stored in insertion order in a vector, with hash chains
//! threaded through the entries for lookup. Deleted entries become tombstones
//! and are squeezed out when the table is rehashed, so iteration order always
//! matches insertion order.

use super::atom::JSAtom;
use crate::value::JSValue;

/// Property attribute flags
pub const WRITABLE: u8 = 1 << 0;
pub const ENUMERABLE: u8 = 1 << 1;
pub const CONFIGURABLE: u8 = 1 << 2;

/// Flags of a property created by plain assignment
pub const DEFAULT_FLAGS: u8 = WRITABLE | ENUMERABLE | CONFIGURABLE;
/// Flags of builtin methods and intrinsic globals
pub const HIDDEN_FLAGS: u8 = WRITABLE | CONFIGURABLE;

/// A single property
#[derive(Debug, Clone)]
pub struct Property {
    pub atom: JSAtom,
    pub value: JSValue,
    pub flags: u8,
    /// Next entry in the hash chain (index + 1, 0 = end)
    hash_next: u32,
}

impl Property {
    #[inline]
    pub fn writable(&self) -> bool {
        self.flags & WRITABLE != 0
    }

    #[inline]
    pub fn enumerable(&self) -> bool {
        self.flags & ENUMERABLE != 0
    }

    #[inline]
    pub fn configurable(&self) -> bool {
        self.flags & CONFIGURABLE != 0
    }
}

/// Property table
#[derive(Debug)]
pub struct PropertyTable {
    /// Number of live properties
    count: u32,
    /// Hash table mask (size - 1)
    hash_mask: u32,
    /// Entries in insertion order, including tombstones
    properties: Vec<Property>,
    /// Bucket heads (index + 1 into properties, 0 = empty)
    hash_table: Vec<u32>,
}

impl PropertyTable {
    const MIN_HASH_SIZE: usize = 4;

    pub fn new() -> Self {
        PropertyTable {
            count: 0,
            hash_mask: (Self::MIN_HASH_SIZE - 1) as u32,
            properties: Vec::new(),
            hash_table: vec![0; Self::MIN_HASH_SIZE],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn hash_atom(atom: JSAtom) -> u32 {
        let mut h = atom.raw();
        h ^= h >> 16;
        h = h.wrapping_mul(0x85eb_ca6b);
        h ^= h >> 13;
        h = h.wrapping_mul(0xc2b2_ae35);
        h ^= h >> 16;
        h
    }

    /// Find the entry index of a property
    pub fn find(&self, atom: JSAtom) -> Option<usize> {
        if self.count == 0 {
            return None;
        }
        let mut idx = self.hash_table[(Self::hash_atom(atom) & self.hash_mask) as usize];
        while idx != 0 {
            let prop = &self.properties[(idx - 1) as usize];
            if prop.atom == atom {
                return Some((idx - 1) as usize);
            }
            idx = prop.hash_next;
        }
        None
    }

    pub fn get(&self, atom: JSAtom) -> Option<&Property> {
        self.find(atom).map(|idx| &self.properties[idx])
    }

    pub fn get_mut(&mut self, atom: JSAtom) -> Option<&mut Property> {
        self.find(atom).map(move |idx| &mut self.properties[idx])
    }

    #[inline]
    pub fn has(&self, atom: JSAtom) -> bool {
        self.find(atom).is_some()
    }

    /// Insert or replace a property, value and flags both
    ///
    /// Returns true if the property is new.
    pub fn define(&mut self, atom: JSAtom, value: JSValue, flags: u8) -> bool {
        if let Some(idx) = self.find(atom) {
            let prop = &mut self.properties[idx];
            prop.value = value;
            prop.flags = flags;
            return false;
        }

        if self.properties.len() + 1 > (self.hash_mask as usize + 1) * 3 / 4 {
            self.rehash();
        }

        let bucket = (Self::hash_atom(atom) & self.hash_mask) as usize;
        self.properties.push(Property {
            atom,
            value,
            flags,
            hash_next: self.hash_table[bucket],
        });
        self.hash_table[bucket] = self.properties.len() as u32;
        self.count += 1;
        true
    }

    /// Delete a property
    ///
    /// Returns true if it existed.
    pub fn delete(&mut self, atom: JSAtom) -> bool {
        if self.count == 0 {
            return false;
        }
        let bucket = (Self::hash_atom(atom) & self.hash_mask) as usize;
        let mut prev: Option<usize> = None;
        let mut idx = self.hash_table[bucket];

        while idx != 0 {
            let prop_idx = (idx - 1) as usize;
            let next = self.properties[prop_idx].hash_next;
            if self.properties[prop_idx].atom == atom {
                match prev {
                    Some(p) => self.properties[p].hash_next = next,
                    None => self.hash_table[bucket] = next,
                }
                let dead = &mut self.properties[prop_idx];
                dead.atom = JSAtom::NULL;
                dead.value = JSValue::Undefined;
                dead.hash_next = 0;
                self.count -= 1;
                return true;
            }
            prev = Some(prop_idx);
            idx = next;
        }
        false
    }

    /// Rebuild the hash index, dropping tombstones and growing if needed
    fn rehash(&mut self) {
        self.properties.retain(|p| p.atom != JSAtom::NULL);
        let needed = (self.properties.len() + 1) * 4 / 3 + 1;
        let size = needed.next_power_of_two().max(Self::MIN_HASH_SIZE);
        self.hash_mask = (size - 1) as u32;
        self.hash_table = vec![0; size];

        for i in 0..self.properties.len() {
            let bucket = (Self::hash_atom(self.properties[i].atom) & self.hash_mask) as usize;
            self.properties[i].hash_next = self.hash_table[bucket];
            self.hash_table[bucket] = (i + 1) as u32;
        }
    }

    /// Iterate live properties in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.atom != JSAtom::NULL)
    }

    /// Own keys in engine order: index keys ascending, then the rest in
    /// insertion order
    pub fn own_keys(&self, enumerable_only: bool) -> Vec<JSAtom> {
        let mut indices = Vec::new();
        let mut names = Vec::new();
        for prop in self.iter() {
            if enumerable_only && !prop.enumerable() {
                continue;
            }
            if prop.atom.is_index() {
                indices.push(prop.atom);
            } else {
                names.push(prop.atom);
            }
        }
        indices.sort_unstable_by_key(|a| a.index());
        indices.extend(names);
        indices
    }
}

impl Default for PropertyTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(n: u32) -> JSAtom {
        JSAtom(100 + n)
    }

    #[test]
    fn test_empty_table() {
        let table = PropertyTable::new();
        assert!(table.is_empty());
        assert!(table.get(atom(1)).is_none());
    }

    #[test]
    fn test_define_get() {
        let mut table = PropertyTable::new();
        assert!(table.define(atom(1), JSValue::Int(100), DEFAULT_FLAGS));
        assert_eq!(table.len(), 1);
        let prop = table.get(atom(1)).unwrap();
        assert!(matches!(prop.value, JSValue::Int(100)));
        assert!(prop.writable() && prop.enumerable() && prop.configurable());
    }

    #[test]
    fn test_update_keeps_position() {
        let mut table = PropertyTable::new();
        table.define(atom(1), JSValue::Int(10), DEFAULT_FLAGS);
        table.define(atom(2), JSValue::Int(20), DEFAULT_FLAGS);
        assert!(!table.define(atom(1), JSValue::Int(30), HIDDEN_FLAGS));
        assert_eq!(table.len(), 2);
        assert_eq!(table.own_keys(false), vec![atom(1), atom(2)]);
        assert_eq!(table.own_keys(true), vec![atom(2)]);
    }

    #[test]
    fn test_delete() {
        let mut table = PropertyTable::new();
        table.define(atom(1), JSValue::Int(10), DEFAULT_FLAGS);
        assert!(table.delete(atom(1)));
        assert!(!table.has(atom(1)));
        assert!(table.is_empty());
        assert!(!table.delete(atom(1)));
    }

    #[test]
    fn test_many_with_deletes() {
        let mut table = PropertyTable::new();
        for i in 0..100 {
            table.define(atom(i), JSValue::Int(i as i32), DEFAULT_FLAGS);
        }
        for i in (0..100).step_by(2) {
            assert!(table.delete(atom(i)));
        }
        for i in 100..150 {
            table.define(atom(i), JSValue::Int(i as i32), DEFAULT_FLAGS);
        }
        assert_eq!(table.len(), 100);
        for i in 0..150 {
            assert_eq!(table.has(atom(i)), i >= 100 || i % 2 == 1);
        }
        let keys = table.own_keys(false);
        assert_eq!(keys.first(), Some(&atom(1)));
        assert_eq!(keys.last(), Some(&atom(149)));
    }

    #[test]
    fn test_index_keys_first() {
        let mut table = PropertyTable::new();
        table.define(atom(7), JSValue::Null, DEFAULT_FLAGS);
        table.define(JSAtom::from_index(10), JSValue::Null, DEFAULT_FLAGS);
        table.define(atom(3), JSValue::Null, DEFAULT_FLAGS);
        table.define(JSAtom::from_index(2), JSValue::Null, DEFAULT_FLAGS);
        assert_eq!(
            table.own_keys(true),
            vec![JSAtom::from_index(2), JSAtom::from_index(10), atom(7), atom(3)]
        );
    }
}
