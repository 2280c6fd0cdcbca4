//! Atom table
//!
//! Property names are interned once per runtime and referred to by a 32-bit
//! handle. Canonical array indices never enter the table: they are encoded
//! directly in the handle with the high bit set, which keeps `a[0]`..`a[n]`
//! allocation-free and lets own-key ordering put them first.

use std::collections::HashMap;

use super::string::{JSString, MAX_INDEX, is_array_index};

/// Interned property name
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct JSAtom(pub(crate) u32);

const INDEX_BIT: u32 = 1 << 31;

impl JSAtom {
    /// Tombstone marker used by property tables (never interned)
    pub const NULL: JSAtom = JSAtom(u32::MAX);

    /// Create an index atom
    #[inline]
    pub fn from_index(index: u32) -> JSAtom {
        debug_assert!(index <= MAX_INDEX);
        JSAtom(index | INDEX_BIT)
    }

    /// Check if this atom is a canonical array index
    #[inline]
    pub fn is_index(self) -> bool {
        self.0 & INDEX_BIT != 0 && self != JSAtom::NULL
    }

    /// Get the array index, if this is an index atom
    #[inline]
    pub fn index(self) -> Option<u32> {
        if self.is_index() {
            Some(self.0 & !INDEX_BIT)
        } else {
            None
        }
    }

    /// Raw handle value
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Predefined atoms, interned in this order by every runtime
pub mod atoms {
    use super::JSAtom;

    pub const EMPTY: JSAtom = JSAtom(0);
    pub const LENGTH: JSAtom = JSAtom(1);
    pub const PROTOTYPE: JSAtom = JSAtom(2);
    pub const CONSTRUCTOR: JSAtom = JSAtom(3);
    pub const NAME: JSAtom = JSAtom(4);
    pub const MESSAGE: JSAtom = JSAtom(5);
    pub const STACK: JSAtom = JSAtom(6);
    pub const TO_STRING: JSAtom = JSAtom(7);
    pub const VALUE_OF: JSAtom = JSAtom(8);
    pub const DEFAULT: JSAtom = JSAtom(9);
    pub const BYTE_LENGTH: JSAtom = JSAtom(10);
    pub const ANONYMOUS: JSAtom = JSAtom(11);

    pub(super) const NAMES: &[&str] = &[
        "",
        "length",
        "prototype",
        "constructor",
        "name",
        "message",
        "stack",
        "toString",
        "valueOf",
        "default",
        "byteLength",
        "<anonymous>",
    ];
}

/// Runtime-wide intern table
///
/// Entries are never freed; the table lives as long as its runtime.
pub struct AtomTable {
    strings: Vec<JSString>,
    map: HashMap<JSString, u32>,
}

impl AtomTable {
    pub fn new() -> Self {
        let mut table = AtomTable {
            strings: Vec::with_capacity(256),
            map: HashMap::with_capacity(256),
        };
        for name in atoms::NAMES {
            table.intern_str(name);
        }
        table
    }

    /// Intern a string
    pub fn intern(&mut self, s: &JSString) -> JSAtom {
        if let Some(index) = is_array_index(s.units()) {
            return JSAtom::from_index(index);
        }
        if let Some(&id) = self.map.get(s) {
            return JSAtom(id);
        }
        let id = self.strings.len() as u32;
        self.strings.push(s.clone());
        self.map.insert(s.clone(), id);
        JSAtom(id)
    }

    /// Intern Rust text
    pub fn intern_str(&mut self, s: &str) -> JSAtom {
        self.intern(&JSString::from_str(s))
    }

    /// Look up without interning
    pub fn find(&self, s: &JSString) -> Option<JSAtom> {
        if let Some(index) = is_array_index(s.units()) {
            return Some(JSAtom::from_index(index));
        }
        self.map.get(s).map(|&id| JSAtom(id))
    }

    /// Get the string form of an atom
    pub fn to_js_string(&self, atom: JSAtom) -> JSString {
        if let Some(index) = atom.index() {
            return JSString::from_str(&index.to_string());
        }
        self.strings
            .get(atom.0 as usize)
            .cloned()
            .unwrap_or_else(JSString::empty)
    }

    /// Check that a non-index atom was issued by this table
    pub fn contains(&self, atom: JSAtom) -> bool {
        atom.is_index() || (atom.0 as usize) < self.strings.len()
    }

    /// Number of interned strings
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for AtomTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_order() {
        let table = AtomTable::new();
        assert_eq!(table.to_js_string(atoms::LENGTH).to_string_lossy(), "length");
        assert_eq!(table.to_js_string(atoms::STACK).to_string_lossy(), "stack");
        assert_eq!(
            table.to_js_string(atoms::ANONYMOUS).to_string_lossy(),
            "<anonymous>"
        );
        assert_eq!(table.len(), atoms::NAMES.len());
    }

    #[test]
    fn test_intern_is_stable() {
        let mut table = AtomTable::new();
        let a = table.intern_str("foo");
        let b = table.intern_str("foo");
        let c = table.intern_str("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.intern_str("length"), atoms::LENGTH);
    }

    #[test]
    fn test_index_atoms() {
        let mut table = AtomTable::new();
        let before = table.len();
        let a = table.intern_str("42");
        assert!(a.is_index());
        assert_eq!(a.index(), Some(42));
        assert_eq!(table.to_js_string(a).to_string_lossy(), "42");
        // Non-canonical forms are ordinary names
        assert!(!table.intern_str("042").is_index());
        assert_eq!(table.len(), before + 1);
        assert!(!JSAtom::NULL.is_index());
    }

    #[test]
    fn test_find() {
        let mut table = AtomTable::new();
        assert!(table.find(&JSString::from_str("zzz")).is_none());
        let a = table.intern_str("zzz");
        assert_eq!(table.find(&JSString::from_str("zzz")), Some(a));
    }
}
