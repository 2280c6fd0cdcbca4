//! JavaScript string representation
//!
//! Strings are immutable sequences of UTF-16 code units shared through an
//! `Rc`, so lone surrogates produced by script code survive intact. Conversion
//! to Rust text is lossy here (`to_string_lossy`); the host boundary does the
//! strict decoding.

use std::cmp::Ordering;
use std::rc::Rc;

/// JavaScript string
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct JSString(Rc<[u16]>);

impl JSString {
    /// Create a string from Rust text
    pub fn from_str(s: &str) -> Self {
        JSString(s.encode_utf16().collect::<Vec<u16>>().into())
    }

    /// Create a string from UTF-16 code units (lone surrogates allowed)
    pub fn from_units(units: Vec<u16>) -> Self {
        JSString(units.into())
    }

    /// The empty string
    pub fn empty() -> Self {
        JSString(Rc::from([]))
    }

    /// Get the UTF-16 code units
    #[inline]
    pub fn units(&self) -> &[u16] {
        &self.0
    }

    /// Get the length in UTF-16 code units
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to Rust text, replacing unpaired surrogates with U+FFFD
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }

    /// Concatenate two strings
    pub fn concat(&self, other: &JSString) -> JSString {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut units = Vec::with_capacity(self.len() + other.len());
        units.extend_from_slice(&self.0);
        units.extend_from_slice(&other.0);
        JSString::from_units(units)
    }

    /// Substring by code unit range (clamped)
    pub fn slice(&self, start: usize, end: usize) -> JSString {
        let end = end.min(self.len());
        let start = start.min(end);
        JSString::from_units(self.0[start..end].to_vec())
    }

    /// Find `needle` at or after code unit `from`
    pub fn index_of(&self, needle: &JSString, from: usize) -> Option<usize> {
        let hay = self.units();
        let pat = needle.units();
        if pat.is_empty() {
            return Some(from.min(hay.len()));
        }
        if pat.len() > hay.len() {
            return None;
        }
        (from..=hay.len() - pat.len()).find(|&i| &hay[i..i + pat.len()] == pat)
    }

    /// Get the code point starting at code unit `index`
    pub fn code_point_at(&self, index: usize) -> Option<u32> {
        let c = *self.0.get(index)? as u32;
        if (0xD800..0xDC00).contains(&c) {
            if let Some(&next) = self.0.get(index + 1) {
                let next = next as u32;
                if (0xDC00..0xE000).contains(&next) {
                    return Some(0x10000 + ((c - 0xD800) << 10) + (next - 0xDC00));
                }
            }
        }
        Some(c)
    }
}

impl std::fmt::Debug for JSString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl PartialOrd for JSString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JSString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl From<&str> for JSString {
    fn from(s: &str) -> Self {
        JSString::from_str(s)
    }
}

/// Largest value an index atom can carry
pub const MAX_INDEX: u32 = (1 << 31) - 2;

/// Check if a string represents a canonical array index
#[inline]
pub fn is_array_index(s: &[u16]) -> Option<u32> {
    if s.is_empty() || s.len() > 10 {
        return None;
    }

    // Fast path for single digits
    if s.len() == 1 {
        let b = s[0];
        if (b'0' as u16..=b'9' as u16).contains(&b) {
            return Some((b - b'0' as u16) as u32);
        }
        return None;
    }

    // Leading zeros are not valid (except "0")
    if s[0] == b'0' as u16 {
        return None;
    }

    let mut n: u64 = 0;
    for &c in s {
        if !(b'0' as u16..=b'9' as u16).contains(&c) {
            return None;
        }
        n = n * 10 + (c - b'0' as u16) as u64;
    }
    if n <= MAX_INDEX as u64 {
        Some(n as u32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn test_round_trip() {
        let s = JSString::from_str("héllo 😀");
        assert_eq!(s.to_string_lossy(), "héllo 😀");
        assert_eq!(s.len(), 8); // emoji is a surrogate pair
    }

    #[test]
    fn test_lone_surrogate_is_kept() {
        let s = JSString::from_units(vec![0x61, 0xD800]);
        assert_eq!(s.to_string_lossy(), "a\u{FFFD}");
    }

    #[test]
    fn test_concat_and_slice() {
        let a = JSString::from_str("foo");
        let b = JSString::from_str("bar");
        let c = a.concat(&b);
        assert_eq!(c.to_string_lossy(), "foobar");
        assert_eq!(c.slice(2, 4).to_string_lossy(), "ob");
        assert_eq!(c.slice(4, 100).to_string_lossy(), "ar");
    }

    #[test]
    fn test_index_of() {
        let s = JSString::from_str("hello world");
        assert_eq!(s.index_of(&JSString::from_str("o"), 0), Some(4));
        assert_eq!(s.index_of(&JSString::from_str("o"), 5), Some(7));
        assert_eq!(s.index_of(&JSString::from_str("xyz"), 0), None);
    }

    #[test]
    fn test_code_point_at() {
        let s = JSString::from_str("a😀");
        assert_eq!(s.code_point_at(0), Some(0x61));
        assert_eq!(s.code_point_at(1), Some(0x1F600));
        assert_eq!(s.code_point_at(2), Some(0xDE00));
        assert_eq!(s.code_point_at(3), None);
    }

    #[test]
    fn test_is_array_index() {
        assert_eq!(is_array_index(&units("0")), Some(0));
        assert_eq!(is_array_index(&units("1")), Some(1));
        assert_eq!(is_array_index(&units("42")), Some(42));
        assert_eq!(is_array_index(&units("12345")), Some(12345));
        assert_eq!(is_array_index(&units("")), None);
        assert_eq!(is_array_index(&units("01")), None); // Leading zero
        assert_eq!(is_array_index(&units("-1")), None); // Negative
        assert_eq!(is_array_index(&units("abc")), None);
        assert_eq!(is_array_index(&units("1.5")), None);
        assert_eq!(is_array_index(&units("99999999999")), None);
    }

    #[test]
    fn test_ordering() {
        assert!(JSString::from_str("a") < JSString::from_str("b"));
        assert!(JSString::from_str("ab") > JSString::from_str("a"));
    }
}
