//! Dense array storage
//!
//! Arrays keep their elements in a contiguous vector. Writing past the end
//! fills the gap with `undefined`; lengths are capped so that a stray
//! `a[1e9] = 0` fails instead of exhausting memory.

use crate::value::JSValue;

/// Largest length an array may reach
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Store an element, growing the array if needed
///
/// Returns false if the index is beyond the length cap.
pub fn set_element(items: &mut Vec<JSValue>, index: usize, value: JSValue) -> bool {
    if index < items.len() {
        items[index] = value;
        return true;
    }
    if index >= MAX_ARRAY_LENGTH {
        return false;
    }
    items.resize(index, JSValue::Undefined);
    items.push(value);
    true
}

/// Set the array length, truncating or padding with `undefined`
///
/// Returns false if the length is beyond the cap.
pub fn set_length(items: &mut Vec<JSValue>, len: usize) -> bool {
    if len > MAX_ARRAY_LENGTH {
        return false;
    }
    items.resize(len, JSValue::Undefined);
    true
}

/// Resolve a relative index argument (as used by `slice`) against a length
pub fn relative_index(n: f64, len: usize) -> usize {
    if n.is_nan() {
        return 0;
    }
    let len_f = len as f64;
    let n = n.trunc();
    if n < 0.0 {
        (len_f + n).max(0.0) as usize
    } else {
        n.min(len_f) as usize
    }
}
