//! JavaScript value representation
//!
//! JSValue is the engine-side tagged union. Primitives are stored inline or
//! behind a shared `Rc` (strings, big numbers); objects are generation-checked
//! handles into the runtime heap.
//!
//! # Variants
//! - `Int` holds small integers; arithmetic falls back to `Float` on overflow
//! - `Exception` is a marker only: host functions return it to signal that an
//!   exception is pending on the context
//! - `Uninitialized` fills `let`/`const` slots until their declaration runs

use std::fmt;
use std::rc::Rc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::gc::GcRef;
use crate::object::JSString;

/// Engine value
#[derive(Clone, Default)]
pub enum JSValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i32),
    Float(f64),
    String(JSString),
    BigInt(Rc<BigInt>),
    BigDecimal(Rc<BigDecimal>),
    Object(GcRef),
    /// Pending-exception marker (never stored in objects)
    Exception,
    /// Temporal dead zone marker (never escapes a binding slot)
    Uninitialized,
}

impl JSValue {
    /// Create a number, using the integer representation when it is exact
    #[inline]
    pub fn number(n: f64) -> Self {
        if n.fract() == 0.0
            && n >= i32::MIN as f64
            && n <= i32::MAX as f64
            && !(n == 0.0 && n.is_sign_negative())
        {
            JSValue::Int(n as i32)
        } else {
            JSValue::Float(n)
        }
    }

    /// Create a number from a 64-bit integer
    #[inline]
    pub fn from_i64(n: i64) -> Self {
        match i32::try_from(n) {
            Ok(i) => JSValue::Int(i),
            Err(_) => JSValue::Float(n as f64),
        }
    }

    /// Create a string value from Rust text
    #[inline]
    pub fn string(s: &str) -> Self {
        JSValue::String(JSString::from_str(s))
    }

    /// Create a BigInt value
    #[inline]
    pub fn big_int(n: BigInt) -> Self {
        JSValue::BigInt(Rc::new(n))
    }

    /// Create a BigDecimal value
    #[inline]
    pub fn big_decimal(n: BigDecimal) -> Self {
        JSValue::BigDecimal(Rc::new(n))
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, JSValue::Undefined)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, JSValue::Null)
    }

    /// Check if this is nullish (null or undefined)
    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, JSValue::Undefined | JSValue::Null)
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, JSValue::Int(_) | JSValue::Float(_))
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, JSValue::String(_))
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, JSValue::Object(_))
    }

    #[inline]
    pub fn is_exception(&self) -> bool {
        matches!(self, JSValue::Exception)
    }

    #[inline]
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, JSValue::Uninitialized)
    }

    /// Get the object handle, if this is an object
    #[inline]
    pub fn as_object(&self) -> Option<GcRef> {
        match self {
            JSValue::Object(r) => Some(*r),
            _ => None,
        }
    }

    /// Get the numeric value of a Number
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            JSValue::Int(i) => Some(*i as f64),
            JSValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get the string, if this is a string
    #[inline]
    pub fn as_string(&self) -> Option<&JSString> {
        match self {
            JSValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for JSValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JSValue::Undefined => write!(f, "Undefined"),
            JSValue::Null => write!(f, "Null"),
            JSValue::Bool(b) => write!(f, "Bool({})", b),
            JSValue::Int(i) => write!(f, "Int({})", i),
            JSValue::Float(n) => write!(f, "Float({})", n),
            JSValue::String(s) => write!(f, "String({:?})", s.to_string_lossy()),
            JSValue::BigInt(n) => write!(f, "BigInt({})", n),
            JSValue::BigDecimal(n) => write!(f, "BigDecimal({})", n),
            JSValue::Object(r) => write!(f, "Object({:?})", r),
            JSValue::Exception => write!(f, "Exception"),
            JSValue::Uninitialized => write!(f, "Uninitialized"),
        }
    }
}

/// Largest integer a double represents exactly
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullish() {
        assert!(JSValue::Null.is_nullish());
        assert!(JSValue::Undefined.is_nullish());
        assert!(!JSValue::Bool(false).is_nullish());
        assert!(!JSValue::Int(0).is_nullish());
    }

    #[test]
    fn test_number_normalization() {
        assert!(matches!(JSValue::number(42.0), JSValue::Int(42)));
        assert!(matches!(JSValue::number(-7.0), JSValue::Int(-7)));
        assert!(matches!(JSValue::number(1.5), JSValue::Float(_)));
        assert!(matches!(JSValue::number(-0.0), JSValue::Float(_)));
        assert!(matches!(JSValue::number(1e10), JSValue::Float(_)));
        assert!(matches!(JSValue::number(f64::NAN), JSValue::Float(_)));
    }

    #[test]
    fn test_from_i64() {
        assert!(matches!(JSValue::from_i64(5), JSValue::Int(5)));
        assert!(matches!(JSValue::from_i64(1 << 40), JSValue::Float(n) if n == (1u64 << 40) as f64));
    }

    #[test]
    fn test_debug() {
        assert_eq!(format!("{:?}", JSValue::Null), "Null");
        assert_eq!(format!("{:?}", JSValue::Int(42)), "Int(42)");
        assert_eq!(format!("{:?}", JSValue::Bool(true)), "Bool(true)");
        assert_eq!(format!("{:?}", JSValue::string("hi")), "String(\"hi\")");
    }
}
