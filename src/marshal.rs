//! Conversions between host types and Values
//!
//! [`IntoJs`] builds a Value from a host value; [`FromJs`] is the typed,
//! fallible extraction in the other direction. Extraction never coerces:
//! asking for an integer from a string is a [`ConversionError`], and a float
//! is only an integer when it is integral and in range.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::context::Context;
use crate::error::{ConversionError, Result};
use crate::handle::Value;
use crate::value::{JSValue, MAX_SAFE_INTEGER};

/// Host value that can be turned into a [`Value`]
pub trait IntoJs {
    fn into_js(self, ctx: &Context) -> Result<Value>;
}

/// Host type that can be extracted from a [`Value`]
pub trait FromJs: Sized {
    fn from_js(value: &Value) -> std::result::Result<Self, ConversionError>;
}

/// Engine representation of a host integer
///
/// Magnitudes above 2^53 - 1 are not exact as numbers and become BigInt.
pub(crate) fn i64_to_raw(n: i64) -> JSValue {
    if (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&n) {
        JSValue::from_i64(n)
    } else {
        JSValue::big_int(BigInt::from(n))
    }
}

/// Decode UTF-16, reporting the first unpaired surrogate
pub(crate) fn utf16_to_string(units: &[u16]) -> std::result::Result<String, ConversionError> {
    let mut out = String::with_capacity(units.len());
    let mut pos = 0;
    for c in char::decode_utf16(units.iter().copied()) {
        match c {
            Ok(c) => {
                out.push(c);
                pos += c.len_utf16();
            }
            Err(_) => return Err(ConversionError::InvalidUtf16(pos)),
        }
    }
    Ok(out)
}

/// Integral value of a number Value, or why it has none
fn integral(value: &Value, target: &'static str) -> std::result::Result<f64, ConversionError> {
    let n = match value.raw() {
        JSValue::Int(i) => return Ok(*i as f64),
        JSValue::Float(f) => *f,
        _ => return Err(value.mismatch(target)),
    };
    if n.fract() != 0.0 || !n.is_finite() {
        return Err(ConversionError::NotIntegral(n));
    }
    Ok(n)
}

fn out_of_range(value: impl ToString, target: &'static str) -> ConversionError {
    ConversionError::OutOfRange {
        value: value.to_string(),
        target,
    }
}

// ---- host to engine ----

impl IntoJs for Value {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        ctx.check_owner(&self);
        Ok(self)
    }
}

impl IntoJs for &Value {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        ctx.check_owner(self);
        Ok(self.dup())
    }
}

impl IntoJs for () {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        Ok(ctx.undefined())
    }
}

impl IntoJs for bool {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        Ok(ctx.bool(self))
    }
}

impl IntoJs for i32 {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        Ok(ctx.int(self))
    }
}

impl IntoJs for u32 {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        Ok(ctx.int64(self as i64))
    }
}

impl IntoJs for i64 {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        Ok(ctx.int64(self))
    }
}

impl IntoJs for f64 {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        Ok(ctx.float(self))
    }
}

impl IntoJs for &str {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        Ok(ctx.string(self))
    }
}

impl IntoJs for String {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        Ok(ctx.string(&self))
    }
}

impl IntoJs for &[u8] {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        ctx.array_buffer(self)
    }
}

impl IntoJs for BigInt {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        Ok(ctx.big_int(self))
    }
}

impl IntoJs for BigDecimal {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        Ok(ctx.big_decimal(self))
    }
}

/// `None` is `null`
impl<T: IntoJs> IntoJs for Option<T> {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        match self {
            Some(v) => v.into_js(ctx),
            None => Ok(ctx.null()),
        }
    }
}

/// A new array
impl<T: IntoJs> IntoJs for Vec<T> {
    fn into_js(self, ctx: &Context) -> Result<Value> {
        let items = self
            .into_iter()
            .map(|v| v.into_js(ctx))
            .collect::<Result<Vec<_>>>()?;
        ctx.array(&items)
    }
}

// ---- engine to host ----

impl FromJs for Value {
    fn from_js(value: &Value) -> std::result::Result<Self, ConversionError> {
        Ok(value.dup())
    }
}

impl FromJs for bool {
    fn from_js(value: &Value) -> std::result::Result<Self, ConversionError> {
        match value.raw() {
            JSValue::Bool(b) => Ok(*b),
            _ => Err(value.mismatch("boolean")),
        }
    }
}

impl FromJs for i32 {
    fn from_js(value: &Value) -> std::result::Result<Self, ConversionError> {
        let n = integral(value, "integer")?;
        if n < i32::MIN as f64 || n > i32::MAX as f64 {
            return Err(out_of_range(n, "i32"));
        }
        Ok(n as i32)
    }
}

impl FromJs for u32 {
    fn from_js(value: &Value) -> std::result::Result<Self, ConversionError> {
        let n = integral(value, "integer")?;
        if n < 0.0 || n > u32::MAX as f64 {
            return Err(out_of_range(n, "u32"));
        }
        Ok(n as u32)
    }
}

/// Numbers that are integral, or a BigInt within range
impl FromJs for i64 {
    fn from_js(value: &Value) -> std::result::Result<Self, ConversionError> {
        if let JSValue::BigInt(b) = value.raw() {
            return b.to_i64().ok_or_else(|| out_of_range(b, "i64"));
        }
        let n = integral(value, "integer")?;
        // 2^63 itself is representable as f64 but not as i64
        if n < i64::MIN as f64 || n >= i64::MAX as f64 {
            return Err(out_of_range(n, "i64"));
        }
        Ok(n as i64)
    }
}

impl FromJs for f64 {
    fn from_js(value: &Value) -> std::result::Result<Self, ConversionError> {
        match value.raw() {
            JSValue::Int(i) => Ok(*i as f64),
            JSValue::Float(f) => Ok(*f),
            _ => Err(value.mismatch("number")),
        }
    }
}

/// Rejects strings holding unpaired surrogates
impl FromJs for String {
    fn from_js(value: &Value) -> std::result::Result<Self, ConversionError> {
        match value.raw() {
            JSValue::String(s) => utf16_to_string(s.units()),
            _ => Err(value.mismatch("string")),
        }
    }
}

impl FromJs for BigInt {
    fn from_js(value: &Value) -> std::result::Result<Self, ConversionError> {
        match value.raw() {
            JSValue::BigInt(b) => Ok(BigInt::clone(b)),
            _ => Err(value.mismatch("bigint")),
        }
    }
}

impl FromJs for BigDecimal {
    fn from_js(value: &Value) -> std::result::Result<Self, ConversionError> {
        match value.raw() {
            JSValue::BigDecimal(d) => Ok(BigDecimal::clone(d)),
            _ => Err(value.mismatch("bigdecimal")),
        }
    }
}

/// `undefined` and `null` are `None`
impl<T: FromJs> FromJs for Option<T> {
    fn from_js(value: &Value) -> std::result::Result<Self, ConversionError> {
        if value.raw().is_nullish() {
            Ok(None)
        } else {
            T::from_js(value).map(Some)
        }
    }
}

/// Elements of an array, each extracted as `T`
impl<T: FromJs> FromJs for Vec<T> {
    fn from_js(value: &Value) -> std::result::Result<Self, ConversionError> {
        if !value.is_array() {
            return Err(value.mismatch("array"));
        }
        let raw = value.raw().clone();
        let ctx = value.context();
        let items = match raw {
            JSValue::Object(r) => ctx.inner.with_object(r, |o| match &o.class {
                crate::object::ObjectClass::Array(items) => items.clone(),
                _ => Vec::new(),
            }),
            _ => Vec::new(),
        };
        items
            .into_iter()
            .map(|item| T::from_js(&ctx.wrap(item)))
            .collect()
    }
}
