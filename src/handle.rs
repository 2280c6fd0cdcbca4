//! Host handle to an engine value
//!
//! A [`Value`] owns one reference to engine data. Object references are
//! counted in the runtime's root set: creating or duplicating a Value adds a
//! reference, dropping it releases one. Values are move-only; a second
//! reference is taken explicitly with [`Value::dup`] (or `clone`).

use std::fmt;
use std::rc::Rc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::atom::{Atom, PropertyNames};
use crate::context::Context;
use crate::error::{ConversionError, Error, Result};
use crate::gc::GcRef;
use crate::marshal::{FromJs, IntoJs};
use crate::object::string::MAX_INDEX;
use crate::object::{JSAtom, ObjectClass};
use crate::value::JSValue;
use crate::vm::{self, ops};

/// Type of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Undefined,
    Null,
    Bool,
    Int,
    Float,
    String,
    BigInt,
    BigDecimal,
    Object,
    Function,
    /// Marker returned by [`Context::throw`]
    Exception,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Int => "integer",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::BigInt => "bigint",
            ValueKind::BigDecimal => "bigdecimal",
            ValueKind::Object => "object",
            ValueKind::Function => "function",
            ValueKind::Exception => "exception",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reference to an engine value, bound to the [`Context`] that made it
pub struct Value {
    ctx: Context,
    raw: JSValue,
}

impl Value {
    pub(crate) fn from_raw(ctx: &Context, raw: JSValue) -> Value {
        if let JSValue::Object(r) = raw {
            ctx.inner.runtime().roots.borrow_mut().add(r);
        }
        Value {
            ctx: Context::from_inner(Rc::clone(&ctx.inner)),
            raw,
        }
    }

    #[inline]
    pub(crate) fn raw(&self) -> &JSValue {
        &self.raw
    }

    /// Give up this reference and return the engine value
    ///
    /// The result is unrooted: it must reach the engine before the next
    /// collection point.
    pub(crate) fn into_raw(self) -> JSValue {
        let raw = self.raw.clone();
        drop(self);
        raw
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn kind(&self) -> ValueKind {
        match &self.raw {
            JSValue::Undefined | JSValue::Uninitialized => ValueKind::Undefined,
            JSValue::Null => ValueKind::Null,
            JSValue::Bool(_) => ValueKind::Bool,
            JSValue::Int(_) => ValueKind::Int,
            JSValue::Float(_) => ValueKind::Float,
            JSValue::String(_) => ValueKind::String,
            JSValue::BigInt(_) => ValueKind::BigInt,
            JSValue::BigDecimal(_) => ValueKind::BigDecimal,
            JSValue::Exception => ValueKind::Exception,
            JSValue::Object(_) if self.ctx.inner.is_function(&self.raw) => ValueKind::Function,
            JSValue::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_undefined(&self) -> bool {
        self.kind() == ValueKind::Undefined
    }

    pub fn is_null(&self) -> bool {
        self.raw.is_null()
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.raw, JSValue::Bool(_))
    }

    pub fn is_number(&self) -> bool {
        self.raw.is_number()
    }

    pub fn is_string(&self) -> bool {
        self.raw.is_string()
    }

    pub fn is_big_int(&self) -> bool {
        matches!(self.raw, JSValue::BigInt(_))
    }

    pub fn is_big_decimal(&self) -> bool {
        matches!(self.raw, JSValue::BigDecimal(_))
    }

    /// Objects, functions included
    pub fn is_object(&self) -> bool {
        self.raw.is_object()
    }

    pub fn is_function(&self) -> bool {
        self.ctx.inner.is_function(&self.raw)
    }

    pub fn is_array(&self) -> bool {
        self.ctx.inner.is_array(&self.raw)
    }

    pub fn is_error(&self) -> bool {
        self.ctx.inner.is_error(&self.raw)
    }

    pub fn is_exception(&self) -> bool {
        self.raw.is_exception()
    }

    /// Take another reference to the same datum
    pub fn dup(&self) -> Value {
        Value::from_raw(&self.ctx, self.raw.clone())
    }

    /// Release this reference
    pub fn free(self) {}

    // ---- typed extraction ----

    pub fn to<T: FromJs>(&self) -> Result<T> {
        Ok(T::from_js(self)?)
    }

    pub fn as_bool(&self) -> Result<bool> {
        self.to()
    }

    pub fn as_i32(&self) -> Result<i32> {
        self.to()
    }

    pub fn as_i64(&self) -> Result<i64> {
        self.to()
    }

    pub fn as_f64(&self) -> Result<f64> {
        self.to()
    }

    pub fn as_string(&self) -> Result<String> {
        self.to()
    }

    pub fn as_big_int(&self) -> Result<BigInt> {
        self.to()
    }

    pub fn as_big_decimal(&self) -> Result<BigDecimal> {
        self.to()
    }

    /// Copy of an ArrayBuffer's bytes
    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        let bytes = match &self.raw {
            JSValue::Object(r) => self.ctx.inner.with_object(*r, |o| match &o.class {
                ObjectClass::ArrayBuffer(bytes) => Some(bytes.clone()),
                _ => None,
            }),
            _ => None,
        };
        bytes.ok_or_else(|| self.mismatch("ArrayBuffer").into())
    }

    pub(crate) fn mismatch(&self, expected: &'static str) -> ConversionError {
        ConversionError::TypeMismatch {
            expected,
            actual: self.kind(),
        }
    }

    /// The engine's string coercion (may run `toString`)
    pub fn to_js_string(&self) -> Result<String> {
        let ctx = &self.ctx;
        let s = ctx.wrap_result(ops::to_string(&ctx.inner, &self.raw).map(JSValue::String))?;
        Ok(match &s.raw {
            JSValue::String(s) => s.to_string_lossy(),
            _ => String::new(),
        })
    }

    // ---- properties ----

    fn object_ref(&self) -> Result<GcRef> {
        self.raw
            .as_object()
            .ok_or_else(|| Error::from(self.mismatch("object")))
    }

    fn get_raw(&self, atom: JSAtom) -> Result<Value> {
        let result = self.ctx.inner.get_value_property(&self.raw, atom);
        self.ctx.wrap_result(result)
    }

    fn set_raw(&self, atom: JSAtom, value: impl IntoJs) -> Result<()> {
        let value = value.into_js(&self.ctx)?;
        let result = self
            .ctx
            .inner
            .set_value_property(&self.raw, atom, value.raw().clone());
        self.ctx.wrap_result(result.map(|_| JSValue::Undefined))?;
        Ok(())
    }

    /// Read a property; a missing key gives `undefined`
    pub fn get(&self, name: &str) -> Result<Value> {
        self.get_raw(self.ctx.inner.atom(name))
    }

    pub fn set(&self, name: &str, value: impl IntoJs) -> Result<()> {
        self.set_raw(self.ctx.inner.atom(name), value)
    }

    /// Read a property by interned name; a missing key gives `undefined`
    pub fn get_by_atom(&self, atom: Atom) -> Result<Value> {
        self.get_raw(atom.resolve(&self.ctx.inner))
    }

    pub fn set_by_atom(&self, atom: Atom, value: impl IntoJs) -> Result<()> {
        self.set_raw(atom.resolve(&self.ctx.inner), value)
    }

    /// Own or inherited property
    pub fn has(&self, name: &str) -> Result<bool> {
        let r = self.object_ref()?;
        Ok(self.ctx.inner.has_property(r, self.ctx.inner.atom(name)))
    }

    /// Delete an own property; false if it is not configurable
    pub fn delete(&self, name: &str) -> Result<bool> {
        let r = self.object_ref()?;
        Ok(self.ctx.inner.delete_property(r, self.ctx.inner.atom(name)))
    }

    fn index_atom(&self, index: u32) -> JSAtom {
        if index <= MAX_INDEX {
            JSAtom::from_index(index)
        } else {
            self.ctx.inner.atom(&index.to_string())
        }
    }

    pub fn get_index(&self, index: u32) -> Result<Value> {
        self.get_raw(self.index_atom(index))
    }

    pub fn set_index(&self, index: u32, value: impl IntoJs) -> Result<()> {
        self.set_raw(self.index_atom(index), value)
    }

    /// Length of an array or string, or the `length` property otherwise
    pub fn len(&self) -> Result<usize> {
        match &self.raw {
            JSValue::String(s) => Ok(s.len()),
            _ => {
                let n = self.get("length")?.as_f64()?;
                Ok(if n.is_finite() && n > 0.0 { n as usize } else { 0 })
            }
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of the own enumerable keys, in engine order
    pub fn property_names(&self) -> Result<PropertyNames> {
        let r = self.object_ref()?;
        let keys = self.ctx.inner.own_keys(r, true);
        Ok(PropertyNames::new(&self.ctx, keys))
    }

    // ---- calls ----

    /// Call a function value
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value> {
        self.ctx.check_owner(this);
        let raw_args: Vec<JSValue> = args
            .iter()
            .map(|a| {
                self.ctx.check_owner(a);
                a.raw.clone()
            })
            .collect();
        self.ctx.inner.runtime().maybe_gc();
        let result = self
            .ctx
            .guard_pending(|| vm::call(&self.ctx.inner, &self.raw, &this.raw, &raw_args));
        self.ctx.wrap_result(result)
    }

    /// `new` on a constructor value
    pub fn construct(&self, args: &[Value]) -> Result<Value> {
        let raw_args: Vec<JSValue> = args
            .iter()
            .map(|a| {
                self.ctx.check_owner(a);
                a.raw.clone()
            })
            .collect();
        self.ctx.inner.runtime().maybe_gc();
        let result = self
            .ctx
            .guard_pending(|| vm::construct(&self.ctx.inner, &self.raw, &raw_args));
        self.ctx.wrap_result(result)
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        self.dup()
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        if let JSValue::Object(r) = self.raw {
            self.ctx.inner.runtime().roots.borrow_mut().release(r);
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({:?})", self.raw)
    }
}

/// The engine's string coercion; a throwing `toString` shows its cause
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_js_string() {
            Ok(s) => f.write_str(&s),
            Err(e) => write!(f, "[exception: {}]", e.cause()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{EvalKind, Runtime, ValueKind};

    #[test]
    fn test_kinds() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let cases = [
            ("undefined", ValueKind::Undefined),
            ("null", ValueKind::Null),
            ("true", ValueKind::Bool),
            ("42", ValueKind::Int),
            ("0.5", ValueKind::Float),
            ("'s'", ValueKind::String),
            ("1n", ValueKind::BigInt),
            ("1l", ValueKind::BigDecimal),
            ("({})", ValueKind::Object),
            ("[]", ValueKind::Object),
            ("(function () {})", ValueKind::Function),
        ];
        for (src, kind) in cases {
            assert_eq!(ctx.eval(src, EvalKind::Global).unwrap().kind(), kind, "{src}");
        }
    }

    #[test]
    fn test_predicates() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        assert!(ctx.eval("true", EvalKind::Global).unwrap().is_bool());
        assert!(ctx.eval("2n", EvalKind::Global).unwrap().is_big_int());
        assert!(ctx.eval("2l", EvalKind::Global).unwrap().is_big_decimal());
        let v = ctx.eval("2", EvalKind::Global).unwrap();
        assert!(v.is_number());
        assert!(!v.is_big_int() && !v.is_bool() && !v.is_object());
    }

    #[test]
    fn test_dup_then_free_twice_keeps_datum() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let obj = ctx.eval("({ tag: 'alive' })", EvalKind::Global).unwrap();
        let a = obj.dup();
        let b = obj.dup();
        a.free();
        b.free();
        rt.run_gc().unwrap();
        assert_eq!(obj.get("tag").unwrap().as_string().unwrap(), "alive");
    }

    #[test]
    fn test_dropped_value_is_collectable() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let obj = ctx.eval("({})", EvalKind::Global).unwrap();
        assert_eq!(rt.memory_usage().host_roots, 1);
        obj.free();
        assert_eq!(rt.memory_usage().host_roots, 0);
        let stats = rt.run_gc().unwrap();
        assert!(stats.freed >= 1);
    }

    #[test]
    fn test_properties() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let obj = ctx.object().unwrap();
        obj.set("a", 1).unwrap();
        obj.set("b", "two").unwrap();
        assert!(obj.has("a").unwrap());
        assert!(obj.has("toString").unwrap());
        assert!(obj.delete("a").unwrap());
        assert!(!obj.has("a").unwrap());
        assert!(obj.get("missing").unwrap().is_undefined());
        assert_eq!(obj.to_string(), "[object Object]");
    }

    #[test]
    fn test_array_access() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let arr = ctx.eval("[10, 20]", EvalKind::Global).unwrap();
        assert!(arr.is_array());
        arr.set_index(3, 40).unwrap();
        assert_eq!(arr.len().unwrap(), 4);
        assert!(arr.get_index(2).unwrap().is_undefined());
        assert_eq!(arr.get_index(3).unwrap().as_i32().unwrap(), 40);
        assert_eq!(arr.to_string(), "10,20,,40");
    }

    #[test]
    fn test_call_and_construct() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let f = ctx
            .eval("(function (a, b) { return this.base + a * b; })", EvalKind::Global)
            .unwrap();
        let this = ctx.eval("({ base: 100 })", EvalKind::Global).unwrap();
        let r = f.call(&this, &[ctx.int(6), ctx.int(7)]).unwrap();
        assert_eq!(r.as_i64().unwrap(), 142);

        let point = ctx
            .eval("(function Point(x) { this.x = x; })", EvalKind::Global)
            .unwrap();
        let p = point.construct(&[ctx.int(3)]).unwrap();
        assert_eq!(p.get("x").unwrap().as_i32().unwrap(), 3);
    }

    #[test]
    fn test_throwing_call_is_an_exception() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let f = ctx
            .eval("(function () { throw new TypeError('bad input'); })", EvalKind::Global)
            .unwrap();
        let err = f.call(&ctx.undefined(), &[]).unwrap_err();
        assert_eq!(err.cause(), "TypeError: bad input");
        assert!(err.stack().contains("<input>"));
    }

    #[test]
    fn test_display_uses_engine_coercion() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        for (src, shown) in [
            ("1.5", "1.5"),
            ("[1, [2, 3]]", "1,2,3"),
            ("128n ** 2n", "16384"),
            ("null", "null"),
            ("({ toString: function () { throw 'no' } })", "[exception: no]"),
        ] {
            assert_eq!(ctx.eval(src, EvalKind::Global).unwrap().to_string(), shown);
        }
    }
}
