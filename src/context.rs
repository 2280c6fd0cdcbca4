//! Execution context
//!
//! A [`Context`] is one global environment inside a [`Runtime`]. All values
//! are created through a context and stay bound to it.
//!
//! [`Runtime`]: crate::Runtime

use std::rc::Rc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::bytecode;
use crate::engine::{ErrorKind, JSContext, JSResult, Thrown};
use crate::error::{ConversionError, Error, JsException, Result};
use crate::handle::Value;
use crate::marshal::{IntoJs, utf16_to_string};
use crate::object::{FunctionBytecode, JSObject, JSString, ObjectClass};
use crate::parser;
use crate::value::JSValue;
use crate::vm;

/// How source text is evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvalKind {
    /// Classic script: top-level `this` is the global object and top-level
    /// declarations become globals
    #[default]
    Global,
    /// Strict module with `import`/`export`; top-level `this` is undefined
    Module,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalOptions {
    pub kind: EvalKind,
    /// Name used in stack traces and as the module specifier
    pub filename: String,
    /// Force strict mode for scripts
    pub strict: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions {
            kind: EvalKind::Global,
            filename: "<input>".to_string(),
            strict: false,
        }
    }
}

impl EvalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: EvalKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn module(self) -> Self {
        self.kind(EvalKind::Module)
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Execution environment with its own global object
pub struct Context {
    pub(crate) inner: Rc<JSContext>,
}

impl Context {
    pub(crate) fn from_inner(inner: Rc<JSContext>) -> Context {
        Context { inner }
    }

    /// Check that `value` was created by this context
    ///
    /// # Panics
    /// On a value from another context or runtime.
    pub(crate) fn check_owner(&self, value: &Value) {
        let other = &value.context().inner;
        if Rc::ptr_eq(&self.inner, other) {
            return;
        }
        if self.inner.runtime().id() != other.runtime().id() {
            panic!("protocol violation: value from another runtime");
        }
        panic!("protocol violation: value from another context");
    }

    /// Wrap an engine value, rooting it for as long as the Value lives
    pub(crate) fn wrap(&self, raw: JSValue) -> Value {
        Value::from_raw(self, raw)
    }

    /// Run engine code entered from the host
    ///
    /// A host function may have raised (and not yet returned its marker)
    /// when it re-enters, so its pending exception is set aside for the
    /// nested run and put back afterwards. Anything left pending by the
    /// nested run itself is discarded.
    pub(crate) fn guard_pending<R>(&self, f: impl FnOnce() -> R) -> R {
        let outer = self.inner.take_pending_exception();
        let result = f();
        let _ = self.inner.take_pending_exception();
        if let Some(v) = outer {
            self.inner.set_pending_exception(v);
        }
        result
    }

    /// Wrap an engine result, converting a throw into [`Error::Exception`]
    pub(crate) fn wrap_result(&self, result: JSResult<JSValue>) -> Result<Value> {
        match result {
            Ok(v) => Ok(self.wrap(v)),
            Err(Thrown(v)) => Err(Error::Exception(JsException::from_thrown(&self.inner, &v))),
        }
    }

    // ---- evaluation ----

    /// Evaluate source text with default options
    pub fn eval(&self, source: &str, kind: EvalKind) -> Result<Value> {
        self.eval_with(source, &EvalOptions::new().kind(kind))
    }

    /// Evaluate source text
    ///
    /// Scripts return their completion value. Modules return their namespace
    /// object, which is also registered under `options.filename` for later
    /// imports.
    pub fn eval_with(&self, source: &str, options: &EvalOptions) -> Result<Value> {
        self.inner.runtime().maybe_gc();
        let module = options.kind == EvalKind::Module;
        let func = parser::compile_with(&self.inner, source, &options.filename, module, options.strict)?;
        self.run(func)
    }

    /// Compile to a serialized bytecode unit without running it
    pub fn compile(&self, source: &str) -> Result<Vec<u8>> {
        self.compile_with(source, &EvalOptions::new())
    }

    pub fn compile_with(&self, source: &str, options: &EvalOptions) -> Result<Vec<u8>> {
        let module = options.kind == EvalKind::Module;
        let func = parser::compile_with(&self.inner, source, &options.filename, module, options.strict)?;
        Ok(bytecode::write(self.inner.runtime(), &func))
    }

    /// Load, verify and run a bytecode unit produced by [`Context::compile`]
    ///
    /// The buffer is fully checked before anything runs. Loading untrusted
    /// bytecode is still equivalent to running untrusted code.
    pub fn eval_binary(&self, bytes: &[u8]) -> Result<Value> {
        self.inner.runtime().maybe_gc();
        let func = bytecode::read(self.inner.runtime(), bytes)?;
        self.run(func)
    }

    fn run(&self, func: Rc<FunctionBytecode>) -> Result<Value> {
        let module = func.is_module();
        let this = if module {
            JSValue::Undefined
        } else {
            JSValue::Object(self.inner.global_object())
        };
        let filename = func.filename.clone();
        let result = self.guard_pending(|| vm::run_function(&self.inner, func, this));
        if module && result.is_ok() {
            let atom = self.inner.atom_js(&filename);
            let ns = self.inner.modules.borrow().get(&atom).copied();
            return Ok(self.wrap(ns.map_or(JSValue::Undefined, JSValue::Object)));
        }
        self.wrap_result(result)
    }

    /// The global object
    pub fn globals(&self) -> Value {
        self.wrap(JSValue::Object(self.inner.global_object()))
    }

    /// Define or overwrite a global binding
    pub fn set_global(&self, name: &str, value: impl IntoJs) -> Result<()> {
        self.globals().set(name, value)
    }

    // ---- value constructors ----

    pub fn undefined(&self) -> Value {
        self.wrap(JSValue::Undefined)
    }

    pub fn null(&self) -> Value {
        self.wrap(JSValue::Null)
    }

    pub fn bool(&self, b: bool) -> Value {
        self.wrap(JSValue::Bool(b))
    }

    pub fn int(&self, n: i32) -> Value {
        self.wrap(JSValue::Int(n))
    }

    /// Integers beyond 2^53 in magnitude become BigInt so that no digit is lost
    pub fn int64(&self, n: i64) -> Value {
        self.wrap(crate::marshal::i64_to_raw(n))
    }

    pub fn float(&self, n: f64) -> Value {
        self.wrap(JSValue::number(n))
    }

    pub fn string(&self, s: &str) -> Value {
        self.wrap(JSValue::string(s))
    }

    /// String from UTF-8 bytes, rejecting malformed input
    pub fn string_from_utf8(&self, bytes: &[u8]) -> Result<Value> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| ConversionError::InvalidUtf8(e.valid_up_to()))?;
        Ok(self.string(s))
    }

    /// String from UTF-16 code units, rejecting unpaired surrogates
    pub fn string_from_utf16(&self, units: &[u16]) -> Result<Value> {
        utf16_to_string(units)?;
        Ok(self.wrap(JSValue::String(JSString::from_units(units.to_vec()))))
    }

    /// ArrayBuffer holding a copy of `bytes`
    pub fn array_buffer(&self, bytes: &[u8]) -> Result<Value> {
        let result = self.inner.alloc(JSObject::new(
            ObjectClass::ArrayBuffer(bytes.to_vec()),
            Some(self.inner.intrinsics.array_buffer_proto),
        ));
        self.wrap_result(result.map(JSValue::Object))
    }

    pub fn big_int(&self, n: BigInt) -> Value {
        self.wrap(JSValue::big_int(n))
    }

    pub fn big_decimal(&self, n: BigDecimal) -> Value {
        self.wrap(JSValue::big_decimal(n))
    }

    /// Empty plain object
    pub fn object(&self) -> Result<Value> {
        let result = self.inner.new_object();
        self.wrap_result(result.map(JSValue::Object))
    }

    /// Array of duplicated `items`
    pub fn array(&self, items: &[Value]) -> Result<Value> {
        let raw = items
            .iter()
            .map(|v| {
                self.check_owner(v);
                v.raw().clone()
            })
            .collect();
        let result = self.inner.new_array(raw);
        self.wrap_result(result)
    }

    /// Convert any host value
    pub fn value(&self, v: impl IntoJs) -> Result<Value> {
        v.into_js(self)
    }

    // ---- exceptions ----

    /// Raise `value` as a JavaScript exception
    ///
    /// Returns the exception marker a host function hands back to the engine.
    pub fn throw(&self, value: Value) -> Value {
        self.check_owner(&value);
        self.inner.set_pending_exception(value.raw().clone());
        self.wrap(JSValue::Exception)
    }

    /// Raise a new error object of the given class
    pub fn throw_error(&self, kind: ErrorKind, message: &str) -> Value {
        let err = self.inner.new_error(kind, JSString::from_str(message));
        self.throw(self.wrap(JSValue::Object(err)))
    }

    /// Release the context
    ///
    /// The engine-side environment goes away once no Value created from it
    /// is alive.
    pub fn free(self) {}
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("runtime", &self.inner.runtime().id())
            .field("id", &self.inner.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Runtime;

    #[test]
    fn test_eval_script_completion() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let v = ctx.eval("1 + 2 * 100 - 3", EvalKind::Global).unwrap();
        assert_eq!(v.as_i64().unwrap(), 198);
    }

    #[test]
    fn test_global_side_effects() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        ctx.eval("counter = 41", EvalKind::Global).unwrap();
        ctx.eval("counter++", EvalKind::Global).unwrap();
        assert_eq!(ctx.globals().get("counter").unwrap().as_i64().unwrap(), 42);
    }

    #[test]
    fn test_module_this_and_namespace() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let ns = ctx
            .eval_with(
                "export const kind = typeof this; export default 7;",
                &EvalOptions::new().module().filename("m.js"),
            )
            .unwrap();
        assert_eq!(ns.get("kind").unwrap().as_string().unwrap(), "undefined");
        assert_eq!(ns.get("default").unwrap().as_i64().unwrap(), 7);
        let v = ctx
            .eval_with(
                "import d, { kind } from 'm.js'; globalThis.seen = kind + d;",
                &EvalOptions::new().module().filename("user.js"),
            )
            .unwrap();
        assert!(v.is_object());
        assert_eq!(ctx.globals().get("seen").unwrap().as_string().unwrap(), "undefined7");
    }

    #[test]
    fn test_strict_option() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let err = ctx
            .eval_with("undeclared = 1", &EvalOptions::new().strict(true))
            .unwrap_err();
        assert!(err.cause().contains("ReferenceError"), "{}", err.cause());
    }

    #[test]
    fn test_throw_error_from_host_value() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let marker = ctx.throw_error(ErrorKind::RangeError, "nope");
        assert!(marker.is_exception());
        // not raised through a host function, so it is discarded by the next run
        assert!(ctx.eval("1", EvalKind::Global).is_ok());
    }

    #[test]
    fn test_string_validation() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        assert!(matches!(
            ctx.string_from_utf8(b"ab\xff"),
            Err(Error::Conversion(ConversionError::InvalidUtf8(2)))
        ));
        assert!(matches!(
            ctx.string_from_utf16(&[0x61, 0xD800]),
            Err(Error::Conversion(ConversionError::InvalidUtf16(1)))
        ));
        let v = ctx.string_from_utf16(&[0xD83D, 0xDE00]).unwrap();
        assert_eq!(v.as_string().unwrap(), "😀");
    }

    #[test]
    #[should_panic(expected = "protocol violation: value from another context")]
    fn test_cross_context_value_panics() {
        let rt = Runtime::new();
        let a = rt.new_context();
        let b = rt.new_context();
        let obj = a.object().unwrap();
        let _ = b.array(&[obj]);
    }
}
