//! Errors surfaced at the host boundary
//!
//! Four recoverable classes reach the caller as [`Error`]: compile errors,
//! JavaScript exceptions, typed-extraction failures and bytecode decode
//! failures. Misuse of the API (a Value from another runtime, a stale
//! handle, releasing an unheld root) is not an `Error`: it panics with a
//! `protocol violation:` message.

use thiserror::Error;

use crate::engine::JSContext;
use crate::handle::ValueKind;
use crate::object::atoms;
pub use crate::parser::CompileError;
use crate::value::JSValue;
use crate::vm::ops;

/// Result alias used throughout the public API
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Malformed source
    #[error("SyntaxError: {0}")]
    Compile(#[from] CompileError),
    /// A value thrown by JavaScript code
    #[error("{0}")]
    Exception(#[from] JsException),
    /// Typed extraction on an incompatible value
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),
    /// Malformed or incompatible bytecode
    #[error("bytecode error: {0}")]
    Decode(#[from] DecodeError),
}

impl Error {
    /// Description of what went wrong
    ///
    /// For exceptions this is the string form of the thrown value, which
    /// need not be an Error object.
    pub fn cause(&self) -> String {
        match self {
            Error::Compile(e) => format!("SyntaxError: {}", e),
            Error::Exception(e) => e.cause.clone(),
            Error::Conversion(e) => e.to_string(),
            Error::Decode(e) => e.to_string(),
        }
    }

    /// Engine call-stack text; empty unless code was running
    pub fn stack(&self) -> &str {
        match self {
            Error::Exception(e) => &e.stack,
            _ => "",
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, Error::Exception(_))
    }
}

/// A JavaScript exception that escaped to the host
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{cause}")]
pub struct JsException {
    pub cause: String,
    pub stack: String,
}

impl JsException {
    /// Describe a thrown value: its string form and, for objects, the
    /// `stack` text captured when it was created
    pub(crate) fn from_thrown(ctx: &JSContext, thrown: &JSValue) -> JsException {
        // a throwing toString leaves only a placeholder
        let cause = ops::to_string(ctx, thrown)
            .map(|s| s.to_string_lossy())
            .unwrap_or_else(|_| "[exception]".to_string());
        let stack = match thrown {
            JSValue::Object(r) => match ctx.get_own_property(*r, atoms::STACK) {
                Some(JSValue::String(s)) => s.to_string_lossy(),
                _ => String::new(),
            },
            _ => String::new(),
        };
        JsException { cause, stack }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("expected {expected}, found {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: ValueKind,
    },
    #[error("{value} does not fit in {target}")]
    OutOfRange { value: String, target: &'static str },
    #[error("{0} is not an integer")]
    NotIntegral(f64),
    #[error("invalid UTF-8 at byte {0}")]
    InvalidUtf8(usize),
    #[error("unpaired surrogate at code unit {0}")]
    InvalidUtf16(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("not a bytecode buffer")]
    BadMagic,
    #[error("unsupported bytecode version {0}")]
    Version(u16),
    #[error("bytecode from an incompatible engine build (tag {found:#010x}, expected {expected:#010x})")]
    BuildTag { expected: u32, found: u32 },
    #[error("truncated bytecode at offset {0}")]
    Truncated(usize),
    #[error("unknown tag {tag} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },
    #[error("{0} trailing bytes after bytecode")]
    TrailingBytes(usize),
    #[error("functions nested deeper than {0}")]
    TooDeep(usize),
    #[error("invalid function '{function}': {reason}")]
    Invalid { function: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EvalKind, Runtime};

    #[test]
    fn test_compile_error_has_cause_without_stack() {
        let err = Error::from(CompileError {
            message: "unexpected token".into(),
            line: 3,
            column: 7,
        });
        assert_eq!(err.cause(), "SyntaxError: unexpected token (line 3, column 7)");
        assert_eq!(err.cause(), err.to_string());
        assert_eq!(err.stack(), "");
        assert!(!err.is_exception());
    }

    #[test]
    fn test_exception_display() {
        let err = Error::from(JsException {
            cause: "Error: x".into(),
            stack: "    at f (a.js:1)\n".into(),
        });
        assert_eq!(err.to_string(), "Error: x");
        assert_eq!(err.stack(), "    at f (a.js:1)\n");
    }

    #[test]
    fn test_thrown_error_has_cause_and_stack() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let err = ctx
            .eval("function f(){throw new Error('x')} f()", EvalKind::Global)
            .unwrap_err();
        assert_eq!(err.cause(), "Error: x");
        assert!(err.stack().contains("    at f (<input>:1)"), "{}", err.stack());
    }

    #[test]
    fn test_from_thrown_primitive_and_bad_to_string() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let e = JsException::from_thrown(&ctx.inner, &JSValue::from_i64(42));
        assert_eq!(e.cause, "42");
        assert_eq!(e.stack, "");

        let v = ctx
            .eval("({ toString: function () { throw 1; } })", EvalKind::Global)
            .unwrap();
        let e = JsException::from_thrown(&ctx.inner, v.raw());
        assert_eq!(e.cause, "[exception]");
        assert_eq!(e.stack, "");
    }

    #[test]
    fn test_conversion_message() {
        let err = ConversionError::TypeMismatch {
            expected: "integer",
            actual: ValueKind::String,
        };
        assert_eq!(err.to_string(), "expected integer, found string");
    }
}
