//! mquickjs-host - embed isolated JavaScript runtimes in Rust
//!
//! A [`Runtime`] is one engine instance with its own heap, atom table and
//! limits. Each [`Context`] created from it is an independent global
//! environment. Code runs through [`Context::eval`] or, precompiled, through
//! [`Context::compile`] and [`Context::eval_binary`]. Results come back as
//! [`Value`] handles that keep their datum alive until dropped.
//!
//! # Ownership
//! - A `Value` holds one reference; [`Value::dup`] takes another and
//!   dropping (or [`Value::free`]) releases it
//! - Values are bound to their context: passing one to another context or
//!   runtime panics with a `protocol violation` message
//! - Collection happens only when control enters the engine from the host
//!
//! # Errors
//! Failures surface as [`Error`]: a compile error, a JavaScript exception
//! (cause and stack text), a failed typed extraction, or a bytecode buffer
//! that could not be loaded.
//!
//! # Example
//! ```
//! use mquickjs_host::{EvalKind, Runtime};
//!
//! let rt = Runtime::new();
//! let ctx = rt.new_context();
//! let double = ctx
//!     .function("double", |ctx, _this, args| {
//!         let n = args.first().and_then(|a| a.as_i64().ok()).unwrap_or(0);
//!         ctx.int64(n * 2)
//!     })
//!     .unwrap();
//! ctx.set_global("double", double).unwrap();
//! let v = ctx.eval("double(1 + 2 * 100 - 3)", EvalKind::Global).unwrap();
//! assert_eq!(v.as_i64().unwrap(), 396);
//! ```

// Engine
pub(crate) mod builtins;
pub(crate) mod engine;
pub(crate) mod gc;
pub(crate) mod object;
pub(crate) mod parser;
pub(crate) mod util;
pub(crate) mod value;
pub(crate) mod vm;

// Host boundary
pub mod atom;
pub mod bytecode;
pub mod context;
pub mod error;
pub mod handle;
pub mod marshal;
pub mod runtime;
pub mod trampoline;

pub use atom::{Atom, PropertyName, PropertyNames};
pub use context::{Context, EvalKind, EvalOptions};
pub use engine::ErrorKind;
pub use error::{CompileError, ConversionError, DecodeError, Error, JsException, Result};
pub use gc::GcStats;
pub use handle::{Value, ValueKind};
pub use marshal::{FromJs, IntoJs};
pub use runtime::{MemoryUsage, Runtime, RuntimeOptions};

pub use bigdecimal::BigDecimal;
pub use num_bigint::BigInt;
