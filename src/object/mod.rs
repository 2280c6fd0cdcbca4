//! Object model
//!
//! Strings, interned atoms, property tables, heap objects and function
//! representations.

pub mod array;
pub mod atom;
pub mod function;
#[allow(clippy::module_inception)]
pub mod object;
pub mod property;
pub mod string;

pub use atom::{AtomTable, JSAtom, atoms};
pub use function::{
    Closure, Constant, FUNC_ALL, FUNC_MODULE, FUNC_SCRIPT, FunctionBytecode, HostCallback, NativeFn,
    NativeFunction,
};
pub use object::{ForInIter, ForOfIter, JSObject, ObjectClass, Scope};
pub use property::{CONFIGURABLE, DEFAULT_FLAGS, ENUMERABLE, HIDDEN_FLAGS, PropertyTable, WRITABLE};
pub use string::JSString;
