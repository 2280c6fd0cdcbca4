//! JavaScript built-in objects
//!
//! `install` populates a fresh realm. Every intrinsic global is defined
//! non-enumerable so that enumerating the global object only shows what
//! scripts and the host added.

pub mod array;
pub mod bigint;
pub mod error;
pub mod function;
pub mod global;
pub mod math;
pub mod number;
pub mod object;
pub mod string;

use crate::engine::JSContext;
use crate::gc::GcRef;
use crate::object::{HIDDEN_FLAGS, NativeFn, atoms};
use crate::value::JSValue;

/// Populate the global object of a new context
pub fn install(ctx: &JSContext) {
    let global = ctx.global_object();
    object::install(ctx, global);
    function::install(ctx, global);
    array::install(ctx, global);
    string::install(ctx, global);
    number::install(ctx, global);
    bigint::install(ctx, global);
    math::install(ctx, global);
    error::install(ctx, global);
    global::install(ctx, global);
}

/// Argument `i`, or `undefined` if absent
pub(crate) fn arg(args: &[JSValue], i: usize) -> JSValue {
    args.get(i).cloned().unwrap_or_default()
}

/// Define a data property directly on a builtin object
pub(crate) fn define_value(ctx: &JSContext, target: GcRef, name: &str, value: JSValue, flags: u8) {
    let atom = ctx.atom(name);
    ctx.with_object_mut(target, |o| o.props.define(atom, value, flags));
}

/// Define a builtin method
pub(crate) fn define_method(ctx: &JSContext, target: GcRef, name: &str, func: NativeFn, length: u32) {
    define_method_magic(ctx, target, name, func, length, 0);
}

pub(crate) fn define_method_magic(
    ctx: &JSContext,
    target: GcRef,
    name: &str,
    func: NativeFn,
    length: u32,
    magic: i32,
) {
    let f = ctx.new_native_function(name, func, length, magic, false);
    define_value(ctx, target, name, JSValue::Object(f), HIDDEN_FLAGS);
}

/// Create a constructor linked with its prototype and bind it as a global
pub(crate) fn define_constructor(
    ctx: &JSContext,
    global: GcRef,
    name: &str,
    func: NativeFn,
    length: u32,
    magic: i32,
    proto: GcRef,
) -> GcRef {
    let ctor = ctx.new_native_function(name, func, length, magic, true);
    link_prototype(ctx, global, name, ctor, proto);
    ctor
}

/// Bind `func` as global `name` with `proto` as its `prototype`
pub(crate) fn link_prototype(ctx: &JSContext, global: GcRef, name: &str, func: GcRef, proto: GcRef) {
    ctx.with_object_mut(func, |o| o.props.define(atoms::PROTOTYPE, JSValue::Object(proto), 0));
    ctx.with_object_mut(proto, |o| {
        o.props
            .define(atoms::CONSTRUCTOR, JSValue::Object(func), HIDDEN_FLAGS)
    });
    define_value(ctx, global, name, JSValue::Object(func), HIDDEN_FLAGS);
}

/// Natives receive the constructor as `this` when invoked with `new`
pub(crate) fn is_construct_call(ctx: &JSContext, this: &JSValue) -> bool {
    ctx.is_function(this)
}
