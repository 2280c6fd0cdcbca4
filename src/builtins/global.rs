//! Global value properties, global functions and ArrayBuffer

use super::{arg, define_constructor, define_method, define_value, is_construct_call};
use crate::engine::{JSContext, JSResult};
use crate::gc::GcRef;
use crate::object::{HIDDEN_FLAGS, JSObject, ObjectClass};
use crate::util::dtoa;
use crate::value::JSValue;
use crate::vm::ops;

/// Largest ArrayBuffer a script may allocate
pub const MAX_ARRAY_BUFFER_LENGTH: usize = 1 << 30;

pub fn install(ctx: &JSContext, global: GcRef) {
    define_value(ctx, global, "globalThis", JSValue::Object(global), HIDDEN_FLAGS);
    define_value(ctx, global, "undefined", JSValue::Undefined, 0);
    define_value(ctx, global, "NaN", JSValue::Float(f64::NAN), 0);
    define_value(ctx, global, "Infinity", JSValue::Float(f64::INFINITY), 0);
    define_method(ctx, global, "parseInt", global_parse_int, 2);
    define_method(ctx, global, "parseFloat", global_parse_float, 1);
    define_method(ctx, global, "isNaN", global_is_nan, 1);
    define_method(ctx, global, "isFinite", global_is_finite, 1);

    let proto = ctx.intrinsics.array_buffer_proto;
    define_constructor(ctx, global, "ArrayBuffer", array_buffer_constructor, 1, 0, proto);
}

fn global_parse_int(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let s = ops::to_string(ctx, &arg(args, 0))?.to_string_lossy();
    let radix = ops::to_int32(ops::to_number(ctx, &arg(args, 1))?);
    if radix != 0 && !(2..=36).contains(&radix) {
        return Ok(JSValue::Float(f64::NAN));
    }
    Ok(JSValue::number(dtoa::parse_int(&s, radix as u32)))
}

fn global_parse_float(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let s = ops::to_string(ctx, &arg(args, 0))?.to_string_lossy();
    Ok(JSValue::number(dtoa::parse_float(&s)))
}

fn global_is_nan(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    Ok(JSValue::Bool(ops::to_number(ctx, &arg(args, 0))?.is_nan()))
}

fn global_is_finite(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    Ok(JSValue::Bool(ops::to_number(ctx, &arg(args, 0))?.is_finite()))
}

/// `new ArrayBuffer(n)`: zero-filled bytes; `byteLength` is a virtual property
fn array_buffer_constructor(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    if !is_construct_call(ctx, this) {
        return Err(ctx.type_error("ArrayBuffer constructor requires 'new'"));
    }
    let n = ops::to_integer(ops::to_number(ctx, &arg(args, 0))?);
    if !(0.0..=MAX_ARRAY_BUFFER_LENGTH as f64).contains(&n) {
        return Err(ctx.range_error("invalid array buffer length"));
    }
    let r = ctx.alloc(JSObject::new(
        ObjectClass::ArrayBuffer(vec![0; n as usize]),
        Some(ctx.intrinsics.array_buffer_proto),
    ))?;
    Ok(JSValue::Object(r))
}

#[cfg(test)]
mod tests {
    use crate::engine::{JSContext, JSRuntime};
    use crate::parser;
    use crate::value::JSValue;
    use crate::vm;

    fn eval(src: &str) -> JSValue {
        let rt = JSRuntime::new();
        let ctx = JSContext::new(&rt);
        let f = parser::compile(&ctx, src, "<test>", false).unwrap();
        vm::run_function(&ctx, f, JSValue::Object(ctx.global_object())).unwrap()
    }

    #[test]
    fn test_parse_functions() {
        assert_eq!(eval("parseInt('42px') + parseInt('ff', 16) + parseInt('0x10')").as_number(), Some(313.0));
        assert_eq!(eval("parseFloat('3.5e1abc')").as_number(), Some(35.0));
        assert!(matches!(eval("isNaN(parseInt('abc'))"), JSValue::Bool(true)));
    }

    #[test]
    fn test_is_finite() {
        assert!(matches!(
            eval("isFinite('12') && !isFinite(Infinity) && !isFinite(NaN)"),
            JSValue::Bool(true)
        ));
    }

    #[test]
    fn test_globals_are_hidden() {
        // only the script's own `n` and `k`
        assert_eq!(eval("var n = 0; for (var k in globalThis) n++; n").as_number(), Some(2.0));
    }

    #[test]
    fn test_array_buffer() {
        assert_eq!(eval("new ArrayBuffer(16).byteLength").as_number(), Some(16.0));
        assert!(matches!(
            eval("try { ArrayBuffer(1) } catch (e) { e instanceof TypeError }"),
            JSValue::Bool(true)
        ));
    }
}
