//! Number and Boolean

use num_traits::ToPrimitive;

use super::{arg, define_constructor, define_method, define_value, is_construct_call};
use crate::engine::{JSContext, JSResult};
use crate::gc::GcRef;
use crate::object::{JSObject, ObjectClass};
use crate::util::dtoa::{number_to_string, number_to_string_radix, to_fixed};
use crate::value::JSValue;
use crate::vm::ops;

pub fn install(ctx: &JSContext, global: GcRef) {
    let proto = ctx.intrinsics.number_proto;
    let ctor = define_constructor(ctx, global, "Number", number_constructor, 1, 0, proto);
    define_method(ctx, ctor, "isInteger", number_is_integer, 1);
    for (name, value) in [
        ("MAX_SAFE_INTEGER", 9_007_199_254_740_991.0),
        ("MIN_SAFE_INTEGER", -9_007_199_254_740_991.0),
        ("EPSILON", f64::EPSILON),
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", 5e-324),
        ("NaN", f64::NAN),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
    ] {
        define_value(ctx, ctor, name, JSValue::number(value), 0);
    }
    define_method(ctx, proto, "toString", number_to_string_method, 1);
    define_method(ctx, proto, "toFixed", number_to_fixed, 1);
    define_method(ctx, proto, "valueOf", number_value_of, 0);

    let proto = ctx.intrinsics.boolean_proto;
    define_constructor(ctx, global, "Boolean", boolean_constructor, 1, 0, proto);
    define_method(ctx, proto, "toString", boolean_to_string, 0);
    define_method(ctx, proto, "valueOf", boolean_value_of, 0);
}

/// Box a primitive for `new Number(..)` / `new Boolean(..)`
fn wrap(ctx: &JSContext, v: JSValue, proto: GcRef) -> JSResult<JSValue> {
    let r = ctx.alloc(JSObject::new(ObjectClass::Primitive(v), Some(proto)))?;
    Ok(JSValue::Object(r))
}

/// Primitive inside `this`, which may be a wrapper object
fn this_primitive(ctx: &JSContext, this: &JSValue) -> JSValue {
    match this {
        JSValue::Object(r) => ctx.with_object(*r, |o| match &o.class {
            ObjectClass::Primitive(v) => v.clone(),
            _ => JSValue::Undefined,
        }),
        v => v.clone(),
    }
}

fn this_number(ctx: &JSContext, this: &JSValue) -> JSResult<f64> {
    this_primitive(ctx, this)
        .as_number()
        .ok_or_else(|| ctx.type_error("not a number"))
}

fn number_constructor(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let n = match args.first() {
        None => 0.0,
        Some(v) => match ops::to_numeric(ctx, v)? {
            ops::Numeric::Number(n) => n,
            ops::Numeric::BigInt(n) => n.to_f64().unwrap_or(f64::NAN),
            ops::Numeric::BigDecimal(n) => n.to_f64().unwrap_or(f64::NAN),
        },
    };
    if is_construct_call(ctx, this) {
        return wrap(ctx, JSValue::number(n), ctx.intrinsics.number_proto);
    }
    Ok(JSValue::number(n))
}

fn number_is_integer(_ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let yes = arg(args, 0)
        .as_number()
        .is_some_and(|n| n.is_finite() && n.trunc() == n);
    Ok(JSValue::Bool(yes))
}

fn number_to_string_method(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let x = this_number(ctx, this)?;
    let radix = match arg(args, 0) {
        JSValue::Undefined => 10.0,
        v => ops::to_integer(ops::to_number(ctx, &v)?),
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(ctx.range_error("radix must be between 2 and 36"));
    }
    let s = if radix == 10.0 {
        number_to_string(x)
    } else {
        number_to_string_radix(x, radix as u32)
    };
    Ok(JSValue::string(&s))
}

fn number_to_fixed(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let x = this_number(ctx, this)?;
    let digits = ops::to_integer(ops::to_number(ctx, &arg(args, 0))?);
    if !(0.0..=100.0).contains(&digits) {
        return Err(ctx.range_error("toFixed() digits argument must be between 0 and 100"));
    }
    Ok(JSValue::string(&to_fixed(x, digits as usize)))
}

fn number_value_of(ctx: &JSContext, this: &JSValue, _args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    this_number(ctx, this).map(JSValue::number)
}

fn boolean_constructor(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let b = JSValue::Bool(ops::to_boolean(&arg(args, 0)));
    if is_construct_call(ctx, this) {
        return wrap(ctx, b, ctx.intrinsics.boolean_proto);
    }
    Ok(b)
}

fn this_boolean(ctx: &JSContext, this: &JSValue) -> JSResult<bool> {
    match this_primitive(ctx, this) {
        JSValue::Bool(b) => Ok(b),
        _ => Err(ctx.type_error("not a boolean")),
    }
}

fn boolean_to_string(ctx: &JSContext, this: &JSValue, _args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let b = this_boolean(ctx, this)?;
    Ok(JSValue::string(if b { "true" } else { "false" }))
}

fn boolean_value_of(ctx: &JSContext, this: &JSValue, _args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    this_boolean(ctx, this).map(JSValue::Bool)
}

#[cfg(test)]
mod tests {
    use crate::engine::{JSContext, JSRuntime};
    use crate::parser;
    use crate::value::JSValue;
    use crate::vm;

    fn eval_string(src: &str) -> String {
        let rt = JSRuntime::new();
        let ctx = JSContext::new(&rt);
        let f = parser::compile(&ctx, src, "<test>", false).unwrap();
        let v = vm::run_function(&ctx, f, JSValue::Object(ctx.global_object())).unwrap();
        v.as_string().expect("string result").to_string_lossy()
    }

    #[test]
    fn test_to_string_radix() {
        assert_eq!(eval_string("(255).toString(16) + ' ' + (5).toString(2) + ' ' + (-1.5).toString()"), "ff 101 -1.5");
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(eval_string("(3.14159).toFixed(2) + ' ' + (1).toFixed(1)"), "3.14 1.0");
    }

    #[test]
    fn test_is_integer_and_constants() {
        assert_eq!(
            eval_string("'' + Number.isInteger(5) + Number.isInteger(5.5) + Number.isInteger('5') + (Number.MAX_SAFE_INTEGER === 9007199254740991)"),
            "truefalsefalsetrue"
        );
    }

    #[test]
    fn test_conversions() {
        assert_eq!(eval_string("'' + Number('0x10') + Number(' 12 ') + Number(12n) + Boolean('') + Boolean('x')"), "161212falsetrue");
    }

    #[test]
    fn test_wrappers() {
        assert_eq!(eval_string("typeof new Number(1) + ' ' + (new Boolean(false)).toString() + ' ' + (new Number(7) + 1)"), "object false 8");
    }
}
