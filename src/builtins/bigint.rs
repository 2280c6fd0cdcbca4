//! BigInt and BigDecimal
//!
//! Both are conversion functions rather than constructors: `new BigInt(1)`
//! is a TypeError.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Num};

use super::{arg, define_method, link_prototype};
use crate::engine::{ErrorKind, JSContext, JSResult};
use crate::gc::GcRef;
use crate::object::ObjectClass;
use crate::util::unicode;
use crate::value::JSValue;
use crate::vm::ops;

pub fn install(ctx: &JSContext, global: GcRef) {
    let proto = ctx.intrinsics.bigint_proto;
    let f = ctx.new_native_function("BigInt", bigint_function, 1, 0, false);
    link_prototype(ctx, global, "BigInt", f, proto);
    define_method(ctx, proto, "toString", bigint_to_string, 0);
    define_method(ctx, proto, "valueOf", bigint_value_of, 0);

    let proto = ctx.intrinsics.bigdecimal_proto;
    let f = ctx.new_native_function("BigDecimal", bigdecimal_function, 1, 0, false);
    link_prototype(ctx, global, "BigDecimal", f, proto);
    define_method(ctx, proto, "toString", bigdecimal_to_string, 0);
    define_method(ctx, proto, "valueOf", bigdecimal_value_of, 0);
}

fn parse_bigint(text: &str) -> Option<BigInt> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let trimmed = String::from_utf16_lossy(unicode::trim(&units));
    if trimmed.is_empty() {
        return Some(BigInt::from(0));
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return BigInt::from_str_radix(rest, radix).ok();
        }
    }
    BigInt::from_str(&trimmed).ok()
}

fn bigint_function(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let v = ops::to_primitive(ctx, &arg(args, 0), ops::Hint::Number)?;
    let n = match &v {
        JSValue::BigInt(n) => return Ok(JSValue::BigInt(n.clone())),
        JSValue::Bool(b) => BigInt::from(*b as i32),
        JSValue::Int(i) => BigInt::from(*i),
        JSValue::Float(f) => {
            if f.fract() != 0.0 || !f.is_finite() {
                return Err(ctx.range_error("cannot convert a non-integer number to a BigInt"));
            }
            BigInt::from_f64(*f).ok_or_else(|| ctx.range_error("invalid BigInt"))?
        }
        JSValue::String(s) => parse_bigint(&s.to_string_lossy())
            .ok_or_else(|| ctx.throw_error(ErrorKind::SyntaxError, "invalid BigInt syntax"))?,
        JSValue::BigDecimal(d) if d.is_integer() => d.with_scale(0).into_bigint_and_exponent().0,
        _ => return Err(ctx.type_error("cannot convert to BigInt")),
    };
    Ok(JSValue::big_int(n))
}

fn this_bigint(ctx: &JSContext, this: &JSValue) -> JSResult<JSValue> {
    let v = match this {
        JSValue::Object(r) => ctx.with_object(*r, |o| match &o.class {
            ObjectClass::Primitive(v) => v.clone(),
            _ => JSValue::Undefined,
        }),
        v => v.clone(),
    };
    match v {
        JSValue::BigInt(_) => Ok(v),
        _ => Err(ctx.type_error("not a BigInt")),
    }
}

fn bigint_to_string(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let JSValue::BigInt(n) = this_bigint(ctx, this)? else {
        return Err(ctx.type_error("not a BigInt"));
    };
    let radix = match arg(args, 0) {
        JSValue::Undefined => 10.0,
        v => ops::to_integer(ops::to_number(ctx, &v)?),
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(ctx.range_error("radix must be between 2 and 36"));
    }
    Ok(JSValue::string(&n.to_str_radix(radix as u32)))
}

fn bigint_value_of(ctx: &JSContext, this: &JSValue, _args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    this_bigint(ctx, this)
}

fn bigdecimal_function(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let v = ops::to_primitive(ctx, &arg(args, 0), ops::Hint::Number)?;
    let d = match &v {
        JSValue::BigDecimal(d) => return Ok(JSValue::BigDecimal(d.clone())),
        JSValue::BigInt(n) => BigDecimal::new(n.as_ref().clone(), 0),
        JSValue::Bool(b) => BigDecimal::from(*b as i32),
        JSValue::Int(i) => BigDecimal::from(*i),
        JSValue::Float(f) => BigDecimal::from_f64(*f)
            .ok_or_else(|| ctx.range_error("cannot convert a non-finite number to a BigDecimal"))?,
        JSValue::String(s) => BigDecimal::from_str(s.to_string_lossy().trim())
            .map_err(|_| ctx.throw_error(ErrorKind::SyntaxError, "invalid BigDecimal syntax"))?,
        _ => return Err(ctx.type_error("cannot convert to BigDecimal")),
    };
    Ok(JSValue::big_decimal(d))
}

fn this_bigdecimal(ctx: &JSContext, this: &JSValue) -> JSResult<JSValue> {
    let v = match this {
        JSValue::Object(r) => ctx.with_object(*r, |o| match &o.class {
            ObjectClass::Primitive(v) => v.clone(),
            _ => JSValue::Undefined,
        }),
        v => v.clone(),
    };
    match v {
        JSValue::BigDecimal(_) => Ok(v),
        _ => Err(ctx.type_error("not a BigDecimal")),
    }
}

fn bigdecimal_to_string(ctx: &JSContext, this: &JSValue, _args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let JSValue::BigDecimal(d) = this_bigdecimal(ctx, this)? else {
        return Err(ctx.type_error("not a BigDecimal"));
    };
    Ok(JSValue::string(&ops::format_big_decimal(&d)))
}

fn bigdecimal_value_of(ctx: &JSContext, this: &JSValue, _args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    this_bigdecimal(ctx, this)
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
    fn test_bigint_to_string_radix() {
        assert_eq!(eval_string("(255n).toString(16) + ' ' + (2n ** 64n).toString()"), "ff 18446744073709551616");
    }

    #[test]
    fn test_bigint_conversion() {
        assert_eq!(eval_string("'' + BigInt(42) + BigInt('0x10') + typeof BigInt(true)"), "4216bigint");
        assert_eq!(eval_string("try { BigInt(1.5); 'no' } catch (e) { e.name }"), "RangeError");
        assert_eq!(eval_string("try { new BigInt(1); 'no' } catch (e) { e.name }"), "TypeError");
    }

    #[test]
    fn test_bigdecimal() {
        assert_eq!(eval_string("BigDecimal('1.25').toString() + ' ' + typeof 1.5l"), "1.25 bigdecimal");
    }
}
