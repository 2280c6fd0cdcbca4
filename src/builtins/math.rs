//! The Math object

use super::{arg, define_method, define_method_magic, define_value};
use crate::engine::{JSContext, JSResult};
use crate::gc::GcRef;
use crate::object::{HIDDEN_FLAGS, JSObject, ObjectClass};
use crate::value::JSValue;
use crate::vm::ops::{self, BinOp};

/// One-argument functions, selected by magic
const UNARY: [(&str, fn(f64) -> f64); 19] = [
    ("abs", f64::abs),
    ("floor", f64::floor),
    ("ceil", f64::ceil),
    ("round", round),
    ("trunc", f64::trunc),
    ("sign", sign),
    ("sqrt", f64::sqrt),
    ("sin", f64::sin),
    ("cos", f64::cos),
    ("tan", f64::tan),
    ("asin", f64::asin),
    ("acos", f64::acos),
    ("atan", f64::atan),
    ("exp", f64::exp),
    ("log", f64::ln),
    ("log2", f64::log2),
    ("log10", f64::log10),
    ("cbrt", f64::cbrt),
    ("fround", fround),
];

pub fn install(ctx: &JSContext, global: GcRef) {
    let math = ctx.alloc_unchecked(JSObject::new(ObjectClass::Ordinary, Some(ctx.intrinsics.object_proto)));
    for (name, value) in [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("SQRT2", std::f64::consts::SQRT_2),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
    ] {
        define_value(ctx, math, name, JSValue::Float(value), 0);
    }
    for (i, (name, _)) in UNARY.iter().enumerate() {
        define_method_magic(ctx, math, name, math_unary, 1, i as i32);
    }
    define_method(ctx, math, "atan2", math_atan2, 2);
    define_method(ctx, math, "pow", math_pow, 2);
    define_method_magic(ctx, math, "max", math_min_max, 2, 1);
    define_method_magic(ctx, math, "min", math_min_max, 2, 0);
    define_value(ctx, global, "Math", JSValue::Object(math), HIDDEN_FLAGS);
}

/// Round half up, keeping the sign of zero
fn round(x: f64) -> f64 {
    if !x.is_finite() || x.fract() == 0.0 {
        return x;
    }
    let r = (x + 0.5).floor();
    if r == 0.0 && x < 0.0 { -0.0 } else { r }
}

fn sign(x: f64) -> f64 {
    if x.is_nan() || x == 0.0 { x } else { x.signum() }
}

fn fround(x: f64) -> f64 {
    x as f32 as f64
}

fn math_unary(ctx: &JSContext, _this: &JSValue, args: &[JSValue], magic: i32) -> JSResult<JSValue> {
    let x = ops::to_number(ctx, &arg(args, 0))?;
    let f = UNARY
        .get(magic as usize)
        .map(|(_, f)| *f)
        .ok_or_else(|| ctx.internal_error("bad Math function"))?;
    Ok(JSValue::number(f(x)))
}

fn math_atan2(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let y = ops::to_number(ctx, &arg(args, 0))?;
    let x = ops::to_number(ctx, &arg(args, 1))?;
    Ok(JSValue::number(y.atan2(x)))
}

fn math_pow(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let x = ops::to_number(ctx, &arg(args, 0))?;
    let y = ops::to_number(ctx, &arg(args, 1))?;
    Ok(ops::number_op(BinOp::Pow, x, y))
}

/// magic: 1 for max, 0 for min
fn math_min_max(ctx: &JSContext, _this: &JSValue, args: &[JSValue], magic: i32) -> JSResult<JSValue> {
    let is_max = magic != 0;
    let mut acc = if is_max { f64::NEG_INFINITY } else { f64::INFINITY };
    let mut nan = false;
    for v in args {
        let x = ops::to_number(ctx, v)?;
        if x.is_nan() {
            nan = true;
        } else if (is_max && (x > acc || (x == 0.0 && acc == 0.0 && acc.is_sign_negative())))
            || (!is_max && (x < acc || (x == 0.0 && acc == 0.0 && x.is_sign_negative())))
        {
            acc = x;
        }
    }
    Ok(JSValue::number(if nan { f64::NAN } else { acc }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round() {
        assert_eq!(round(2.5), 3.0);
        assert_eq!(round(-2.5), -2.0);
        assert!(round(-0.2).is_sign_negative());
        assert_eq!(round(1e300), 1e300);
    }

    #[test]
    fn test_sign() {
        assert_eq!(sign(-3.0), -1.0);
        assert!(sign(-0.0).is_sign_negative());
        assert!(sign(f64::NAN).is_nan());
    }

    #[test]
    fn test_math_from_script() {
        use crate::engine::{JSContext, JSRuntime};
        let rt = JSRuntime::new();
        let ctx = JSContext::new(&rt);
        let f = crate::parser::compile(
            &ctx,
            "Math.max(1, 5, 3) + Math.min(4, -2) + Math.pow(2, 10) + Math.floor(Math.PI) + Math.abs(-7)",
            "<test>",
            false,
        )
        .unwrap();
        let v = crate::vm::run_function(&ctx, f, JSValue::Undefined).unwrap();
        assert_eq!(v.as_number(), Some(1037.0));
    }
}
