//! Abstract operations
//!
//! Type conversions, operators and equality as the interpreter and the
//! builtins need them. Anything that may run user code (`valueOf`,
//! `toString`) takes the context and returns a `JSResult`.

use std::rc::Rc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, One, Signed, ToPrimitive, Zero};

use super::interpreter;
use crate::engine::{JSContext, JSResult};
use crate::gc::GcRef;
use crate::object::string::MAX_INDEX;
use crate::object::{JSAtom, JSObject, JSString, ObjectClass, atoms};
use crate::util::dtoa::{number_to_string, string_to_number};
use crate::value::JSValue;

/// Preferred type for ToPrimitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Default,
    Number,
    String,
}

/// Result of ToNumeric
pub enum Numeric {
    Number(f64),
    BigInt(Rc<BigInt>),
    BigDecimal(Rc<BigDecimal>),
}

/// Binary operators other than `+` and comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Shl,
    Sar,
    Shr,
    And,
    Or,
    Xor,
}

/// Relational operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Lte,
    Gt,
    Gte,
}

pub fn to_boolean(v: &JSValue) -> bool {
    match v {
        JSValue::Undefined | JSValue::Null | JSValue::Exception | JSValue::Uninitialized => false,
        JSValue::Bool(b) => *b,
        JSValue::Int(i) => *i != 0,
        JSValue::Float(f) => !(f.is_nan() || *f == 0.0),
        JSValue::String(s) => !s.is_empty(),
        JSValue::BigInt(n) => !n.is_zero(),
        JSValue::BigDecimal(n) => !n.is_zero(),
        JSValue::Object(_) => true,
    }
}

pub fn to_primitive(ctx: &JSContext, v: &JSValue, hint: Hint) -> JSResult<JSValue> {
    let JSValue::Object(r) = v else {
        return Ok(v.clone());
    };
    let order = if hint == Hint::String {
        [atoms::TO_STRING, atoms::VALUE_OF]
    } else {
        [atoms::VALUE_OF, atoms::TO_STRING]
    };
    for atom in order {
        let method = ctx.get_property(*r, atom);
        if ctx.is_function(&method) {
            let result = interpreter::call(ctx, &method, v, &[])?;
            if !result.is_object() {
                return Ok(result);
            }
        }
    }
    Err(ctx.type_error("cannot convert object to primitive value"))
}

pub fn to_number(ctx: &JSContext, v: &JSValue) -> JSResult<f64> {
    Ok(match v {
        JSValue::Undefined | JSValue::Exception | JSValue::Uninitialized => f64::NAN,
        JSValue::Null => 0.0,
        JSValue::Bool(b) => *b as i32 as f64,
        JSValue::Int(i) => *i as f64,
        JSValue::Float(f) => *f,
        JSValue::String(s) => string_to_number(&s.to_string_lossy()),
        JSValue::BigInt(_) | JSValue::BigDecimal(_) => {
            return Err(ctx.type_error("cannot convert a big number to a number"));
        }
        JSValue::Object(_) => {
            let prim = to_primitive(ctx, v, Hint::Number)?;
            return to_number(ctx, &prim);
        }
    })
}

pub fn to_numeric(ctx: &JSContext, v: &JSValue) -> JSResult<Numeric> {
    let prim = to_primitive(ctx, v, Hint::Number)?;
    Ok(match prim {
        JSValue::BigInt(n) => Numeric::BigInt(n),
        JSValue::BigDecimal(n) => Numeric::BigDecimal(n),
        other => Numeric::Number(to_number(ctx, &other)?),
    })
}

/// Render a big decimal without exponent notation
pub fn format_big_decimal(d: &BigDecimal) -> String {
    let (digits, scale) = d.normalized().as_bigint_and_exponent();
    let negative = digits.is_negative();
    let mut text = digits.abs().to_string();
    if scale <= 0 {
        if !digits.is_zero() {
            text.extend(std::iter::repeat_n('0', (-scale) as usize));
        }
    } else {
        let scale = scale as usize;
        if text.len() <= scale {
            let pad = "0".repeat(scale - text.len() + 1);
            text.insert_str(0, &pad);
        }
        text.insert(text.len() - scale, '.');
    }
    if negative {
        text.insert(0, '-');
    }
    text
}

pub fn to_string(ctx: &JSContext, v: &JSValue) -> JSResult<JSString> {
    Ok(match v {
        JSValue::Undefined | JSValue::Uninitialized => JSString::from_str("undefined"),
        JSValue::Null => JSString::from_str("null"),
        JSValue::Exception => JSString::from_str("[exception]"),
        JSValue::Bool(b) => JSString::from_str(if *b { "true" } else { "false" }),
        JSValue::Int(i) => JSString::from_str(&i.to_string()),
        JSValue::Float(f) => JSString::from_str(&number_to_string(*f)),
        JSValue::String(s) => s.clone(),
        JSValue::BigInt(n) => JSString::from_str(&n.to_string()),
        JSValue::BigDecimal(n) => JSString::from_str(&format_big_decimal(n)),
        JSValue::Object(_) => {
            let prim = to_primitive(ctx, v, Hint::String)?;
            return to_string(ctx, &prim);
        }
    })
}

/// ToInt32 on an already converted number
pub fn to_int32(f: f64) -> i32 {
    to_uint32(f) as i32
}

/// ToUint32 on an already converted number
pub fn to_uint32(f: f64) -> u32 {
    if !f.is_finite() {
        return 0;
    }
    f.trunc().rem_euclid(4_294_967_296.0) as u32
}

/// ToIntegerOrInfinity on an already converted number
pub fn to_integer(f: f64) -> f64 {
    if f.is_nan() { 0.0 } else { f.trunc() + 0.0 }
}

/// Convert to an object, boxing primitives
pub fn to_object(ctx: &JSContext, v: &JSValue) -> JSResult<GcRef> {
    match v {
        JSValue::Object(r) => Ok(*r),
        JSValue::Undefined | JSValue::Null => Err(ctx.type_error(&format!(
            "cannot convert {} to object",
            if v.is_null() { "null" } else { "undefined" }
        ))),
        other => {
            let proto = ctx.primitive_proto(other);
            ctx.alloc(JSObject::new(ObjectClass::Primitive(other.clone()), proto))
        }
    }
}

/// ToPropertyKey, interning the result
pub fn to_property_key(ctx: &JSContext, v: &JSValue) -> JSResult<JSAtom> {
    match v {
        JSValue::Int(i) if *i >= 0 && *i as u32 <= MAX_INDEX => Ok(JSAtom::from_index(*i as u32)),
        JSValue::String(s) => Ok(ctx.atom_js(s)),
        other => {
            let s = to_string(ctx, other)?;
            Ok(ctx.atom_js(&s))
        }
    }
}

pub fn type_of(ctx: &JSContext, v: &JSValue) -> &'static str {
    match v {
        JSValue::Undefined | JSValue::Uninitialized | JSValue::Exception => "undefined",
        JSValue::Null => "object",
        JSValue::Bool(_) => "boolean",
        JSValue::Int(_) | JSValue::Float(_) => "number",
        JSValue::String(_) => "string",
        JSValue::BigInt(_) => "bigint",
        JSValue::BigDecimal(_) => "bigdecimal",
        JSValue::Object(_) => {
            if ctx.is_function(v) {
                "function"
            } else {
                "object"
            }
        }
    }
}

pub fn strict_equals(a: &JSValue, b: &JSValue) -> bool {
    match (a, b) {
        (JSValue::Undefined, JSValue::Undefined) | (JSValue::Null, JSValue::Null) => true,
        (JSValue::Bool(x), JSValue::Bool(y)) => x == y,
        (JSValue::Int(x), JSValue::Int(y)) => x == y,
        (JSValue::String(x), JSValue::String(y)) => x == y,
        (JSValue::BigInt(x), JSValue::BigInt(y)) => x == y,
        (JSValue::BigDecimal(x), JSValue::BigDecimal(y)) => x == y,
        (JSValue::Object(x), JSValue::Object(y)) => x == y,
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn bigint_equals_number(n: &BigInt, f: f64) -> bool {
    f.fract() == 0.0 && BigInt::from_f64(f).is_some_and(|g| &g == n)
}

fn bigdecimal_equals_number(n: &BigDecimal, f: f64) -> bool {
    BigDecimal::from_f64(f).is_some_and(|g| &g == n)
}

pub fn loose_equals(ctx: &JSContext, a: &JSValue, b: &JSValue) -> JSResult<bool> {
    use JSValue as V;
    Ok(match (a, b) {
        (V::Undefined | V::Null, V::Undefined | V::Null) => true,
        (V::Undefined | V::Null, _) | (_, V::Undefined | V::Null) => false,
        (V::Object(x), V::Object(y)) => x == y,
        (V::Bool(x), _) => {
            return loose_equals(ctx, &V::Int(*x as i32), b);
        }
        (_, V::Bool(y)) => {
            return loose_equals(ctx, a, &V::Int(*y as i32));
        }
        (V::Object(_), _) => {
            let prim = to_primitive(ctx, a, Hint::Default)?;
            return loose_equals(ctx, &prim, b);
        }
        (_, V::Object(_)) => {
            let prim = to_primitive(ctx, b, Hint::Default)?;
            return loose_equals(ctx, a, &prim);
        }
        (V::String(s), V::Int(_) | V::Float(_)) => {
            string_to_number(&s.to_string_lossy()) == to_number(ctx, b)?
        }
        (V::Int(_) | V::Float(_), V::String(s)) => {
            to_number(ctx, a)? == string_to_number(&s.to_string_lossy())
        }
        (V::BigInt(n), V::Int(_) | V::Float(_)) => bigint_equals_number(n, to_number(ctx, b)?),
        (V::Int(_) | V::Float(_), V::BigInt(n)) => bigint_equals_number(n, to_number(ctx, a)?),
        (V::BigDecimal(n), V::Int(_) | V::Float(_)) => {
            bigdecimal_equals_number(n, to_number(ctx, b)?)
        }
        (V::Int(_) | V::Float(_), V::BigDecimal(n)) => {
            bigdecimal_equals_number(n, to_number(ctx, a)?)
        }
        (V::BigInt(n), V::String(s)) | (V::String(s), V::BigInt(n)) => {
            let text = s.to_string_lossy();
            text.trim().parse::<BigInt>().is_ok_and(|m| &m == n.as_ref())
        }
        (V::BigInt(x), V::BigDecimal(y)) | (V::BigDecimal(y), V::BigInt(x)) => {
            BigDecimal::new(x.as_ref().clone(), 0) == **y
        }
        _ => strict_equals(a, b),
    })
}

fn mixed_types(ctx: &JSContext) -> crate::engine::Thrown {
    ctx.type_error("cannot mix BigInt and other types, use explicit conversions")
}

/// The `+` operator
pub fn add(ctx: &JSContext, a: &JSValue, b: &JSValue) -> JSResult<JSValue> {
    if let (JSValue::Int(x), JSValue::Int(y)) = (a, b) {
        return Ok(match x.checked_add(*y) {
            Some(r) => JSValue::Int(r),
            None => JSValue::Float(*x as f64 + *y as f64),
        });
    }
    if let (JSValue::String(x), JSValue::String(y)) = (a, b) {
        return Ok(JSValue::String(x.concat(y)));
    }
    let pa = to_primitive(ctx, a, Hint::Default)?;
    let pb = to_primitive(ctx, b, Hint::Default)?;
    if pa.is_string() || pb.is_string() {
        let sa = to_string(ctx, &pa)?;
        let sb = to_string(ctx, &pb)?;
        return Ok(JSValue::String(sa.concat(&sb)));
    }
    match (to_numeric(ctx, &pa)?, to_numeric(ctx, &pb)?) {
        (Numeric::Number(x), Numeric::Number(y)) => Ok(JSValue::number(x + y)),
        (Numeric::BigInt(x), Numeric::BigInt(y)) => Ok(JSValue::big_int(x.as_ref() + y.as_ref())),
        (Numeric::BigDecimal(x), Numeric::BigDecimal(y)) => {
            Ok(JSValue::big_decimal(x.as_ref() + y.as_ref()))
        }
        _ => Err(mixed_types(ctx)),
    }
}

/// Apply a binary operator to two numbers
pub fn number_op(op: BinOp, x: f64, y: f64) -> JSValue {
    match op {
        BinOp::Sub => JSValue::number(x - y),
        BinOp::Mul => JSValue::number(x * y),
        BinOp::Div => JSValue::number(x / y),
        BinOp::Mod => JSValue::number(x % y),
        BinOp::Pow => {
            if y.is_nan() || (x.abs() == 1.0 && y.is_infinite()) {
                JSValue::Float(f64::NAN)
            } else {
                JSValue::number(x.powf(y))
            }
        }
        BinOp::Shl => JSValue::Int(to_int32(x).wrapping_shl(to_uint32(y) & 31)),
        BinOp::Sar => JSValue::Int(to_int32(x) >> (to_uint32(y) & 31)),
        BinOp::Shr => JSValue::from_i64((to_uint32(x) >> (to_uint32(y) & 31)) as i64),
        BinOp::And => JSValue::Int(to_int32(x) & to_int32(y)),
        BinOp::Or => JSValue::Int(to_int32(x) | to_int32(y)),
        BinOp::Xor => JSValue::Int(to_int32(x) ^ to_int32(y)),
    }
}

fn bigint_op(ctx: &JSContext, op: BinOp, x: &BigInt, y: &BigInt) -> JSResult<BigInt> {
    Ok(match op {
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div | BinOp::Mod if y.is_zero() => {
            return Err(ctx.range_error("division by zero"));
        }
        BinOp::Div => x / y,
        BinOp::Mod => x % y,
        BinOp::Pow => {
            if y.is_negative() {
                return Err(ctx.range_error("negative exponent"));
            }
            let Some(e) = y.to_u32() else {
                return Err(ctx.range_error("exponent is too large"));
            };
            x.pow(e)
        }
        BinOp::Shl | BinOp::Sar => {
            let Some(shift) = y.to_i64() else {
                return Err(ctx.range_error("shift count is too large"));
            };
            let left = (op == BinOp::Shl) == (shift >= 0);
            let amount = shift.unsigned_abs() as usize;
            if left {
                if amount > 1 << 24 {
                    return Err(ctx.range_error("shift count is too large"));
                }
                x << amount
            } else {
                x >> amount
            }
        }
        BinOp::Shr => return Err(ctx.type_error("BigInts have no unsigned right shift, use >> instead")),
        BinOp::And => x & y,
        BinOp::Or => x | y,
        BinOp::Xor => x ^ y,
    })
}

fn bigdecimal_pow(ctx: &JSContext, x: &BigDecimal, y: &BigDecimal) -> JSResult<BigDecimal> {
    if !y.is_integer() {
        return Err(ctx.range_error("exponent must be an integer"));
    }
    let Some(e) = y.to_i64() else {
        return Err(ctx.range_error("exponent is too large"));
    };
    let mut base = x.clone();
    let mut n = e.unsigned_abs();
    let mut result = BigDecimal::one();
    while n > 0 {
        if n & 1 == 1 {
            result = &result * &base;
        }
        n >>= 1;
        if n > 0 {
            base = &base * &base;
        }
    }
    if e < 0 {
        if result.is_zero() {
            return Err(ctx.range_error("division by zero"));
        }
        result = BigDecimal::one() / result;
    }
    Ok(result)
}

fn bigdecimal_op(ctx: &JSContext, op: BinOp, x: &BigDecimal, y: &BigDecimal) -> JSResult<BigDecimal> {
    Ok(match op {
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div | BinOp::Mod if y.is_zero() => {
            return Err(ctx.range_error("division by zero"));
        }
        BinOp::Div => x / y,
        BinOp::Mod => x.clone() % y.clone(),
        BinOp::Pow => bigdecimal_pow(ctx, x, y)?,
        _ => return Err(ctx.type_error("invalid operation on a big decimal")),
    })
}

/// Apply a non-additive binary operator
pub fn binary_arith(ctx: &JSContext, op: BinOp, a: &JSValue, b: &JSValue) -> JSResult<JSValue> {
    if let (JSValue::Int(x), JSValue::Int(y)) = (a, b) {
        let fast = match op {
            BinOp::Sub => x.checked_sub(*y),
            BinOp::Mul => x.checked_mul(*y).filter(|&r| r != 0 || (*x >= 0 && *y >= 0)),
            _ => None,
        };
        if let Some(r) = fast {
            return Ok(JSValue::Int(r));
        }
    }
    match (to_numeric(ctx, a)?, to_numeric(ctx, b)?) {
        (Numeric::Number(x), Numeric::Number(y)) => Ok(number_op(op, x, y)),
        (Numeric::BigInt(x), Numeric::BigInt(y)) => Ok(JSValue::big_int(bigint_op(ctx, op, &x, &y)?)),
        (Numeric::BigDecimal(x), Numeric::BigDecimal(y)) => {
            Ok(JSValue::big_decimal(bigdecimal_op(ctx, op, &x, &y)?))
        }
        _ => Err(mixed_types(ctx)),
    }
}

fn apply_cmp<T: PartialOrd>(op: CmpOp, x: &T, y: &T) -> bool {
    match op {
        CmpOp::Lt => x < y,
        CmpOp::Lte => x <= y,
        CmpOp::Gt => x > y,
        CmpOp::Gte => x >= y,
    }
}

fn big_to_f64(n: &BigInt) -> f64 {
    n.to_f64().unwrap_or(if n.is_negative() { f64::NEG_INFINITY } else { f64::INFINITY })
}

/// Relational comparison
pub fn compare(ctx: &JSContext, op: CmpOp, a: &JSValue, b: &JSValue) -> JSResult<bool> {
    if let (JSValue::Int(x), JSValue::Int(y)) = (a, b) {
        return Ok(apply_cmp(op, x, y));
    }
    let pa = to_primitive(ctx, a, Hint::Number)?;
    let pb = to_primitive(ctx, b, Hint::Number)?;
    if let (JSValue::String(x), JSValue::String(y)) = (&pa, &pb) {
        return Ok(apply_cmp(op, x, y));
    }
    Ok(match (to_numeric(ctx, &pa)?, to_numeric(ctx, &pb)?) {
        (Numeric::Number(x), Numeric::Number(y)) => apply_cmp(op, &x, &y),
        (Numeric::BigInt(x), Numeric::BigInt(y)) => apply_cmp(op, x.as_ref(), y.as_ref()),
        (Numeric::BigDecimal(x), Numeric::BigDecimal(y)) => apply_cmp(op, x.as_ref(), y.as_ref()),
        (Numeric::BigInt(x), Numeric::Number(y)) => apply_cmp(op, &big_to_f64(&x), &y),
        (Numeric::Number(x), Numeric::BigInt(y)) => apply_cmp(op, &x, &big_to_f64(&y)),
        (Numeric::BigInt(x), Numeric::BigDecimal(y)) => {
            apply_cmp(op, &BigDecimal::new(x.as_ref().clone(), 0), y.as_ref())
        }
        (Numeric::BigDecimal(x), Numeric::BigInt(y)) => {
            apply_cmp(op, x.as_ref(), &BigDecimal::new(y.as_ref().clone(), 0))
        }
        (Numeric::BigDecimal(x), Numeric::Number(y)) => match BigDecimal::from_f64(y) {
            Some(y) => apply_cmp(op, x.as_ref(), &y),
            None => apply_cmp(op, &x.to_f64().unwrap_or(f64::NAN), &y),
        },
        (Numeric::Number(x), Numeric::BigDecimal(y)) => match BigDecimal::from_f64(x) {
            Some(x) => apply_cmp(op, &x, y.as_ref()),
            None => apply_cmp(op, &x, &y.to_f64().unwrap_or(f64::NAN)),
        },
    })
}

/// Unary minus
pub fn negate(ctx: &JSContext, v: &JSValue) -> JSResult<JSValue> {
    if let JSValue::Int(i) = v {
        if *i != 0 {
            if let Some(n) = i.checked_neg() {
                return Ok(JSValue::Int(n));
            }
        }
    }
    Ok(match to_numeric(ctx, v)? {
        Numeric::Number(x) => JSValue::number(-x),
        Numeric::BigInt(n) => JSValue::big_int(-n.as_ref()),
        Numeric::BigDecimal(n) => JSValue::big_decimal(-n.as_ref()),
    })
}

/// `++`/`--` on a numeric value
pub fn increment(ctx: &JSContext, v: &JSValue, delta: i32) -> JSResult<JSValue> {
    if let JSValue::Int(i) = v {
        if let Some(n) = i.checked_add(delta) {
            return Ok(JSValue::Int(n));
        }
    }
    Ok(match to_numeric(ctx, v)? {
        Numeric::Number(x) => JSValue::number(x + delta as f64),
        Numeric::BigInt(n) => JSValue::big_int(n.as_ref() + delta),
        Numeric::BigDecimal(n) => JSValue::big_decimal(n.as_ref() + BigDecimal::from(delta)),
    })
}

/// Bitwise not
pub fn bit_not(ctx: &JSContext, v: &JSValue) -> JSResult<JSValue> {
    Ok(match to_numeric(ctx, v)? {
        Numeric::Number(x) => JSValue::Int(!to_int32(x)),
        Numeric::BigInt(n) => JSValue::big_int(!n.as_ref()),
        Numeric::BigDecimal(_) => return Err(ctx.type_error("invalid operation on a big decimal")),
    })
}

/// Convert a numeric result back to a number for the old value of a postfix
/// update
pub fn to_numeric_value(ctx: &JSContext, v: &JSValue) -> JSResult<JSValue> {
    Ok(match to_numeric(ctx, v)? {
        Numeric::Number(x) => JSValue::number(x),
        Numeric::BigInt(n) => JSValue::BigInt(n),
        Numeric::BigDecimal(n) => JSValue::BigDecimal(n),
    })
}

pub fn instance_of(ctx: &JSContext, v: &JSValue, ctor: &JSValue) -> JSResult<bool> {
    if !ctx.is_function(ctor) {
        return Err(ctx.type_error("invalid 'instanceof' right operand"));
    }
    let JSValue::Object(c) = ctor else {
        return Ok(false);
    };
    let &JSValue::Object(mut obj) = v else {
        return Ok(false);
    };
    let JSValue::Object(proto) = ctx.get_property(*c, atoms::PROTOTYPE) else {
        return Err(ctx.type_error("'prototype' is not an object"));
    };
    loop {
        match ctx.with_object(obj, |o| o.proto) {
            Some(p) if p == proto => return Ok(true),
            Some(p) => obj = p,
            None => return Ok(false),
        }
    }
}

/// The `in` operator
pub fn has_in(ctx: &JSContext, key: &JSValue, obj: &JSValue) -> JSResult<bool> {
    let JSValue::Object(r) = obj else {
        return Err(ctx.type_error("invalid 'in' operand"));
    };
    let atom = to_property_key(ctx, key)?;
    Ok(ctx.has_property(*r, atom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::JSRuntime;
    use std::str::FromStr;

    fn ctx() -> Rc<JSContext> {
        JSContext::new(&JSRuntime::new())
    }

    #[test]
    fn test_to_boolean() {
        assert!(!to_boolean(&JSValue::Int(0)));
        assert!(!to_boolean(&JSValue::Float(f64::NAN)));
        assert!(!to_boolean(&JSValue::string("")));
        assert!(to_boolean(&JSValue::string("0")));
        assert!(!to_boolean(&JSValue::big_int(BigInt::zero())));
    }

    #[test]
    fn test_int32_conversions() {
        assert_eq!(to_int32(4_294_967_296.0 + 5.0), 5);
        assert_eq!(to_int32(-1.0), -1);
        assert_eq!(to_uint32(-1.0), u32::MAX);
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_int32(2_147_483_648.0), i32::MIN);
    }

    #[test]
    fn test_add_and_concat() {
        let ctx = ctx();
        assert!(matches!(add(&ctx, &JSValue::Int(1), &JSValue::Int(2)).unwrap(), JSValue::Int(3)));
        assert!(matches!(
            add(&ctx, &JSValue::Int(i32::MAX), &JSValue::Int(1)).unwrap(),
            JSValue::Float(f) if f == 2_147_483_648.0
        ));
        let s = add(&ctx, &JSValue::string("a"), &JSValue::Int(1)).unwrap();
        assert_eq!(s.as_string().unwrap().to_string_lossy(), "a1");
    }

    #[test]
    fn test_big_arith() {
        let ctx = ctx();
        let x = JSValue::big_int(BigInt::from(128));
        let y = JSValue::big_int(BigInt::from(16));
        let r = binary_arith(&ctx, BinOp::Pow, &x, &y).unwrap();
        match r {
            JSValue::BigInt(n) => assert_eq!(*n, BigInt::from(128).pow(16)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(binary_arith(&ctx, BinOp::Mul, &x, &JSValue::Int(2)).is_err());
        assert!(binary_arith(&ctx, BinOp::Div, &x, &JSValue::big_int(BigInt::zero())).is_err());
    }

    #[test]
    fn test_big_decimal_pow() {
        let ctx = ctx();
        let x = JSValue::big_decimal(BigDecimal::from(128));
        let y = JSValue::big_decimal(BigDecimal::from(12));
        match binary_arith(&ctx, BinOp::Pow, &x, &y).unwrap() {
            JSValue::BigDecimal(n) => {
                assert_eq!(*n, BigDecimal::from_str("19342813113834066795298816").unwrap())
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_format_big_decimal() {
        assert_eq!(format_big_decimal(&BigDecimal::from_str("1.50").unwrap()), "1.5");
        assert_eq!(format_big_decimal(&BigDecimal::from_str("-0.05").unwrap()), "-0.05");
        assert_eq!(format_big_decimal(&BigDecimal::from_str("1200").unwrap()), "1200");
        assert_eq!(format_big_decimal(&BigDecimal::from(0)), "0");
    }

    #[test]
    fn test_equality() {
        let ctx = ctx();
        assert!(strict_equals(&JSValue::Int(1), &JSValue::Float(1.0)));
        assert!(!strict_equals(&JSValue::Float(f64::NAN), &JSValue::Float(f64::NAN)));
        assert!(loose_equals(&ctx, &JSValue::string("1"), &JSValue::Int(1)).unwrap());
        assert!(loose_equals(&ctx, &JSValue::Null, &JSValue::Undefined).unwrap());
        assert!(!loose_equals(&ctx, &JSValue::Null, &JSValue::Int(0)).unwrap());
        assert!(loose_equals(&ctx, &JSValue::big_int(BigInt::from(2)), &JSValue::Int(2)).unwrap());
    }

    #[test]
    fn test_compare() {
        let ctx = ctx();
        assert!(compare(&ctx, CmpOp::Lt, &JSValue::Int(1), &JSValue::Float(1.5)).unwrap());
        assert!(compare(&ctx, CmpOp::Lt, &JSValue::string("a"), &JSValue::string("b")).unwrap());
        assert!(!compare(&ctx, CmpOp::Lt, &JSValue::Float(f64::NAN), &JSValue::Int(1)).unwrap());
        assert!(
            compare(&ctx, CmpOp::Gte, &JSValue::big_int(BigInt::from(5)), &JSValue::Int(5)).unwrap()
        );
    }

    #[test]
    fn test_negative_zero_product() {
        let ctx = ctx();
        let r = binary_arith(&ctx, BinOp::Mul, &JSValue::Int(-1), &JSValue::Int(0)).unwrap();
        assert!(matches!(r, JSValue::Float(f) if f == 0.0 && f.is_sign_negative()));
    }
}
