//! String constructor and String.prototype
//!
//! Positions and lengths are in UTF-16 code units.

use super::{arg, define_constructor, define_method, define_method_magic, is_construct_call};
use crate::engine::{JSContext, JSResult};
use crate::gc::GcRef;
use crate::object::array::relative_index;
use crate::object::{JSObject, JSString, ObjectClass};
use crate::util::unicode;
use crate::value::JSValue;
use crate::vm::ops;

pub fn install(ctx: &JSContext, global: GcRef) {
    let proto = ctx.intrinsics.string_proto;
    let ctor = define_constructor(ctx, global, "String", string_constructor, 1, 0, proto);
    define_method(ctx, ctor, "fromCharCode", string_from_char_code, 1);
    define_method(ctx, proto, "charAt", string_char_at, 1);
    define_method(ctx, proto, "charCodeAt", string_char_code_at, 1);
    define_method(ctx, proto, "codePointAt", string_code_point_at, 1);
    define_method(ctx, proto, "indexOf", string_index_of, 1);
    define_method(ctx, proto, "slice", string_slice, 2);
    define_method(ctx, proto, "substring", string_substring, 2);
    define_method_magic(ctx, proto, "toUpperCase", string_to_case, 0, 1);
    define_method_magic(ctx, proto, "toLowerCase", string_to_case, 0, 0);
    define_method(ctx, proto, "trim", string_trim, 0);
    define_method(ctx, proto, "split", string_split, 2);
    define_method(ctx, proto, "toString", string_value_of, 0);
    define_method(ctx, proto, "valueOf", string_value_of, 0);
}

/// Coerce the receiver of a generic string method
fn this_string(ctx: &JSContext, this: &JSValue) -> JSResult<JSString> {
    if this.is_nullish() {
        return Err(ctx.type_error("string method called on null or undefined"));
    }
    ops::to_string(ctx, this)
}

/// Position argument as an integer (NaN becomes 0)
fn position(ctx: &JSContext, v: &JSValue) -> JSResult<f64> {
    Ok(ops::to_integer(ops::to_number(ctx, v)?))
}

fn string_constructor(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let s = match args.first() {
        None => JSString::empty(),
        Some(v) => ops::to_string(ctx, v)?,
    };
    if is_construct_call(ctx, this) {
        let r = ctx.alloc(JSObject::new(
            ObjectClass::Primitive(JSValue::String(s)),
            Some(ctx.intrinsics.string_proto),
        ))?;
        return Ok(JSValue::Object(r));
    }
    Ok(JSValue::String(s))
}

fn string_from_char_code(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let mut units = Vec::with_capacity(args.len());
    for v in args {
        units.push(ops::to_uint32(ops::to_number(ctx, v)?) as u16);
    }
    Ok(JSValue::String(JSString::from_units(units)))
}

fn string_char_at(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let s = this_string(ctx, this)?;
    let pos = position(ctx, &arg(args, 0))?;
    if pos < 0.0 || pos >= s.len() as f64 {
        return Ok(JSValue::String(JSString::empty()));
    }
    let i = pos as usize;
    Ok(JSValue::String(s.slice(i, i + 1)))
}

fn string_char_code_at(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let s = this_string(ctx, this)?;
    let pos = position(ctx, &arg(args, 0))?;
    if pos < 0.0 || pos >= s.len() as f64 {
        return Ok(JSValue::Float(f64::NAN));
    }
    Ok(JSValue::Int(s.units()[pos as usize] as i32))
}

fn string_code_point_at(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let s = this_string(ctx, this)?;
    let pos = position(ctx, &arg(args, 0))?;
    if pos < 0.0 {
        return Ok(JSValue::Undefined);
    }
    Ok(s
        .code_point_at(pos as usize)
        .map_or(JSValue::Undefined, |c| JSValue::Int(c as i32)))
}

fn string_index_of(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let s = this_string(ctx, this)?;
    let needle = ops::to_string(ctx, &arg(args, 0))?;
    let from = position(ctx, &arg(args, 1))?.clamp(0.0, s.len() as f64) as usize;
    Ok(JSValue::from_i64(s.index_of(&needle, from).map_or(-1, |i| i as i64)))
}

fn string_slice(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let s = this_string(ctx, this)?;
    let len = s.len();
    let start = relative_index(ops::to_number(ctx, &arg(args, 0))?, len);
    let end = match arg(args, 1) {
        JSValue::Undefined => len,
        v => relative_index(ops::to_number(ctx, &v)?, len),
    };
    Ok(JSValue::String(if start < end { s.slice(start, end) } else { JSString::empty() }))
}

fn string_substring(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let s = this_string(ctx, this)?;
    let len = s.len() as f64;
    let a = position(ctx, &arg(args, 0))?.clamp(0.0, len) as usize;
    let b = match arg(args, 1) {
        JSValue::Undefined => s.len(),
        v => position(ctx, &v)?.clamp(0.0, len) as usize,
    };
    Ok(JSValue::String(s.slice(a.min(b), a.max(b))))
}

/// magic: 1 for upper case, 0 for lower case
fn string_to_case(ctx: &JSContext, this: &JSValue, _args: &[JSValue], magic: i32) -> JSResult<JSValue> {
    let s = this_string(ctx, this)?;
    Ok(JSValue::String(JSString::from_units(unicode::map_case(s.units(), magic != 0))))
}

fn string_trim(ctx: &JSContext, this: &JSValue, _args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let s = this_string(ctx, this)?;
    Ok(JSValue::String(JSString::from_units(unicode::trim(s.units()).to_vec())))
}

fn string_split(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let s = this_string(ctx, this)?;
    let limit = match arg(args, 1) {
        JSValue::Undefined => u32::MAX,
        v => ops::to_uint32(ops::to_number(ctx, &v)?),
    } as usize;
    let mut parts = Vec::new();
    if limit == 0 {
        return ctx.new_array(parts);
    }
    let sep = match arg(args, 0) {
        JSValue::Undefined => {
            parts.push(JSValue::String(s));
            return ctx.new_array(parts);
        }
        v => ops::to_string(ctx, &v)?,
    };
    if sep.is_empty() {
        parts.extend((0..s.len()).take(limit).map(|i| JSValue::String(s.slice(i, i + 1))));
        return ctx.new_array(parts);
    }
    let mut start = 0;
    while let Some(i) = s.index_of(&sep, start) {
        parts.push(JSValue::String(s.slice(start, i)));
        if parts.len() == limit {
            return ctx.new_array(parts);
        }
        start = i + sep.len();
    }
    parts.push(JSValue::String(s.slice(start, s.len())));
    ctx.new_array(parts)
}

fn string_value_of(ctx: &JSContext, this: &JSValue, _args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    match this {
        JSValue::String(_) => Ok(this.clone()),
        JSValue::Object(r) => ctx
            .with_object(*r, |o| match &o.class {
                ObjectClass::Primitive(v @ JSValue::String(_)) => Some(v.clone()),
                _ => None,
            })
            .ok_or_else(|| ctx.type_error("not a string")),
        _ => Err(ctx.type_error("not a string")),
    }
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
    fn test_char_access() {
        assert_eq!(
            eval_string("var s = 'héllo'; s.charAt(1) + s.charCodeAt(1) + s.charAt(9) + isNaN(s.charCodeAt(-1))"),
            "é233true"
        );
        assert_eq!(eval_string("'😀'.codePointAt(0) + ',' + '😀'.length"), "128512,2");
    }

    #[test]
    fn test_slice_substring() {
        assert_eq!(
            eval_string("var s = 'abcdef'; s.slice(-3) + s.slice(1, 3) + s.substring(4, 1) + s.substring(-2, 2)"),
            "defbcbcdab"
        );
    }

    #[test]
    fn test_split() {
        assert_eq!(eval_string("'a,b,,c'.split(',').join('|')"), "a|b||c");
        assert_eq!(eval_string("'abc'.split('').join('|')"), "a|b|c");
        assert_eq!(eval_string("'a-b-c'.split('-', 2).join('|')"), "a|b");
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(eval_string("'  MiXed  '.trim().toUpperCase() + 'ABC'.toLowerCase()"), "MIXEDabc");
    }

    #[test]
    fn test_wrapper_object() {
        assert_eq!(
            eval_string("var w = new String('ab'); typeof w + ' ' + w.length + ' ' + w.valueOf() + String.fromCharCode(67, 68)"),
            "object 2 abCD"
        );
    }
}
