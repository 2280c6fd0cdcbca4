//! Array constructor and Array.prototype
//!
//! Methods only accept real arrays as `this`; generic array-likes are not
//! supported.

use super::{arg, define_constructor, define_method};
use crate::engine::{JSContext, JSResult};
use crate::gc::GcRef;
use crate::object::array::{MAX_ARRAY_LENGTH, relative_index};
use crate::object::{JSAtom, JSString, ObjectClass};
use crate::value::JSValue;
use crate::vm::{self, ops};

pub fn install(ctx: &JSContext, global: GcRef) {
    let proto = ctx.intrinsics.array_proto;
    let ctor = define_constructor(ctx, global, "Array", array_constructor, 1, 0, proto);
    define_method(ctx, ctor, "isArray", array_is_array, 1);
    define_method(ctx, proto, "push", array_push, 1);
    define_method(ctx, proto, "pop", array_pop, 0);
    define_method(ctx, proto, "join", array_join, 1);
    define_method(ctx, proto, "toString", array_to_string, 0);
    define_method(ctx, proto, "indexOf", array_index_of, 1);
    define_method(ctx, proto, "slice", array_slice, 2);
    define_method(ctx, proto, "forEach", array_for_each, 1);
    define_method(ctx, proto, "map", array_map, 1);
}

fn this_array(ctx: &JSContext, this: &JSValue) -> JSResult<GcRef> {
    match this {
        JSValue::Object(r) if ctx.with_object(*r, |o| o.is_array()) => Ok(*r),
        _ => Err(ctx.type_error("not an array")),
    }
}

fn items(ctx: &JSContext, r: GcRef) -> Vec<JSValue> {
    ctx.with_object(r, |o| match &o.class {
        ObjectClass::Array(items) => items.clone(),
        _ => Vec::new(),
    })
}

fn length(ctx: &JSContext, r: GcRef) -> usize {
    ctx.with_object(r, |o| match &o.class {
        ObjectClass::Array(items) => items.len(),
        _ => 0,
    })
}

fn array_constructor(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    if let [len] = args {
        if let Some(n) = len.as_number() {
            if n < 0.0 || n.fract() != 0.0 || n > MAX_ARRAY_LENGTH as f64 {
                return Err(ctx.range_error("invalid array length"));
            }
            return ctx.new_array(vec![JSValue::Undefined; n as usize]);
        }
    }
    ctx.new_array(args.to_vec())
}

fn array_is_array(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    Ok(JSValue::Bool(ctx.is_array(&arg(args, 0))))
}

fn array_push(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let r = this_array(ctx, this)?;
    let len = ctx.with_object_mut(r, |o| match &mut o.class {
        ObjectClass::Array(items) if items.len() + args.len() <= MAX_ARRAY_LENGTH => {
            items.extend_from_slice(args);
            Some(items.len())
        }
        _ => None,
    });
    let len = len.ok_or_else(|| ctx.range_error("invalid array length"))?;
    Ok(JSValue::from_i64(len as i64))
}

fn array_pop(ctx: &JSContext, this: &JSValue, _args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let r = this_array(ctx, this)?;
    Ok(ctx
        .with_object_mut(r, |o| match &mut o.class {
            ObjectClass::Array(items) => items.pop(),
            _ => None,
        })
        .unwrap_or_default())
}

fn join(ctx: &JSContext, r: GcRef, sep: &JSString) -> JSResult<JSValue> {
    let mut out: Vec<u16> = Vec::new();
    for (i, v) in items(ctx, r).iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(sep.units());
        }
        if !v.is_nullish() {
            out.extend_from_slice(ops::to_string(ctx, v)?.units());
        }
    }
    Ok(JSValue::String(JSString::from_units(out)))
}

fn array_join(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let r = this_array(ctx, this)?;
    let sep = match arg(args, 0) {
        JSValue::Undefined => JSString::from_str(","),
        v => ops::to_string(ctx, &v)?,
    };
    join(ctx, r, &sep)
}

fn array_to_string(ctx: &JSContext, this: &JSValue, _args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let r = this_array(ctx, this)?;
    join(ctx, r, &JSString::from_str(","))
}

fn array_index_of(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let r = this_array(ctx, this)?;
    let items = items(ctx, r);
    let from = match arg(args, 1) {
        JSValue::Undefined => 0,
        v => relative_index(ops::to_number(ctx, &v)?, items.len()),
    };
    let target = arg(args, 0);
    let found = items
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, v)| ops::strict_equals(v, &target))
        .map_or(-1, |(i, _)| i as i64);
    Ok(JSValue::from_i64(found))
}

fn array_slice(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let r = this_array(ctx, this)?;
    let items = items(ctx, r);
    let start = relative_index(ops::to_number(ctx, &arg(args, 0))?, items.len());
    let end = match arg(args, 1) {
        JSValue::Undefined => items.len(),
        v => relative_index(ops::to_number(ctx, &v)?, items.len()),
    };
    let part = if start < end { items[start..end].to_vec() } else { Vec::new() };
    ctx.new_array(part)
}

/// Shared loop of `forEach` and `map`; the length is re-read every step
fn iterate(
    ctx: &JSContext,
    this: &JSValue,
    args: &[JSValue],
    mut each: impl FnMut(JSValue) -> JSResult<()>,
) -> JSResult<()> {
    let r = this_array(ctx, this)?;
    let callback = arg(args, 0);
    if !ctx.is_function(&callback) {
        return Err(ctx.type_error("callback is not a function"));
    }
    let this_arg = arg(args, 1);
    let mut i = 0;
    while i < length(ctx, r) {
        let v = ctx.get_property(r, JSAtom::from_index(i as u32));
        let result = vm::call(
            ctx,
            &callback,
            &this_arg,
            &[v, JSValue::from_i64(i as i64), this.clone()],
        )?;
        each(result)?;
        i += 1;
    }
    Ok(())
}

fn array_for_each(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    iterate(ctx, this, args, |_| Ok(()))?;
    Ok(JSValue::Undefined)
}

fn array_map(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let mut out = Vec::new();
    iterate(ctx, this, args, |v| {
        out.push(v);
        Ok(())
    })?;
    ctx.new_array(out)
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
    fn test_push_pop_join() {
        assert_eq!(
            eval_string("var a = [1, 2]; a.push(3, 4); var p = a.pop(); a.join('-') + ' ' + p + ' ' + a.length"),
            "1-2-3 4 3"
        );
    }

    #[test]
    fn test_join_skips_nullish() {
        assert_eq!(eval_string("[1, null, undefined, 'x'].toString()"), "1,,,x");
    }

    #[test]
    fn test_slice_and_index_of() {
        assert_eq!(
            eval_string("var a = [5, 6, 7, 8]; a.slice(1, -1).join() + ' ' + a.indexOf(7) + ' ' + a.indexOf('7')"),
            "6,7 2 -1"
        );
    }

    #[test]
    fn test_map_and_for_each() {
        assert_eq!(
            eval_string("var s = 0; [1, 2, 3].forEach(function (x) { s += x; }); [1, 2, 3].map(function (x, i) { return x * i; }).join() + ' ' + s"),
            "0,2,6 6"
        );
    }

    #[test]
    fn test_constructor_length() {
        assert_eq!(eval_string("Array(3).length + ',' + Array(1, 2).join('') + ',' + Array.isArray([])"), "3,12,true");
    }
}
