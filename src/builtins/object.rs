//! Object constructor and Object.prototype

use super::{arg, define_constructor, define_method};
use crate::engine::{JSContext, JSResult};
use crate::gc::GcRef;
use crate::object::ObjectClass;
use crate::value::JSValue;
use crate::vm::ops;

pub fn install(ctx: &JSContext, global: GcRef) {
    let proto = ctx.intrinsics.object_proto;
    let ctor = define_constructor(ctx, global, "Object", object_constructor, 1, 0, proto);
    define_method(ctx, ctor, "keys", object_keys, 1);
    define_method(ctx, ctor, "getPrototypeOf", object_get_prototype_of, 1);
    define_method(ctx, ctor, "create", object_create, 2);
    define_method(ctx, proto, "toString", object_to_string, 0);
    define_method(ctx, proto, "valueOf", object_value_of, 0);
    define_method(ctx, proto, "hasOwnProperty", object_has_own_property, 1);
}

fn object_constructor(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    match arg(args, 0) {
        JSValue::Undefined | JSValue::Null => Ok(JSValue::Object(ctx.new_object()?)),
        v => Ok(JSValue::Object(ops::to_object(ctx, &v)?)),
    }
}

fn object_keys(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let r = ops::to_object(ctx, &arg(args, 0))?;
    let keys = ctx
        .own_keys(r, true)
        .into_iter()
        .map(|atom| JSValue::String(ctx.atom_to_string(atom)))
        .collect();
    ctx.new_array(keys)
}

fn object_get_prototype_of(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let r = ops::to_object(ctx, &arg(args, 0))?;
    Ok(ctx
        .with_object(r, |o| o.proto)
        .map_or(JSValue::Null, JSValue::Object))
}

fn object_create(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let proto = match arg(args, 0) {
        JSValue::Null => None,
        JSValue::Object(p) => Some(p),
        _ => return Err(ctx.type_error("object prototype may only be an object or null")),
    };
    let r = ctx.new_object_with_proto(proto)?;
    if let JSValue::Object(props) = arg(args, 1) {
        for atom in ctx.own_keys(props, true) {
            let v = ctx.get_property(props, atom);
            ctx.set_property(r, atom, v)?;
        }
    }
    Ok(JSValue::Object(r))
}

/// Class tag used by `Object.prototype.toString`
fn class_name(ctx: &JSContext, v: &JSValue) -> &'static str {
    match v {
        JSValue::Undefined => "Undefined",
        JSValue::Null => "Null",
        JSValue::Bool(_) => "Boolean",
        JSValue::Int(_) | JSValue::Float(_) => "Number",
        JSValue::String(_) => "String",
        JSValue::Object(r) => ctx.with_object(*r, |o| match &o.class {
            ObjectClass::Array(_) => "Array",
            ObjectClass::Error => "Error",
            ObjectClass::ArrayBuffer(_) => "ArrayBuffer",
            ObjectClass::Closure(_) | ObjectClass::Native(_) | ObjectClass::Host(_) => "Function",
            ObjectClass::Primitive(p) => match p {
                JSValue::Bool(_) => "Boolean",
                JSValue::String(_) => "String",
                JSValue::Int(_) | JSValue::Float(_) => "Number",
                _ => "Object",
            },
            _ => "Object",
        }),
        _ => "Object",
    }
}

fn object_to_string(ctx: &JSContext, this: &JSValue, _args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    Ok(JSValue::string(&format!("[object {}]", class_name(ctx, this))))
}

fn object_value_of(ctx: &JSContext, this: &JSValue, _args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    Ok(JSValue::Object(ops::to_object(ctx, this)?))
}

fn object_has_own_property(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let atom = ops::to_property_key(ctx, &arg(args, 0))?;
    let r = ops::to_object(ctx, this)?;
    Ok(JSValue::Bool(ctx.has_own_property(r, atom)))
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
    fn test_keys_in_insertion_order() {
        assert_eq!(eval_string("Object.keys({ b: 1, a: 2, 0: 3 }).join()"), "0,b,a");
    }

    #[test]
    fn test_to_string_tags() {
        assert_eq!(
            eval_string("[{}, [], function () {}, null].map(function (v) { return Object.prototype.toString.call(v); }).join(' ')"),
            "[object Object] [object Array] [object Function] [object Null]"
        );
    }

    #[test]
    fn test_create_and_prototype() {
        assert_eq!(
            eval_string("var p = { greet: 'hi' }; var o = Object.create(p); (Object.getPrototypeOf(o) === p) + ' ' + o.greet + ' ' + o.hasOwnProperty('greet')"),
            "true hi false"
        );
    }
}
