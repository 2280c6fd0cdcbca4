//! Function constructor and Function.prototype

use super::{arg, define_constructor, define_method};
use crate::engine::{ErrorKind, JSContext, JSResult};
use crate::gc::GcRef;
use crate::object::{JSString, ObjectClass, atoms};
use crate::parser;
use crate::value::JSValue;
use crate::vm::{self, ops};

pub fn install(ctx: &JSContext, global: GcRef) {
    let proto = ctx.intrinsics.function_proto;
    define_constructor(ctx, global, "Function", function_constructor, 1, 0, proto);
    define_method(ctx, proto, "call", function_call, 1);
    define_method(ctx, proto, "apply", function_apply, 2);
    define_method(ctx, proto, "toString", function_to_string, 0);
}

/// `Function.prototype` is itself callable and returns undefined
pub fn function_proto_call_empty(
    _ctx: &JSContext,
    _this: &JSValue,
    _args: &[JSValue],
    _magic: i32,
) -> JSResult<JSValue> {
    Ok(JSValue::Undefined)
}

/// `Function(p1, ..., body)` compiles a function in the global scope
fn function_constructor(ctx: &JSContext, _this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let mut params = Vec::new();
    let mut body = String::new();
    if let Some((last, rest)) = args.split_last() {
        for p in rest {
            params.push(ops::to_string(ctx, p)?.to_string_lossy());
        }
        body = ops::to_string(ctx, last)?.to_string_lossy();
    }
    let source = format!("(function anonymous({}\n) {{\n{}\n}})", params.join(","), body);
    let func = parser::compile(ctx, &source, "<function>", false)
        .map_err(|e| ctx.throw_error(ErrorKind::SyntaxError, &e.message))?;
    vm::run_function(ctx, func, JSValue::Object(ctx.global_object()))
}

fn function_call(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let rest = if args.is_empty() { &[][..] } else { &args[1..] };
    vm::call(ctx, this, &arg(args, 0), rest)
}

fn function_apply(ctx: &JSContext, this: &JSValue, args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let list = match arg(args, 1) {
        JSValue::Undefined | JSValue::Null => Vec::new(),
        JSValue::Object(r) => ctx
            .with_object(r, |o| match &o.class {
                ObjectClass::Array(items) => Some(items.clone()),
                _ => None,
            })
            .ok_or_else(|| ctx.type_error("apply: argument list must be an array"))?,
        _ => return Err(ctx.type_error("apply: argument list must be an array")),
    };
    vm::call(ctx, this, &arg(args, 0), &list)
}

fn function_to_string(ctx: &JSContext, this: &JSValue, _args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let JSValue::Object(r) = this else {
        return Err(ctx.type_error("not a function"));
    };
    let body = ctx.with_object(*r, |o| match &o.class {
        ObjectClass::Closure(_) => Some("[bytecode]"),
        ObjectClass::Native(_) | ObjectClass::Host(_) => Some("[native code]"),
        _ => None,
    });
    let Some(body) = body else {
        return Err(ctx.type_error("not a function"));
    };
    let name = match ctx.get_property(*r, atoms::NAME) {
        JSValue::String(s) => s,
        _ => JSString::empty(),
    };
    Ok(JSValue::string(&format!(
        "function {}() {{\n    {}\n}}",
        name.to_string_lossy(),
        body
    )))
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
    fn test_call_and_apply() {
        let v = eval(
            "function f(a, b) { return this.x + a + b; }\n\
             var o = { x: 1 };\n\
             f.call(o, 2, 3) * 10 + f.apply(o, [4, 5]);",
        );
        assert_eq!(v.as_number(), Some(70.0));
    }

    #[test]
    fn test_function_constructor() {
        let v = eval("var add = Function('a', 'b', 'return a + b'); add(2, 3);");
        assert_eq!(v.as_number(), Some(5.0));
    }

    #[test]
    fn test_to_string() {
        let v = eval("Math.max.toString()");
        assert_eq!(
            v.as_string().map(|s| s.to_string_lossy()).as_deref(),
            Some("function max() {\n    [native code]\n}")
        );
    }
}
