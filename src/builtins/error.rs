//! Error constructors
//!
//! One native serves all eight classes; `magic` is the `ErrorKind` index.

use super::{arg, define_constructor, define_method, define_value};
use crate::engine::{ErrorKind, JSContext, JSResult};
use crate::gc::GcRef;
use crate::object::{HIDDEN_FLAGS, JSString, atoms};
use crate::value::JSValue;
use crate::vm::ops;

pub fn install(ctx: &JSContext, global: GcRef) {
    for kind in ErrorKind::ALL {
        let proto = ctx.intrinsics.error_protos[kind.index()];
        define_constructor(ctx, global, kind.name(), error_constructor, 1, kind.index() as i32, proto);
        define_value(ctx, proto, "name", JSValue::string(kind.name()), HIDDEN_FLAGS);
        define_value(ctx, proto, "message", JSValue::String(JSString::empty()), HIDDEN_FLAGS);
    }
    define_method(ctx, ctx.intrinsics.error_protos[0], "toString", error_to_string, 0);
}

fn error_constructor(ctx: &JSContext, _this: &JSValue, args: &[JSValue], magic: i32) -> JSResult<JSValue> {
    let kind = ErrorKind::from_index(magic as usize).unwrap_or(ErrorKind::Error);
    let message = match arg(args, 0) {
        JSValue::Undefined => JSString::empty(),
        v => ops::to_string(ctx, &v)?,
    };
    Ok(JSValue::Object(ctx.new_error(kind, message)))
}

fn error_to_string(ctx: &JSContext, this: &JSValue, _args: &[JSValue], _magic: i32) -> JSResult<JSValue> {
    let JSValue::Object(r) = this else {
        return Err(ctx.type_error("Error.prototype.toString called on a non-object"));
    };
    let name = match ctx.get_property(*r, atoms::NAME) {
        JSValue::Undefined => JSString::from_str("Error"),
        v => ops::to_string(ctx, &v)?,
    };
    let message = match ctx.get_property(*r, atoms::MESSAGE) {
        JSValue::Undefined => JSString::empty(),
        v => ops::to_string(ctx, &v)?,
    };
    let s = if name.is_empty() {
        message
    } else if message.is_empty() {
        name
    } else {
        name.concat(&JSString::from_str(": ")).concat(&message)
    };
    Ok(JSValue::String(s))
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
    fn test_to_string() {
        assert_eq!(eval_string("String(new TypeError('bad')) + '|' + String(Error())"), "TypeError: bad|Error");
    }

    #[test]
    fn test_instanceof_chain() {
        assert_eq!(
            eval_string("var e = new RangeError('r'); '' + (e instanceof RangeError) + (e instanceof Error) + (e instanceof TypeError)"),
            "truetruefalse"
        );
    }

    #[test]
    fn test_stack_is_captured() {
        let stack = eval_string("function where() {\n  return new Error('x').stack;\n}\nwhere()");
        assert!(stack.starts_with("    at where (<test>:2)\n"), "{stack}");
        assert!(stack.contains("at <anonymous> (<test>:4)"), "{stack}");
    }

    #[test]
    fn test_engine_errors_are_catchable() {
        assert_eq!(eval_string("try { null.x } catch (e) { e.name + ' ' + (e instanceof TypeError) }"), "TypeError true");
    }
}
