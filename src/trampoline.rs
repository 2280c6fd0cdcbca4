//! Host functions callable from JavaScript
//!
//! [`Context::function`] wraps a Rust closure in an engine function object.
//! When script code calls it, the trampoline roots `this` and the arguments
//! as Values for the duration of the call, runs the closure, and hands its
//! result back to the engine. A closure raises by returning the marker from
//! [`Context::throw`] or [`Context::throw_error`].
//!
//! Nothing here is shared between calls, so a closure may evaluate code or
//! call other host functions on the same context.

use std::rc::Rc;

use log::trace;

use crate::context::Context;
use crate::engine::{JSContext, JSResult, Thrown};
use crate::error::Result;
use crate::handle::Value;
use crate::object::HostCallback;
use crate::value::JSValue;

/// Host closure signature
pub type HostFn = dyn Fn(&Context, &Value, &[Value]) -> Value;

struct Trampoline {
    name: String,
    func: Box<HostFn>,
}

impl HostCallback for Trampoline {
    fn call(&self, ctx: &JSContext, this: &JSValue, args: &[JSValue]) -> JSResult<JSValue> {
        trace!("enter host function '{}' ({} args)", self.name, args.len());
        let host = Context::from_inner(ctx.handle());
        let this = host.wrap(this.clone());
        let args: Vec<Value> = args.iter().map(|a| host.wrap(a.clone())).collect();

        let result = (self.func)(&host, &this, &args);
        host.check_owner(&result);
        drop(args);
        drop(this);

        let raw = result.into_raw();
        trace!("leave host function '{}'", self.name);
        if raw.is_exception() {
            let thrown = ctx.take_pending_exception().unwrap_or_else(|| {
                let Thrown(e) =
                    ctx.internal_error(&format!("host function '{}' raised without a value", self.name));
                e
            });
            return Err(Thrown(thrown));
        }
        Ok(raw)
    }
}

impl Context {
    /// Wrap `f` as a JavaScript function
    ///
    /// Arguments and `this` are valid for the duration of the call; use
    /// [`Value::dup`] to keep one. The result is taken over by the engine.
    /// Under `new`, `this` is a fresh object and a non-object result gives
    /// that object.
    ///
    /// A closure that captures a Value of its own context keeps that datum
    /// (and the context) alive for as long as the function exists.
    pub fn function<F>(&self, name: &str, f: F) -> Result<Value>
    where
        F: Fn(&Context, &Value, &[Value]) -> Value + 'static,
    {
        let callback = Rc::new(Trampoline {
            name: name.to_string(),
            func: Box::new(f),
        });
        let result = self.inner.new_host_function(name, callback, 0);
        self.wrap_result(result.map(JSValue::Object))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::{ErrorKind, EvalKind, Runtime};

    #[test]
    fn test_branch_counts() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let a = Rc::new(Cell::new(0));
        let b = Rc::new(Cell::new(0));
        let (ca, cb) = (Rc::clone(&a), Rc::clone(&b));
        let fa = ctx
            .function("A", move |ctx, _this, _args| {
                ca.set(ca.get() + 1);
                ctx.undefined()
            })
            .unwrap();
        let fb = ctx
            .function("B", move |ctx, _this, _args| {
                cb.set(cb.get() + 1);
                ctx.undefined()
            })
            .unwrap();
        ctx.set_global("A", fa).unwrap();
        ctx.set_global("B", fb).unwrap();
        ctx.eval("for (var i = 0; i < 10; i++) { if (i % 2) A(); else B(); }", EvalKind::Global)
            .unwrap();
        assert_eq!((a.get(), b.get()), (5, 5));
    }

    #[test]
    fn test_arguments_and_result() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let sum = ctx
            .function("sum", |ctx, _this, args| {
                let total: f64 = args.iter().filter_map(|a| a.as_f64().ok()).sum();
                ctx.float(total)
            })
            .unwrap();
        ctx.set_global("sum", sum).unwrap();
        let v = ctx.eval("sum(1, 2.5, 'x', 3) + typeof sum", EvalKind::Global).unwrap();
        assert_eq!(v.as_string().unwrap(), "6.5function");
        let v = ctx.eval("sum.name", EvalKind::Global).unwrap();
        assert_eq!(v.as_string().unwrap(), "sum");
    }

    #[test]
    fn test_this_binding() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let get_tag = ctx
            .function("getTag", |_ctx, this, _args| this.get("tag").unwrap())
            .unwrap();
        ctx.set_global("getTag", get_tag).unwrap();
        let v = ctx
            .eval("var o = { tag: 'mine', getTag: getTag }; o.getTag()", EvalKind::Global)
            .unwrap();
        assert_eq!(v.as_string().unwrap(), "mine");
    }

    #[test]
    fn test_reentrant_eval() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let depth = ctx
            .function("nest", |ctx, _this, args| {
                let n = args[0].as_i32().unwrap();
                if n == 0 {
                    return ctx.int(0);
                }
                let inner = ctx.eval(&format!("nest({}) + 1", n - 1), EvalKind::Global).unwrap();
                // the caller's argument is still intact after the nested call
                assert_eq!(args[0].as_i32().unwrap(), n);
                inner
            })
            .unwrap();
        ctx.set_global("nest", depth).unwrap();
        let v = ctx.eval("nest(5)", EvalKind::Global).unwrap();
        assert_eq!(v.as_i32().unwrap(), 5);
        assert_eq!(rt.memory_usage().host_roots, 0);
    }

    #[test]
    fn test_host_throw_is_catchable() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let fail = ctx
            .function("fail", |ctx, _this, _args| ctx.throw_error(ErrorKind::RangeError, "too far"))
            .unwrap();
        ctx.set_global("fail", fail).unwrap();
        let v = ctx
            .eval("try { fail() } catch (e) { e instanceof RangeError && e.message }", EvalKind::Global)
            .unwrap();
        assert_eq!(v.as_string().unwrap(), "too far");
        let err = ctx.eval("fail()", EvalKind::Global).unwrap_err();
        assert_eq!(err.cause(), "RangeError: too far");
    }

    #[test]
    fn test_raise_survives_nested_eval() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let inner = ctx
            .function("inner", |ctx, _this, _args| ctx.throw_error(ErrorKind::RangeError, "inner"))
            .unwrap();
        ctx.set_global("inner", inner).unwrap();
        let outer = ctx
            .function("outer", |ctx, _this, _args| {
                let raised = ctx.throw_error(ErrorKind::TypeError, "outer");
                assert_eq!(ctx.eval("1 + 1", EvalKind::Global).unwrap().as_i32().unwrap(), 2);
                let caught = ctx
                    .eval("try { inner() } catch (e) { e.message }", EvalKind::Global)
                    .unwrap();
                assert_eq!(caught.as_string().unwrap(), "inner");
                raised
            })
            .unwrap();
        ctx.set_global("outer", outer).unwrap();
        let err = ctx.eval("outer()", EvalKind::Global).unwrap_err();
        assert_eq!(err.cause(), "TypeError: outer");
        assert!(ctx.eval("1", EvalKind::Global).is_ok());
    }

    #[test]
    fn test_throw_any_value() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let fail = ctx
            .function("fail", |ctx, _this, _args| ctx.throw(ctx.int(7)))
            .unwrap();
        ctx.set_global("fail", fail).unwrap();
        let err = ctx.eval("fail()", EvalKind::Global).unwrap_err();
        assert_eq!(err.cause(), "7");
        assert_eq!(err.stack(), "");
    }

    #[test]
    fn test_retained_argument() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let kept = Rc::new(std::cell::RefCell::new(None));
        let slot = Rc::clone(&kept);
        let keep = ctx
            .function("keep", move |ctx, _this, args| {
                *slot.borrow_mut() = Some(args[0].dup());
                ctx.undefined()
            })
            .unwrap();
        ctx.set_global("keep", keep).unwrap();
        ctx.eval("keep({ n: 11 })", EvalKind::Global).unwrap();
        rt.run_gc().unwrap();
        let v = kept.borrow_mut().take().unwrap();
        assert_eq!(v.get("n").unwrap().as_i32().unwrap(), 11);
    }

    #[test]
    fn test_host_constructor() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let point = ctx
            .function("Point", |ctx, this, args| {
                this.set("x", &args[0]).unwrap();
                ctx.undefined()
            })
            .unwrap();
        ctx.set_global("Point", point).unwrap();
        let v = ctx.eval("new Point(4).x", EvalKind::Global).unwrap();
        assert_eq!(v.as_i32().unwrap(), 4);
    }
}
