//! Bytecode interpreter
//!
//! A `Vm` activation runs one call from Rust to completion. Calls between
//! JavaScript functions push frames on the activation instead of recursing in
//! Rust; native and host functions are called directly and may re-enter the
//! interpreter with a fresh activation.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use super::opcode::{OpCode, decode};
use super::ops::{self, BinOp, CmpOp};
use super::stack::Stack;
use crate::engine::{BacktraceFrame, ErrorKind, JSContext, JSResult, JSRuntime, Thrown};
use crate::gc::GcRef;
use crate::object::{
    Closure, Constant, DEFAULT_FLAGS, ENUMERABLE, ForInIter, ForOfIter, FunctionBytecode,
    HostCallback, JSAtom, JSObject, NativeFunction, ObjectClass, Scope, WRITABLE, atoms,
};
use crate::value::JSValue;

/// Initial operand stack capacity of an activation
const DEFAULT_STACK_SIZE: usize = 64;

/// Exception handler installed by `Catch`
struct Handler {
    pc: usize,
    sp: usize,
    scope: Option<GcRef>,
}

/// Call frame
struct Frame {
    func: Rc<FunctionBytecode>,
    pc: usize,
    locals: Vec<JSValue>,
    /// Full argument list (kept only for functions using `arguments`)
    args: Vec<JSValue>,
    this_val: JSValue,
    scope: Option<GcRef>,
    handlers: Vec<Handler>,
    /// Operand stack height at entry
    stack_base: usize,
    /// Instance under construction for `new` calls
    construct: Option<GcRef>,
    trace: Rc<BacktraceFrame>,
}

/// Restores the runtime's call depth and backtrace when dropped
struct DepthGuard<'a> {
    rt: &'a JSRuntime,
    depth: usize,
    backtrace: usize,
}

impl<'a> DepthGuard<'a> {
    fn new(rt: &'a JSRuntime) -> Self {
        DepthGuard {
            rt,
            depth: rt.depth.get(),
            backtrace: rt.backtrace.borrow().len(),
        }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.rt.depth.set(self.depth);
        self.rt.backtrace.borrow_mut().truncate(self.backtrace);
    }
}

/// Account for one more active call
fn enter(ctx: &JSContext) -> JSResult<()> {
    let rt = ctx.runtime();
    let depth = rt.depth.get();
    if depth >= rt.max_depth.get() {
        return Err(ctx.internal_error("stack overflow"));
    }
    rt.depth.set(depth + 1);
    Ok(())
}

enum Callee {
    Closure(Closure),
    Native(NativeFunction),
    Host(Rc<dyn HostCallback>),
}

fn callee(ctx: &JSContext, func: &JSValue) -> Option<Callee> {
    let JSValue::Object(r) = func else {
        return None;
    };
    ctx.with_object(*r, |o| match &o.class {
        ObjectClass::Closure(c) => Some(Callee::Closure(c.clone())),
        ObjectClass::Native(n) => Some(Callee::Native(*n)),
        ObjectClass::Host(h) => Some(Callee::Host(Rc::clone(h))),
        _ => None,
    })
}

fn call_native(
    ctx: &JSContext,
    native: NativeFunction,
    this: &JSValue,
    args: &[JSValue],
) -> JSResult<JSValue> {
    let _guard = DepthGuard::new(ctx.runtime());
    enter(ctx)?;
    (native.func)(ctx, this, args, native.magic)
}

fn call_host(
    ctx: &JSContext,
    host: &Rc<dyn HostCallback>,
    this: &JSValue,
    args: &[JSValue],
) -> JSResult<JSValue> {
    let _guard = DepthGuard::new(ctx.runtime());
    enter(ctx)?;
    host.call(ctx, this, args)
}

/// Call any function value
pub fn call(ctx: &JSContext, func: &JSValue, this: &JSValue, args: &[JSValue]) -> JSResult<JSValue> {
    match callee(ctx, func) {
        Some(Callee::Closure(c)) => run_closure(ctx, &c, this.clone(), args.to_vec(), None),
        Some(Callee::Native(n)) => call_native(ctx, n, this, args),
        Some(Callee::Host(h)) => call_host(ctx, &h, this, args),
        None => Err(ctx.type_error("not a function")),
    }
}

/// Allocate the receiver of a `new` call
fn new_instance(ctx: &JSContext, ctor: GcRef) -> JSResult<GcRef> {
    let proto = match ctx.get_property(ctor, atoms::PROTOTYPE) {
        JSValue::Object(p) => p,
        _ => ctx.intrinsics.object_proto,
    };
    ctx.new_object_with_proto(Some(proto))
}

fn constructor_ref(ctx: &JSContext, func: &JSValue) -> JSResult<GcRef> {
    match func {
        JSValue::Object(r) if ctx.with_object(*r, |o| o.is_constructor()) => Ok(*r),
        _ => Err(ctx.type_error("not a constructor")),
    }
}

/// `new func(...args)` for natives and host functions
///
/// Natives receive the constructor itself as `this`.
fn construct_other(
    ctx: &JSContext,
    target: Callee,
    ctor: GcRef,
    args: &[JSValue],
) -> JSResult<JSValue> {
    match target {
        Callee::Native(n) => call_native(ctx, n, &JSValue::Object(ctor), args),
        Callee::Host(h) => {
            let this = new_instance(ctx, ctor)?;
            let result = call_host(ctx, &h, &JSValue::Object(this), args)?;
            Ok(if result.is_object() {
                result
            } else {
                JSValue::Object(this)
            })
        }
        Callee::Closure(c) => {
            let this = new_instance(ctx, ctor)?;
            run_closure(ctx, &c, JSValue::Object(this), args.to_vec(), Some(this))
        }
    }
}

/// `new func(...args)`
pub fn construct(ctx: &JSContext, func: &JSValue, args: &[JSValue]) -> JSResult<JSValue> {
    let ctor = constructor_ref(ctx, func)?;
    match callee(ctx, func) {
        Some(target) => construct_other(ctx, target, ctor, args),
        None => Err(ctx.type_error("not a constructor")),
    }
}

/// Run a top-level script or module function
pub fn run_function(ctx: &JSContext, func: Rc<FunctionBytecode>, this: JSValue) -> JSResult<JSValue> {
    let closure = Closure {
        func,
        scope: None,
        this_val: None,
    };
    run_closure(ctx, &closure, this, Vec::new(), None)
}

fn run_closure(
    ctx: &JSContext,
    closure: &Closure,
    this: JSValue,
    args: Vec<JSValue>,
    construct: Option<GcRef>,
) -> JSResult<JSValue> {
    let _guard = DepthGuard::new(ctx.runtime());
    let mut vm = Vm {
        ctx,
        stack: Stack::new(DEFAULT_STACK_SIZE.max(closure.func.stack_size as usize)),
        frames: Vec::new(),
    };
    vm.push_frame(closure, this, args, construct)?;
    vm.execute()
}

fn underflow(ctx: &JSContext) -> Thrown {
    ctx.internal_error("stack underflow")
}

fn bad_bytecode(ctx: &JSContext) -> Thrown {
    ctx.internal_error("invalid bytecode")
}

fn constant_value(c: &Constant) -> Option<JSValue> {
    Some(match c {
        Constant::Number(n) => JSValue::number(*n),
        Constant::String(s) => JSValue::String(s.clone()),
        Constant::BigInt(n) => JSValue::BigInt(Rc::clone(n)),
        Constant::BigDecimal(n) => JSValue::BigDecimal(Rc::clone(n)),
        Constant::Function(_) => return None,
    })
}

fn atom_name(ctx: &JSContext, atom: JSAtom) -> String {
    ctx.atom_to_string(atom).to_string_lossy()
}

fn not_initialized(ctx: &JSContext, atom: JSAtom) -> Thrown {
    ctx.reference_error(&format!("'{}' is not initialized", atom_name(ctx, atom)))
}

fn scope_parent(ctx: &JSContext, scope: GcRef) -> Option<GcRef> {
    ctx.with_object(scope, |o| match &o.class {
        ObjectClass::Scope(s) => s.parent,
        _ => None,
    })
}

fn scope_at(ctx: &JSContext, scope: Option<GcRef>, depth: u32) -> JSResult<GcRef> {
    let mut cur = scope;
    for _ in 0..depth {
        cur = cur.and_then(|s| scope_parent(ctx, s));
    }
    cur.ok_or_else(|| bad_bytecode(ctx))
}

fn get_scoped(ctx: &JSContext, scope: Option<GcRef>, depth: u32, idx: u32) -> JSResult<JSValue> {
    let s = scope_at(ctx, scope, depth)?;
    ctx.with_object(s, |o| match &o.class {
        ObjectClass::Scope(sc) => sc.slots.get(idx as usize).cloned(),
        _ => None,
    })
    .ok_or_else(|| bad_bytecode(ctx))
}

fn put_scoped(
    ctx: &JSContext,
    scope: Option<GcRef>,
    depth: u32,
    idx: u32,
    value: JSValue,
) -> JSResult<()> {
    let s = scope_at(ctx, scope, depth)?;
    let stored = ctx.with_object_mut(s, |o| match &mut o.class {
        ObjectClass::Scope(sc) => match sc.slots.get_mut(idx as usize) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        },
        _ => false,
    });
    if stored { Ok(()) } else { Err(bad_bytecode(ctx)) }
}

fn get_global(ctx: &JSContext, atom: JSAtom, or_undefined: bool) -> JSResult<JSValue> {
    let lexical = ctx.lexicals.borrow().get(&atom).map(|l| l.value.clone());
    if let Some(v) = lexical {
        if v.is_uninitialized() {
            return Err(not_initialized(ctx, atom));
        }
        return Ok(v);
    }
    let global = ctx.global_object();
    if ctx.has_property(global, atom) {
        Ok(ctx.get_property(global, atom))
    } else if or_undefined {
        Ok(JSValue::Undefined)
    } else {
        Err(ctx.reference_error(&format!("'{}' is not defined", atom_name(ctx, atom))))
    }
}

fn put_global(ctx: &JSContext, atom: JSAtom, value: JSValue, strict: bool) -> JSResult<()> {
    enum Lexical {
        Missing,
        Const,
        Uninitialized,
        Stored,
    }
    let state = match ctx.lexicals.borrow_mut().get_mut(&atom) {
        None => Lexical::Missing,
        Some(l) if l.value.is_uninitialized() => Lexical::Uninitialized,
        Some(l) if l.is_const => Lexical::Const,
        Some(l) => {
            l.value = value.clone();
            Lexical::Stored
        }
    };
    match state {
        Lexical::Stored => Ok(()),
        Lexical::Const => Err(ctx.type_error(&format!("'{}' is read-only", atom_name(ctx, atom)))),
        Lexical::Uninitialized => Err(not_initialized(ctx, atom)),
        Lexical::Missing => {
            let global = ctx.global_object();
            if strict && !ctx.has_property(global, atom) {
                return Err(ctx.reference_error(&format!("'{}' is not defined", atom_name(ctx, atom))));
            }
            ctx.set_property(global, atom, value)
        }
    }
}

fn redeclaration(ctx: &JSContext, atom: JSAtom) -> Thrown {
    ctx.throw_error(
        ErrorKind::SyntaxError,
        &format!("redeclaration of '{}'", atom_name(ctx, atom)),
    )
}

fn define_global(ctx: &JSContext, atom: JSAtom, value: Option<JSValue>) -> JSResult<()> {
    if ctx.lexicals.borrow().contains_key(&atom) {
        return Err(redeclaration(ctx, atom));
    }
    let global = ctx.global_object();
    match value {
        Some(v) => ctx.define_property(global, atom, v, WRITABLE | ENUMERABLE),
        None if ctx.has_own_property(global, atom) => Ok(()),
        None => ctx.define_property(global, atom, JSValue::Undefined, WRITABLE | ENUMERABLE),
    }
}

fn define_global_lexical(ctx: &JSContext, atom: JSAtom, is_const: bool) -> JSResult<()> {
    let global = ctx.global_object();
    let is_var = ctx.with_object(global, |o| {
        o.props.get(atom).is_some_and(|p| !p.configurable())
    });
    if is_var || ctx.lexicals.borrow().contains_key(&atom) {
        return Err(redeclaration(ctx, atom));
    }
    ctx.lexicals.borrow_mut().insert(
        atom,
        crate::engine::GlobalLexical {
            value: JSValue::Uninitialized,
            is_const,
        },
    );
    Ok(())
}

fn get_element(ctx: &JSContext, obj: &JSValue, key: &JSValue) -> JSResult<JSValue> {
    if let (JSValue::Object(r), JSValue::Int(i)) = (obj, key) {
        if *i >= 0 {
            return Ok(ctx.get_property(*r, ops::to_property_key(ctx, key)?));
        }
    }
    let atom = ops::to_property_key(ctx, key)?;
    ctx.get_value_property(obj, atom)
}

fn delete_element(ctx: &JSContext, obj: &JSValue, key: &JSValue, strict: bool) -> JSResult<bool> {
    match obj {
        JSValue::Object(r) => {
            let atom = ops::to_property_key(ctx, key)?;
            let deleted = ctx.delete_property(*r, atom);
            if !deleted && strict {
                return Err(ctx.type_error(&format!(
                    "could not delete property '{}'",
                    atom_name(ctx, atom)
                )));
            }
            Ok(deleted)
        }
        JSValue::Undefined | JSValue::Null => Err(ctx.type_error("cannot convert undefined or null to object")),
        _ => Ok(true),
    }
}

fn for_in_start(ctx: &JSContext, target: JSValue) -> JSResult<JSValue> {
    let mut keys = Vec::new();
    match &target {
        JSValue::Object(r) => {
            let mut seen = HashSet::new();
            let mut cur = Some(*r);
            while let Some(obj) = cur {
                for key in ctx.own_keys(obj, true) {
                    if seen.insert(key) {
                        keys.push(key);
                    }
                }
                cur = ctx.with_object(obj, |o| o.proto);
            }
        }
        JSValue::String(s) => keys.extend((0..s.len() as u32).map(JSAtom::from_index)),
        _ => {}
    }
    let iter = ctx.alloc(JSObject::new(
        ObjectClass::ForIn(ForInIter {
            target,
            keys,
            pos: 0,
        }),
        None,
    ))?;
    Ok(JSValue::Object(iter))
}

fn for_in_next(ctx: &JSContext, iter: &JSValue) -> JSResult<Option<JSValue>> {
    let JSValue::Object(iter) = iter else {
        return Err(bad_bytecode(ctx));
    };
    loop {
        let next = ctx.with_object_mut(*iter, |o| match &mut o.class {
            ObjectClass::ForIn(it) => {
                let key = it.keys.get(it.pos).copied();
                if key.is_some() {
                    it.pos += 1;
                }
                Some((it.target.clone(), key))
            }
            _ => None,
        });
        let Some((target, key)) = next else {
            return Err(bad_bytecode(ctx));
        };
        let Some(key) = key else {
            return Ok(None);
        };
        // keys deleted during the loop are skipped
        if let JSValue::Object(t) = target {
            if !ctx.has_property(t, key) {
                continue;
            }
        }
        return Ok(Some(JSValue::String(ctx.atom_to_string(key))));
    }
}

fn for_of_start(ctx: &JSContext, target: JSValue) -> JSResult<JSValue> {
    let target = match target {
        JSValue::String(_) => target,
        JSValue::Object(r) => match ctx.with_object(r, |o| match &o.class {
            ObjectClass::Array(_) => Some(JSValue::Object(r)),
            ObjectClass::Primitive(s @ JSValue::String(_)) => Some(s.clone()),
            _ => None,
        }) {
            Some(t) => t,
            None => return Err(ctx.type_error("value is not iterable")),
        },
        _ => return Err(ctx.type_error("value is not iterable")),
    };
    let iter = ctx.alloc(JSObject::new(
        ObjectClass::ForOf(ForOfIter { target, pos: 0 }),
        None,
    ))?;
    Ok(JSValue::Object(iter))
}

fn for_of_next(ctx: &JSContext, iter: &JSValue) -> JSResult<Option<JSValue>> {
    let JSValue::Object(iter) = iter else {
        return Err(bad_bytecode(ctx));
    };
    let state = ctx.with_object(*iter, |o| match &o.class {
        ObjectClass::ForOf(it) => Some((it.target.clone(), it.pos)),
        _ => None,
    });
    let Some((target, pos)) = state else {
        return Err(bad_bytecode(ctx));
    };
    let (item, width) = match &target {
        JSValue::Object(r) => {
            let item = ctx.with_object(*r, |o| match &o.class {
                ObjectClass::Array(items) => items.get(pos).cloned(),
                _ => None,
            });
            (item, 1)
        }
        JSValue::String(s) => match s.code_point_at(pos) {
            Some(cp) => {
                let width = if cp > 0xFFFF { 2 } else { 1 };
                (Some(JSValue::String(s.slice(pos, pos + width))), width)
            }
            None => (None, 0),
        },
        _ => (None, 0),
    };
    if item.is_some() {
        ctx.with_object_mut(*iter, |o| {
            if let ObjectClass::ForOf(it) = &mut o.class {
                it.pos += width;
            }
        });
    }
    Ok(item)
}

fn binary_op(op: OpCode) -> Option<BinOp> {
    Some(match op {
        OpCode::Sub => BinOp::Sub,
        OpCode::Mul => BinOp::Mul,
        OpCode::Div => BinOp::Div,
        OpCode::Mod => BinOp::Mod,
        OpCode::Pow => BinOp::Pow,
        OpCode::Shl => BinOp::Shl,
        OpCode::Sar => BinOp::Sar,
        OpCode::Shr => BinOp::Shr,
        OpCode::And => BinOp::And,
        OpCode::Or => BinOp::Or,
        OpCode::Xor => BinOp::Xor,
        _ => return None,
    })
}

fn compare_op(op: OpCode) -> Option<CmpOp> {
    Some(match op {
        OpCode::Lt => CmpOp::Lt,
        OpCode::Lte => CmpOp::Lte,
        OpCode::Gt => CmpOp::Gt,
        OpCode::Gte => CmpOp::Gte,
        _ => return None,
    })
}

/// Interpreter activation
struct Vm<'a> {
    ctx: &'a JSContext,
    stack: Stack,
    frames: Vec<Frame>,
}

impl Vm<'_> {
    fn push_frame(
        &mut self,
        closure: &Closure,
        this: JSValue,
        mut args: Vec<JSValue>,
        construct: Option<GcRef>,
    ) -> JSResult<()> {
        let ctx = self.ctx;
        enter(ctx)?;
        let func = Rc::clone(&closure.func);
        let mut locals = vec![JSValue::Undefined; func.local_count as usize];
        for (slot, arg) in locals
            .iter_mut()
            .zip(args.iter())
            .take(func.arg_count as usize)
        {
            *slot = arg.clone();
        }
        let this_val = if func.is_arrow() {
            closure.this_val.clone().unwrap_or_default()
        } else if !func.is_strict() && this.is_nullish() {
            JSValue::Object(ctx.global_object())
        } else {
            this
        };
        if !func.uses_arguments() {
            args = Vec::new();
        }
        let trace = Rc::new(BacktraceFrame {
            func: Rc::clone(&func),
            pc: Cell::new(0),
        });
        ctx.runtime().backtrace.borrow_mut().push(Rc::clone(&trace));
        self.frames.push(Frame {
            func,
            pc: 0,
            locals,
            args,
            this_val,
            scope: closure.scope,
            handlers: Vec::new(),
            stack_base: self.stack.len(),
            construct,
            trace,
        });
        Ok(())
    }

    fn pop_frame(&mut self) -> Option<Frame> {
        let frame = self.frames.pop()?;
        let rt = self.ctx.runtime();
        rt.depth.set(rt.depth.get().saturating_sub(1));
        rt.backtrace.borrow_mut().pop();
        self.stack.truncate(frame.stack_base);
        Some(frame)
    }

    /// Leave the current frame; returns the activation's result once the
    /// outermost frame returns
    fn finish_frame(&mut self, value: JSValue) -> Option<JSValue> {
        let value = match self.pop_frame() {
            Some(Frame {
                construct: Some(obj),
                ..
            }) if !value.is_object() => JSValue::Object(obj),
            _ => value,
        };
        if self.frames.is_empty() {
            Some(value)
        } else {
            self.stack.push(value);
            None
        }
    }

    /// Transfer control to the nearest handler; false if none is left
    fn unwind(&mut self, exception: &JSValue) -> bool {
        while let Some(frame) = self.frames.last_mut() {
            if let Some(handler) = frame.handlers.pop() {
                frame.pc = handler.pc;
                frame.scope = handler.scope;
                self.stack.truncate(handler.sp);
                self.stack.push(exception.clone());
                return true;
            }
            self.pop_frame();
        }
        false
    }

    fn execute(&mut self) -> JSResult<JSValue> {
        loop {
            match self.run() {
                Ok(value) => return Ok(value),
                Err(Thrown(exception)) => {
                    if !self.unwind(&exception) {
                        return Err(Thrown(exception));
                    }
                }
            }
        }
    }

    fn run(&mut self) -> JSResult<JSValue> {
        let ctx = self.ctx;

        macro_rules! pop {
            () => {
                match self.stack.pop() {
                    Some(v) => v,
                    None => return Err(underflow(ctx)),
                }
            };
        }
        macro_rules! top {
            ($n:expr) => {
                match self.stack.peek($n) {
                    Some(v) => v.clone(),
                    None => return Err(underflow(ctx)),
                }
            };
        }

        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Err(ctx.internal_error("no active frame"));
            };
            let func = Rc::clone(&frame.func);
            let pc = frame.pc;
            frame.trace.pc.set(pc as u32);
            let Some(ins) = decode(&func.code, pc) else {
                if pc >= func.code.len() {
                    if let Some(v) = self.finish_frame(JSValue::Undefined) {
                        return Ok(v);
                    }
                    continue;
                }
                return Err(bad_bytecode(ctx));
            };
            frame.pc = pc + ins.size;
            let atom = |i: u32| func.atoms.get(i as usize).copied().ok_or_else(|| bad_bytecode(ctx));

            match ins.op {
                OpCode::Nop => {}

                OpCode::PushI32 => self.stack.push(JSValue::Int(ins.a as i32)),
                OpCode::PushConst => {
                    let v = func
                        .constants
                        .get(ins.a as usize)
                        .and_then(constant_value)
                        .ok_or_else(|| bad_bytecode(ctx))?;
                    self.stack.push(v);
                }
                OpCode::Undefined => self.stack.push(JSValue::Undefined),
                OpCode::Null => self.stack.push(JSValue::Null),
                OpCode::PushTrue => self.stack.push(JSValue::Bool(true)),
                OpCode::PushFalse => self.stack.push(JSValue::Bool(false)),
                OpCode::PushThis => self.stack.push(frame.this_val.clone()),
                OpCode::PushUninitialized => self.stack.push(JSValue::Uninitialized),
                OpCode::PushGlobalObject => self.stack.push(JSValue::Object(ctx.global_object())),
                OpCode::FClosure => {
                    let Some(Constant::Function(inner)) = func.constants.get(ins.a as usize) else {
                        return Err(bad_bytecode(ctx));
                    };
                    let this_val = inner.is_arrow().then(|| frame.this_val.clone());
                    let closure = ctx.new_closure(Rc::clone(inner), frame.scope, this_val)?;
                    self.stack.push(JSValue::Object(closure));
                }
                OpCode::Object => {
                    let obj = ctx.new_object()?;
                    self.stack.push(JSValue::Object(obj));
                }
                OpCode::ArrayFrom => {
                    let items = self.stack.pop_n(ins.a as usize).ok_or_else(|| underflow(ctx))?;
                    let arr = ctx.new_array(items)?;
                    self.stack.push(arr);
                }
                OpCode::SpecialArguments => {
                    let arr = ctx.new_array(frame.args.clone())?;
                    self.stack.push(arr);
                }

                OpCode::Drop => {
                    pop!();
                }
                OpCode::Dup => {
                    let v = top!(0);
                    self.stack.push(v);
                }
                OpCode::Dup2 => {
                    let b = top!(0);
                    let a = top!(1);
                    self.stack.push(a);
                    self.stack.push(b);
                }
                OpCode::Swap => {
                    if !self.stack.swap(0, 1) {
                        return Err(underflow(ctx));
                    }
                }
                OpCode::Perm3 => {
                    if !self.stack.swap(1, 2) {
                        return Err(underflow(ctx));
                    }
                }
                OpCode::Perm4 => {
                    if !self.stack.perm4() {
                        return Err(underflow(ctx));
                    }
                }

                OpCode::Call | OpCode::CallMethod => {
                    let args = self.stack.pop_n(ins.a as usize).ok_or_else(|| underflow(ctx))?;
                    let target = pop!();
                    let this = if ins.op == OpCode::CallMethod {
                        pop!()
                    } else {
                        JSValue::Undefined
                    };
                    match callee(ctx, &target) {
                        Some(Callee::Closure(c)) => self.push_frame(&c, this, args, None)?,
                        Some(Callee::Native(n)) => {
                            let v = call_native(ctx, n, &this, &args)?;
                            self.stack.push(v);
                        }
                        Some(Callee::Host(h)) => {
                            let v = call_host(ctx, &h, &this, &args)?;
                            self.stack.push(v);
                        }
                        None => return Err(ctx.type_error("not a function")),
                    }
                }
                OpCode::CallConstructor => {
                    let args = self.stack.pop_n(ins.a as usize).ok_or_else(|| underflow(ctx))?;
                    let target = pop!();
                    let ctor = constructor_ref(ctx, &target)?;
                    match callee(ctx, &target) {
                        Some(Callee::Closure(c)) => {
                            let this = new_instance(ctx, ctor)?;
                            self.push_frame(&c, JSValue::Object(this), args, Some(this))?;
                        }
                        Some(other) => {
                            let v = construct_other(ctx, other, ctor, &args)?;
                            self.stack.push(v);
                        }
                        None => return Err(ctx.type_error("not a constructor")),
                    }
                }
                OpCode::Return | OpCode::ReturnUndef => {
                    let value = if ins.op == OpCode::Return {
                        pop!()
                    } else {
                        JSValue::Undefined
                    };
                    if let Some(v) = self.finish_frame(value) {
                        return Ok(v);
                    }
                }
                OpCode::Throw => {
                    let v = pop!();
                    return Err(Thrown(v));
                }
                OpCode::ThrowError => {
                    let kind = ErrorKind::from_index(ins.a as usize).ok_or_else(|| bad_bytecode(ctx))?;
                    let message = atom_name(ctx, atom(ins.b)?);
                    return Err(ctx.throw_error(kind, &message));
                }

                OpCode::GetField => {
                    let obj = pop!();
                    let v = ctx.get_value_property(&obj, atom(ins.a)?)?;
                    self.stack.push(v);
                }
                OpCode::PutField => {
                    let value = pop!();
                    let obj = pop!();
                    ctx.set_value_property(&obj, atom(ins.a)?, value.clone())?;
                    self.stack.push(value);
                }
                OpCode::DefineField => {
                    let value = pop!();
                    let obj = top!(0);
                    let JSValue::Object(r) = obj else {
                        return Err(bad_bytecode(ctx));
                    };
                    ctx.define_property(r, atom(ins.a)?, value, DEFAULT_FLAGS)?;
                }
                OpCode::GetArrayEl => {
                    let key = pop!();
                    let obj = pop!();
                    let v = get_element(ctx, &obj, &key)?;
                    self.stack.push(v);
                }
                OpCode::PutArrayEl => {
                    let value = pop!();
                    let key = pop!();
                    let obj = pop!();
                    let atom = ops::to_property_key(ctx, &key)?;
                    ctx.set_value_property(&obj, atom, value.clone())?;
                    self.stack.push(value);
                }
                OpCode::DefineArrayEl => {
                    let value = pop!();
                    let key = pop!();
                    let JSValue::Object(r) = top!(0) else {
                        return Err(bad_bytecode(ctx));
                    };
                    let atom = ops::to_property_key(ctx, &key)?;
                    ctx.define_property(r, atom, value, DEFAULT_FLAGS)?;
                }
                OpCode::Delete => {
                    let key = pop!();
                    let obj = pop!();
                    let deleted = delete_element(ctx, &obj, &key, func.is_strict())?;
                    self.stack.push(JSValue::Bool(deleted));
                }
                OpCode::In => {
                    let obj = pop!();
                    let key = pop!();
                    let v = ops::has_in(ctx, &key, &obj)?;
                    self.stack.push(JSValue::Bool(v));
                }
                OpCode::InstanceOf => {
                    let ctor = pop!();
                    let v = pop!();
                    let r = ops::instance_of(ctx, &v, &ctor)?;
                    self.stack.push(JSValue::Bool(r));
                }

                OpCode::GetLoc | OpCode::GetLocCheck => {
                    let v = frame
                        .locals
                        .get(ins.a as usize)
                        .cloned()
                        .ok_or_else(|| bad_bytecode(ctx))?;
                    if ins.op == OpCode::GetLocCheck && v.is_uninitialized() {
                        return Err(not_initialized(ctx, atom(ins.b)?));
                    }
                    self.stack.push(v);
                }
                OpCode::PutLoc | OpCode::PutLocCheck => {
                    let value = pop!();
                    let Some(slot) = frame.locals.get_mut(ins.a as usize) else {
                        return Err(bad_bytecode(ctx));
                    };
                    if ins.op == OpCode::PutLocCheck && slot.is_uninitialized() {
                        return Err(not_initialized(ctx, atom(ins.b)?));
                    }
                    *slot = value;
                }
                OpCode::GetScoped | OpCode::GetScopedCheck => {
                    let v = get_scoped(ctx, frame.scope, ins.a, ins.b)?;
                    if ins.op == OpCode::GetScopedCheck && v.is_uninitialized() {
                        return Err(not_initialized(ctx, atom(ins.c)?));
                    }
                    self.stack.push(v);
                }
                OpCode::PutScoped | OpCode::PutScopedCheck => {
                    let value = pop!();
                    if ins.op == OpCode::PutScopedCheck
                        && get_scoped(ctx, frame.scope, ins.a, ins.b)?.is_uninitialized()
                    {
                        return Err(not_initialized(ctx, atom(ins.c)?));
                    }
                    put_scoped(ctx, frame.scope, ins.a, ins.b, value)?;
                }
                OpCode::PushScope => {
                    let scope = ctx.alloc(JSObject::new(
                        ObjectClass::Scope(Scope {
                            slots: vec![JSValue::Undefined; ins.a as usize],
                            parent: frame.scope,
                        }),
                        None,
                    ))?;
                    frame.scope = Some(scope);
                }
                OpCode::PopScope => {
                    let current = frame.scope.ok_or_else(|| bad_bytecode(ctx))?;
                    frame.scope = scope_parent(ctx, current);
                }
                OpCode::CopyScope => {
                    let current = frame.scope.ok_or_else(|| bad_bytecode(ctx))?;
                    let copy = ctx.with_object(current, |o| match &o.class {
                        ObjectClass::Scope(s) => Some(s.clone()),
                        _ => None,
                    });
                    let copy = copy.ok_or_else(|| bad_bytecode(ctx))?;
                    let scope = ctx.alloc(JSObject::new(ObjectClass::Scope(copy), None))?;
                    frame.scope = Some(scope);
                }

                OpCode::GetGlobal | OpCode::GetGlobalUndef => {
                    let v = get_global(ctx, atom(ins.a)?, ins.op == OpCode::GetGlobalUndef)?;
                    self.stack.push(v);
                }
                OpCode::PutGlobal => {
                    let value = pop!();
                    put_global(ctx, atom(ins.a)?, value, func.is_strict())?;
                }
                OpCode::DefineGlobalVar => define_global(ctx, atom(ins.a)?, None)?,
                OpCode::DefineGlobalFunc => {
                    let value = pop!();
                    define_global(ctx, atom(ins.a)?, Some(value))?;
                }
                OpCode::DefineGlobalLex => define_global_lexical(ctx, atom(ins.a)?, ins.b != 0)?,
                OpCode::InitGlobalLex => {
                    let value = pop!();
                    let name = atom(ins.a)?;
                    match ctx.lexicals.borrow_mut().get_mut(&name) {
                        Some(lex) => lex.value = value,
                        None => return Err(bad_bytecode(ctx)),
                    }
                }
                OpCode::GetModule => {
                    let name = atom(ins.a)?;
                    let module = ctx.modules.borrow().get(&name).copied();
                    match module {
                        Some(ns) => self.stack.push(JSValue::Object(ns)),
                        None => {
                            return Err(ctx.reference_error(&format!(
                                "could not load module '{}'",
                                atom_name(ctx, name)
                            )));
                        }
                    }
                }
                OpCode::ExportModule => {
                    let JSValue::Object(ns) = pop!() else {
                        return Err(bad_bytecode(ctx));
                    };
                    ctx.modules.borrow_mut().insert(atom(ins.a)?, ns);
                }

                OpCode::Goto => frame.pc = ins.a as usize,
                OpCode::IfFalse | OpCode::IfTrue => {
                    let cond = ops::to_boolean(&pop!());
                    if cond == (ins.op == OpCode::IfTrue) {
                        frame.pc = ins.a as usize;
                    }
                }
                OpCode::Catch => frame.handlers.push(Handler {
                    pc: ins.a as usize,
                    sp: self.stack.len(),
                    scope: frame.scope,
                }),
                OpCode::DropCatch => {
                    frame.handlers.pop();
                }

                OpCode::ForInStart => {
                    let target = pop!();
                    let iter = for_in_start(ctx, target)?;
                    self.stack.push(iter);
                }
                OpCode::ForOfStart => {
                    let target = pop!();
                    let iter = for_of_start(ctx, target)?;
                    self.stack.push(iter);
                }
                OpCode::ForInNext | OpCode::ForOfNext => {
                    let iter = pop!();
                    let next = if ins.op == OpCode::ForInNext {
                        for_in_next(ctx, &iter)?
                    } else {
                        for_of_next(ctx, &iter)?
                    };
                    let done = next.is_none();
                    self.stack.push(next.unwrap_or_default());
                    self.stack.push(JSValue::Bool(done));
                }

                OpCode::Neg => {
                    let v = pop!();
                    self.stack.push(ops::negate(ctx, &v)?);
                }
                OpCode::Plus => {
                    let v = pop!();
                    self.stack.push(JSValue::number(ops::to_number(ctx, &v)?));
                }
                OpCode::Inc | OpCode::Dec => {
                    let v = pop!();
                    let delta = if ins.op == OpCode::Inc { 1 } else { -1 };
                    self.stack.push(ops::increment(ctx, &v, delta)?);
                }
                OpCode::PostInc | OpCode::PostDec => {
                    let v = pop!();
                    let old = ops::to_numeric_value(ctx, &v)?;
                    let delta = if ins.op == OpCode::PostInc { 1 } else { -1 };
                    let new = ops::increment(ctx, &old, delta)?;
                    self.stack.push(old);
                    self.stack.push(new);
                }
                OpCode::Not => {
                    let v = pop!();
                    self.stack.push(ops::bit_not(ctx, &v)?);
                }
                OpCode::LNot => {
                    let v = pop!();
                    self.stack.push(JSValue::Bool(!ops::to_boolean(&v)));
                }
                OpCode::TypeOf => {
                    let v = pop!();
                    self.stack.push(JSValue::string(ops::type_of(ctx, &v)));
                }

                OpCode::Add => {
                    let b = pop!();
                    let a = pop!();
                    self.stack.push(ops::add(ctx, &a, &b)?);
                }
                OpCode::Eq | OpCode::Neq => {
                    let b = pop!();
                    let a = pop!();
                    let eq = ops::loose_equals(ctx, &a, &b)?;
                    self.stack.push(JSValue::Bool(eq == (ins.op == OpCode::Eq)));
                }
                OpCode::StrictEq | OpCode::StrictNeq => {
                    let b = pop!();
                    let a = pop!();
                    let eq = ops::strict_equals(&a, &b);
                    self.stack.push(JSValue::Bool(eq == (ins.op == OpCode::StrictEq)));
                }
                op if binary_op(op).is_some() || compare_op(op).is_some() => {
                    let b = pop!();
                    let a = pop!();
                    let v = match (binary_op(op), compare_op(op)) {
                        (Some(bin), _) => ops::binary_arith(ctx, bin, &a, &b)?,
                        (_, Some(cmp)) => JSValue::Bool(ops::compare(ctx, cmp, &a, &b)?),
                        _ => return Err(bad_bytecode(ctx)),
                    };
                    self.stack.push(v);
                }

                OpCode::IsNullish => {
                    let v = pop!();
                    self.stack.push(JSValue::Bool(v.is_nullish()));
                }
                OpCode::ToString => {
                    let v = pop!();
                    self.stack.push(JSValue::String(ops::to_string(ctx, &v)?));
                }

                _ => return Err(bad_bytecode(ctx)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::JSRuntime;
    use crate::object::JSString;

    fn function(build: impl FnOnce(&mut FunctionBytecode)) -> Rc<FunctionBytecode> {
        let mut fb = FunctionBytecode::new(JSString::from_str("test"), JSString::from_str("test.js"));
        build(&mut fb);
        Rc::new(fb)
    }

    fn push_i32(fb: &mut FunctionBytecode, v: i32) {
        fb.emit_u8(OpCode::PushI32 as u8);
        fb.emit_i32(v);
    }

    #[test]
    fn test_arithmetic() {
        let ctx = JSContext::new(&JSRuntime::new());
        let f = function(|fb| {
            push_i32(fb, 2);
            push_i32(fb, 3);
            fb.emit_u8(OpCode::Add as u8);
            push_i32(fb, 4);
            fb.emit_u8(OpCode::Mul as u8);
            fb.emit_u8(OpCode::Return as u8);
        });
        let v = run_function(&ctx, f, JSValue::Undefined).unwrap();
        assert!(matches!(v, JSValue::Int(20)));
    }

    #[test]
    fn test_catch_handler() {
        let ctx = JSContext::new(&JSRuntime::new());
        let f = function(|fb| {
            fb.emit_u8(OpCode::Catch as u8);
            let patch = fb.current_offset();
            fb.emit_u32(0);
            push_i32(fb, 7);
            fb.emit_u8(OpCode::Throw as u8);
            let target = fb.current_offset();
            fb.patch_u32(patch, target);
            fb.emit_u8(OpCode::Return as u8);
        });
        let v = run_function(&ctx, f, JSValue::Undefined).unwrap();
        assert!(matches!(v, JSValue::Int(7)));
    }

    #[test]
    fn test_uncaught_restores_depth() {
        let rt = JSRuntime::new();
        let ctx = JSContext::new(&rt);
        let f = function(|fb| {
            push_i32(fb, 1);
            fb.emit_u8(OpCode::Throw as u8);
        });
        let err = run_function(&ctx, f, JSValue::Undefined).unwrap_err();
        assert!(matches!(err.0, JSValue::Int(1)));
        assert_eq!(rt.depth.get(), 0);
        assert!(rt.backtrace.borrow().is_empty());
    }

    #[test]
    fn test_call_native() {
        fn double(_ctx: &JSContext, _this: &JSValue, args: &[JSValue], magic: i32) -> JSResult<JSValue> {
            match args.first() {
                Some(JSValue::Int(i)) => Ok(JSValue::Int(i * magic)),
                _ => Ok(JSValue::Undefined),
            }
        }
        let ctx = JSContext::new(&JSRuntime::new());
        let f = ctx.new_native_function("double", double, 1, 2, false);
        let v = call(&ctx, &JSValue::Object(f), &JSValue::Undefined, &[JSValue::Int(21)]).unwrap();
        assert!(matches!(v, JSValue::Int(42)));
        assert!(call(&ctx, &JSValue::Int(1), &JSValue::Undefined, &[]).is_err());
        assert!(construct(&ctx, &JSValue::Object(f), &[]).is_err());
    }

    #[test]
    fn test_stack_overflow() {
        let rt = JSRuntime::new();
        let ctx = JSContext::new(&rt);
        rt.max_depth.set(0);
        let f = function(|fb| fb.emit_u8(OpCode::ReturnUndef as u8));
        let err = run_function(&ctx, f, JSValue::Undefined).unwrap_err();
        assert!(ctx.is_error(&err.0));
        assert_eq!(rt.depth.get(), 0);
    }

    #[test]
    fn test_undefined_global_is_reference_error() {
        let ctx = JSContext::new(&JSRuntime::new());
        let name = ctx.atom("missing");
        let f = function(|fb| {
            let idx = fb.add_atom(name);
            fb.emit_u8(OpCode::GetGlobal as u8);
            fb.emit_u32(idx);
            fb.emit_u8(OpCode::Return as u8);
        });
        let err = run_function(&ctx, f, JSValue::Undefined).unwrap_err();
        let JSValue::Object(r) = err.0 else { panic!("expected an error object") };
        let proto = ctx.with_object(r, |o| o.proto);
        assert_eq!(proto, Some(ctx.intrinsics.error_protos[ErrorKind::ReferenceError.index()]));
    }
}
