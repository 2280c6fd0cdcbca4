//! Engine state
//!
//! `JSRuntime` owns the heap, the root set and the atom table; `JSContext`
//! owns a realm (global object and intrinsic prototypes), the global lexical
//! environment and the module registry. Everything here is engine-internal:
//! embedders go through `Runtime`, `Context` and `Value`.
//!
//! Heap access uses short `RefCell` borrows. No borrow is held across a call
//! that may allocate or run script.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};

use crate::builtins;
use crate::gc::{GcRef, GcStats, Heap, RootSet};
use crate::object::array::{set_element, set_length};
use crate::object::{
    AtomTable, CONFIGURABLE, Closure, DEFAULT_FLAGS, FunctionBytecode, HIDDEN_FLAGS, JSAtom,
    HostCallback, JSObject, JSString, NativeFn, NativeFunction, ObjectClass, atoms,
};
use crate::value::JSValue;

/// A JavaScript exception in flight
#[derive(Debug, Clone)]
pub struct Thrown(pub JSValue);

/// Result of an engine operation that may throw
pub type JSResult<T> = Result<T, Thrown>;

/// Native error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Error,
    EvalError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
    URIError,
    InternalError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Error,
        ErrorKind::EvalError,
        ErrorKind::RangeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
        ErrorKind::TypeError,
        ErrorKind::URIError,
        ErrorKind::InternalError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::URIError => "URIError",
            ErrorKind::InternalError => "InternalError",
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<ErrorKind> {
        Self::ALL.get(index).copied()
    }
}

/// Default limit on nested calls
pub const DEFAULT_MAX_STACK_DEPTH: usize = 512;

/// One active JavaScript frame, as seen by stack capture
pub struct BacktraceFrame {
    pub func: Rc<FunctionBytecode>,
    pub pc: Cell<u32>,
}

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Engine instance
pub struct JSRuntime {
    id: u64,
    pub(crate) heap: RefCell<Heap>,
    pub(crate) roots: RefCell<RootSet>,
    pub(crate) atoms: RefCell<AtomTable>,
    /// Number of active calls (JavaScript frames and native/host calls)
    pub(crate) depth: Cell<usize>,
    pub(crate) max_depth: Cell<usize>,
    pub(crate) backtrace: RefCell<Vec<Rc<BacktraceFrame>>>,
    contexts: RefCell<Vec<Weak<JSContext>>>,
    next_context_id: Cell<u64>,
}

impl JSRuntime {
    pub fn new() -> Rc<JSRuntime> {
        let id = NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed);
        debug!("runtime {} created", id);
        Rc::new(JSRuntime {
            id,
            heap: RefCell::new(Heap::new()),
            roots: RefCell::new(RootSet::new()),
            atoms: RefCell::new(AtomTable::new()),
            depth: Cell::new(0),
            max_depth: Cell::new(DEFAULT_MAX_STACK_DEPTH),
            backtrace: RefCell::new(Vec::new()),
            contexts: RefCell::new(Vec::new()),
            next_context_id: Cell::new(1),
        })
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn intern(&self, s: &str) -> JSAtom {
        self.atoms.borrow_mut().intern_str(s)
    }

    pub fn intern_js(&self, s: &JSString) -> JSAtom {
        self.atoms.borrow_mut().intern(s)
    }

    pub fn atom_string(&self, atom: JSAtom) -> JSString {
        self.atoms.borrow().to_js_string(atom)
    }

    /// Number of contexts still alive
    pub fn live_contexts(&self) -> usize {
        let mut contexts = self.contexts.borrow_mut();
        contexts.retain(|c| c.strong_count() > 0);
        contexts.len()
    }

    /// Check that no engine code is running
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.depth.get() == 0
    }

    /// Collect garbage; refused while engine code is on the stack
    pub fn run_gc(&self) -> Option<GcStats> {
        if !self.is_idle() {
            warn!(
                "runtime {}: gc refused while engine code is running (depth {})",
                self.id,
                self.depth.get()
            );
            return None;
        }
        let roots = self.gather_roots();
        let stats = self.heap.borrow_mut().collect(roots);
        debug!(
            "runtime {}: gc marked {} freed {} ({} bytes live)",
            self.id, stats.marked, stats.freed, stats.bytes_after
        );
        Some(stats)
    }

    /// Collect if the allocation threshold has been crossed
    pub fn maybe_gc(&self) {
        if self.is_idle() && self.heap.borrow().should_collect() {
            self.run_gc();
        }
    }

    fn gather_roots(&self) -> Vec<GcRef> {
        let mut roots: Vec<GcRef> = self.roots.borrow().iter().collect();
        let contexts: Vec<Rc<JSContext>> = {
            let mut list = self.contexts.borrow_mut();
            list.retain(|c| c.strong_count() > 0);
            list.iter().filter_map(Weak::upgrade).collect()
        };
        for ctx in contexts {
            ctx.trace_roots(&mut roots);
        }
        roots
    }
}

impl Drop for JSRuntime {
    fn drop(&mut self) {
        debug!("runtime {} destroyed", self.id);
    }
}

/// Intrinsic prototypes of a realm
#[derive(Clone, Copy)]
pub struct Intrinsics {
    pub object_proto: GcRef,
    pub function_proto: GcRef,
    pub array_proto: GcRef,
    pub string_proto: GcRef,
    pub number_proto: GcRef,
    pub boolean_proto: GcRef,
    pub bigint_proto: GcRef,
    pub bigdecimal_proto: GcRef,
    pub array_buffer_proto: GcRef,
    pub error_protos: [GcRef; 8],
}

impl Intrinsics {
    fn trace(&self, out: &mut Vec<GcRef>) {
        out.extend([
            self.object_proto,
            self.function_proto,
            self.array_proto,
            self.string_proto,
            self.number_proto,
            self.boolean_proto,
            self.bigint_proto,
            self.bigdecimal_proto,
            self.array_buffer_proto,
        ]);
        out.extend_from_slice(&self.error_protos);
    }
}

/// Top-level `let`/`const` binding of a script
pub struct GlobalLexical {
    pub value: JSValue,
    pub is_const: bool,
}

/// Execution environment
pub struct JSContext {
    id: u64,
    pub(crate) rt: Rc<JSRuntime>,
    this: Weak<JSContext>,
    pub(crate) global: GcRef,
    pub(crate) intrinsics: Intrinsics,
    pub(crate) lexicals: RefCell<HashMap<JSAtom, GlobalLexical>>,
    pub(crate) modules: RefCell<HashMap<JSAtom, GcRef>>,
    pending_exception: RefCell<Option<JSValue>>,
}

impl JSContext {
    /// Create a context with a fresh realm
    pub fn new(rt: &Rc<JSRuntime>) -> Rc<JSContext> {
        let intrinsics = {
            let mut heap = rt.heap.borrow_mut();
            let object_proto = heap.alloc(JSObject::new(ObjectClass::Ordinary, None));
            let mut proto = |class: ObjectClass, parent: GcRef| {
                heap.alloc(JSObject::new(class, Some(parent)))
            };
            let function_proto = proto(
                ObjectClass::Native(NativeFunction {
                    func: builtins::function::function_proto_call_empty,
                    magic: 0,
                    constructor: false,
                }),
                object_proto,
            );
            let array_proto = proto(ObjectClass::Array(Vec::new()), object_proto);
            let string_proto = proto(
                ObjectClass::Primitive(JSValue::String(JSString::empty())),
                object_proto,
            );
            let number_proto = proto(ObjectClass::Primitive(JSValue::Int(0)), object_proto);
            let boolean_proto = proto(ObjectClass::Primitive(JSValue::Bool(false)), object_proto);
            let bigint_proto = proto(ObjectClass::Ordinary, object_proto);
            let bigdecimal_proto = proto(ObjectClass::Ordinary, object_proto);
            let array_buffer_proto = proto(ObjectClass::Ordinary, object_proto);
            let error_base = proto(ObjectClass::Ordinary, object_proto);
            let mut error_protos = [error_base; 8];
            for slot in error_protos.iter_mut().skip(1) {
                *slot = proto(ObjectClass::Ordinary, error_base);
            }
            Intrinsics {
                object_proto,
                function_proto,
                array_proto,
                string_proto,
                number_proto,
                boolean_proto,
                bigint_proto,
                bigdecimal_proto,
                array_buffer_proto,
                error_protos,
            }
        };
        let global = rt
            .heap
            .borrow_mut()
            .alloc(JSObject::new(ObjectClass::Ordinary, Some(intrinsics.object_proto)));

        let id = rt.next_context_id.get();
        rt.next_context_id.set(id + 1);

        let ctx = Rc::new_cyclic(|this| JSContext {
            id,
            rt: Rc::clone(rt),
            this: this.clone(),
            global,
            intrinsics,
            lexicals: RefCell::new(HashMap::new()),
            modules: RefCell::new(HashMap::new()),
            pending_exception: RefCell::new(None),
        });
        builtins::install(&ctx);
        rt.contexts.borrow_mut().push(Rc::downgrade(&ctx));
        debug!("runtime {}: context {} created", rt.id(), id);
        ctx
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn runtime(&self) -> &Rc<JSRuntime> {
        &self.rt
    }

    /// Strong reference to this context
    pub fn handle(&self) -> Rc<JSContext> {
        match self.this.upgrade() {
            Some(ctx) => ctx,
            None => panic!("protocol violation: context used during teardown"),
        }
    }

    #[inline]
    pub fn global_object(&self) -> GcRef {
        self.global
    }

    fn trace_roots(&self, out: &mut Vec<GcRef>) {
        out.push(self.global);
        self.intrinsics.trace(out);
        for lex in self.lexicals.borrow().values() {
            if let JSValue::Object(r) = lex.value {
                out.push(r);
            }
        }
        out.extend(self.modules.borrow().values().copied());
        if let Some(JSValue::Object(r)) = &*self.pending_exception.borrow() {
            out.push(*r);
        }
    }

    // ---- atoms ----

    #[inline]
    pub fn atom(&self, s: &str) -> JSAtom {
        self.rt.intern(s)
    }

    #[inline]
    pub fn atom_js(&self, s: &JSString) -> JSAtom {
        self.rt.intern_js(s)
    }

    #[inline]
    pub fn atom_to_string(&self, atom: JSAtom) -> JSString {
        self.rt.atom_string(atom)
    }

    // ---- pending exception ----

    pub fn set_pending_exception(&self, value: JSValue) {
        *self.pending_exception.borrow_mut() = Some(value);
    }

    pub fn take_pending_exception(&self) -> Option<JSValue> {
        self.pending_exception.borrow_mut().take()
    }

    // ---- heap access ----

    #[inline]
    pub fn with_object<R>(&self, r: GcRef, f: impl FnOnce(&JSObject) -> R) -> R {
        f(self.rt.heap.borrow().get(r))
    }

    #[inline]
    pub fn with_object_mut<R>(&self, r: GcRef, f: impl FnOnce(&mut JSObject) -> R) -> R {
        f(self.rt.heap.borrow_mut().get_mut(r))
    }

    /// Allocate, throwing "out of memory" past the runtime's limit
    pub fn alloc(&self, obj: JSObject) -> JSResult<GcRef> {
        let size = obj.approx_size();
        if !self.rt.heap.borrow().fits(size) {
            return Err(self.throw_error(ErrorKind::InternalError, "out of memory"));
        }
        Ok(self.alloc_unchecked(obj))
    }

    /// Allocate regardless of the memory limit
    pub fn alloc_unchecked(&self, obj: JSObject) -> GcRef {
        self.rt.heap.borrow_mut().alloc(obj)
    }

    pub fn new_object(&self) -> JSResult<GcRef> {
        self.alloc(JSObject::new(
            ObjectClass::Ordinary,
            Some(self.intrinsics.object_proto),
        ))
    }

    pub fn new_object_with_proto(&self, proto: Option<GcRef>) -> JSResult<GcRef> {
        self.alloc(JSObject::new(ObjectClass::Ordinary, proto))
    }

    pub fn new_array(&self, items: Vec<JSValue>) -> JSResult<JSValue> {
        let r = self.alloc(JSObject::new(
            ObjectClass::Array(items),
            Some(self.intrinsics.array_proto),
        ))?;
        Ok(JSValue::Object(r))
    }

    /// Create a builtin function object
    pub fn new_native_function(
        &self,
        name: &str,
        func: NativeFn,
        length: u32,
        magic: i32,
        constructor: bool,
    ) -> GcRef {
        let mut obj = JSObject::new(
            ObjectClass::Native(NativeFunction {
                func,
                magic,
                constructor,
            }),
            Some(self.intrinsics.function_proto),
        );
        obj.props
            .define(atoms::LENGTH, JSValue::Int(length as i32), CONFIGURABLE);
        obj.props
            .define(atoms::NAME, JSValue::string(name), CONFIGURABLE);
        self.alloc_unchecked(obj)
    }

    /// Create a function object backed by an embedder callback
    pub fn new_host_function(
        &self,
        name: &str,
        callback: Rc<dyn HostCallback>,
        length: u32,
    ) -> JSResult<GcRef> {
        let mut obj = JSObject::new(
            ObjectClass::Host(callback),
            Some(self.intrinsics.function_proto),
        );
        obj.props
            .define(atoms::LENGTH, JSValue::Int(length as i32), CONFIGURABLE);
        obj.props
            .define(atoms::NAME, JSValue::string(name), CONFIGURABLE);
        self.alloc(obj)
    }

    /// Instantiate a compiled function
    pub fn new_closure(
        &self,
        func: Rc<FunctionBytecode>,
        scope: Option<GcRef>,
        this_val: Option<JSValue>,
    ) -> JSResult<GcRef> {
        let is_arrow = func.is_arrow();
        let mut obj = JSObject::new(
            ObjectClass::Closure(Closure {
                func: Rc::clone(&func),
                scope,
                this_val,
            }),
            Some(self.intrinsics.function_proto),
        );
        obj.props
            .define(atoms::LENGTH, JSValue::Int(func.arg_count as i32), CONFIGURABLE);
        obj.props
            .define(atoms::NAME, JSValue::String(func.name.clone()), CONFIGURABLE);
        let closure = self.alloc(obj)?;
        if !is_arrow {
            let proto = self.new_object()?;
            self.with_object_mut(proto, |o| {
                o.props
                    .define(atoms::CONSTRUCTOR, JSValue::Object(closure), HIDDEN_FLAGS)
            });
            self.with_object_mut(closure, |o| {
                o.props.define(
                    atoms::PROTOTYPE,
                    JSValue::Object(proto),
                    crate::object::WRITABLE,
                )
            });
        }
        Ok(closure)
    }

    // ---- errors ----

    /// Render the active JavaScript frames, innermost first
    pub fn capture_stack(&self) -> JSString {
        let mut out = String::new();
        for frame in self.rt.backtrace.borrow().iter().rev() {
            let func = &frame.func;
            let name = if func.name.is_empty() {
                "<anonymous>".to_string()
            } else {
                func.name.to_string_lossy()
            };
            let line = func.get_line_number(frame.pc.get()).unwrap_or(0);
            let _ = writeln!(out, "    at {} ({}:{})", name, func.filename.to_string_lossy(), line);
        }
        JSString::from_str(&out)
    }

    /// Create an error object of the given class
    pub fn new_error(&self, kind: ErrorKind, message: JSString) -> GcRef {
        let mut obj = JSObject::new(
            ObjectClass::Error,
            Some(self.intrinsics.error_protos[kind.index()]),
        );
        if !message.is_empty() {
            obj.props
                .define(atoms::MESSAGE, JSValue::String(message), HIDDEN_FLAGS);
        }
        obj.props
            .define(atoms::STACK, JSValue::String(self.capture_stack()), HIDDEN_FLAGS);
        self.alloc_unchecked(obj)
    }

    /// Create an error and return it as an exception
    pub fn throw_error(&self, kind: ErrorKind, message: &str) -> Thrown {
        Thrown(JSValue::Object(self.new_error(kind, JSString::from_str(message))))
    }

    pub fn type_error(&self, message: &str) -> Thrown {
        self.throw_error(ErrorKind::TypeError, message)
    }

    pub fn range_error(&self, message: &str) -> Thrown {
        self.throw_error(ErrorKind::RangeError, message)
    }

    pub fn reference_error(&self, message: &str) -> Thrown {
        self.throw_error(ErrorKind::ReferenceError, message)
    }

    pub fn internal_error(&self, message: &str) -> Thrown {
        self.throw_error(ErrorKind::InternalError, message)
    }

    // ---- properties ----

    /// Read an own property, including virtual array/string/buffer slots
    pub fn get_own_property(&self, r: GcRef, atom: JSAtom) -> Option<JSValue> {
        let heap = self.rt.heap.borrow();
        let obj = heap.get(r);
        match &obj.class {
            ObjectClass::Array(items) => {
                if let Some(i) = atom.index() {
                    if let Some(v) = items.get(i as usize) {
                        return Some(v.clone());
                    }
                } else if atom == atoms::LENGTH {
                    return Some(JSValue::from_i64(items.len() as i64));
                }
            }
            ObjectClass::Primitive(JSValue::String(s)) => {
                if let Some(i) = atom.index() {
                    if let Some(&u) = s.units().get(i as usize) {
                        return Some(JSValue::String(JSString::from_units(vec![u])));
                    }
                } else if atom == atoms::LENGTH {
                    return Some(JSValue::Int(s.len() as i32));
                }
            }
            ObjectClass::ArrayBuffer(bytes) if atom == atoms::BYTE_LENGTH => {
                return Some(JSValue::from_i64(bytes.len() as i64));
            }
            _ => {}
        }
        obj.props.get(atom).map(|p| p.value.clone())
    }

    pub fn has_own_property(&self, r: GcRef, atom: JSAtom) -> bool {
        self.get_own_property(r, atom).is_some()
    }

    /// Look a property up along the prototype chain
    pub fn get_property(&self, r: GcRef, atom: JSAtom) -> JSValue {
        let mut cur = Some(r);
        while let Some(obj) = cur {
            if let Some(v) = self.get_own_property(obj, atom) {
                return v;
            }
            cur = self.with_object(obj, |o| o.proto);
        }
        JSValue::Undefined
    }

    pub fn has_property(&self, r: GcRef, atom: JSAtom) -> bool {
        let mut cur = Some(r);
        while let Some(obj) = cur {
            if self.has_own_property(obj, atom) {
                return true;
            }
            cur = self.with_object(obj, |o| o.proto);
        }
        false
    }

    /// Prototype used for property lookup on a primitive
    pub fn primitive_proto(&self, v: &JSValue) -> Option<GcRef> {
        let i = &self.intrinsics;
        match v {
            JSValue::Int(_) | JSValue::Float(_) => Some(i.number_proto),
            JSValue::String(_) => Some(i.string_proto),
            JSValue::Bool(_) => Some(i.boolean_proto),
            JSValue::BigInt(_) => Some(i.bigint_proto),
            JSValue::BigDecimal(_) => Some(i.bigdecimal_proto),
            _ => None,
        }
    }

    /// `v[atom]` for any value
    pub fn get_value_property(&self, v: &JSValue, atom: JSAtom) -> JSResult<JSValue> {
        match v {
            JSValue::Object(r) => Ok(self.get_property(*r, atom)),
            JSValue::String(s) => {
                if atom == atoms::LENGTH {
                    return Ok(JSValue::Int(s.len() as i32));
                }
                if let Some(i) = atom.index() {
                    if let Some(&u) = s.units().get(i as usize) {
                        return Ok(JSValue::String(JSString::from_units(vec![u])));
                    }
                }
                Ok(self.get_property(self.intrinsics.string_proto, atom))
            }
            JSValue::Undefined | JSValue::Null => {
                let name = self.atom_to_string(atom).to_string_lossy();
                let what = if v.is_null() { "null" } else { "undefined" };
                Err(self.type_error(&format!("cannot read property '{}' of {}", name, what)))
            }
            other => match self.primitive_proto(other) {
                Some(proto) => Ok(self.get_property(proto, atom)),
                None => Ok(JSValue::Undefined),
            },
        }
    }

    /// Assign an own property (`obj[atom] = value`)
    pub fn set_property(&self, r: GcRef, atom: JSAtom, value: JSValue) -> JSResult<()> {
        enum Outcome {
            Done,
            ReadOnly,
            BadLength,
            Define(JSValue),
        }
        let new_len = if atom == atoms::LENGTH {
            value.as_number()
        } else {
            None
        };
        let outcome = {
            let mut heap = self.rt.heap.borrow_mut();
            let obj = heap.get_mut(r);
            let mut outcome = None;
            match &mut obj.class {
                ObjectClass::Array(items) => {
                    if let Some(i) = atom.index() {
                        outcome = Some(if set_element(items, i as usize, value.clone()) {
                            Outcome::Done
                        } else {
                            Outcome::BadLength
                        });
                    } else if atom == atoms::LENGTH {
                        let resized = match new_len {
                            Some(n) if n >= 0.0 && n.fract() == 0.0 => set_length(items, n as usize),
                            _ => false,
                        };
                        outcome = Some(if resized {
                            Outcome::Done
                        } else {
                            Outcome::BadLength
                        });
                    }
                }
                ObjectClass::Primitive(JSValue::String(_))
                    if atom == atoms::LENGTH || atom.is_index() =>
                {
                    outcome = Some(Outcome::ReadOnly);
                }
                ObjectClass::ArrayBuffer(_) if atom == atoms::BYTE_LENGTH => {
                    outcome = Some(Outcome::ReadOnly);
                }
                _ => {}
            }
            match outcome {
                Some(o) => o,
                None => match obj.props.get_mut(atom) {
                    Some(prop) if !prop.writable() => Outcome::ReadOnly,
                    Some(prop) => {
                        prop.value = value;
                        Outcome::Done
                    }
                    None => Outcome::Define(value),
                },
            }
        };
        match outcome {
            Outcome::Done => Ok(()),
            Outcome::Define(value) => {
                self.with_object_mut(r, |o| o.props.define(atom, value, DEFAULT_FLAGS));
                Ok(())
            }
            Outcome::ReadOnly => {
                let name = self.atom_to_string(atom).to_string_lossy();
                Err(self.type_error(&format!("'{}' is read-only", name)))
            }
            Outcome::BadLength => Err(self.range_error("invalid array length")),
        }
    }

    /// `v[atom] = value` for any value
    pub fn set_value_property(&self, target: &JSValue, atom: JSAtom, value: JSValue) -> JSResult<()> {
        match target {
            JSValue::Object(r) => self.set_property(*r, atom, value),
            JSValue::Undefined | JSValue::Null => {
                let name = self.atom_to_string(atom).to_string_lossy();
                let what = if target.is_null() { "null" } else { "undefined" };
                Err(self.type_error(&format!("cannot set property '{}' of {}", name, what)))
            }
            // Assignments to primitives are dropped
            _ => Ok(()),
        }
    }

    /// Create or overwrite an own data property with explicit flags
    pub fn define_property(&self, r: GcRef, atom: JSAtom, value: JSValue, flags: u8) -> JSResult<()> {
        let is_array = self.with_object(r, |o| o.is_array());
        if is_array && (atom.is_index() || atom == atoms::LENGTH) {
            return self.set_property(r, atom, value);
        }
        self.with_object_mut(r, |o| o.props.define(atom, value, flags));
        Ok(())
    }

    /// Delete an own property; false if it cannot be deleted
    pub fn delete_property(&self, r: GcRef, atom: JSAtom) -> bool {
        self.with_object_mut(r, |obj| {
            match &mut obj.class {
                ObjectClass::Array(items) => {
                    if let Some(i) = atom.index() {
                        let i = i as usize;
                        if i + 1 == items.len() {
                            items.pop();
                        } else if i < items.len() {
                            items[i] = JSValue::Undefined;
                        }
                        return true;
                    }
                    if atom == atoms::LENGTH {
                        return false;
                    }
                }
                ObjectClass::Primitive(JSValue::String(s)) => {
                    if atom == atoms::LENGTH || atom.index().is_some_and(|i| (i as usize) < s.len()) {
                        return false;
                    }
                }
                _ => {}
            }
            match obj.props.get(atom) {
                Some(p) if !p.configurable() => false,
                Some(_) => obj.props.delete(atom),
                None => true,
            }
        })
    }

    /// Own property keys in engine order
    pub fn own_keys(&self, r: GcRef, enumerable_only: bool) -> Vec<JSAtom> {
        self.with_object(r, |obj| {
            let virtual_len = match &obj.class {
                ObjectClass::Array(items) => items.len(),
                ObjectClass::Primitive(JSValue::String(s)) => s.len(),
                _ => 0,
            };
            let mut keys: Vec<JSAtom> = (0..virtual_len as u32).map(JSAtom::from_index).collect();
            keys.extend(obj.props.own_keys(enumerable_only));
            keys
        })
    }

    // ---- classification ----

    pub fn is_function(&self, v: &JSValue) -> bool {
        match v {
            JSValue::Object(r) => self.with_object(*r, |o| o.is_function()),
            _ => false,
        }
    }

    pub fn is_array(&self, v: &JSValue) -> bool {
        match v {
            JSValue::Object(r) => self.with_object(*r, |o| o.is_array()),
            _ => false,
        }
    }

    pub fn is_error(&self, v: &JSValue) -> bool {
        match v {
            JSValue::Object(r) => self.with_object(*r, |o| matches!(o.class, ObjectClass::Error)),
            _ => false,
        }
    }
}

impl Drop for JSContext {
    fn drop(&mut self) {
        debug!("runtime {}: context {} destroyed", self.rt.id(), self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Rc<JSContext> {
        JSContext::new(&JSRuntime::new())
    }

    #[test]
    fn test_error_kind_names() {
        for (i, kind) in ErrorKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(ErrorKind::from_index(i), Some(*kind));
        }
        assert_eq!(ErrorKind::URIError.name(), "URIError");
        assert_eq!(ErrorKind::from_index(8), None);
    }

    #[test]
    fn test_property_round_trip() {
        let ctx = setup();
        let obj = ctx.new_object().unwrap();
        let foo = ctx.atom("foo");
        assert!(ctx.get_property(obj, foo).is_undefined());
        ctx.set_property(obj, foo, JSValue::Int(7)).unwrap();
        assert!(matches!(ctx.get_property(obj, foo), JSValue::Int(7)));
        assert!(ctx.has_property(obj, foo));
        assert!(ctx.delete_property(obj, foo));
        assert!(!ctx.has_property(obj, foo));
    }

    #[test]
    fn test_array_virtual_properties() {
        let ctx = setup();
        let arr = ctx
            .new_array(vec![JSValue::Int(1), JSValue::Int(2)])
            .unwrap()
            .as_object()
            .unwrap();
        assert!(matches!(ctx.get_property(arr, atoms::LENGTH), JSValue::Int(2)));
        ctx.set_property(arr, JSAtom::from_index(4), JSValue::Int(5)).unwrap();
        assert!(matches!(ctx.get_property(arr, atoms::LENGTH), JSValue::Int(5)));
        ctx.set_property(arr, atoms::LENGTH, JSValue::Int(1)).unwrap();
        assert_eq!(ctx.own_keys(arr, true), vec![JSAtom::from_index(0)]);
        assert!(ctx.set_property(arr, atoms::LENGTH, JSValue::Float(1.5)).is_err());
    }

    #[test]
    fn test_read_only_property() {
        let ctx = setup();
        let obj = ctx.new_object().unwrap();
        let k = ctx.atom("k");
        ctx.define_property(obj, k, JSValue::Int(1), 0).unwrap();
        assert!(ctx.set_property(obj, k, JSValue::Int(2)).is_err());
        assert!(!ctx.delete_property(obj, k));
    }

    #[test]
    fn test_reading_from_undefined_throws() {
        let ctx = setup();
        let err = ctx
            .get_value_property(&JSValue::Undefined, atoms::LENGTH)
            .unwrap_err();
        assert!(ctx.is_error(&err.0));
    }

    #[test]
    fn test_gc_keeps_realm_alive() {
        let rt = JSRuntime::new();
        let ctx = JSContext::new(&rt);
        let before = rt.heap.borrow().live_objects();
        let garbage = ctx.new_object().unwrap();
        let stats = rt.run_gc().unwrap();
        assert!(stats.freed >= 1);
        assert!(rt.heap.borrow().try_get(garbage).is_none());
        assert!(rt.heap.borrow().live_objects() <= before);
        assert!(rt.heap.borrow().try_get(ctx.global_object()).is_some());
    }

    #[test]
    fn test_gc_refused_while_running() {
        let rt = JSRuntime::new();
        rt.depth.set(1);
        assert!(rt.run_gc().is_none());
        rt.depth.set(0);
        assert!(rt.run_gc().is_some());
    }

    #[test]
    fn test_memory_limit_throws() {
        let rt = JSRuntime::new();
        let ctx = JSContext::new(&rt);
        let used = rt.heap.borrow().bytes_used();
        rt.heap.borrow_mut().memory_limit = Some(used);
        let err = ctx.new_object().unwrap_err();
        assert!(ctx.is_error(&err.0));
    }
}
