//! JavaScript object representation
//!
//! Every heap cell is a JSObject: a prototype link, an own property table and
//! a class payload. Engine-private records (scope frames, loop iterators) use
//! the same representation so the collector sees a single graph.

use std::mem;
use std::rc::Rc;

use super::atom::JSAtom;
use super::function::{Closure, HostCallback, NativeFunction};
use super::property::PropertyTable;
use crate::gc::GcRef;
use crate::value::JSValue;

/// Captured variable record
#[derive(Clone)]
pub struct Scope {
    pub slots: Vec<JSValue>,
    pub parent: Option<GcRef>,
}

/// for-in iteration state (keys snapshotted at loop entry)
#[derive(Clone)]
pub struct ForInIter {
    pub target: JSValue,
    pub keys: Vec<JSAtom>,
    pub pos: usize,
}

/// for-of iteration state over arrays and strings
#[derive(Clone)]
pub struct ForOfIter {
    pub target: JSValue,
    pub pos: usize,
}

/// Object class payload
pub enum ObjectClass {
    Ordinary,
    Array(Vec<JSValue>),
    Closure(Closure),
    Native(NativeFunction),
    Host(Rc<dyn HostCallback>),
    Error,
    ArrayBuffer(Vec<u8>),
    /// Boxed Number/String/Boolean/BigInt/BigDecimal
    Primitive(JSValue),
    Scope(Scope),
    ForIn(ForInIter),
    ForOf(ForOfIter),
}

impl ObjectClass {
    /// Class name used by `Object.prototype.toString`
    pub fn name(&self) -> &'static str {
        match self {
            ObjectClass::Array(_) => "Array",
            ObjectClass::Closure(_) | ObjectClass::Native(_) | ObjectClass::Host(_) => "Function",
            ObjectClass::Error => "Error",
            ObjectClass::ArrayBuffer(_) => "ArrayBuffer",
            ObjectClass::Primitive(v) => match v {
                JSValue::Int(_) | JSValue::Float(_) => "Number",
                JSValue::String(_) => "String",
                JSValue::Bool(_) => "Boolean",
                JSValue::BigInt(_) => "BigInt",
                JSValue::BigDecimal(_) => "BigDecimal",
                _ => "Object",
            },
            _ => "Object",
        }
    }
}

/// Heap object
pub struct JSObject {
    pub class: ObjectClass,
    pub proto: Option<GcRef>,
    pub props: PropertyTable,
}

impl JSObject {
    pub fn new(class: ObjectClass, proto: Option<GcRef>) -> Self {
        JSObject {
            class,
            proto,
            props: PropertyTable::new(),
        }
    }

    #[inline]
    pub fn is_function(&self) -> bool {
        matches!(
            self.class,
            ObjectClass::Closure(_) | ObjectClass::Native(_) | ObjectClass::Host(_)
        )
    }

    /// Check if `new` may be applied
    pub fn is_constructor(&self) -> bool {
        match &self.class {
            ObjectClass::Closure(c) => !c.func.is_arrow(),
            ObjectClass::Native(n) => n.constructor,
            ObjectClass::Host(_) => true,
            _ => false,
        }
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self.class, ObjectClass::Array(_))
    }

    /// Approximate retained size in bytes
    pub fn approx_size(&self) -> usize {
        let payload = match &self.class {
            ObjectClass::Array(v) => v.capacity() * mem::size_of::<JSValue>(),
            ObjectClass::ArrayBuffer(b) => b.capacity(),
            ObjectClass::Scope(s) => s.slots.capacity() * mem::size_of::<JSValue>(),
            ObjectClass::ForIn(it) => it.keys.capacity() * mem::size_of::<JSAtom>(),
            ObjectClass::Closure(c) => c.func.code.len(),
            _ => 0,
        };
        mem::size_of::<JSObject>() + self.props.len() * 32 + payload
    }

    /// Push every heap reference held by this object
    pub fn trace(&self, out: &mut Vec<GcRef>) {
        if let Some(p) = self.proto {
            out.push(p);
        }
        for prop in self.props.iter() {
            trace_value(&prop.value, out);
        }
        match &self.class {
            ObjectClass::Array(items) => items.iter().for_each(|v| trace_value(v, out)),
            ObjectClass::Closure(c) => {
                if let Some(s) = c.scope {
                    out.push(s);
                }
                if let Some(t) = &c.this_val {
                    trace_value(t, out);
                }
            }
            ObjectClass::Primitive(v) => trace_value(v, out),
            ObjectClass::Scope(s) => {
                s.slots.iter().for_each(|v| trace_value(v, out));
                if let Some(p) = s.parent {
                    out.push(p);
                }
            }
            ObjectClass::ForIn(it) => trace_value(&it.target, out),
            ObjectClass::ForOf(it) => trace_value(&it.target, out),
            ObjectClass::Ordinary
            | ObjectClass::Native(_)
            | ObjectClass::Host(_)
            | ObjectClass::Error
            | ObjectClass::ArrayBuffer(_) => {}
        }
    }
}

#[inline]
pub fn trace_value(v: &JSValue, out: &mut Vec<GcRef>) {
    if let JSValue::Object(r) = v {
        out.push(*r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::property::DEFAULT_FLAGS;

    fn gc_ref(index: u32) -> GcRef {
        GcRef::new(index, 0)
    }

    #[test]
    fn test_class_names() {
        assert_eq!(ObjectClass::Ordinary.name(), "Object");
        assert_eq!(ObjectClass::Array(Vec::new()).name(), "Array");
        assert_eq!(ObjectClass::Primitive(JSValue::Bool(true)).name(), "Boolean");
        assert_eq!(ObjectClass::Primitive(JSValue::string("x")).name(), "String");
    }

    #[test]
    fn test_trace_collects_children() {
        let mut obj = JSObject::new(
            ObjectClass::Array(vec![JSValue::Object(gc_ref(2)), JSValue::Int(1)]),
            Some(gc_ref(1)),
        );
        obj.props
            .define(JSAtom(50), JSValue::Object(gc_ref(3)), DEFAULT_FLAGS);
        let mut out = Vec::new();
        obj.trace(&mut out);
        out.sort_by_key(|r| r.index());
        assert_eq!(out, vec![gc_ref(1), gc_ref(2), gc_ref(3)]);
    }

    #[test]
    fn test_scope_trace() {
        let obj = JSObject::new(
            ObjectClass::Scope(Scope {
                slots: vec![JSValue::Object(gc_ref(7))],
                parent: Some(gc_ref(8)),
            }),
            None,
        );
        let mut out = Vec::new();
        obj.trace(&mut out);
        assert_eq!(out.len(), 2);
        assert!(!obj.is_function());
        assert!(!obj.is_constructor());
    }
}
