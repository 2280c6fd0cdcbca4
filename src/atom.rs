//! Interned property names and property enumeration
//!
//! An [`Atom`] is a runtime-scoped handle to an interned name: comparing two
//! atoms is an integer compare, turning one back into text needs a
//! [`Context`]. [`Value::property_names`](crate::Value::property_names)
//! returns [`PropertyNames`], a snapshot of an object's own enumerable keys
//! taken at the time of the call.

use std::fmt;

use crate::context::Context;
use crate::engine::JSContext;
use crate::object::JSAtom;

/// Interned property name, valid in every context of its runtime
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom {
    raw: JSAtom,
    runtime: u64,
}

impl Atom {
    pub(crate) fn new(ctx: &JSContext, raw: JSAtom) -> Atom {
        Atom {
            raw,
            runtime: ctx.runtime().id(),
        }
    }

    /// Engine atom for use in `ctx`
    ///
    /// # Panics
    /// If the atom was interned by another runtime.
    pub(crate) fn resolve(self, ctx: &JSContext) -> JSAtom {
        if self.runtime != ctx.runtime().id() {
            panic!("protocol violation: atom from another runtime");
        }
        self.raw
    }

    /// Array index this atom stands for, if any
    pub fn index(self) -> Option<u32> {
        self.raw.index()
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw.index() {
            Some(i) => write!(f, "Atom(#{})", i),
            None => write!(f, "Atom({}@{})", self.raw.raw(), self.runtime),
        }
    }
}

/// One enumerated key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyName {
    pub atom: Atom,
    /// Text form; unpaired surrogates are replaced
    pub name: String,
}

/// Own enumerable keys of an object, captured when it was created
///
/// Array indices come first in ascending order, then string keys in
/// insertion order. Later mutations of the object are not observed.
pub struct PropertyNames {
    ctx: Context,
    keys: std::vec::IntoIter<JSAtom>,
}

impl PropertyNames {
    pub(crate) fn new(ctx: &Context, keys: Vec<JSAtom>) -> PropertyNames {
        PropertyNames {
            ctx: Context::from_inner(ctx.inner.handle()),
            keys: keys.into_iter(),
        }
    }
}

impl Iterator for PropertyNames {
    type Item = PropertyName;

    fn next(&mut self) -> Option<PropertyName> {
        let raw = self.keys.next()?;
        Some(PropertyName {
            atom: Atom::new(&self.ctx.inner, raw),
            name: self.ctx.inner.atom_to_string(raw).to_string_lossy(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl ExactSizeIterator for PropertyNames {}

impl Context {
    /// Intern a property name
    pub fn atom(&self, name: &str) -> Atom {
        Atom::new(&self.inner, self.inner.atom(name))
    }

    /// Text of an atom
    ///
    /// # Panics
    /// If the atom was interned by another runtime.
    pub fn atom_name(&self, atom: Atom) -> String {
        let raw = atom.resolve(&self.inner);
        self.inner.atom_to_string(raw).to_string_lossy()
    }
}

#[cfg(test)]
mod tests {
    use crate::{EvalKind, Runtime};

    fn names(v: &crate::Value) -> Vec<String> {
        v.property_names().unwrap().map(|p| p.name).collect()
    }

    #[test]
    fn test_engine_key_order() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let v = ctx
            .eval("({ b: 1, 10: 2, a: 3, 2: 4 })", EvalKind::Global)
            .unwrap();
        assert_eq!(names(&v), ["2", "10", "b", "a"]);
    }

    #[test]
    fn test_snapshot_ignores_later_mutation() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let obj = ctx.eval("({ first: 1 })", EvalKind::Global).unwrap();
        let snapshot = obj.property_names().unwrap();
        obj.set("second", 2).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.map(|p| p.name).collect::<Vec<_>>(), ["first"]);
        assert_eq!(names(&obj), ["first", "second"]);
    }

    #[test]
    fn test_get_by_atom() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let obj = ctx.eval("({ x: 'ex', 3: 'three' })", EvalKind::Global).unwrap();
        for p in obj.property_names().unwrap() {
            let v = obj.get_by_atom(p.atom).unwrap();
            assert_eq!(v.as_string().unwrap(), obj.get(&p.name).unwrap().as_string().unwrap());
        }
        assert_eq!(ctx.atom("3").index(), Some(3));
        assert!(obj.get_by_atom(ctx.atom("missing")).unwrap().is_undefined());
    }

    #[test]
    fn test_atoms_shared_across_contexts() {
        let rt = Runtime::new();
        let a = rt.new_context();
        let b = rt.new_context();
        let atom = a.atom("shared");
        assert_eq!(atom, b.atom("shared"));
        assert_eq!(b.atom_name(atom), "shared");
        let obj = b.object().unwrap();
        obj.set_by_atom(atom, 1).unwrap();
        assert_eq!(obj.get("shared").unwrap().as_i32().unwrap(), 1);
    }

    #[test]
    #[should_panic(expected = "protocol violation: atom from another runtime")]
    fn test_foreign_atom_panics() {
        let rt1 = Runtime::new();
        let rt2 = Runtime::new();
        let atom = rt1.new_context().atom("x");
        rt2.new_context().atom_name(atom);
    }

    #[test]
    fn test_global_enumeration() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        ctx.eval("var alpha = 1; beta = 2; function gamma() {}", EvalKind::Global)
            .unwrap();
        let globals = names(&ctx.globals());
        for name in ["alpha", "beta", "gamma"] {
            assert!(globals.iter().any(|g| g == name), "{name} in {globals:?}");
        }
        assert!(!globals.iter().any(|g| g == "Math"));
    }
}
