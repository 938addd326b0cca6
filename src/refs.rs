// opal-core - Reference kinds
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Reference kinds: vars (with their sentinel kinds), namespaces, atoms,
//! volatiles, delays, and tagged literals.
//!
//! The namespace/var machinery here is deliberately thin: interning
//! policy, thread-local binding stacks, and refer/alias resolution belong
//! to the evaluation layers. The core only gives these kinds a uniform
//! representation and their capability surface (deref, name, metadata).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::seq::lazy::LazyThunk;
use crate::symbol::Symbol;
use crate::value::OpalVal;

// ============================================================================
// Var
// ============================================================================

struct VarInner {
    ns: Option<Rc<str>>,
    name: Rc<str>,
    root: RefCell<OpalVal>,
    dynamic: Cell<bool>,
    meta: RefCell<Option<OpalVal>>,
}

/// A var: a named mutable root binding. Vars compare and hash by
/// identity.
#[derive(Clone)]
pub struct OpalVar {
    inner: Rc<VarInner>,
}

impl OpalVar {
    pub fn new(name: &str, value: OpalVal) -> Self {
        OpalVar {
            inner: Rc::new(VarInner {
                ns: None,
                name: Rc::from(name),
                root: RefCell::new(value),
                dynamic: Cell::new(false),
                meta: RefCell::new(None),
            }),
        }
    }

    pub fn with_ns(ns: &str, name: &str, value: OpalVal) -> Self {
        OpalVar {
            inner: Rc::new(VarInner {
                ns: Some(Rc::from(ns)),
                name: Rc::from(name),
                root: RefCell::new(value),
                dynamic: Cell::new(false),
                meta: RefCell::new(None),
            }),
        }
    }

    /// A var whose root has not been bound yet: it derefs to the
    /// unbound-root sentinel.
    pub fn unbound(ns: Option<&str>, name: &str) -> Self {
        let var = OpalVar {
            inner: Rc::new(VarInner {
                ns: ns.map(Rc::from),
                name: Rc::from(name),
                root: RefCell::new(OpalVal::Nil),
                dynamic: Cell::new(false),
                meta: RefCell::new(None),
            }),
        };
        let sentinel = OpalVal::var_unbound_root(VarUnboundRoot {
            var_name: var.qualified_name(),
        });
        *var.inner.root.borrow_mut() = sentinel;
        var
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn ns(&self) -> Option<&str> {
        self.inner.ns.as_deref()
    }

    pub fn qualified_name(&self) -> String {
        match &self.inner.ns {
            Some(ns) => format!("{}/{}", ns, self.inner.name),
            None => self.inner.name.to_string(),
        }
    }

    /// The current root binding. Thread-local bindings are resolved by
    /// the excluded binding layer, not here.
    pub fn deref(&self) -> OpalVal {
        self.inner.root.borrow().clone()
    }

    pub fn bind_root(&self, value: OpalVal) {
        *self.inner.root.borrow_mut() = value;
    }

    pub fn is_bound(&self) -> bool {
        !matches!(&*self.inner.root.borrow(), OpalVal::VarUnboundRoot(_))
    }

    pub fn is_dynamic(&self) -> bool {
        self.inner.dynamic.get()
    }

    pub fn set_dynamic(&self, dynamic: bool) {
        self.inner.dynamic.set(dynamic);
    }

    pub fn meta(&self) -> Option<OpalVal> {
        self.inner.meta.borrow().clone()
    }

    /// Replace the var's metadata. Must be map-shaped or nil.
    pub fn set_meta(&self, meta: Option<OpalVal>) -> Result<()> {
        if let Some(m) = &meta
            && !m.is_map()
        {
            return Err(Error::shape(format!(
                "metadata must be a map, got {}",
                m.type_name()
            )));
        }
        *self.inner.meta.borrow_mut() = meta;
        Ok(())
    }

    pub fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }
}

impl PartialEq for OpalVar {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for OpalVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#'{}", self.qualified_name())
    }
}

/// Sentinel stored as the root of a var that has never been bound.
pub struct VarUnboundRoot {
    pub var_name: String,
}

/// Sentinel produced by the excluded binding layer when a dynamic var is
/// rebound on a thread's binding stack.
pub struct VarThreadBinding {
    pub value: OpalVal,
    pub var_name: String,
}

// ============================================================================
// Namespace
// ============================================================================

/// A namespace: an interned name with a symbol-to-var mapping table.
pub struct OpalNamespace {
    name: Symbol,
    mappings: RefCell<FxHashMap<Symbol, OpalVal>>,
    meta: RefCell<Option<OpalVal>>,
}

impl OpalNamespace {
    pub fn new(name: Symbol) -> Self {
        OpalNamespace {
            name,
            mappings: RefCell::new(FxHashMap::default()),
            meta: RefCell::new(None),
        }
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Map a symbol to a value (typically a var).
    pub fn def(&self, sym: Symbol, value: OpalVal) {
        self.mappings.borrow_mut().insert(sym, value);
    }

    pub fn find(&self, sym: &Symbol) -> Option<OpalVal> {
        self.mappings.borrow().get(sym).cloned()
    }

    pub fn mapping_count(&self) -> usize {
        self.mappings.borrow().len()
    }

    pub fn meta(&self) -> Option<OpalVal> {
        self.meta.borrow().clone()
    }
}

impl fmt::Debug for OpalNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<ns {}>", self.name)
    }
}

// ============================================================================
// Atom
// ============================================================================

/// Synchronous mutable reference. Compares and hashes by identity.
#[derive(Clone)]
pub struct OpalAtom {
    value: Rc<RefCell<OpalVal>>,
}

impl OpalAtom {
    pub fn new(value: OpalVal) -> Self {
        OpalAtom {
            value: Rc::new(RefCell::new(value)),
        }
    }

    pub fn deref(&self) -> OpalVal {
        self.value.borrow().clone()
    }

    /// Replace the value, returning the previous one.
    pub fn reset(&self, new_val: OpalVal) -> OpalVal {
        std::mem::replace(&mut *self.value.borrow_mut(), new_val)
    }

    /// Set the value only when the current value equals `expected`.
    pub fn compare_and_set(&self, expected: &OpalVal, new_val: OpalVal) -> Result<bool> {
        let matches = crate::ops::equality::equal(&self.value.borrow(), expected)?;
        if matches {
            *self.value.borrow_mut() = new_val;
        }
        Ok(matches)
    }

    pub fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.value) as usize
    }
}

impl PartialEq for OpalAtom {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }
}

// ============================================================================
// Volatile
// ============================================================================

/// Uncoordinated mutable box for single-threaded hot paths.
#[derive(Clone)]
pub struct OpalVolatile {
    value: Rc<RefCell<OpalVal>>,
}

impl OpalVolatile {
    pub fn new(value: OpalVal) -> Self {
        OpalVolatile {
            value: Rc::new(RefCell::new(value)),
        }
    }

    pub fn deref(&self) -> OpalVal {
        self.value.borrow().clone()
    }

    pub fn reset(&self, new_val: OpalVal) -> OpalVal {
        *self.value.borrow_mut() = new_val.clone();
        new_val
    }

    pub fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.value) as usize
    }
}

impl PartialEq for OpalVolatile {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }
}

// ============================================================================
// Delay
// ============================================================================

enum DelayState {
    Pending(LazyThunk),
    Realized(OpalVal),
    Failed(Error),
}

/// A deferred computation memoizing its value or its failure, like a lazy
/// sequence without the sequence coercion.
#[derive(Clone)]
pub struct OpalDelay {
    state: Rc<RefCell<DelayState>>,
}

impl OpalDelay {
    pub fn new_native(thunk: Rc<dyn Fn() -> Result<OpalVal>>) -> Self {
        OpalDelay {
            state: Rc::new(RefCell::new(DelayState::Pending(LazyThunk::Native(thunk)))),
        }
    }

    pub fn new_callable(f: OpalVal) -> Self {
        OpalDelay {
            state: Rc::new(RefCell::new(DelayState::Pending(LazyThunk::Callable(f)))),
        }
    }

    pub fn is_realized(&self) -> bool {
        !matches!(*self.state.borrow(), DelayState::Pending(_))
    }

    /// Run the thunk once; later derefs return the memoized value or
    /// re-raise the memoized failure.
    pub fn force(&self) -> Result<OpalVal> {
        {
            let state = self.state.borrow();
            match &*state {
                DelayState::Realized(v) => return Ok(v.clone()),
                DelayState::Failed(e) => return Err(e.clone()),
                DelayState::Pending(_) => {}
            }
        }
        let thunk = {
            let mut state = self.state.borrow_mut();
            match std::mem::replace(
                &mut *state,
                DelayState::Failed(Error::internal("delay forced re-entrantly")),
            ) {
                DelayState::Pending(thunk) => thunk,
                other => {
                    let result = match &other {
                        DelayState::Realized(v) => Ok(v.clone()),
                        DelayState::Failed(e) => Err(e.clone()),
                        DelayState::Pending(_) => unreachable!(),
                    };
                    *state = other;
                    return result;
                }
            }
        };
        let outcome = thunk.run();
        let mut state = self.state.borrow_mut();
        match outcome {
            Ok(v) => {
                *state = DelayState::Realized(v.clone());
                Ok(v)
            }
            Err(e) => {
                *state = DelayState::Failed(e.clone());
                Err(e)
            }
        }
    }

    pub fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.state) as usize
    }
}

impl PartialEq for OpalDelay {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

// ============================================================================
// TaggedLiteral
// ============================================================================

/// A reader tagged literal: a tag symbol and the tagged form. Equality
/// and hashing cover both.
pub struct TaggedLiteral {
    pub tag: OpalVal,
    pub form: OpalVal,
}

impl TaggedLiteral {
    pub fn new(tag: OpalVal, form: OpalVal) -> Self {
        TaggedLiteral { tag, form }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_deref_and_rebind() {
        let v = OpalVar::with_ns("user", "x", OpalVal::int(1));
        assert_eq!(v.deref(), OpalVal::int(1));
        v.bind_root(OpalVal::int(2));
        assert_eq!(v.deref(), OpalVal::int(2));
        assert_eq!(v.qualified_name(), "user/x");
    }

    #[test]
    fn test_unbound_var_sentinel() {
        let v = OpalVar::unbound(Some("user"), "y");
        assert!(!v.is_bound());
        assert!(matches!(v.deref(), OpalVal::VarUnboundRoot(_)));
    }

    #[test]
    fn test_var_meta_must_be_map() {
        let v = OpalVar::new("m", OpalVal::Nil);
        assert!(v.set_meta(Some(OpalVal::int(1))).is_err());
        let meta = OpalVal::array_map_from_flat(&[]).unwrap();
        v.set_meta(Some(meta)).unwrap();
        assert!(v.meta().is_some());
    }

    #[test]
    fn test_atom_compare_and_set() {
        let a = OpalAtom::new(OpalVal::int(1));
        assert!(a.compare_and_set(&OpalVal::int(1), OpalVal::int(2)).unwrap());
        assert!(!a.compare_and_set(&OpalVal::int(1), OpalVal::int(3)).unwrap());
        assert_eq!(a.deref(), OpalVal::int(2));
    }

    #[test]
    fn test_delay_memoizes_failure() {
        let d = OpalDelay::new_native(Rc::new(|| Err(Error::shape("boom"))));
        assert!(d.force().is_err());
        assert!(d.force().is_err());
        assert!(d.is_realized());
    }

    #[test]
    fn test_namespace_mapping() {
        let ns = OpalNamespace::new(Symbol::new("user"));
        let var = OpalVar::with_ns("user", "z", OpalVal::int(3));
        ns.def(Symbol::new("z"), OpalVal::var(var));
        assert!(ns.find(&Symbol::new("z")).is_some());
        assert!(ns.find(&Symbol::new("missing")).is_none());
    }
}
