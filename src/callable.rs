// opal-core - Function-like kinds
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Function-like values: native wrappers, compiled functions, and
//! multi-methods.
//!
//! Invocation is arity-specialized (0-10 positional arguments) and every
//! callable answers an arity-flags query: bit `n` set means arity `n` is
//! accepted, with [`VARIADIC_BIT`] marking a variadic tail.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::symbol::Symbol;
use crate::value::OpalVal;

/// Highest positional arity the call protocol supports.
pub const MAX_ARITY: usize = 10;

/// Arity-flags bit marking a variadic tail beyond the fixed arities.
pub const VARIADIC_BIT: u32 = 1 << 11;

/// Mask with every fixed arity bit set.
pub const ALL_ARITIES: u32 = (1 << (MAX_ARITY as u32 + 1)) - 1;

pub type NativeFnImpl = Rc<dyn Fn(&[OpalVal]) -> Result<OpalVal>>;

// ============================================================================
// OpalNativeFn
// ============================================================================

/// A runtime function implemented in Rust. Accepts any arity up to the
/// protocol maximum; the implementation enforces its own arity rules.
#[derive(Clone)]
pub struct OpalNativeFn {
    name: Rc<str>,
    func: NativeFnImpl,
}

impl OpalNativeFn {
    pub fn new(name: &str, func: NativeFnImpl) -> Self {
        OpalNativeFn {
            name: Rc::from(name),
            func,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invoke(&self, args: &[OpalVal]) -> Result<OpalVal> {
        (self.func)(args)
    }

    pub fn arity_flags(&self) -> u32 {
        ALL_ARITIES | VARIADIC_BIT
    }

    /// Identity for equality and hashing; functions have no structural
    /// equality.
    pub fn fn_ptr(&self) -> usize {
        Rc::as_ptr(&self.func).cast::<()>() as usize
    }
}

impl fmt::Debug for OpalNativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<native-fn {}>", self.name)
    }
}

// ============================================================================
// OpalCompiledFn
// ============================================================================

/// The core-side representation of a compiled function: one boxed entry
/// point per fixed arity, plus an optional variadic entry point taking
/// the trailing arguments as a sequence-ready slice.
pub struct OpalCompiledFn {
    name: Option<Symbol>,
    arities: [Option<NativeFnImpl>; MAX_ARITY + 1],
    variadic: Option<(usize, NativeFnImpl)>,
    meta: Option<OpalVal>,
}

impl OpalCompiledFn {
    pub fn new(name: Option<Symbol>) -> Self {
        OpalCompiledFn {
            name,
            arities: Default::default(),
            variadic: None,
            meta: None,
        }
    }

    /// Register the entry point for a fixed arity. Arities above the
    /// protocol maximum are a shape error.
    pub fn with_arity(mut self, arity: usize, f: NativeFnImpl) -> Result<Self> {
        if arity > MAX_ARITY {
            return Err(Error::shape(format!(
                "arity {} exceeds the supported maximum of {}",
                arity, MAX_ARITY
            )));
        }
        self.arities[arity] = Some(f);
        Ok(self)
    }

    /// Register a variadic entry point for `min_arity` or more arguments.
    pub fn with_variadic(mut self, min_arity: usize, f: NativeFnImpl) -> Result<Self> {
        if min_arity > MAX_ARITY {
            return Err(Error::shape(format!(
                "variadic minimum arity {} exceeds the supported maximum of {}",
                min_arity, MAX_ARITY
            )));
        }
        self.variadic = Some((min_arity, f));
        Ok(self)
    }

    pub fn name(&self) -> Option<&Symbol> {
        self.name.as_ref()
    }

    fn display_name(&self) -> String {
        match &self.name {
            Some(sym) => sym.to_string(),
            None => "fn".to_string(),
        }
    }

    pub fn invoke(&self, args: &[OpalVal]) -> Result<OpalVal> {
        if args.len() <= MAX_ARITY
            && let Some(f) = &self.arities[args.len()]
        {
            return f(args);
        }
        if let Some((min, f)) = &self.variadic
            && args.len() >= *min
        {
            return f(args);
        }
        Err(Error::arity(self.display_name(), args.len()))
    }

    pub fn arity_flags(&self) -> u32 {
        let mut flags = 0u32;
        for (i, slot) in self.arities.iter().enumerate() {
            if slot.is_some() {
                flags |= 1 << i;
            }
        }
        if self.variadic.is_some() {
            flags |= VARIADIC_BIT;
        }
        flags
    }

    pub fn meta(&self) -> Option<&OpalVal> {
        self.meta.as_ref()
    }

    pub fn with_meta(&self, meta: Option<OpalVal>) -> Self {
        OpalCompiledFn {
            name: self.name.clone(),
            arities: self.arities.clone(),
            variadic: self.variadic.clone(),
            meta,
        }
    }
}

impl fmt::Debug for OpalCompiledFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<fn {}>", self.display_name())
    }
}

// ============================================================================
// OpalMultiFn
// ============================================================================

/// A multi-method: a dispatch function selects a method from a mutable
/// method table, with an optional default method.
pub struct OpalMultiFn {
    name: Symbol,
    dispatch_fn: OpalVal,
    methods: RefCell<FxHashMap<OpalVal, OpalVal>>,
    default: RefCell<Option<OpalVal>>,
}

impl OpalMultiFn {
    pub fn new(name: Symbol, dispatch_fn: OpalVal) -> Self {
        OpalMultiFn {
            name,
            dispatch_fn,
            methods: RefCell::new(FxHashMap::default()),
            default: RefCell::new(None),
        }
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    pub fn dispatch_fn(&self) -> &OpalVal {
        &self.dispatch_fn
    }

    /// Register a method for a dispatch value.
    pub fn add_method(&self, dispatch_val: OpalVal, method: OpalVal) {
        self.methods.borrow_mut().insert(dispatch_val, method);
    }

    /// Register the default method.
    pub fn set_default(&self, method: OpalVal) {
        *self.default.borrow_mut() = Some(method);
    }

    pub fn remove_method(&self, dispatch_val: &OpalVal) {
        self.methods.borrow_mut().remove(dispatch_val);
    }

    /// Method for a dispatch value, falling back to the default.
    pub fn get_method(&self, dispatch_val: &OpalVal) -> Option<OpalVal> {
        self.methods
            .borrow()
            .get(dispatch_val)
            .cloned()
            .or_else(|| self.default.borrow().clone())
    }

    pub fn invoke(&self, args: &[OpalVal]) -> Result<OpalVal> {
        let dispatch_val = crate::ops::invoke::invoke(&self.dispatch_fn, args)?;
        match self.get_method(&dispatch_val) {
            Some(method) => crate::ops::invoke::invoke(&method, args),
            None => Err(Error::shape(format!(
                "no method in multi-fn {} for dispatch value {}",
                self.name,
                crate::ops::print::to_code_string(&dispatch_val)
            ))),
        }
    }

    pub fn arity_flags(&self) -> u32 {
        ALL_ARITIES | VARIADIC_BIT
    }
}

impl fmt::Debug for OpalMultiFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<multi-fn {}>", self.name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_fn_invoke() {
        let f = OpalNativeFn::new(
            "add",
            Rc::new(|args| {
                let mut sum = 0;
                for a in args {
                    if let OpalVal::Int(n) = a {
                        sum += n;
                    }
                }
                Ok(OpalVal::int(sum))
            }),
        );
        let out = f.invoke(&[OpalVal::int(1), OpalVal::int(2)]).unwrap();
        assert_eq!(out, OpalVal::int(3));
    }

    #[test]
    fn test_compiled_fn_arities() {
        let f = OpalCompiledFn::new(Some(Symbol::new("two-faced")))
            .with_arity(0, Rc::new(|_| Ok(OpalVal::int(0))))
            .unwrap()
            .with_arity(2, Rc::new(|_| Ok(OpalVal::int(2))))
            .unwrap();
        assert_eq!(f.invoke(&[]).unwrap(), OpalVal::int(0));
        assert_eq!(
            f.invoke(&[OpalVal::Nil, OpalVal::Nil]).unwrap(),
            OpalVal::int(2)
        );
        let err = f.invoke(&[OpalVal::Nil]).unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { .. }));
        assert_eq!(f.arity_flags(), 0b101);
    }

    #[test]
    fn test_compiled_fn_variadic() {
        let f = OpalCompiledFn::new(None)
            .with_variadic(1, Rc::new(|args| Ok(OpalVal::int(args.len() as i64))))
            .unwrap();
        assert!(f.invoke(&[]).is_err());
        assert_eq!(f.invoke(&vec![OpalVal::Nil; 4]).unwrap(), OpalVal::int(4));
        assert_eq!(f.arity_flags(), VARIADIC_BIT);
    }
}
