// opal-core - Symbol type with interning
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Symbols are identifiers that may be optionally namespaced.
//!
//! Symbols are interned through the global table in [`crate::intern`]:
//! two symbols with the same namespace and name share storage, so equality
//! is a pointer comparison and hashing is a pointer hash. Ordering is
//! semantic (by namespace, then name) so symbols sort stably regardless of
//! interning order.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock};

use crate::intern::{Interner, NameInner, intern_in, order_names};

/// A symbol with optional namespace.
#[derive(Clone)]
pub struct Symbol {
    inner: Arc<NameInner>,
}

static SYMBOL_INTERNER: OnceLock<Mutex<Interner>> = OnceLock::new();

fn interner() -> &'static Mutex<Interner> {
    SYMBOL_INTERNER.get_or_init(|| Mutex::new(Interner::new()))
}

impl Symbol {
    /// Create a new symbol with no namespace.
    pub fn new(name: &str) -> Self {
        Symbol {
            inner: intern_in(interner(), None, name),
        }
    }

    /// Create a new symbol with a namespace.
    pub fn with_namespace(namespace: &str, name: &str) -> Self {
        Symbol {
            inner: intern_in(interner(), Some(namespace), name),
        }
    }

    /// Parse a symbol from a string like "foo" or "ns/foo".
    pub fn parse(s: &str) -> Self {
        // The division symbol is the one name that legitimately contains '/'.
        if s == "/" {
            return Symbol::new("/");
        }
        if let Some(slash_pos) = s.find('/') {
            Symbol::with_namespace(&s[..slash_pos], &s[slash_pos + 1..])
        } else {
            Symbol::new(s)
        }
    }

    /// Get the namespace, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.inner.namespace.as_deref()
    }

    /// Get the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Check if this symbol has a namespace.
    #[must_use]
    pub fn has_namespace(&self) -> bool {
        self.inner.namespace.is_some()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ns) = &self.inner.namespace {
            write!(f, "{}/{}", ns, self.inner.name)
        } else {
            write!(f, "{}", self.inner.name)
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        // Due to interning, pointer comparison is sufficient
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Symbol {}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        order_names(&self.inner, &other.inner)
    }
}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Use pointer hash for interned symbols
        Arc::as_ptr(&self.inner).hash(state);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_symbol() {
        let sym = Symbol::new("foo");
        assert_eq!(sym.name(), "foo");
        assert!(sym.namespace().is_none());
        assert_eq!(format!("{}", sym), "foo");
    }

    #[test]
    fn test_namespaced_symbol() {
        let sym = Symbol::with_namespace("user", "foo");
        assert_eq!(sym.name(), "foo");
        assert_eq!(sym.namespace(), Some("user"));
        assert_eq!(format!("{}", sym), "user/foo");
    }

    #[test]
    fn test_parse_namespaced() {
        let sym = Symbol::parse("user/foo");
        assert_eq!(sym.name(), "foo");
        assert_eq!(sym.namespace(), Some("user"));
    }

    #[test]
    fn test_parse_slash_symbol() {
        let sym = Symbol::parse("/");
        assert_eq!(sym.name(), "/");
        assert!(sym.namespace().is_none());
    }

    #[test]
    fn test_interning() {
        let sym1 = Symbol::new("foo");
        let sym2 = Symbol::new("foo");
        assert_eq!(sym1, sym2);
        // Interned symbols share the same Arc
        assert!(Arc::ptr_eq(&sym1.inner, &sym2.inner));
    }

    #[test]
    fn test_ordering() {
        let a = Symbol::new("a");
        let b = Symbol::new("b");
        let ns_a = Symbol::with_namespace("ns", "a");

        assert!(a < b);
        assert!(a < ns_a); // Non-namespaced comes before namespaced
    }
}
