// opal-core - Keyword type with interning
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Keywords are self-evaluating identifiers that may be optionally
//! namespaced. They always print with a leading colon.
//!
//! Keywords share the interning machinery in [`crate::intern`] but keep
//! their own table, so `:foo` and the symbol `foo` are distinct identities.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock};

use crate::intern::{Interner, NameInner, intern_in, order_names};

/// A keyword with optional namespace.
#[derive(Clone)]
pub struct Keyword {
    inner: Arc<NameInner>,
}

static KEYWORD_INTERNER: OnceLock<Mutex<Interner>> = OnceLock::new();

fn interner() -> &'static Mutex<Interner> {
    KEYWORD_INTERNER.get_or_init(|| Mutex::new(Interner::new()))
}

impl Keyword {
    /// Create a new keyword with no namespace.
    pub fn new(name: &str) -> Self {
        Keyword {
            inner: intern_in(interner(), None, name),
        }
    }

    /// Create a new keyword with a namespace.
    pub fn with_namespace(namespace: &str, name: &str) -> Self {
        Keyword {
            inner: intern_in(interner(), Some(namespace), name),
        }
    }

    /// Parse a keyword from a string like ":foo" or ":ns/foo".
    /// The leading colon is optional.
    pub fn parse(s: &str) -> Self {
        let s = s.strip_prefix(':').unwrap_or(s);
        if let Some(slash_pos) = s.find('/') {
            Keyword::with_namespace(&s[..slash_pos], &s[slash_pos + 1..])
        } else {
            Keyword::new(s)
        }
    }

    /// Get the namespace, if any.
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.inner.namespace.as_deref()
    }

    /// Get the name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Check if this keyword has a namespace.
    #[inline]
    #[must_use]
    pub fn has_namespace(&self) -> bool {
        self.inner.namespace.is_some()
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ns) = &self.inner.namespace {
            write!(f, ":{}/{}", ns, self.inner.name)
        } else {
            write!(f, ":{}", self.inner.name)
        }
    }
}

impl fmt::Debug for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keyword({})", self)
    }
}

impl PartialEq for Keyword {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        // Due to interning, pointer comparison is sufficient
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Keyword {}

impl PartialOrd for Keyword {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Keyword {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        order_names(&self.inner, &other.inner)
    }
}

impl Hash for Keyword {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Use pointer hash for interned keywords
        Arc::as_ptr(&self.inner).hash(state);
    }
}

// ============================================================================
// Tests
// ============================================================================
