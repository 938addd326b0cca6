// opal-core - Global interning for identifier names
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Shared interning machinery for symbols and keywords.
//!
//! Identifiers are interned process-wide: two identifiers with the same
//! namespace and name share one allocation, so equality is a pointer
//! comparison and hashing is a pointer hash. Interned names are never
//! deallocated; the tables grow monotonically with unique identifiers,
//! which is the expected shape for programs with a bounded identifier set.
//!
//! Creation takes a `Mutex`; lookup, comparison, and hashing after creation
//! are lock-free. The tables are safe to use from any thread.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

/// An interned (namespace, name) pair.
#[derive(Debug)]
pub(crate) struct NameInner {
    pub(crate) namespace: Option<Arc<str>>,
    pub(crate) name: Arc<str>,
}

/// One interning table. Symbols and keywords each own a table so that a
/// symbol and a keyword with the same name remain distinct identities.
pub(crate) struct Interner {
    names: FxHashMap<(Option<Arc<str>>, Arc<str>), Arc<NameInner>>,
    strings: FxHashMap<String, Arc<str>>,
}

impl Interner {
    pub(crate) fn new() -> Self {
        Interner {
            names: FxHashMap::default(),
            strings: FxHashMap::default(),
        }
    }

    fn intern_str(&mut self, s: &str) -> Arc<str> {
        if let Some(interned) = self.strings.get(s) {
            Arc::clone(interned)
        } else {
            let interned: Arc<str> = Arc::from(s);
            self.strings.insert(s.to_string(), Arc::clone(&interned));
            interned
        }
    }

    pub(crate) fn intern(&mut self, namespace: Option<&str>, name: &str) -> Arc<NameInner> {
        let ns = namespace.map(|s| self.intern_str(s));
        let n = self.intern_str(name);

        let key = (ns.clone(), n.clone());
        if let Some(existing) = self.names.get(&key) {
            Arc::clone(existing)
        } else {
            let inner = Arc::new(NameInner {
                namespace: ns,
                name: n,
            });
            self.names.insert(key, Arc::clone(&inner));
            inner
        }
    }
}

/// Intern into the given table, acquiring its lock.
pub(crate) fn intern_in(
    table: &Mutex<Interner>,
    namespace: Option<&str>,
    name: &str,
) -> Arc<NameInner> {
    table
        .lock()
        .expect("interner mutex poisoned: another thread panicked while holding the lock")
        .intern(namespace, name)
}

/// Order two interned names: namespace-less sorts first, then by namespace,
/// then by name.
pub(crate) fn order_names(a: &NameInner, b: &NameInner) -> std::cmp::Ordering {
    match (&a.namespace, &b.namespace) {
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
        (Some(x), Some(y)) => match x.cmp(y) {
            std::cmp::Ordering::Equal => a.name.cmp(&b.name),
            other => other,
        },
    }
}
