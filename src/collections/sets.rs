// opal-core - Persistent set family
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Persistent sets, mirroring the map family structurally.
//!
//! A set stores each element as both key and value of its backing map, so
//! membership testing is exactly a map lookup with the element as key, and
//! `get` on a set returns the stored element itself.

use std::cell::Cell;

use crate::collections::hash_map::{PersistentHashMap, TransientHashMap};
use crate::collections::sorted_map::{PersistentSortedMap, TransientSortedMap};
use crate::error::Result;
use crate::value::OpalVal;

// ============================================================================
// PersistentHashSet
// ============================================================================

/// An immutable unordered set backed by the hash trie.
#[derive(Clone)]
pub struct PersistentHashSet {
    map: PersistentHashMap,
    meta: Option<OpalVal>,
    hash: Cell<Option<u64>>,
}

impl PersistentHashSet {
    /// The empty hash set.
    pub fn empty() -> Self {
        PersistentHashSet {
            map: PersistentHashMap::empty(),
            meta: None,
            hash: Cell::new(None),
        }
    }

    /// Build from elements; duplicates collapse.
    pub fn from_vec(elements: Vec<OpalVal>) -> Result<Self> {
        let mut t = PersistentHashSet::empty().to_transient();
        for v in elements {
            t.conj_mut(v)?;
        }
        Ok(t.persistent())
    }

    /// Add an element.
    pub fn conj(&self, value: OpalVal) -> Result<Self> {
        Ok(PersistentHashSet {
            map: self.map.assoc(value.clone(), value)?,
            meta: self.meta.clone(),
            hash: Cell::new(None),
        })
    }

    /// Remove an element; missing elements are a no-op.
    pub fn disj(&self, value: &OpalVal) -> Result<Self> {
        Ok(PersistentHashSet {
            map: self.map.dissoc(value)?,
            meta: self.meta.clone(),
            hash: Cell::new(None),
        })
    }

    /// Membership test: a map lookup with the element as key.
    pub fn contains(&self, value: &OpalVal) -> Result<bool> {
        self.map.contains(value)
    }

    /// The stored element equal to `value`, or None.
    pub fn get(&self, value: &OpalVal) -> Result<Option<&OpalVal>> {
        Ok(self.map.get_entry(value)?.map(|(k, _)| k))
    }

    pub fn count(&self) -> usize {
        self.map.count()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpalVal> {
        self.map.iter().map(|(k, _)| k)
    }

    pub fn meta(&self) -> Option<&OpalVal> {
        self.meta.as_ref()
    }

    pub fn with_meta(&self, meta: Option<OpalVal>) -> Self {
        PersistentHashSet {
            map: self.map.clone(),
            meta,
            hash: self.hash.clone(),
        }
    }

    /// Thaw into a transient for batch updates.
    pub fn to_transient(&self) -> TransientHashSet {
        TransientHashSet {
            map: self.map.to_transient(),
        }
    }

    /// Cached structural hash; element order does not contribute.
    pub fn structural_hash(&self) -> u64 {
        if let Some(h) = self.hash.get() {
            return h;
        }
        let h = crate::hashing::hash_unordered(self.iter().map(crate::hashing::hash_value));
        self.hash.set(Some(h));
        h
    }
}

/// Mutable, exclusively-owned counterpart of [`PersistentHashSet`].
pub struct TransientHashSet {
    map: TransientHashMap,
}

impl TransientHashSet {
    /// Add an element in place.
    pub fn conj_mut(&mut self, value: OpalVal) -> Result<()> {
        self.map.assoc_mut(value.clone(), value)
    }

    /// Remove an element in place.
    pub fn disj_mut(&mut self, value: &OpalVal) -> Result<()> {
        self.map.dissoc_mut(value)
    }

    pub fn contains(&self, value: &OpalVal) -> Result<bool> {
        self.map.contains(value)
    }

    pub fn count(&self) -> usize {
        self.map.count()
    }

    /// Freeze into a persistent set, consuming the transient.
    pub fn persistent(self) -> PersistentHashSet {
        PersistentHashSet {
            map: self.map.persistent(),
            meta: None,
            hash: Cell::new(None),
        }
    }
}

// ============================================================================
// PersistentSortedSet
// ============================================================================

/// An immutable set with ordered traversal, backed by the sorted map.
#[derive(Clone)]
pub struct PersistentSortedSet {
    map: PersistentSortedMap,
    meta: Option<OpalVal>,
    hash: Cell<Option<u64>>,
}

impl PersistentSortedSet {
    /// The empty sorted set.
    pub fn empty() -> Self {
        PersistentSortedSet {
            map: PersistentSortedMap::empty(),
            meta: None,
            hash: Cell::new(None),
        }
    }

    /// Build from elements; duplicates collapse. Incomparable elements
    /// error.
    pub fn from_vec(elements: Vec<OpalVal>) -> Result<Self> {
        let mut s = PersistentSortedSet::empty();
        for v in elements {
            s = s.conj(v)?;
        }
        Ok(s)
    }

    /// Add an element.
    pub fn conj(&self, value: OpalVal) -> Result<Self> {
        Ok(PersistentSortedSet {
            map: self.map.assoc(value.clone(), value)?,
            meta: self.meta.clone(),
            hash: Cell::new(None),
        })
    }

    /// Remove an element; missing elements are a no-op.
    pub fn disj(&self, value: &OpalVal) -> Result<Self> {
        Ok(PersistentSortedSet {
            map: self.map.dissoc(value)?,
            meta: self.meta.clone(),
            hash: Cell::new(None),
        })
    }

    /// Membership test: a map lookup with the element as key.
    pub fn contains(&self, value: &OpalVal) -> Result<bool> {
        self.map.contains(value)
    }

    /// The stored element equal to `value`, or None.
    pub fn get(&self, value: &OpalVal) -> Result<Option<&OpalVal>> {
        Ok(self.map.get_entry(value)?.map(|(k, _)| k))
    }

    pub fn count(&self) -> usize {
        self.map.count()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// In-order (sorted) traversal.
    pub fn iter(&self) -> impl Iterator<Item = &OpalVal> {
        self.map.iter().map(|(k, _)| k)
    }

    pub fn meta(&self) -> Option<&OpalVal> {
        self.meta.as_ref()
    }

    pub fn with_meta(&self, meta: Option<OpalVal>) -> Self {
        PersistentSortedSet {
            map: self.map.clone(),
            meta,
            hash: self.hash.clone(),
        }
    }

    /// Thaw into a transient for batch updates.
    pub fn to_transient(&self) -> TransientSortedSet {
        TransientSortedSet {
            map: self.map.to_transient(),
        }
    }

    /// Cached structural hash; identical to the hash of an unordered set
    /// with the same elements.
    pub fn structural_hash(&self) -> u64 {
        if let Some(h) = self.hash.get() {
            return h;
        }
        let h = crate::hashing::hash_unordered(self.iter().map(crate::hashing::hash_value));
        self.hash.set(Some(h));
        h
    }
}

/// Mutable, exclusively-owned counterpart of [`PersistentSortedSet`].
pub struct TransientSortedSet {
    map: TransientSortedMap,
}

impl TransientSortedSet {
    /// Add an element in place.
    pub fn conj_mut(&mut self, value: OpalVal) -> Result<()> {
        self.map.assoc_mut(value.clone(), value)
    }

    /// Remove an element in place.
    pub fn disj_mut(&mut self, value: &OpalVal) -> Result<()> {
        self.map.dissoc_mut(value)
    }

    pub fn contains(&self, value: &OpalVal) -> Result<bool> {
        self.map.contains(value)
    }

    pub fn count(&self) -> usize {
        self.map.count()
    }

    /// Freeze into a persistent set, consuming the transient.
    pub fn persistent(self) -> PersistentSortedSet {
        PersistentSortedSet {
            map: self.map.persistent(),
            meta: None,
            hash: Cell::new(None),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
