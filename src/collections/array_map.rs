// opal-core - Small insertion-ordered array map
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Small persistent map backed by a linear array of entries.
//!
//! Lookup is O(n), which beats the hash trie for the handful-of-keys case
//! and preserves insertion order. Growing past [`ARRAY_MAP_THRESHOLD`]
//! entries promotes the map to a [`PersistentHashMap`]; the two remain
//! `equal` for the same entries.

use std::cell::Cell;

use smallvec::SmallVec;

use crate::collections::hash_map::{PersistentHashMap, TransientHashMap};
use crate::error::{Error, Result};
use crate::ops::equality::equal;
use crate::value::OpalVal;

/// Entry count past which construction and assoc promote to a hash map.
pub const ARRAY_MAP_THRESHOLD: usize = 8;

type Entries = SmallVec<[(OpalVal, OpalVal); ARRAY_MAP_THRESHOLD]>;

/// An immutable insertion-ordered map for small entry counts.
#[derive(Clone, Debug)]
pub struct PersistentArrayMap {
    entries: Entries,
    meta: Option<OpalVal>,
    hash: Cell<Option<u64>>,
}

impl PersistentArrayMap {
    /// The empty array map.
    pub fn empty() -> Self {
        PersistentArrayMap {
            entries: SmallVec::new(),
            meta: None,
            hash: Cell::new(None),
        }
    }

    /// Build from key/value pairs; a later duplicate key replaces the
    /// earlier entry. Does not promote (callers that may exceed the
    /// threshold go through the ops-layer factory).
    pub fn from_pairs(pairs: Vec<(OpalVal, OpalVal)>) -> Result<Self> {
        let mut m = PersistentArrayMap::empty();
        for (k, v) in pairs {
            m = m.assoc_no_promote(k, v)?;
        }
        Ok(m)
    }

    /// Build from a flat `[k1 v1 k2 v2 …]` slice. An odd number of
    /// elements is a shape error.
    pub fn from_flat(elements: &[OpalVal]) -> Result<Self> {
        if elements.len() % 2 != 0 {
            return Err(Error::shape(format!(
                "odd number of elements ({}) for map construction",
                elements.len()
            )));
        }
        let mut m = PersistentArrayMap::empty();
        for pair in elements.chunks(2) {
            m = m.assoc_no_promote(pair[0].clone(), pair[1].clone())?;
        }
        Ok(m)
    }

    fn index_of(&self, key: &OpalVal) -> Result<Option<usize>> {
        for (i, (k, _)) in self.entries.iter().enumerate() {
            if equal(k, key)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Value for key, or None.
    pub fn get(&self, key: &OpalVal) -> Result<Option<&OpalVal>> {
        Ok(self.index_of(key)?.map(|i| &self.entries[i].1))
    }

    /// The full entry for key, or None.
    pub fn get_entry(&self, key: &OpalVal) -> Result<Option<(&OpalVal, &OpalVal)>> {
        Ok(self.index_of(key)?.map(|i| {
            let (k, v) = &self.entries[i];
            (k, v)
        }))
    }

    pub fn contains(&self, key: &OpalVal) -> Result<bool> {
        Ok(self.index_of(key)?.is_some())
    }

    /// Add or replace an entry, never promoting.
    pub fn assoc_no_promote(&self, key: OpalVal, value: OpalVal) -> Result<Self> {
        let mut entries = self.entries.clone();
        match self.index_of(&key)? {
            Some(i) => entries[i] = (key, value),
            None => entries.push((key, value)),
        }
        Ok(PersistentArrayMap {
            entries,
            meta: self.meta.clone(),
            hash: Cell::new(None),
        })
    }

    /// Add or replace an entry; adding a fresh key past the threshold
    /// promotes to a hash map.
    pub fn assoc(&self, key: OpalVal, value: OpalVal) -> Result<OpalVal> {
        if self.index_of(&key)?.is_none() && self.entries.len() >= ARRAY_MAP_THRESHOLD {
            let promoted = self.to_hash_map()?.assoc(key, value)?;
            return Ok(OpalVal::hash_map(promoted.with_meta(self.meta.clone())));
        }
        Ok(OpalVal::array_map(self.assoc_no_promote(key, value)?))
    }

    /// Remove an entry; unknown keys are a no-op.
    pub fn dissoc(&self, key: &OpalVal) -> Result<Self> {
        match self.index_of(key)? {
            None => Ok(self.clone()),
            Some(i) => {
                let mut entries = self.entries.clone();
                entries.remove(i);
                Ok(PersistentArrayMap {
                    entries,
                    meta: self.meta.clone(),
                    hash: Cell::new(None),
                })
            }
        }
    }

    /// Rebuild as a hash map with the same entries.
    pub fn to_hash_map(&self) -> Result<PersistentHashMap> {
        let mut m = PersistentHashMap::empty();
        for (k, v) in self.entries.iter() {
            m = m.assoc(k.clone(), v.clone())?;
        }
        Ok(m)
    }

    /// Thaw into a transient hash map (the mutable counterpart of the
    /// map family; array maps have no dedicated transient form).
    pub fn to_transient(&self) -> Result<TransientHashMap> {
        Ok(self.to_hash_map()?.to_transient())
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OpalVal, &OpalVal)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn meta(&self) -> Option<&OpalVal> {
        self.meta.as_ref()
    }

    pub fn with_meta(&self, meta: Option<OpalVal>) -> Self {
        PersistentArrayMap {
            entries: self.entries.clone(),
            meta,
            hash: self.hash.clone(),
        }
    }

    /// Cached structural hash; entry order does not contribute.
    pub fn structural_hash(&self) -> u64 {
        if let Some(h) = self.hash.get() {
            return h;
        }
        let h = crate::hashing::hash_map_entries(self.iter());
        self.hash.set(Some(h));
        h
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flat_odd_count_errors() {
        let err = PersistentArrayMap::from_flat(&[
            OpalVal::keyword_str("a"),
            OpalVal::int(1),
            OpalVal::keyword_str("b"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let m = PersistentArrayMap::from_flat(&[
            OpalVal::keyword_str("b"),
            OpalVal::int(2),
            OpalVal::keyword_str("a"),
            OpalVal::int(1),
        ])
        .unwrap();
        let keys: Vec<_> = m.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![OpalVal::keyword_str("b"), OpalVal::keyword_str("a")]);
    }

    #[test]
    fn test_assoc_replaces_in_place() {
        let m = PersistentArrayMap::from_flat(&[OpalVal::keyword_str("a"), OpalVal::int(1)])
            .unwrap();
        let m2 = m.assoc_no_promote(OpalVal::keyword_str("a"), OpalVal::int(9)).unwrap();
        assert_eq!(m2.count(), 1);
        assert_eq!(m2.get(&OpalVal::keyword_str("a")).unwrap(), Some(&OpalVal::int(9)));
        // Original unchanged
        assert_eq!(m.get(&OpalVal::keyword_str("a")).unwrap(), Some(&OpalVal::int(1)));
    }

    #[test]
    fn test_assoc_promotes_past_threshold() {
        let mut m = PersistentArrayMap::empty();
        for i in 0..ARRAY_MAP_THRESHOLD {
            m = m
                .assoc_no_promote(OpalVal::int(i as i64), OpalVal::int(i as i64))
                .unwrap();
        }
        let promoted = m.assoc(OpalVal::int(100), OpalVal::int(100)).unwrap();
        assert!(matches!(promoted, OpalVal::HashMap(_)));
        // Replacing an existing key at the threshold does not promote.
        let replaced = m.assoc(OpalVal::int(0), OpalVal::int(42)).unwrap();
        assert!(matches!(replaced, OpalVal::ArrayMap(_)));
    }

    #[test]
    fn test_dissoc() {
        let m = PersistentArrayMap::from_flat(&[
            OpalVal::keyword_str("a"),
            OpalVal::int(1),
            OpalVal::keyword_str("b"),
            OpalVal::int(2),
        ])
        .unwrap();
        let m2 = m.dissoc(&OpalVal::keyword_str("a")).unwrap();
        assert_eq!(m2.count(), 1);
        assert!(!m2.contains(&OpalVal::keyword_str("a")).unwrap());
        assert_eq!(m.count(), 2);
    }
}
