// opal-core - Generic core operations
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The capability-driven free functions that are the public vocabulary
//! for manipulating values without knowing their concrete kind.
//!
//! Every operation resolves the value's capability table and either
//! performs the operation or raises the capability error naming what was
//! missing and the offending value. Nil has the usual special cases
//! (documented per function).

pub mod equality;
pub mod invoke;
pub mod print;
pub mod seqs;

pub use equality::{compare, equal, is_sequential};
pub use invoke::{arity_flags, invoke};
pub use print::{to_code_string, to_display_string};
pub use seqs::{
    chunk_append, chunk_cons, chunk_finalize, chunk_first, chunk_next, chunk_of, chunk_rest,
    cons, count, first, fresh_seq, is_empty, next, next_in_place, nth, nth_default, reduce,
    rest, second, seq, seq_to_vec, shuffle, sort,
};

use crate::behaviors::caps;
use crate::error::{Error, Result};
use crate::value::OpalVal;

// ============================================================================
// Associative operations
// ============================================================================

/// Value at key, or nil. Nil and kinds without a lookup answer nil;
/// lookup never raises a capability error.
pub fn get(m: &OpalVal, key: &OpalVal) -> Result<OpalVal> {
    get_default(m, key, &OpalVal::Nil)
}

/// Value at key, or the fallback when missing.
pub fn get_default(m: &OpalVal, key: &OpalVal, fallback: &OpalVal) -> Result<OpalVal> {
    if m.is_nil() {
        return Ok(fallback.clone());
    }
    let c = caps(m);
    if c.has_get() {
        c.get_default(key, fallback)
    } else {
        Ok(fallback.clone())
    }
}

/// The `[key value]` entry for the key, or nil. Non-associative values
/// answer nil.
pub fn find(m: &OpalVal, key: &OpalVal) -> Result<OpalVal> {
    if m.is_nil() {
        return Ok(OpalVal::Nil);
    }
    match caps(m).get_entry(key) {
        Ok(entry) => Ok(entry),
        Err(Error::NotCapable { .. }) => Ok(OpalVal::Nil),
        Err(e) => Err(e),
    }
}

/// Does the collection contain the key (or element, for sets)? Nil
/// contains nothing; kinds without membership raise the capability
/// error.
pub fn contains(m: &OpalVal, key: &OpalVal) -> Result<bool> {
    if m.is_nil() {
        return Ok(false);
    }
    caps(m).contains(key)
}

/// Add or replace an entry. Nil grows into a map.
pub fn assoc(m: &OpalVal, key: OpalVal, value: OpalVal) -> Result<OpalVal> {
    if m.is_nil() {
        return OpalVal::array_map_from_flat(&[key, value]);
    }
    caps(m).assoc(&key, &value)
}

/// Remove an entry. Nil stays nil.
pub fn dissoc(m: &OpalVal, key: &OpalVal) -> Result<OpalVal> {
    if m.is_nil() {
        return Ok(OpalVal::Nil);
    }
    caps(m).dissoc(key)
}

/// In-place variant of [`assoc`] for transients.
pub fn assoc_in_place(m: &OpalVal, key: OpalVal, value: OpalVal) -> Result<OpalVal> {
    caps(m).assoc_in_place(&key, &value)
}

/// In-place variant of [`dissoc`] for transients.
pub fn dissoc_in_place(m: &OpalVal, key: &OpalVal) -> Result<OpalVal> {
    caps(m).dissoc_in_place(key)
}

/// Value at a path of keys, or the fallback when the path misses.
pub fn get_in(m: &OpalVal, keys: &OpalVal, fallback: &OpalVal) -> Result<OpalVal> {
    let mut current = m.clone();
    let mut node = seqs::seq(keys)?;
    while !node.is_nil() {
        current = get(&current, &seqs::first(&node)?)?;
        node = seqs::next(&node)?;
    }
    if current.is_nil() {
        Ok(fallback.clone())
    } else {
        Ok(current)
    }
}

/// Merge maps left to right; nil arguments are skipped, and all-nil
/// input yields nil.
pub fn merge(maps: &[OpalVal]) -> Result<OpalVal> {
    let mut acc = OpalVal::Nil;
    for m in maps {
        if m.is_nil() {
            continue;
        }
        if acc.is_nil() {
            acc = m.clone();
            continue;
        }
        acc = conj(&acc, m.clone())?;
    }
    Ok(acc)
}

// ============================================================================
// Conjoining
// ============================================================================

/// Add an element in the collection's natural position: lists prepend,
/// vectors append, maps take `[key value]` entries or whole maps, sets
/// take members. Nil grows into a list. Transients conjoin in place.
pub fn conj(coll: &OpalVal, value: OpalVal) -> Result<OpalVal> {
    if coll.is_nil() {
        return Ok(OpalVal::list(vec![value]));
    }
    let c = caps(coll);
    if c.is_conjable_in_place() {
        return c.conj_in_place(&value);
    }
    if c.is_conjable() {
        return c.conj(&value);
    }
    if c.is_seqable() {
        let s = c.seq()?;
        return seqs::cons(value, &s);
    }
    Err(Error::not_capable("conjable", coll))
}

/// In-place variant of [`conj`] for transients.
pub fn conj_in_place(coll: &OpalVal, value: OpalVal) -> Result<OpalVal> {
    caps(coll).conj_in_place(&value)
}

/// Map conj: accepts a `[key value]` vector or a whole map; anything
/// else is a shape error.
pub(crate) fn map_conj(m: &OpalVal, entry: &OpalVal) -> Result<OpalVal> {
    match entry {
        OpalVal::Vector(pair) => {
            if pair.count() != 2 {
                return Err(Error::shape(format!(
                    "map conj expects a [key value] entry, got a vector of {}",
                    pair.count()
                )));
            }
            let key = pair.nth(0).cloned().unwrap_or(OpalVal::Nil);
            let value = pair.nth(1).cloned().unwrap_or(OpalVal::Nil);
            caps(m).assoc(&key, &value)
        }
        other if other.is_map() => {
            let mut acc = m.clone();
            for (k, v) in equality::map_entries(other).into_iter().flatten() {
                acc = caps(&acc).assoc(&k, &v)?;
            }
            Ok(acc)
        }
        other => Err(Error::shape(format!(
            "map conj expects a [key value] entry or a map, got {}",
            other.type_name()
        ))),
    }
}

/// In-place map conj for transient maps.
pub(crate) fn map_conj_in_place(m: &OpalVal, entry: &OpalVal) -> Result<OpalVal> {
    match entry {
        OpalVal::Vector(pair) => {
            if pair.count() != 2 {
                return Err(Error::shape(format!(
                    "map conj expects a [key value] entry, got a vector of {}",
                    pair.count()
                )));
            }
            let key = pair.nth(0).cloned().unwrap_or(OpalVal::Nil);
            let value = pair.nth(1).cloned().unwrap_or(OpalVal::Nil);
            caps(m).assoc_in_place(&key, &value)
        }
        other if other.is_map() => {
            for (k, v) in equality::map_entries(other).into_iter().flatten() {
                caps(m).assoc_in_place(&k, &v)?;
            }
            Ok(m.clone())
        }
        other => Err(Error::shape(format!(
            "map conj expects a [key value] entry or a map, got {}",
            other.type_name()
        ))),
    }
}

/// Remove a member from a set. Nil stays nil; non-sets raise the
/// capability error.
pub fn disj(s: &OpalVal, value: &OpalVal) -> Result<OpalVal> {
    match s {
        OpalVal::Nil => Ok(OpalVal::Nil),
        OpalVal::HashSet(set) => Ok(OpalVal::hash_set(set.disj(value)?)),
        OpalVal::SortedSet(set) => Ok(OpalVal::sorted_set(set.disj(value)?)),
        OpalVal::TransientHashSet(_) | OpalVal::TransientSortedSet(_) => {
            disj_in_place(s, value)
        }
        _ => Err(Error::not_capable("disjoinable", s)),
    }
}

/// In-place variant of [`disj`] for transient sets.
pub fn disj_in_place(s: &OpalVal, value: &OpalVal) -> Result<OpalVal> {
    match s {
        OpalVal::TransientHashSet(cell) => {
            let mut slot = cell.borrow_mut();
            match slot.as_mut() {
                Some(t) => t.disj_mut(value)?,
                None => return Err(Error::StaleTransient("disj!")),
            }
            drop(slot);
            Ok(s.clone())
        }
        OpalVal::TransientSortedSet(cell) => {
            let mut slot = cell.borrow_mut();
            match slot.as_mut() {
                Some(t) => t.disj_mut(value)?,
                None => return Err(Error::StaleTransient("disj!")),
            }
            drop(slot);
            Ok(s.clone())
        }
        _ => Err(Error::not_capable("disjoinable", s)),
    }
}

// ============================================================================
// Collection-like, stack-like, conversions
// ============================================================================

/// The empty collection of the same kind. Nil stays nil.
pub fn empty(coll: &OpalVal) -> Result<OpalVal> {
    if coll.is_nil() {
        return Ok(OpalVal::Nil);
    }
    caps(coll).empty()
}

/// Stack read: last of a vector, first of a list. Nil answers nil.
pub fn peek(coll: &OpalVal) -> Result<OpalVal> {
    if coll.is_nil() {
        return Ok(OpalVal::Nil);
    }
    caps(coll).peek()
}

/// Stack drop: pop the element [`peek`] answers. Popping an empty
/// collection is a bounds-family error; nil answers nil.
pub fn pop(coll: &OpalVal) -> Result<OpalVal> {
    if coll.is_nil() {
        return Ok(OpalVal::Nil);
    }
    caps(coll).pop()
}

/// A new vector holding the elements `[start, end)` of a vector. The
/// range's backing slice is copied; element handles are shared.
pub fn subvec(v: &OpalVal, start: usize, end: usize) -> Result<OpalVal> {
    match v {
        OpalVal::Vector(vec) => Ok(OpalVal::persistent_vector(vec.subvec(start, end)?)),
        _ => Err(Error::not_capable("indexable", v)),
    }
}

/// Thaw a persistent collection into its transient counterpart.
pub fn to_transient(coll: &OpalVal) -> Result<OpalVal> {
    caps(coll).to_transient()
}

/// Freeze a transient into its persistent counterpart; the transient
/// handle is stale afterwards.
pub fn to_persistent(coll: &OpalVal) -> Result<OpalVal> {
    caps(coll).to_persistent()
}

// ============================================================================
// Metadata, deref, names, numbers
// ============================================================================

/// A new value with the given metadata (map-shaped or nil). Kinds
/// without metadata raise the capability error.
pub fn with_meta(v: &OpalVal, meta: &OpalVal) -> Result<OpalVal> {
    caps(v).with_meta(meta)
}

/// The attached metadata, or nil. Total, like the meta accessor.
pub fn meta(v: &OpalVal) -> OpalVal {
    v.meta().unwrap_or(OpalVal::Nil)
}

/// Mutate metadata in place where the kind supports it (vars).
pub fn set_meta(v: &OpalVal, meta: &OpalVal) -> Result<OpalVal> {
    caps(v).set_meta(meta)
}

/// Dereference a reference kind. Delays force (memoizing value or
/// failure).
pub fn deref(v: &OpalVal) -> Result<OpalVal> {
    caps(v).deref()
}

/// The name of a nameable value.
pub fn name(v: &OpalVal) -> Result<String> {
    caps(v).name()
}

/// The namespace of a nameable value, if any.
pub fn namespace_name(v: &OpalVal) -> Result<Option<String>> {
    caps(v).namespace()
}

/// Integer rendition of a number-like value.
pub fn to_integer(v: &OpalVal) -> Result<i64> {
    caps(v).to_integer()
}

/// Floating-point rendition of a number-like value.
pub fn to_real(v: &OpalVal) -> Result<f64> {
    caps(v).to_real()
}

/// Concatenate the display strings of all arguments.
pub fn opal_str(args: &[OpalVal]) -> String {
    let mut out = String::new();
    for a in args {
        out.push_str(&to_display_string(a));
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
