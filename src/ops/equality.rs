// opal-core - Generic equality and comparison
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Structural equality and the generic total order.
//!
//! Equality is kind-family aware: any map equals any map with equal
//! entries regardless of backing structure, sets likewise, and all
//! sequential kinds (lists, vectors, seqs) equal each other element-wise.
//! Nil is seqable but never equal to an empty collection. Metadata never
//! participates.
//!
//! `compare` is a total order over the comparable kinds only (nil,
//! numbers cross-kind, booleans, characters, strings, symbols, keywords,
//! vectors); everything else raises a "not comparable" capability error.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::ops::seqs;
use crate::value::OpalVal;

/// Is this kind part of the sequential equality family?
pub fn is_sequential(v: &OpalVal) -> bool {
    match v {
        OpalVal::List(_)
        | OpalVal::Vector(_)
        | OpalVal::Cons(_)
        | OpalVal::Range(_)
        | OpalVal::IntegerRange(_)
        | OpalVal::Repeat(_)
        | OpalVal::LazySeq(_)
        | OpalVal::ChunkedCons(_)
        | OpalVal::IteratorSeq(_)
        | OpalVal::VectorSeq(_)
        | OpalVal::IndexedSeq(_)
        | OpalVal::StringSeq(_) => true,
        OpalVal::Extended(e) => e.behaviors().has("sequential"),
        _ => false,
    }
}

/// Entries of any map kind, or None for non-maps.
pub(crate) fn map_entries(v: &OpalVal) -> Option<Vec<(OpalVal, OpalVal)>> {
    match v {
        OpalVal::ArrayMap(m) => Some(m.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        OpalVal::HashMap(m) => Some(m.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        OpalVal::SortedMap(m) => Some(m.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        _ => None,
    }
}

fn map_lookup_entry(v: &OpalVal, key: &OpalVal) -> Result<Option<(OpalVal, OpalVal)>> {
    match v {
        OpalVal::ArrayMap(m) => Ok(m.get_entry(key)?.map(|(k, v)| (k.clone(), v.clone()))),
        OpalVal::HashMap(m) => Ok(m.get_entry(key)?.map(|(k, v)| (k.clone(), v.clone()))),
        OpalVal::SortedMap(m) => Ok(m.get_entry(key)?.map(|(k, v)| (k.clone(), v.clone()))),
        _ => Err(Error::internal("map_lookup_entry on a non-map")),
    }
}

fn map_count(v: &OpalVal) -> usize {
    match v {
        OpalVal::ArrayMap(m) => m.count(),
        OpalVal::HashMap(m) => m.count(),
        OpalVal::SortedMap(m) => m.count(),
        _ => 0,
    }
}

fn set_elements(v: &OpalVal) -> Option<Vec<OpalVal>> {
    match v {
        OpalVal::HashSet(s) => Some(s.iter().cloned().collect()),
        OpalVal::SortedSet(s) => Some(s.iter().cloned().collect()),
        _ => None,
    }
}

fn set_contains(v: &OpalVal, element: &OpalVal) -> Result<bool> {
    match v {
        OpalVal::HashSet(s) => s.contains(element),
        OpalVal::SortedSet(s) => s.contains(element),
        _ => Err(Error::internal("set_contains on a non-set")),
    }
}

fn set_count(v: &OpalVal) -> usize {
    match v {
        OpalVal::HashSet(s) => s.count(),
        OpalVal::SortedSet(s) => s.count(),
        _ => 0,
    }
}

/// Element-wise equality of two seqable values.
fn seq_equal(a: &OpalVal, b: &OpalVal) -> Result<bool> {
    let mut x = seqs::seq(a)?;
    let mut y = seqs::seq(b)?;
    loop {
        match (x.is_nil(), y.is_nil()) {
            (true, true) => return Ok(true),
            (true, false) | (false, true) => return Ok(false),
            (false, false) => {}
        }
        if !equal(&seqs::first(&x)?, &seqs::first(&y)?)? {
            return Ok(false);
        }
        x = seqs::next(&x)?;
        y = seqs::next(&y)?;
    }
}

/// Structural equality. Propagates failures raised while realizing lazy
/// content; the `PartialEq` impl on `OpalVal` coerces those to unequal.
pub fn equal(a: &OpalVal, b: &OpalVal) -> Result<bool> {
    // Host-defined kinds may supply their own equality.
    if let OpalVal::Extended(e) = a
        && e.behaviors().has_op("object_like", "equal")
    {
        return e.equal_op(a, b);
    }
    if let OpalVal::Extended(e) = b
        && e.behaviors().has_op("object_like", "equal")
    {
        return e.equal_op(b, a);
    }

    // Kind-family equality: maps, sets, sequentials.
    if a.is_map() && b.is_map() {
        if map_count(a) != map_count(b) {
            return Ok(false);
        }
        let entries = map_entries(a).expect("is_map checked");
        for (k, v) in entries {
            match map_lookup_entry(b, &k)? {
                Some((_, bv)) => {
                    if !equal(&v, &bv)? {
                        return Ok(false);
                    }
                }
                None => return Ok(false),
            }
        }
        return Ok(true);
    }
    if a.is_set() && b.is_set() {
        if set_count(a) != set_count(b) {
            return Ok(false);
        }
        let elements = set_elements(a).expect("is_set checked");
        for e in elements {
            if !set_contains(b, &e)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }
    if is_sequential(a) && is_sequential(b) {
        // Vector/vector compares counts first; both are O(1).
        if let (OpalVal::Vector(x), OpalVal::Vector(y)) = (a, b)
            && x.count() != y.count()
        {
            return Ok(false);
        }
        return seq_equal(a, b);
    }

    Ok(match (a, b) {
        (OpalVal::Nil, OpalVal::Nil) => true,
        (OpalVal::Bool(x), OpalVal::Bool(y)) => x == y,
        (OpalVal::Int(x), OpalVal::Int(y)) => x == y,
        // IEEE equality, except NaN equals itself so hashing stays sane.
        (OpalVal::Float(x), OpalVal::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        (OpalVal::Ratio(xn, xd), OpalVal::Ratio(yn, yd)) => xn == yn && xd == yd,
        (OpalVal::Char(x), OpalVal::Char(y)) => x == y,
        (OpalVal::String(x), OpalVal::String(y)) => x == y,
        (OpalVal::Symbol(x, _), OpalVal::Symbol(y, _)) => x == y,
        (OpalVal::Keyword(x), OpalVal::Keyword(y)) => x == y,
        (OpalVal::NativeFn(x), OpalVal::NativeFn(y)) => x.fn_ptr() == y.fn_ptr(),
        (OpalVal::Namespace(x), OpalVal::Namespace(y)) => x.name() == y.name(),
        (OpalVal::Var(x), OpalVal::Var(y)) => x == y,
        (OpalVal::Atom(x), OpalVal::Atom(y)) => x == y,
        (OpalVal::Volatile(x), OpalVal::Volatile(y)) => x == y,
        (OpalVal::Delay(x), OpalVal::Delay(y)) => x == y,
        (OpalVal::Reduced(x), OpalVal::Reduced(y)) => return equal(x, y),
        (OpalVal::TaggedLiteral(x), OpalVal::TaggedLiteral(y)) => {
            return Ok(equal(&x.tag, &y.tag)? && equal(&x.form, &y.form)?);
        }
        // Everything else (chunks, transients, compiled fns, sentinels,
        // extended without an equal op) compares by identity.
        _ => {
            a.kind() == b.kind() && a.identity_ptr() != 0 && a.identity_ptr() == b.identity_ptr()
        }
    })
}

// ============================================================================
// compare
// ============================================================================

fn as_f64(v: &OpalVal) -> Option<f64> {
    match v {
        OpalVal::Int(n) => Some(*n as f64),
        OpalVal::Float(n) => Some(*n),
        OpalVal::Ratio(num, den) => Some(*num as f64 / *den as f64),
        _ => None,
    }
}

/// Generic total order over comparable kinds. Nil sorts before
/// everything; numbers compare numerically across kinds; vectors compare
/// by length, then element-wise.
pub fn compare(a: &OpalVal, b: &OpalVal) -> Result<Ordering> {
    match (a, b) {
        (OpalVal::Nil, OpalVal::Nil) => return Ok(Ordering::Equal),
        (OpalVal::Nil, _) => return Ok(Ordering::Less),
        (_, OpalVal::Nil) => return Ok(Ordering::Greater),
        _ => {}
    }
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        // Exact path for int/int; everything else through f64.
        if let (OpalVal::Int(xi), OpalVal::Int(yi)) = (a, b) {
            return Ok(xi.cmp(yi));
        }
        return Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal));
    }
    match (a, b) {
        (OpalVal::Bool(x), OpalVal::Bool(y)) => Ok(x.cmp(y)),
        (OpalVal::Char(x), OpalVal::Char(y)) => Ok(x.cmp(y)),
        (OpalVal::String(x), OpalVal::String(y)) => Ok(x.cmp(y)),
        (OpalVal::Symbol(x, _), OpalVal::Symbol(y, _)) => Ok(x.cmp(y)),
        (OpalVal::Keyword(x), OpalVal::Keyword(y)) => Ok(x.cmp(y)),
        (OpalVal::Vector(x), OpalVal::Vector(y)) => {
            // Shorter vectors sort first; equal lengths compare
            // element-wise.
            match x.count().cmp(&y.count()) {
                Ordering::Equal => {
                    for (xe, ye) in x.iter().zip(y.iter()) {
                        match compare(xe, ye)? {
                            Ordering::Equal => continue,
                            other => return Ok(other),
                        }
                    }
                    Ok(Ordering::Equal)
                }
                other => Ok(other),
            }
        }
        (OpalVal::Extended(e), _) if e.behaviors().has_op("comparable", "compare") => {
            e.compare_op(a, b)
        }
        _ => Err(Error::not_capable("comparable", a)),
    }
}

// ============================================================================
// Tests
// ============================================================================
