// opal-core - Structural hashing
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Structural hashing for all value kinds.
//!
//! The hashing contract follows equality: values that compare `equal`
//! hash identically. Sequential kinds (lists, vectors, seqs) combine
//! element hashes order-sensitively; maps and sets combine entry hashes
//! order-independently, so an array map, hash map, and sorted map with
//! the same entries share one hash. Persistent collections cache their
//! hash after the first computation; racing recomputation is idempotent
//! because the hash is a pure function of content.
//!
//! Identity kinds (functions, references, chunks) hash by pointer, which
//! is stable for the process lifetime.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::value::OpalVal;

// Per-kind salts so that e.g. the empty set and the empty map disagree.
const SALT_NIL: u64 = 0x6e69_6c00;
const SALT_BOOL: u64 = 0x626f_6f6c;
const SALT_INT: u64 = 0x696e_7400;
const SALT_FLOAT: u64 = 0x666c_6f61;
const SALT_RATIO: u64 = 0x7261_7469;
const SALT_CHAR: u64 = 0x6368_6172;
const SALT_ORDERED: u64 = 0x6f72_6400;
const SALT_UNORDERED: u64 = 0x756e_6f72;
const SALT_IDENTITY: u64 = 0x6964_656e;
const SALT_REDUCED: u64 = 0x7264_6364;
const SALT_TAGGED: u64 = 0x7467_6c74;

/// SplitMix64 finalizer: avalanche a 64-bit value.
pub fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn fx_hash<T: Hash + ?Sized>(t: &T) -> u64 {
    let mut h = FxHasher::default();
    t.hash(&mut h);
    h.finish()
}

// ============================================================================
// Combiners
// ============================================================================

/// Incremental order-sensitive combiner. Lists, vectors, and every
/// sequence view use this same formula so cross-kind sequential equality
/// implies hash equality.
pub struct OrderedHasher {
    h: u64,
    n: u64,
}

impl OrderedHasher {
    pub fn new() -> Self {
        OrderedHasher { h: 1, n: 0 }
    }

    pub fn step(&mut self, element_hash: u64) {
        self.h = self.h.wrapping_mul(31).wrapping_add(element_hash);
        self.n += 1;
    }

    pub fn finish(self) -> u64 {
        mix64(self.h ^ self.n ^ SALT_ORDERED)
    }
}

impl Default for OrderedHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Order-sensitive combine over element hashes.
pub fn hash_ordered(hashes: impl Iterator<Item = u64>) -> u64 {
    let mut oh = OrderedHasher::new();
    for h in hashes {
        oh.step(h);
    }
    oh.finish()
}

/// Order-independent combine over element hashes (sets, map entries).
pub fn hash_unordered(hashes: impl Iterator<Item = u64>) -> u64 {
    let mut sum: u64 = 0;
    let mut n: u64 = 0;
    for h in hashes {
        sum = sum.wrapping_add(h);
        n += 1;
    }
    mix64(sum ^ n ^ SALT_UNORDERED)
}

/// Unordered combine over map entries; each entry hashes its key and
/// value order-sensitively.
pub fn hash_map_entries<'a>(entries: impl Iterator<Item = (&'a OpalVal, &'a OpalVal)>) -> u64 {
    hash_unordered(entries.map(|(k, v)| {
        let mut oh = OrderedHasher::new();
        oh.step(hash_value(k));
        oh.step(hash_value(v));
        oh.finish()
    }))
}

// ============================================================================
// hash_value
// ============================================================================

fn float_bits(n: f64) -> u64 {
    if n == 0.0 {
        // -0.0 and 0.0 are equal, so they must hash alike.
        0.0f64.to_bits()
    } else if n.is_nan() {
        f64::NAN.to_bits()
    } else {
        n.to_bits()
    }
}

fn identity_hash(v: &OpalVal) -> u64 {
    mix64(SALT_IDENTITY ^ v.identity_ptr() as u64)
}

/// Hash a sequence by content; falls back to identity when realization
/// fails (the generic `equal` operation is where such failures surface).
fn hash_seq(v: &OpalVal) -> u64 {
    match try_hash_seq(v) {
        Ok(h) => h,
        Err(_) => identity_hash(v),
    }
}

fn try_hash_seq(v: &OpalVal) -> crate::error::Result<u64> {
    let mut oh = OrderedHasher::new();
    let mut node = crate::ops::seqs::seq(v)?;
    while !node.is_nil() {
        let first = crate::ops::seqs::first(&node)?;
        oh.step(hash_value(&first));
        node = crate::ops::seqs::next(&node)?;
    }
    Ok(oh.finish())
}

/// The structural hash of any value. Metadata never participates.
/// Total: identity kinds hash by pointer rather than failing.
pub fn hash_value(v: &OpalVal) -> u64 {
    match v {
        OpalVal::Nil => mix64(SALT_NIL),
        OpalVal::Bool(b) => mix64(SALT_BOOL ^ u64::from(*b)),
        OpalVal::Int(n) => mix64(SALT_INT ^ *n as u64),
        OpalVal::Float(n) => mix64(SALT_FLOAT ^ float_bits(*n)),
        OpalVal::Ratio(num, den) => {
            mix64(SALT_RATIO ^ (*num as u64).rotate_left(17) ^ *den as u64)
        }
        OpalVal::Char(c) => mix64(SALT_CHAR ^ u64::from(*c as u32)),
        OpalVal::String(s) => fx_hash(&**s),
        OpalVal::Symbol(sym, _) => fx_hash(sym),
        OpalVal::Keyword(kw) => fx_hash(kw),
        OpalVal::List(l) => l.structural_hash(),
        OpalVal::Vector(vec) => vec.structural_hash(),
        OpalVal::ArrayMap(m) => m.structural_hash(),
        OpalVal::HashMap(m) => m.structural_hash(),
        OpalVal::SortedMap(m) => m.structural_hash(),
        OpalVal::HashSet(s) => s.structural_hash(),
        OpalVal::SortedSet(s) => s.structural_hash(),
        // Transients are not equality-comparable; identity only.
        OpalVal::TransientVector(_)
        | OpalVal::TransientHashMap(_)
        | OpalVal::TransientHashSet(_)
        | OpalVal::TransientSortedMap(_)
        | OpalVal::TransientSortedSet(_) => identity_hash(v),
        // Sequence kinds hash by content, agreeing with lists/vectors.
        OpalVal::Cons(_)
        | OpalVal::Range(_)
        | OpalVal::IntegerRange(_)
        | OpalVal::Repeat(_)
        | OpalVal::LazySeq(_)
        | OpalVal::ChunkedCons(_)
        | OpalVal::IteratorSeq(_)
        | OpalVal::VectorSeq(_)
        | OpalVal::IndexedSeq(_)
        | OpalVal::StringSeq(_) => hash_seq(v),
        OpalVal::ChunkBuffer(_) | OpalVal::ArrayChunk(_) => identity_hash(v),
        OpalVal::NativeFn(_) | OpalVal::CompiledFn(_) | OpalVal::MultiFn(_) => identity_hash(v),
        OpalVal::Namespace(ns) => fx_hash(ns.name()),
        OpalVal::Var(var) => fx_hash(&var.qualified_name()),
        OpalVal::VarThreadBinding(_) | OpalVal::VarUnboundRoot(_) => identity_hash(v),
        OpalVal::Atom(_) | OpalVal::Volatile(_) | OpalVal::Delay(_) => identity_hash(v),
        OpalVal::Reduced(inner) => mix64(SALT_REDUCED ^ hash_value(inner)),
        OpalVal::TaggedLiteral(tl) => {
            let mut oh = OrderedHasher::new();
            oh.step(hash_value(&tl.tag));
            oh.step(hash_value(&tl.form));
            mix64(SALT_TAGGED ^ oh.finish())
        }
        OpalVal::Extended(e) => e.to_hash_op(v).unwrap_or_else(|_| identity_hash(v)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stable() {
        let v = OpalVal::vector(vec![OpalVal::int(1), OpalVal::int(2)]);
        assert_eq!(hash_value(&v), hash_value(&v));
    }

    #[test]
    fn test_ordered_vs_unordered() {
        let a = hash_ordered([1u64, 2, 3].into_iter());
        let b = hash_ordered([3u64, 2, 1].into_iter());
        assert_ne!(a, b);
        let c = hash_unordered([1u64, 2, 3].into_iter());
        let d = hash_unordered([3u64, 2, 1].into_iter());
        assert_eq!(c, d);
    }

    #[test]
    fn test_list_vector_agree() {
        let l = OpalVal::list(vec![OpalVal::int(1), OpalVal::int(2)]);
        let v = OpalVal::vector(vec![OpalVal::int(1), OpalVal::int(2)]);
        assert_eq!(hash_value(&l), hash_value(&v));
    }

    #[test]
    fn test_negative_zero() {
        assert_eq!(
            hash_value(&OpalVal::float(0.0)),
            hash_value(&OpalVal::float(-0.0))
        );
    }

    #[test]
    fn test_map_variants_agree() {
        let flat = [
            OpalVal::keyword_str("a"),
            OpalVal::int(1),
            OpalVal::keyword_str("b"),
            OpalVal::int(2),
        ];
        let am = OpalVal::array_map_from_flat(&flat).unwrap();
        let hm = OpalVal::hash_map_from_flat(&flat).unwrap();
        let sm = OpalVal::sorted_map_from_flat(&flat).unwrap();
        assert_eq!(hash_value(&am), hash_value(&hm));
        assert_eq!(hash_value(&hm), hash_value(&sm));
    }
}
