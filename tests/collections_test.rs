// opal-core - Persistent collection integration tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Integration tests for the persistent collection family: persistence
//! of updates, kind-family equality, and construction contracts.

use opal_core::ops;
use opal_core::{Error, OpalVal};

fn kw(s: &str) -> OpalVal {
    OpalVal::keyword_str(s)
}

fn ints(range: std::ops::Range<i64>) -> Vec<OpalVal> {
    range.map(OpalVal::int).collect()
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_assoc_never_mutates_source() {
    let m = OpalVal::hash_map_from_flat(&[kw("a"), OpalVal::int(1)]).unwrap();
    let m2 = ops::assoc(&m, kw("b"), OpalVal::int(2)).unwrap();
    let m3 = ops::dissoc(&m2, &kw("a")).unwrap();

    assert_eq!(ops::count(&m).unwrap(), 1);
    assert_eq!(ops::count(&m2).unwrap(), 2);
    assert_eq!(ops::count(&m3).unwrap(), 1);
    assert_eq!(ops::get(&m, &kw("a")).unwrap(), OpalVal::int(1));
    assert_eq!(ops::get(&m, &kw("b")).unwrap(), OpalVal::Nil);
    assert_eq!(ops::get(&m3, &kw("a")).unwrap(), OpalVal::Nil);
}

#[test]
fn test_conj_never_mutates_source() {
    let v = OpalVal::vector(ints(1..4));
    let v2 = ops::conj(&v, OpalVal::int(4)).unwrap();
    assert_eq!(v2, OpalVal::vector(ints(1..5)));
    assert_eq!(ops::count(&v).unwrap(), 3);

    let s = OpalVal::hash_set_from_vec(ints(0..3)).unwrap();
    let s2 = ops::conj(&s, OpalVal::int(9)).unwrap();
    let s3 = ops::disj(&s2, &OpalVal::int(0)).unwrap();
    assert_eq!(ops::count(&s).unwrap(), 3);
    assert_eq!(ops::count(&s2).unwrap(), 4);
    assert_eq!(ops::count(&s3).unwrap(), 3);
    assert!(ops::contains(&s, &OpalVal::int(0)).unwrap());
}

#[test]
fn test_structural_sharing_scales() {
    // A long chain of derived vectors; every version stays intact.
    let mut versions = vec![OpalVal::empty_vector()];
    for i in 0..500 {
        let next = ops::conj(versions.last().unwrap(), OpalVal::int(i)).unwrap();
        versions.push(next);
    }
    for (i, v) in versions.iter().enumerate() {
        assert_eq!(ops::count(v).unwrap(), i);
    }
}

// =============================================================================
// Kind-family equality
// =============================================================================

#[test]
fn test_map_variants_pairwise_equal() {
    let flat = [
        kw("a"),
        OpalVal::int(1),
        kw("b"),
        OpalVal::int(2),
        kw("c"),
        OpalVal::int(3),
    ];
    let am = OpalVal::array_map_from_flat(&flat).unwrap();
    let hm = OpalVal::hash_map_from_flat(&flat).unwrap();
    let sm = OpalVal::sorted_map_from_flat(&flat).unwrap();
    assert_eq!(am, hm);
    assert_eq!(hm, sm);
    assert_eq!(am, sm);
    // And hashes agree with equality
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let hash_of = |v: &OpalVal| {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    };
    assert_eq!(hash_of(&am), hash_of(&hm));
    assert_eq!(hash_of(&hm), hash_of(&sm));
}

#[test]
fn test_set_variants_equal() {
    let hs = OpalVal::hash_set_from_vec(ints(0..10)).unwrap();
    let ss = OpalVal::sorted_set_from_vec(ints(0..10)).unwrap();
    assert_eq!(hs, ss);
    let smaller = OpalVal::hash_set_from_vec(ints(0..9)).unwrap();
    assert_ne!(hs, smaller);
}

#[test]
fn test_vector_equals_list_and_seq() {
    let v = OpalVal::vector(ints(1..4));
    let l = OpalVal::list(ints(1..4));
    assert_eq!(v, l);
    let s = ops::seq(&v).unwrap();
    assert_eq!(s, l);
    // But a map never equals a vector
    let m = OpalVal::array_map_from_flat(&[]).unwrap();
    assert_ne!(m, OpalVal::empty_vector());
}

#[test]
fn test_nil_never_equals_empty_collection() {
    assert_ne!(OpalVal::Nil, OpalVal::empty_vector());
    assert_ne!(OpalVal::Nil, OpalVal::empty_list());
    assert_ne!(OpalVal::Nil, OpalVal::array_map_from_flat(&[]).unwrap());
    assert_ne!(OpalVal::Nil, OpalVal::hash_set_from_vec(vec![]).unwrap());
}

// =============================================================================
// Construction contracts
// =============================================================================

#[test]
fn test_odd_element_count_is_shape_error() {
    let odd = [kw("a"), OpalVal::int(1), kw("b")];
    assert!(matches!(
        OpalVal::array_map_from_flat(&odd).unwrap_err(),
        Error::Shape(_)
    ));
    assert!(matches!(
        OpalVal::hash_map_from_flat(&odd).unwrap_err(),
        Error::Shape(_)
    ));
    assert!(matches!(
        OpalVal::sorted_map_from_flat(&odd).unwrap_err(),
        Error::Shape(_)
    ));
}

#[test]
fn test_array_map_promotes_and_stays_equal() {
    // Construction from more entries than the threshold yields a hash
    // map with the same contents.
    let mut flat = Vec::new();
    for i in 0..20i64 {
        flat.push(OpalVal::int(i));
        flat.push(OpalVal::int(i * 10));
    }
    let promoted = OpalVal::array_map_from_flat(&flat).unwrap();
    assert!(matches!(promoted, OpalVal::HashMap(_)));
    let hm = OpalVal::hash_map_from_flat(&flat).unwrap();
    assert_eq!(promoted, hm);
}

#[test]
fn test_array_map_keeps_insertion_order() {
    let m = OpalVal::array_map_from_flat(&[
        kw("z"),
        OpalVal::int(1),
        kw("a"),
        OpalVal::int(2),
    ])
    .unwrap();
    let entries = ops::seq_to_vec(&m).unwrap();
    assert_eq!(
        entries[0],
        OpalVal::vector(vec![kw("z"), OpalVal::int(1)])
    );
    assert_eq!(
        entries[1],
        OpalVal::vector(vec![kw("a"), OpalVal::int(2)])
    );
}

#[test]
fn test_sorted_map_orders_by_compare() {
    let m = OpalVal::sorted_map_from_flat(&[
        OpalVal::int(3),
        kw("c"),
        OpalVal::int(1),
        kw("a"),
        OpalVal::int(2),
        kw("b"),
    ])
    .unwrap();
    let entries = ops::seq_to_vec(&m).unwrap();
    assert_eq!(entries[0], OpalVal::vector(vec![OpalVal::int(1), kw("a")]));
    assert_eq!(entries[2], OpalVal::vector(vec![OpalVal::int(3), kw("c")]));
}

#[test]
fn test_set_membership_is_map_lookup() {
    let s = OpalVal::hash_set_from_vec(vec![kw("x"), OpalVal::int(1)]).unwrap();
    assert!(ops::contains(&s, &kw("x")).unwrap());
    assert_eq!(ops::get(&s, &kw("x")).unwrap(), kw("x"));
    assert_eq!(ops::get(&s, &kw("y")).unwrap(), OpalVal::Nil);
}

// =============================================================================
// Vector specifics
// =============================================================================

#[test]
fn test_subvec_is_a_fresh_vector() {
    let v = OpalVal::vector(ints(0..100));
    let s = ops::subvec(&v, 10, 20).unwrap();
    assert_eq!(ops::count(&s).unwrap(), 10);
    assert_eq!(ops::nth(&s, 0).unwrap(), OpalVal::int(10));
    // Deriving from the subvec does not disturb the source
    let s2 = ops::conj(&s, OpalVal::int(999)).unwrap();
    assert_eq!(ops::count(&s2).unwrap(), 11);
    assert_eq!(ops::count(&v).unwrap(), 100);
    assert!(ops::subvec(&v, 50, 101).is_err());
}

#[test]
fn test_vector_get_by_index() {
    let v = OpalVal::vector(ints(10..13));
    assert_eq!(ops::get(&v, &OpalVal::int(1)).unwrap(), OpalVal::int(11));
    assert_eq!(ops::get(&v, &OpalVal::int(99)).unwrap(), OpalVal::Nil);
    assert_eq!(ops::get(&v, &kw("x")).unwrap(), OpalVal::Nil);
    let v2 = ops::assoc(&v, OpalVal::int(0), kw("new")).unwrap();
    assert_eq!(ops::nth(&v2, 0).unwrap(), kw("new"));
    assert_eq!(ops::nth(&v, 0).unwrap(), OpalVal::int(10));
}

#[test]
fn test_empty_returns_same_kind() {
    let v = OpalVal::vector(ints(0..3));
    assert!(matches!(ops::empty(&v).unwrap(), OpalVal::Vector(_)));
    let m = OpalVal::sorted_map_from_flat(&[OpalVal::int(1), kw("a")]).unwrap();
    assert!(matches!(ops::empty(&m).unwrap(), OpalVal::SortedMap(_)));
    let s = OpalVal::hash_set_from_vec(vec![kw("a")]).unwrap();
    assert!(matches!(ops::empty(&s).unwrap(), OpalVal::HashSet(_)));
}
