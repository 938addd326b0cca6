// opal-core - Property-based tests for collection operations
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Property-based tests for collection operations and invariants.
//!
//! Tests the following properties:
//! - conj/count invariants and persistence of the source
//! - assoc/get/dissoc round-trips for every map variant
//! - contains?/conj/disj for sets
//! - transient round-trips
//! - sequence traversal consistency

use opal_core::ops;
use opal_core::OpalVal;
use proptest::prelude::*;

// =============================================================================
// Strategies for generating values
// =============================================================================

/// Generate small integers for collection elements
fn arb_small_int() -> impl Strategy<Value = i64> {
    -1000i64..1000i64
}

fn arb_int_vec(max_len: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(arb_small_int(), 0..=max_len)
}

fn arb_key() -> impl Strategy<Value = String> {
    "[a-z]{1,5}"
}

fn vector_of(elements: &[i64]) -> OpalVal {
    OpalVal::vector(elements.iter().copied().map(OpalVal::int).collect())
}

fn list_of(elements: &[i64]) -> OpalVal {
    OpalVal::list(elements.iter().copied().map(OpalVal::int).collect())
}

// =============================================================================
// conj/count invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// count(conj(coll, x)) = count(coll) + 1 for vectors, and the
    /// source keeps its count
    #[test]
    fn conj_increments_count_vector(x in arb_small_int(), elements in arb_int_vec(20)) {
        let v = vector_of(&elements);
        let v2 = ops::conj(&v, OpalVal::int(x)).unwrap();
        prop_assert_eq!(ops::count(&v2).unwrap(), elements.len() + 1);
        prop_assert_eq!(ops::count(&v).unwrap(), elements.len());
    }

    /// conj to a vector adds at the end; conj to a list adds at the front
    #[test]
    fn conj_position(x in arb_small_int(), elements in arb_int_vec(10)) {
        let v2 = ops::conj(&vector_of(&elements), OpalVal::int(x)).unwrap();
        prop_assert_eq!(ops::peek(&v2).unwrap(), OpalVal::int(x));

        let l2 = ops::conj(&list_of(&elements), OpalVal::int(x)).unwrap();
        prop_assert_eq!(ops::first(&l2).unwrap(), OpalVal::int(x));
    }

    /// pop undoes conj for both stack disciplines
    #[test]
    fn pop_undoes_conj(x in arb_small_int(), elements in arb_int_vec(10)) {
        let v = vector_of(&elements);
        let popped = ops::pop(&ops::conj(&v, OpalVal::int(x)).unwrap()).unwrap();
        prop_assert_eq!(popped, v);

        let l = list_of(&elements);
        let popped = ops::pop(&ops::conj(&l, OpalVal::int(x)).unwrap()).unwrap();
        prop_assert_eq!(popped, l);
    }
}

// =============================================================================
// Map operations: assoc/get round-trips across all variants
// =============================================================================

/// The three map variants built over the same string keys.
fn map_variants(pairs: &[(String, i64)]) -> Vec<OpalVal> {
    let mut flat = Vec::new();
    for (k, v) in pairs {
        flat.push(OpalVal::string(k.as_str()));
        flat.push(OpalVal::int(*v));
    }
    vec![
        OpalVal::array_map_from_flat(&flat).unwrap(),
        OpalVal::hash_map_from_flat(&flat).unwrap(),
        OpalVal::sorted_map_from_flat(&flat).unwrap(),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// get(assoc(m, k, v), k) = v for every map variant
    #[test]
    fn assoc_get_roundtrip(k in arb_key(), v in arb_small_int()) {
        for m in map_variants(&[]) {
            let m2 = ops::assoc(&m, OpalVal::string(k.as_str()), OpalVal::int(v)).unwrap();
            prop_assert_eq!(
                ops::get(&m2, &OpalVal::string(k.as_str())).unwrap(),
                OpalVal::int(v)
            );
            prop_assert!(ops::contains(&m2, &OpalVal::string(k.as_str())).unwrap());
        }
    }

    /// assoc overwrites an existing key without growing the map
    #[test]
    fn assoc_overwrites(k in arb_key(), v1 in arb_small_int(), v2 in arb_small_int()) {
        for m in map_variants(&[(k.clone(), v1)]) {
            let m2 = ops::assoc(&m, OpalVal::string(k.as_str()), OpalVal::int(v2)).unwrap();
            prop_assert_eq!(ops::count(&m2).unwrap(), 1);
            prop_assert_eq!(
                ops::get(&m2, &OpalVal::string(k.as_str())).unwrap(),
                OpalVal::int(v2)
            );
        }
    }

    /// dissoc removes the key and leaves the source intact
    #[test]
    fn dissoc_removes_key(k in arb_key(), v in arb_small_int()) {
        for m in map_variants(&[(k.clone(), v)]) {
            let m2 = ops::dissoc(&m, &OpalVal::string(k.as_str())).unwrap();
            prop_assert_eq!(ops::count(&m2).unwrap(), 0);
            prop_assert_eq!(
                ops::get(&m2, &OpalVal::string(k.as_str())).unwrap(),
                OpalVal::Nil
            );
            prop_assert_eq!(ops::count(&m).unwrap(), 1);
        }
    }

    /// the three map variants stay pairwise equal under the same entries
    #[test]
    fn map_variants_pairwise_equal(pairs in prop::collection::btree_map(arb_key(), arb_small_int(), 0..12)) {
        let pairs: Vec<(String, i64)> = pairs.into_iter().collect();
        let variants = map_variants(&pairs);
        prop_assert_eq!(&variants[0], &variants[1]);
        prop_assert_eq!(&variants[1], &variants[2]);
    }
}

// =============================================================================
// Set operations
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// contains(conj(s, x), x) and conj of a duplicate keeps the count
    #[test]
    fn set_conj_contains_and_idempotent(x in arb_small_int(), elements in arb_int_vec(10)) {
        let s = OpalVal::hash_set_from_vec(
            elements.iter().copied().map(OpalVal::int).collect()
        ).unwrap();
        let once = ops::conj(&s, OpalVal::int(x)).unwrap();
        prop_assert!(ops::contains(&once, &OpalVal::int(x)).unwrap());
        let twice = ops::conj(&once, OpalVal::int(x)).unwrap();
        prop_assert_eq!(ops::count(&once).unwrap(), ops::count(&twice).unwrap());
    }

    /// disj removes the element
    #[test]
    fn set_disj_removes(x in arb_small_int()) {
        let s = OpalVal::hash_set_from_vec(vec![OpalVal::int(x)]).unwrap();
        let s2 = ops::disj(&s, &OpalVal::int(x)).unwrap();
        prop_assert!(!ops::contains(&s2, &OpalVal::int(x)).unwrap());
        prop_assert!(ops::contains(&s, &OpalVal::int(x)).unwrap());
    }

    /// hash set and sorted set with the same elements are equal
    #[test]
    fn set_variants_equal(elements in prop::collection::btree_set(arb_small_int(), 0..20)) {
        let elements: Vec<OpalVal> = elements.into_iter().map(OpalVal::int).collect();
        let hs = OpalVal::hash_set_from_vec(elements.clone()).unwrap();
        let ss = OpalVal::sorted_set_from_vec(elements).unwrap();
        prop_assert_eq!(hs, ss);
    }
}

// =============================================================================
// Transient round-trips
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// to_persistent(to_transient(p)) is structurally equal to p
    #[test]
    fn transient_roundtrip_vector(elements in arb_int_vec(100)) {
        let v = vector_of(&elements);
        let t = ops::to_transient(&v).unwrap();
        let frozen = ops::to_persistent(&t).unwrap();
        prop_assert_eq!(frozen, v);
    }

    /// batch building through a transient agrees with persistent conj
    #[test]
    fn transient_batch_agrees_with_persistent(elements in arb_int_vec(100)) {
        let mut by_conj = OpalVal::empty_vector();
        for &x in &elements {
            by_conj = ops::conj(&by_conj, OpalVal::int(x)).unwrap();
        }
        let t = ops::to_transient(&OpalVal::empty_vector()).unwrap();
        for &x in &elements {
            ops::conj_in_place(&t, OpalVal::int(x)).unwrap();
        }
        let by_transient = ops::to_persistent(&t).unwrap();
        prop_assert_eq!(by_conj, by_transient);
    }
}

// =============================================================================
// Sequence traversal consistency
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// first(cons(x, coll)) = x and rest preserves the count
    #[test]
    fn cons_first_rest(x in arb_small_int(), elements in arb_int_vec(10)) {
        let coll = vector_of(&elements);
        let c = ops::cons(OpalVal::int(x), &coll).unwrap();
        prop_assert_eq!(ops::first(&c).unwrap(), OpalVal::int(x));
        prop_assert_eq!(ops::count(&ops::rest(&c).unwrap()).unwrap(), elements.len());
    }

    /// walking by next and by next_in_place see the same elements
    #[test]
    fn next_and_in_place_agree(elements in arb_int_vec(40)) {
        let v = vector_of(&elements);

        let mut by_next = Vec::new();
        let mut node = ops::seq(&v).unwrap();
        while !node.is_nil() {
            by_next.push(ops::first(&node).unwrap());
            node = ops::next(&node).unwrap();
        }

        let mut by_in_place = Vec::new();
        let mut node = ops::fresh_seq(&v).unwrap();
        while !node.is_nil() {
            by_in_place.push(ops::first(&node).unwrap());
            node = ops::next_in_place(&node).unwrap();
        }

        prop_assert_eq!(by_next, by_in_place);
    }

    /// nth agrees with traversal order for every valid index
    #[test]
    fn nth_matches_traversal(elements in arb_int_vec(20)) {
        let v = vector_of(&elements);
        let walked = ops::seq_to_vec(&v).unwrap();
        for (i, item) in walked.iter().enumerate() {
            prop_assert_eq!(&ops::nth(&v, i as i64).unwrap(), item);
        }
        prop_assert!(ops::nth(&v, elements.len() as i64).is_err());
    }

    /// sorting yields ascending output and never touches the source
    #[test]
    fn sort_is_ordered_permutation(elements in arb_int_vec(30)) {
        let v = vector_of(&elements);
        let sorted = ops::seq_to_vec(&ops::sort(&v).unwrap()).unwrap();

        let mut expected = elements.clone();
        expected.sort_unstable();
        let expected: Vec<OpalVal> = expected.into_iter().map(OpalVal::int).collect();
        prop_assert_eq!(sorted, expected);
        prop_assert_eq!(v, vector_of(&elements));
    }
}
