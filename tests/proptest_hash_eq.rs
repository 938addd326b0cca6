// opal-core - Property-based tests for hash/equality consistency
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Property-based tests for the hash contract: if `equal(a, b)` then
//! `hash(a) == hash(b)`, across kinds, backing structures, and repeated
//! calls. This is what makes values usable as map keys and set members.

use opal_core::hashing::hash_value;
use opal_core::ops;
use opal_core::OpalVal;
use proptest::prelude::*;

fn assert_hash_eq_consistent(a: &OpalVal, b: &OpalVal) -> Result<(), TestCaseError> {
    prop_assert!(ops::equal(a, b).unwrap(), "values should be equal");
    prop_assert_eq!(hash_value(a), hash_value(b), "equal values must hash alike");
    Ok(())
}

// =============================================================================
// Leaf kinds
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Equal ints hash alike, and hashing is stable across calls
    #[test]
    fn int_hash_eq_consistency(n in any::<i64>()) {
        let v = OpalVal::int(n);
        assert_hash_eq_consistent(&v, &OpalVal::int(n))?;
        prop_assert_eq!(hash_value(&v), hash_value(&v));
    }

    /// Equal floats hash alike (including both zeros)
    #[test]
    fn float_hash_eq_consistency(n in any::<f64>().prop_filter("finite", |f| f.is_finite())) {
        assert_hash_eq_consistent(&OpalVal::float(n), &OpalVal::float(n))?;
        if n == 0.0 {
            assert_hash_eq_consistent(&OpalVal::float(0.0), &OpalVal::float(-0.0))?;
        }
    }

    /// Equal strings hash alike; a string never equals its keyword
    #[test]
    fn string_hash_eq_consistency(s in "[a-z]{0,12}") {
        assert_hash_eq_consistent(&OpalVal::string(s.as_str()), &OpalVal::string(s.as_str()))?;
        prop_assert!(!ops::equal(&OpalVal::string(s.as_str()), &OpalVal::keyword_str(&s)).unwrap());
    }

    /// Interned symbols and keywords hash by identity, consistently
    #[test]
    fn identifier_hash_eq_consistency(name in "[a-z]{1,8}", ns in "[a-z]{1,8}") {
        let qualified = format!("{}/{}", ns, name);
        assert_hash_eq_consistent(
            &OpalVal::symbol_str(&qualified),
            &OpalVal::symbol_str(&qualified),
        )?;
        assert_hash_eq_consistent(
            &OpalVal::keyword_str(&qualified),
            &OpalVal::keyword_str(&qualified),
        )?;
    }

    /// Ratios normalize at construction, so equal ratios hash alike
    #[test]
    fn ratio_hash_eq_consistency(num in -100i64..100, den in 1i64..100, scale in 1i64..5) {
        let a = OpalVal::ratio(num, den).unwrap();
        let b = OpalVal::ratio(num * scale, den * scale).unwrap();
        assert_hash_eq_consistent(&a, &b)?;
    }
}

// =============================================================================
// Collections: equality across backing structures implies hash equality
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A vector and a list with the same elements are equal and hash alike
    #[test]
    fn sequential_kinds_hash_alike(elements in prop::collection::vec(-1000i64..1000, 0..20)) {
        let vals: Vec<OpalVal> = elements.iter().copied().map(OpalVal::int).collect();
        let v = OpalVal::vector(vals.clone());
        let l = OpalVal::list(vals);
        assert_hash_eq_consistent(&v, &l)?;

        // The seq over the vector is yet another equal rendition.
        if !elements.is_empty() {
            let s = ops::seq(&v).unwrap();
            assert_hash_eq_consistent(&s, &l)?;
        }
    }

    /// Array, hash, and sorted maps with the same entries hash alike
    #[test]
    fn map_variants_hash_alike(pairs in prop::collection::btree_map(-100i64..100, -1000i64..1000, 0..12)) {
        let mut flat = Vec::new();
        for (k, v) in &pairs {
            flat.push(OpalVal::int(*k));
            flat.push(OpalVal::int(*v));
        }
        let am = OpalVal::array_map_from_flat(&flat).unwrap();
        let hm = OpalVal::hash_map_from_flat(&flat).unwrap();
        let sm = OpalVal::sorted_map_from_flat(&flat).unwrap();
        assert_hash_eq_consistent(&am, &hm)?;
        assert_hash_eq_consistent(&hm, &sm)?;
    }

    /// Insertion order never leaks into map equality or hashing
    #[test]
    fn map_hash_order_independent(pairs in prop::collection::btree_map(-100i64..100, -1000i64..1000, 1..12)) {
        let mut flat = Vec::new();
        for (k, v) in &pairs {
            flat.push(OpalVal::int(*k));
            flat.push(OpalVal::int(*v));
        }
        let mut reversed = Vec::new();
        for (k, v) in pairs.iter().rev() {
            reversed.push(OpalVal::int(*k));
            reversed.push(OpalVal::int(*v));
        }
        let a = OpalVal::hash_map_from_flat(&flat).unwrap();
        let b = OpalVal::hash_map_from_flat(&reversed).unwrap();
        assert_hash_eq_consistent(&a, &b)?;
    }

    /// Hash and sorted sets with the same elements hash alike
    #[test]
    fn set_variants_hash_alike(elements in prop::collection::btree_set(-1000i64..1000, 0..20)) {
        let vals: Vec<OpalVal> = elements.into_iter().map(OpalVal::int).collect();
        let hs = OpalVal::hash_set_from_vec(vals.clone()).unwrap();
        let ss = OpalVal::sorted_set_from_vec(vals).unwrap();
        assert_hash_eq_consistent(&hs, &ss)?;
    }

    /// Metadata never disturbs equality or hashing
    #[test]
    fn metadata_never_affects_hash(elements in prop::collection::vec(-1000i64..1000, 0..10)) {
        let v = OpalVal::vector(elements.into_iter().map(OpalVal::int).collect());
        let meta = OpalVal::array_map_from_flat(&[
            OpalVal::keyword_str("source"),
            OpalVal::string("test"),
        ])
        .unwrap();
        let tagged = v.with_meta(Some(meta)).unwrap();
        assert_hash_eq_consistent(&v, &tagged)?;
    }

    /// The cached hash is stable across repeated reads
    #[test]
    fn hash_caching_is_stable(elements in prop::collection::vec(-1000i64..1000, 0..20)) {
        let v = OpalVal::vector(elements.into_iter().map(OpalVal::int).collect());
        let first = hash_value(&v);
        for _ in 0..3 {
            prop_assert_eq!(hash_value(&v), first);
        }
    }
}

// =============================================================================
// Values as map keys
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A collection key built twice independently still finds its entry
    #[test]
    fn collection_keys_work(elements in prop::collection::vec(-100i64..100, 0..5)) {
        let key1 = OpalVal::vector(elements.iter().copied().map(OpalVal::int).collect());
        let key2 = OpalVal::list(elements.iter().copied().map(OpalVal::int).collect());

        let m = ops::assoc(&OpalVal::hash_map_from_flat(&[]).unwrap(), key1, OpalVal::int(1))
            .unwrap();
        // The list is sequential-equal to the vector, so it must hash into
        // the same bucket and find the entry.
        prop_assert_eq!(ops::get(&m, &key2).unwrap(), OpalVal::int(1));
    }
}
