// opal-core - Transient collection integration tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Integration tests for transients: thaw/freeze round trips, isolation
//! from the originating persistent value, and stale-handle errors.

use opal_core::ops;
use opal_core::{Error, OpalVal};

fn kw(s: &str) -> OpalVal {
    OpalVal::keyword_str(s)
}

#[test]
fn test_round_trip_is_structurally_equal() {
    let originals = vec![
        OpalVal::vector((0..100).map(OpalVal::int).collect()),
        OpalVal::hash_map_from_flat(&[kw("a"), OpalVal::int(1), kw("b"), OpalVal::int(2)])
            .unwrap(),
        OpalVal::hash_set_from_vec((0..10).map(OpalVal::int).collect()).unwrap(),
        OpalVal::sorted_map_from_flat(&[OpalVal::int(2), kw("b"), OpalVal::int(1), kw("a")])
            .unwrap(),
        OpalVal::sorted_set_from_vec((0..10).map(OpalVal::int).collect()).unwrap(),
    ];
    for p in originals {
        let t = ops::to_transient(&p).unwrap();
        let frozen = ops::to_persistent(&t).unwrap();
        assert_eq!(frozen, p, "round trip changed {:?}", p);
    }
}

#[test]
fn test_transient_mutation_invisible_through_source() {
    let v = OpalVal::vector((0..50).map(OpalVal::int).collect());
    let t = ops::to_transient(&v).unwrap();
    for i in 50..100 {
        ops::conj_in_place(&t, OpalVal::int(i)).unwrap();
    }
    ops::assoc_in_place(&t, OpalVal::int(0), kw("changed")).unwrap();
    let frozen = ops::to_persistent(&t).unwrap();

    assert_eq!(ops::count(&frozen).unwrap(), 100);
    assert_eq!(ops::nth(&frozen, 0).unwrap(), kw("changed"));
    // The source persistent vector observed nothing.
    assert_eq!(ops::count(&v).unwrap(), 50);
    assert_eq!(ops::nth(&v, 0).unwrap(), OpalVal::int(0));
}

#[test]
fn test_map_transient_batch_build() {
    let m = OpalVal::hash_map_from_flat(&[]).unwrap();
    let t = ops::to_transient(&m).unwrap();
    for i in 0..500i64 {
        ops::assoc_in_place(&t, OpalVal::int(i), OpalVal::int(i * 2)).unwrap();
    }
    for i in 0..100i64 {
        ops::dissoc_in_place(&t, &OpalVal::int(i)).unwrap();
    }
    let frozen = ops::to_persistent(&t).unwrap();
    assert_eq!(ops::count(&frozen).unwrap(), 400);
    assert_eq!(ops::get(&frozen, &OpalVal::int(250)).unwrap(), OpalVal::int(500));
    assert_eq!(ops::get(&frozen, &OpalVal::int(50)).unwrap(), OpalVal::Nil);
}

#[test]
fn test_stale_transient_errors_after_freeze() {
    let v = OpalVal::vector(vec![OpalVal::int(1)]);
    let t = ops::to_transient(&v).unwrap();
    let _frozen = ops::to_persistent(&t).unwrap();

    // Every further use of the stale handle is a checked error.
    assert!(matches!(
        ops::conj_in_place(&t, OpalVal::int(2)).unwrap_err(),
        Error::StaleTransient(_)
    ));
    assert!(matches!(
        ops::count(&t).unwrap_err(),
        Error::StaleTransient(_)
    ));
    assert!(matches!(
        ops::to_persistent(&t).unwrap_err(),
        Error::StaleTransient(_)
    ));
}

#[test]
fn test_stale_transient_map_errors() {
    let m = OpalVal::hash_map_from_flat(&[kw("a"), OpalVal::int(1)]).unwrap();
    let t = ops::to_transient(&m).unwrap();
    let _frozen = ops::to_persistent(&t).unwrap();
    assert!(matches!(
        ops::assoc_in_place(&t, kw("b"), OpalVal::int(2)).unwrap_err(),
        Error::StaleTransient(_)
    ));
    assert!(matches!(
        ops::get(&t, &kw("a")).unwrap_err(),
        Error::StaleTransient(_)
    ));
}

#[test]
fn test_transient_set_conj_and_disj() {
    let s = OpalVal::hash_set_from_vec(vec![OpalVal::int(1), OpalVal::int(2)]).unwrap();
    let t = ops::to_transient(&s).unwrap();
    ops::conj_in_place(&t, OpalVal::int(3)).unwrap();
    ops::disj_in_place(&t, &OpalVal::int(1)).unwrap();
    let frozen = ops::to_persistent(&t).unwrap();
    assert_eq!(
        frozen,
        OpalVal::hash_set_from_vec(vec![OpalVal::int(2), OpalVal::int(3)]).unwrap()
    );
    // The source is untouched.
    assert!(ops::contains(&s, &OpalVal::int(1)).unwrap());
    assert!(!ops::contains(&s, &OpalVal::int(3)).unwrap());
}

#[test]
fn test_array_map_thaws_to_hash_family() {
    // Array maps have no dedicated transient form; they thaw into the
    // map family's transient and freeze as a hash map with the same
    // entries.
    let m = OpalVal::array_map_from_flat(&[kw("a"), OpalVal::int(1)]).unwrap();
    let t = ops::to_transient(&m).unwrap();
    ops::assoc_in_place(&t, kw("b"), OpalVal::int(2)).unwrap();
    let frozen = ops::to_persistent(&t).unwrap();
    assert!(matches!(frozen, OpalVal::HashMap(_)));
    assert_eq!(
        frozen,
        OpalVal::array_map_from_flat(&[kw("a"), OpalVal::int(1), kw("b"), OpalVal::int(2)])
            .unwrap()
    );
}

#[test]
fn test_transients_not_equal_to_collections() {
    let v = OpalVal::vector(vec![OpalVal::int(1)]);
    let t = ops::to_transient(&v).unwrap();
    assert_ne!(t, v);
    // Two thaws of the same vector are distinct transients.
    let t2 = ops::to_transient(&v).unwrap();
    assert_ne!(t, t2);
}

#[test]
fn test_not_transientable() {
    let err = ops::to_transient(&OpalVal::int(1)).unwrap_err();
    assert!(matches!(
        err,
        Error::NotCapable { capability: "transientable", .. }
    ));
    let err = ops::to_persistent(&OpalVal::int(1)).unwrap_err();
    assert!(matches!(
        err,
        Error::NotCapable { capability: "persistentable", .. }
    ));
}
