// opal-core - Capability dispatch integration tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Integration tests for the capability tables: error surfaces, the
//! callable protocol, and host-defined (extended) kinds built from
//! runtime capability descriptions.

use std::rc::Rc;

use opal_core::ops;
use opal_core::{DynBehaviors, Error, OpalExtended, OpalVal, caps};

fn kw(s: &str) -> OpalVal {
    OpalVal::keyword_str(s)
}

// =============================================================================
// Capability errors
// =============================================================================

#[test]
fn test_capability_errors_name_capability_and_value() {
    let cases: Vec<(Error, &str)> = vec![
        (ops::seq(&OpalVal::int(1)).unwrap_err(), "seqable"),
        (
            ops::assoc(&OpalVal::string("s"), kw("k"), OpalVal::Nil).unwrap_err(),
            "associatively writable",
        ),
        (ops::deref(&OpalVal::int(1)).unwrap_err(), "derefable"),
        (ops::peek(&OpalVal::int(1)).unwrap_err(), "stackable"),
        (ops::invoke(&OpalVal::int(1), &[]).unwrap_err(), "callable"),
        (ops::name(&OpalVal::int(1)).unwrap_err(), "nameable"),
        (
            ops::compare(&OpalVal::empty_list(), &OpalVal::empty_list()).unwrap_err(),
            "comparable",
        ),
        (ops::to_integer(&OpalVal::string("x")).unwrap_err(), "number-like"),
    ];
    for (err, expected) in cases {
        match err {
            Error::NotCapable { capability, .. } => assert_eq!(capability, expected),
            other => panic!("expected capability error, got {:?}", other),
        }
    }
}

#[test]
fn test_number_like_conversions() {
    assert_eq!(ops::to_integer(&OpalVal::int(7)).unwrap(), 7);
    assert_eq!(ops::to_integer(&OpalVal::float(7.9)).unwrap(), 7);
    assert_eq!(ops::to_integer(&OpalVal::ratio(7, 2).unwrap()).unwrap(), 3);
    assert_eq!(ops::to_real(&OpalVal::ratio(1, 2).unwrap()).unwrap(), 0.5);
    assert_eq!(ops::to_integer(&OpalVal::char('A')).unwrap(), 65);
}

#[test]
fn test_var_deref_and_call_through() {
    let f = OpalVal::native_fn("double", Rc::new(|args| match &args[0] {
        OpalVal::Int(n) => Ok(OpalVal::int(n * 2)),
        _ => Err(Error::shape("int expected")),
    }));
    let var = opal_core::OpalVar::with_ns("user", "double", f);
    let var_val = OpalVal::var(var);
    assert_eq!(ops::name(&var_val).unwrap(), "double");
    assert_eq!(
        ops::namespace_name(&var_val).unwrap(),
        Some("user".to_string())
    );
    // Calling the var calls its root binding.
    assert_eq!(
        ops::invoke(&var_val, &[OpalVal::int(21)]).unwrap(),
        OpalVal::int(42)
    );
}

#[test]
fn test_arity_flags_query() {
    let f = opal_core::OpalCompiledFn::new(None)
        .with_arity(1, Rc::new(|args| Ok(args[0].clone())))
        .unwrap()
        .with_arity(3, Rc::new(|args| Ok(args[2].clone())))
        .unwrap();
    let fv = OpalVal::compiled_fn(f);
    assert_eq!(ops::arity_flags(&fv).unwrap(), 0b1010);
    let err = ops::invoke(&fv, &[]).unwrap_err();
    assert!(matches!(err, Error::ArityMismatch { .. }));
}

#[test]
fn test_multi_fn_dispatch() {
    let dispatch = OpalVal::native_fn("kind-of", Rc::new(|args| {
        Ok(OpalVal::keyword_str(args[0].type_name()))
    }));
    let mf = opal_core::OpalMultiFn::new(opal_core::Symbol::new("describe"), dispatch);
    mf.add_method(
        kw("int"),
        OpalVal::native_fn("describe-int", Rc::new(|_| Ok(OpalVal::string("a number")))),
    );
    mf.set_default(OpalVal::native_fn(
        "describe-any",
        Rc::new(|_| Ok(OpalVal::string("something"))),
    ));
    let mfv = OpalVal::multi_fn(mf);
    assert_eq!(
        ops::invoke(&mfv, &[OpalVal::int(1)]).unwrap(),
        OpalVal::string("a number")
    );
    assert_eq!(
        ops::invoke(&mfv, &[OpalVal::string("s")]).unwrap(),
        OpalVal::string("something")
    );
}

// =============================================================================
// Host-defined kinds (dynamic capability descriptions)
// =============================================================================

fn deref_description(result: OpalVal) -> OpalVal {
    OpalVal::array_map_from_flat(&[
        kw("derefable"),
        OpalVal::array_map_from_flat(&[
            kw("deref"),
            OpalVal::native_fn("deref-impl", Rc::new(move |_args| Ok(result.clone()))),
        ])
        .unwrap(),
    ])
    .unwrap()
}

#[test]
fn test_extended_kind_parity_with_compiled_kind() {
    // A host-defined box behaves like the compiled volatile through the
    // same generic operation.
    let description = deref_description(OpalVal::int(99));
    let extended = OpalVal::extended(
        OpalExtended::from_description(OpalVal::int(99), &description).unwrap(),
    );
    let volatile = OpalVal::volatile(OpalVal::int(99));

    assert_eq!(ops::deref(&extended).unwrap(), ops::deref(&volatile).unwrap());
    assert!(caps(&extended).is_derefable());
    // Capabilities it does not declare still error properly.
    let err = ops::seq(&extended).unwrap_err();
    assert!(matches!(err, Error::NotCapable { capability: "seqable", .. }));
}

#[test]
fn test_extended_seqable_through_generic_ops() {
    // Host-defined kind whose seq is a fixed list.
    let elements = OpalVal::list(vec![OpalVal::int(1), OpalVal::int(2)]);
    let seq_fn = {
        let elements = elements.clone();
        OpalVal::native_fn("seq-impl", Rc::new(move |_args| {
            ops::seq(&elements)
        }))
    };
    let description = OpalVal::array_map_from_flat(&[
        kw("seqable"),
        OpalVal::array_map_from_flat(&[kw("seq"), seq_fn]).unwrap(),
        kw("sequential"),
        OpalVal::array_map_from_flat(&[]).unwrap(),
    ])
    .unwrap();
    let extended = OpalVal::extended(
        OpalExtended::from_description(OpalVal::Nil, &description).unwrap(),
    );

    assert_eq!(ops::first(&extended).unwrap(), OpalVal::int(1));
    assert_eq!(ops::count(&extended).unwrap(), 2);
    // Declared sequential, so it participates in sequential equality.
    assert_eq!(extended, OpalVal::vector(vec![OpalVal::int(1), OpalVal::int(2)]));
}

#[test]
fn test_description_validation() {
    // Not a map
    assert!(matches!(
        DynBehaviors::from_description(&OpalVal::int(1)).unwrap_err(),
        Error::Shape(_)
    ));
    // Unknown capability
    let unknown = OpalVal::array_map_from_flat(&[
        kw("teleportable"),
        OpalVal::array_map_from_flat(&[]).unwrap(),
    ])
    .unwrap();
    assert!(matches!(
        DynBehaviors::from_description(&unknown).unwrap_err(),
        Error::Shape(_)
    ));
    // Non-callable operation
    let bad_op = OpalVal::array_map_from_flat(&[
        kw("derefable"),
        OpalVal::array_map_from_flat(&[kw("deref"), OpalVal::int(1)]).unwrap(),
    ])
    .unwrap();
    assert!(matches!(
        DynBehaviors::from_description(&bad_op).unwrap_err(),
        Error::Shape(_)
    ));
    // Missing required operation
    let missing = OpalVal::array_map_from_flat(&[
        kw("stackable"),
        OpalVal::array_map_from_flat(&[
            kw("peek"),
            OpalVal::native_fn("peek", Rc::new(|_| Ok(OpalVal::Nil))),
        ])
        .unwrap(),
    ])
    .unwrap();
    assert!(matches!(
        DynBehaviors::from_description(&missing).unwrap_err(),
        Error::Shape(_)
    ));
}

#[test]
fn test_composite_capability_requires_both_halves() {
    let get_fn = OpalVal::native_fn("get", Rc::new(|_| Ok(OpalVal::Nil)));
    let read_only = OpalVal::array_map_from_flat(&[
        kw("associatively_readable"),
        OpalVal::array_map_from_flat(&[kw("get"), get_fn]).unwrap(),
    ])
    .unwrap();
    let d = DynBehaviors::from_description(&read_only).unwrap();
    assert!(d.has("associatively_readable"));
    assert!(!d.has("associative"));
}

#[test]
fn test_extended_payload_is_opaque() {
    let description = deref_description(OpalVal::Nil);
    let payload = OpalVal::vector(vec![OpalVal::int(1)]);
    let e = OpalExtended::from_description(payload.clone(), &description).unwrap();
    assert_eq!(e.payload(), &payload);
}
