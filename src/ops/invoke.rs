// opal-core - Generic invocation
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Arity-dispatched invocation through the capability table.
//!
//! Callable kinds include the function kinds plus keywords, maps, sets,
//! vectors, transient sets, and vars (which call through their root
//! binding). Invocation supports 0-10 positional arguments.

use crate::behaviors::caps;
use crate::error::Result;
use crate::value::OpalVal;

/// Call a value with the given arguments. Kinds without any call
/// implementation raise "not callable"; kinds with call implementations
/// but not this arity raise an arity error.
pub fn invoke(f: &OpalVal, args: &[OpalVal]) -> Result<OpalVal> {
    caps(f).call(args)
}

/// The callable's arity flags: bit `n` set means arity `n` is accepted;
/// the variadic bit marks a variadic tail.
pub fn arity_flags(f: &OpalVal) -> Result<u32> {
    caps(f).arity_flags()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::rc::Rc;

    #[test]
    fn test_native_fn_invocation() {
        let f = OpalVal::native_fn("len", Rc::new(|args| Ok(OpalVal::int(args.len() as i64))));
        assert_eq!(invoke(&f, &[]).unwrap(), OpalVal::int(0));
        assert_eq!(
            invoke(&f, &[OpalVal::Nil, OpalVal::Nil]).unwrap(),
            OpalVal::int(2)
        );
    }

    #[test]
    fn test_keyword_invocation() {
        let m = OpalVal::array_map_from_flat(&[OpalVal::keyword_str("a"), OpalVal::int(1)])
            .unwrap();
        let kw = OpalVal::keyword_str("a");
        assert_eq!(invoke(&kw, &[m.clone()]).unwrap(), OpalVal::int(1));
        let missing = OpalVal::keyword_str("b");
        assert_eq!(invoke(&missing, &[m.clone()]).unwrap(), OpalVal::Nil);
        assert_eq!(
            invoke(&missing, &[m, OpalVal::keyword_str("fallback")]).unwrap(),
            OpalVal::keyword_str("fallback")
        );
    }

    #[test]
    fn test_map_and_vector_invocation() {
        let m = OpalVal::array_map_from_flat(&[OpalVal::int(1), OpalVal::keyword_str("one")])
            .unwrap();
        assert_eq!(
            invoke(&m, &[OpalVal::int(1)]).unwrap(),
            OpalVal::keyword_str("one")
        );
        let v = OpalVal::vector(vec![OpalVal::keyword_str("zero"), OpalVal::keyword_str("one")]);
        assert_eq!(
            invoke(&v, &[OpalVal::int(1)]).unwrap(),
            OpalVal::keyword_str("one")
        );
    }

    #[test]
    fn test_not_callable() {
        let err = invoke(&OpalVal::int(3), &[]).unwrap_err();
        assert!(matches!(err, Error::NotCapable { capability: "callable", .. }));
    }

    #[test]
    fn test_wrong_arity_on_keyword() {
        let err = invoke(&OpalVal::keyword_str("k"), &[]).unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { .. }));
    }
}
