// opal-core - Capability tables and dispatch
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Per-kind capability tables.
//!
//! A [`Behaviors`] table bundles, for one kind, the boolean flags saying
//! which structural roles the kind fulfils and one function slot per
//! operation. Tables are built once per kind on first dispatch, from a
//! single exhaustive match, and cached process-wide; construction racing
//! across threads is idempotent (both racers build the same table, one
//! copy wins).
//!
//! A second construction path builds an equivalent table from a
//! *runtime-supplied* capability description — a map from capability
//! name to a map of operation name to callable — for host-defined kinds
//! ([`OpalExtended`]). Both paths are validated against the single
//! [`CAPABILITIES`] contract table, and the [`Caps`] facade routes every
//! generic operation through whichever table applies, so the two paths
//! are observationally identical for any capability both implement.

use std::cmp::Ordering;
use std::rc::Rc;
use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use crate::callable::{ALL_ARITIES, MAX_ARITY, VARIADIC_BIT};
use crate::collections::{
    PersistentArrayMap, PersistentHashMap, PersistentList, PersistentSortedMap,
    PersistentVector,
};
use crate::error::{Error, Result};
use crate::seq::{IndexedSeq, StringSeq, VectorSeq};
use crate::value::{Kind, KIND_COUNT, OpalVal};

// ============================================================================
// Slot types
// ============================================================================

pub type StrFn = fn(&OpalVal) -> String;
pub type HashFn = fn(&OpalVal) -> u64;
pub type EqFn = fn(&OpalVal, &OpalVal) -> Result<bool>;
pub type Op1 = fn(&OpalVal) -> Result<OpalVal>;
pub type Op2 = fn(&OpalVal, &OpalVal) -> Result<OpalVal>;
pub type Op3 = fn(&OpalVal, &OpalVal, &OpalVal) -> Result<OpalVal>;
pub type CountOp = fn(&OpalVal) -> Result<usize>;
pub type BoolOp2 = fn(&OpalVal, &OpalVal) -> Result<bool>;
pub type CmpOp = fn(&OpalVal, &OpalVal) -> Result<Ordering>;
pub type MetaOp = fn(&OpalVal) -> Option<OpalVal>;
pub type NameOp = fn(&OpalVal) -> Result<String>;
pub type NsOp = fn(&OpalVal) -> Result<Option<String>>;
pub type CallOp = fn(&OpalVal, &[OpalVal]) -> Result<OpalVal>;
pub type FlagsOp = fn(&OpalVal) -> u32;
pub type NthOp = fn(&OpalVal, i64) -> Result<OpalVal>;
pub type NthDefaultOp = fn(&OpalVal, i64, &OpalVal) -> Result<OpalVal>;
pub type ToIntOp = fn(&OpalVal) -> Result<i64>;
pub type ToRealOp = fn(&OpalVal) -> Result<f64>;

/// The capability table for one kind: role flags plus bound operations.
#[derive(Default)]
pub struct Behaviors {
    pub is_object_like: bool,
    pub is_seqable: bool,
    pub is_sequential: bool,
    pub is_sequenceable: bool,
    pub is_sequenceable_in_place: bool,
    pub is_collection: bool,
    pub is_associative: bool,
    pub is_associatively_readable: bool,
    pub is_associatively_writable: bool,
    pub is_associatively_writable_in_place: bool,
    pub is_countable: bool,
    pub is_transientable: bool,
    pub is_persistentable: bool,
    pub is_chunk_like: bool,
    pub is_chunkable: bool,
    pub is_metadatable: bool,
    pub is_comparable: bool,
    pub is_callable: bool,
    pub is_named: bool,
    pub is_derefable: bool,
    pub is_indexable: bool,
    pub is_map: bool,
    pub is_set: bool,
    pub is_stackable: bool,
    pub is_number_like: bool,
    pub is_conjable: bool,
    pub is_conjable_in_place: bool,

    /* object_like */
    pub to_display_string: Option<StrFn>,
    pub to_code_string: Option<StrFn>,
    pub to_hash: Option<HashFn>,
    pub equal: Option<EqFn>,
    /* seqable */
    pub seq: Option<Op1>,
    pub fresh_seq: Option<Op1>,
    /* sequenceable */
    pub first: Option<Op1>,
    pub next: Option<Op1>,
    pub next_in_place: Option<Op1>,
    /* collection_like */
    pub empty: Option<Op1>,
    /* associatively_readable */
    pub get: Option<Op2>,
    pub get_default: Option<Op3>,
    pub get_entry: Option<Op2>,
    pub contains: Option<BoolOp2>,
    /* associatively_writable */
    pub assoc: Option<Op3>,
    pub dissoc: Option<Op2>,
    pub assoc_in_place: Option<Op3>,
    pub dissoc_in_place: Option<Op2>,
    /* countable */
    pub count: Option<CountOp>,
    /* transientable / persistentable */
    pub to_transient: Option<Op1>,
    pub to_persistent: Option<Op1>,
    /* chunk_like */
    pub chunk_next: Option<Op1>,
    /* chunkable */
    pub chunked_first: Option<Op1>,
    pub chunked_next: Option<Op1>,
    /* metadatable */
    pub with_meta: Option<Op2>,
    pub meta: Option<MetaOp>,
    pub set_meta: Option<Op2>,
    /* comparable */
    pub compare: Option<CmpOp>,
    /* callable: one slot per arity 0..=10 */
    pub calls: [Option<CallOp>; MAX_ARITY + 1],
    pub arity_flags: Option<FlagsOp>,
    /* nameable */
    pub name: Option<NameOp>,
    pub namespace: Option<NsOp>,
    /* derefable */
    pub deref: Option<Op1>,
    /* indexable */
    pub nth: Option<NthOp>,
    pub nth_default: Option<NthDefaultOp>,
    /* stackable */
    pub peek: Option<Op1>,
    pub pop: Option<Op1>,
    /* number_like */
    pub to_integer: Option<ToIntOp>,
    pub to_real: Option<ToRealOp>,
    /* conjable */
    pub conj: Option<Op2>,
    pub conj_in_place: Option<Op2>,
}

// ============================================================================
// Capability contract
// ============================================================================

/// One capability's contract: the operations it requires and the ones it
/// may additionally bind. This table is the single source of truth for
/// both construction paths: the compiled arms below follow it, and
/// runtime-supplied descriptions are validated against it.
pub struct CapabilitySpec {
    pub name: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

pub const CAPABILITIES: &[CapabilitySpec] = &[
    CapabilitySpec {
        name: "object_like",
        required: &[],
        optional: &["to_display_string", "to_code_string", "to_hash", "equal"],
    },
    CapabilitySpec {
        name: "seqable",
        required: &["seq"],
        optional: &["fresh_seq"],
    },
    CapabilitySpec {
        name: "sequential",
        required: &[],
        optional: &[],
    },
    CapabilitySpec {
        name: "sequenceable",
        required: &["first", "next"],
        optional: &[],
    },
    CapabilitySpec {
        name: "sequenceable_in_place",
        required: &["next_in_place"],
        optional: &[],
    },
    CapabilitySpec {
        name: "collection_like",
        required: &["empty"],
        optional: &[],
    },
    CapabilitySpec {
        name: "associatively_readable",
        required: &["get"],
        optional: &["get_default", "get_entry", "contains"],
    },
    CapabilitySpec {
        name: "associatively_writable",
        required: &["assoc", "dissoc"],
        optional: &[],
    },
    CapabilitySpec {
        name: "associatively_writable_in_place",
        required: &["assoc_in_place", "dissoc_in_place"],
        optional: &[],
    },
    CapabilitySpec {
        name: "countable",
        required: &["count"],
        optional: &[],
    },
    CapabilitySpec {
        name: "transientable",
        required: &["to_transient"],
        optional: &[],
    },
    CapabilitySpec {
        name: "persistentable",
        required: &["to_persistent"],
        optional: &[],
    },
    CapabilitySpec {
        name: "chunk_like",
        required: &["chunk_next"],
        optional: &[],
    },
    CapabilitySpec {
        name: "chunkable",
        required: &["chunked_first", "chunked_next"],
        optional: &[],
    },
    CapabilitySpec {
        name: "metadatable",
        required: &["with_meta"],
        optional: &["get_meta", "set_meta"],
    },
    CapabilitySpec {
        name: "comparable",
        required: &["compare"],
        optional: &[],
    },
    CapabilitySpec {
        name: "callable",
        required: &[],
        optional: &[
            "call0",
            "call1",
            "call2",
            "call3",
            "call4",
            "call5",
            "call6",
            "call7",
            "call8",
            "call9",
            "call10",
            "get_arity_flags",
        ],
    },
    CapabilitySpec {
        name: "nameable",
        required: &["name"],
        optional: &["namespace"],
    },
    CapabilitySpec {
        name: "derefable",
        required: &["deref"],
        optional: &[],
    },
    CapabilitySpec {
        name: "indexable",
        required: &["nth"],
        optional: &["nth_default"],
    },
    CapabilitySpec {
        name: "stackable",
        required: &["peek", "pop"],
        optional: &[],
    },
    CapabilitySpec {
        name: "number_like",
        required: &["to_integer", "to_real"],
        optional: &[],
    },
    CapabilitySpec {
        name: "conjable",
        required: &["conj"],
        optional: &[],
    },
    CapabilitySpec {
        name: "conjable_in_place",
        required: &["conj_in_place"],
        optional: &[],
    },
    CapabilitySpec {
        name: "map_like",
        required: &[],
        optional: &[],
    },
    CapabilitySpec {
        name: "set_like",
        required: &[],
        optional: &[],
    },
];

pub fn capability_spec(name: &str) -> Option<&'static CapabilitySpec> {
    CAPABILITIES.iter().find(|spec| spec.name == name)
}

// ============================================================================
// Expect helpers (single-kind visit)
// ============================================================================

macro_rules! expect_kind {
    ($val:expr, $variant:ident, $what:literal) => {
        match $val {
            OpalVal::$variant(x) => Ok(x),
            _ => Err(Error::internal(concat!(
                "capability table slot reached with a non-",
                $what
            ))),
        }
    };
}

fn with_transient<T, R>(
    cell: &crate::value::TransientCell<T>,
    op: &'static str,
    f: impl FnOnce(&mut T) -> Result<R>,
) -> Result<R> {
    let mut slot = cell.borrow_mut();
    match slot.as_mut() {
        Some(t) => f(t),
        None => Err(Error::StaleTransient(op)),
    }
}

// ============================================================================
// Per-kind construction (compiled path)
// ============================================================================

impl Behaviors {
    /// Object-like slots every kind shares: rendering, hashing, and
    /// structural equality are total functions over the closed variant.
    fn base() -> Behaviors {
        Behaviors {
            is_object_like: true,
            to_display_string: Some(crate::ops::print::to_display_string),
            to_code_string: Some(crate::ops::print::to_code_string),
            to_hash: Some(crate::hashing::hash_value),
            equal: Some(crate::ops::equality::equal),
            ..Default::default()
        }
    }

    fn comparable() -> Behaviors {
        Behaviors {
            is_comparable: true,
            compare: Some(crate::ops::equality::compare),
            ..Behaviors::base()
        }
    }

    /// Build the table for a kind. Exhaustive over the closed variant;
    /// a new kind fails to compile until it gains an arm here.
    pub fn for_kind(kind: Kind) -> Behaviors {
        match kind {
            Kind::Nil => Behaviors::base(),
            Kind::Bool => Behaviors::comparable(),
            Kind::Int => Behaviors {
                is_number_like: true,
                to_integer: Some(|v| Ok(*expect_kind!(v, Int, "int")?)),
                to_real: Some(|v| Ok(*expect_kind!(v, Int, "int")? as f64)),
                ..Behaviors::comparable()
            },
            Kind::Float => Behaviors {
                is_number_like: true,
                to_integer: Some(|v| Ok(*expect_kind!(v, Float, "float")? as i64)),
                to_real: Some(|v| Ok(*expect_kind!(v, Float, "float")?)),
                ..Behaviors::comparable()
            },
            Kind::Ratio => Behaviors {
                is_number_like: true,
                to_integer: Some(|v| match v {
                    OpalVal::Ratio(num, den) => Ok(num / den),
                    _ => Err(Error::internal("capability table slot reached with a non-ratio")),
                }),
                to_real: Some(|v| match v {
                    OpalVal::Ratio(num, den) => Ok(*num as f64 / *den as f64),
                    _ => Err(Error::internal("capability table slot reached with a non-ratio")),
                }),
                ..Behaviors::comparable()
            },
            Kind::Char => Behaviors {
                is_number_like: true,
                to_integer: Some(|v| Ok(u32::from(*expect_kind!(v, Char, "char")?) as i64)),
                to_real: Some(|v| Ok(f64::from(u32::from(*expect_kind!(v, Char, "char")?)))),
                ..Behaviors::comparable()
            },
            Kind::String => Behaviors::string(),
            Kind::Symbol => Behaviors {
                is_named: true,
                is_metadatable: true,
                name: Some(|v| match v {
                    OpalVal::Symbol(sym, _) => Ok(sym.name().to_string()),
                    _ => Err(Error::internal("capability table slot reached with a non-symbol")),
                }),
                namespace: Some(|v| match v {
                    OpalVal::Symbol(sym, _) => Ok(sym.namespace().map(str::to_string)),
                    _ => Err(Error::internal("capability table slot reached with a non-symbol")),
                }),
                with_meta: Some(|v, m| v.with_meta(Some(m.clone()))),
                meta: Some(OpalVal::meta),
                ..Behaviors::comparable()
            },
            Kind::Keyword => Behaviors::keyword(),
            Kind::List => Behaviors::list(),
            Kind::Vector => Behaviors::vector(),
            Kind::ArrayMap | Kind::HashMap | Kind::SortedMap => Behaviors::map(kind),
            Kind::HashSet | Kind::SortedSet => Behaviors::set(kind),
            Kind::TransientVector => Behaviors::transient_vector(),
            Kind::TransientHashMap => Behaviors::transient_map(kind),
            Kind::TransientSortedMap => Behaviors::transient_map(kind),
            Kind::TransientHashSet => Behaviors::transient_set(kind),
            Kind::TransientSortedSet => Behaviors::transient_set(kind),
            Kind::Cons => Behaviors::cons(),
            Kind::Range => Behaviors::float_range(),
            Kind::IntegerRange => Behaviors::integer_range(),
            Kind::Repeat => Behaviors::repeat(),
            Kind::LazySeq => Behaviors::lazy_seq(),
            Kind::ChunkedCons => Behaviors::chunked_cons(),
            Kind::ChunkBuffer => Behaviors {
                is_countable: true,
                count: Some(|v| Ok(expect_kind!(v, ChunkBuffer, "chunk-buffer")?.len())),
                ..Behaviors::base()
            },
            Kind::ArrayChunk => Behaviors::array_chunk(),
            Kind::IteratorSeq => Behaviors::iterator_seq(),
            Kind::VectorSeq => Behaviors::vector_seq(),
            Kind::IndexedSeq => Behaviors::indexed_seq(),
            Kind::StringSeq => Behaviors::string_seq(),
            Kind::NativeFn => Behaviors::function(|v, args| {
                expect_kind!(v, NativeFn, "native-fn")?.invoke(args)
            }, |v| match v {
                OpalVal::NativeFn(f) => f.arity_flags(),
                _ => ALL_ARITIES | VARIADIC_BIT,
            }),
            Kind::CompiledFn => {
                let mut b = Behaviors::function(
                    |v, args| expect_kind!(v, CompiledFn, "fn")?.invoke(args),
                    |v| match v {
                        OpalVal::CompiledFn(f) => f.arity_flags(),
                        _ => 0,
                    },
                );
                b.is_metadatable = true;
                b.with_meta = Some(|v, m| v.with_meta(Some(m.clone())));
                b.meta = Some(OpalVal::meta);
                b
            }
            Kind::MultiFn => Behaviors::function(
                |v, args| expect_kind!(v, MultiFn, "multi-fn")?.invoke(args),
                |v| match v {
                    OpalVal::MultiFn(f) => f.arity_flags(),
                    _ => 0,
                },
            ),
            Kind::Namespace => Behaviors {
                is_named: true,
                name: Some(|v| {
                    Ok(expect_kind!(v, Namespace, "namespace")?.name().name().to_string())
                }),
                namespace: Some(|_| Ok(None)),
                ..Behaviors::base()
            },
            Kind::Var => Behaviors::var(),
            Kind::VarThreadBinding => Behaviors {
                is_derefable: true,
                deref: Some(|v| {
                    Ok(expect_kind!(v, VarThreadBinding, "thread-binding")?.value.clone())
                }),
                ..Behaviors::base()
            },
            Kind::VarUnboundRoot => Behaviors::base(),
            Kind::Atom => Behaviors {
                is_derefable: true,
                deref: Some(|v| Ok(expect_kind!(v, Atom, "atom")?.deref())),
                ..Behaviors::base()
            },
            Kind::Volatile => Behaviors {
                is_derefable: true,
                deref: Some(|v| Ok(expect_kind!(v, Volatile, "volatile")?.deref())),
                ..Behaviors::base()
            },
            Kind::Delay => Behaviors {
                is_derefable: true,
                deref: Some(|v| expect_kind!(v, Delay, "delay")?.force()),
                ..Behaviors::base()
            },
            Kind::Reduced => Behaviors {
                is_derefable: true,
                deref: Some(|v| Ok((**expect_kind!(v, Reduced, "reduced")?).clone())),
                ..Behaviors::base()
            },
            Kind::TaggedLiteral => Behaviors::tagged_literal(),
            // Host-defined kinds dispatch through the value's own
            // description table; the Caps facade never consults these
            // slots for them.
            Kind::Extended => Behaviors::base(),
        }
    }

    fn string() -> Behaviors {
        Behaviors {
            is_seqable: true,
            is_countable: true,
            is_indexable: true,
            seq: Some(|v| {
                let s = expect_kind!(v, String, "string")?;
                if s.is_empty() {
                    Ok(OpalVal::Nil)
                } else {
                    Ok(OpalVal::string_seq(StringSeq::new(Rc::clone(s))))
                }
            }),
            fresh_seq: Some(|v| {
                let s = expect_kind!(v, String, "string")?;
                if s.is_empty() {
                    Ok(OpalVal::Nil)
                } else {
                    Ok(OpalVal::string_seq(StringSeq::new(Rc::clone(s))))
                }
            }),
            count: Some(|v| Ok(expect_kind!(v, String, "string")?.chars().count())),
            nth: Some(|v, i| {
                let s = expect_kind!(v, String, "string")?;
                if i < 0 {
                    return Err(Error::out_of_bounds(i, s.chars().count()));
                }
                s.chars()
                    .nth(i as usize)
                    .map(OpalVal::char)
                    .ok_or_else(|| Error::out_of_bounds(i, s.chars().count()))
            }),
            nth_default: Some(|v, i, d| {
                let s = expect_kind!(v, String, "string")?;
                if i < 0 {
                    return Ok(d.clone());
                }
                Ok(s.chars().nth(i as usize).map(OpalVal::char).unwrap_or_else(|| d.clone()))
            }),
            ..Behaviors::comparable()
        }
    }

    fn keyword() -> Behaviors {
        // (kw coll) and (kw coll default) look the keyword up in the
        // argument.
        fn kw_call(v: &OpalVal, args: &[OpalVal]) -> Result<OpalVal> {
            match args.len() {
                1 => crate::ops::get(&args[0], v),
                2 => crate::ops::get_default(&args[0], v, &args[1]),
                n => Err(Error::arity("keyword", n)),
            }
        }
        let mut b = Behaviors {
            is_named: true,
            name: Some(|v| Ok(expect_kind!(v, Keyword, "keyword")?.name().to_string())),
            namespace: Some(|v| {
                Ok(expect_kind!(v, Keyword, "keyword")?.namespace().map(str::to_string))
            }),
            ..Behaviors::comparable()
        };
        b.calls[1] = Some(kw_call);
        b.calls[2] = Some(kw_call);
        b
    }

    fn list() -> Behaviors {
        fn list_of(v: &OpalVal) -> Result<&Rc<PersistentList>> {
            expect_kind!(v, List, "list")
        }
        Behaviors {
            is_seqable: true,
            is_sequential: true,
            is_sequenceable: true,
            is_sequenceable_in_place: true,
            is_collection: true,
            is_countable: true,
            is_stackable: true,
            is_conjable: true,
            is_metadatable: true,
            seq: Some(|v| {
                let l = list_of(v)?;
                Ok(if l.is_empty() { OpalVal::Nil } else { v.clone() })
            }),
            fresh_seq: Some(|v| {
                let l = list_of(v)?;
                Ok(if l.is_empty() { OpalVal::Nil } else { v.clone() })
            }),
            first: Some(|v| Ok(list_of(v)?.first().cloned().unwrap_or(OpalVal::Nil))),
            next: Some(|v| {
                let l = list_of(v)?;
                if l.count() <= 1 {
                    Ok(OpalVal::Nil)
                } else {
                    Ok(OpalVal::persistent_list(l.rest()))
                }
            }),
            // List nodes share immutable structure; the in-place variant
            // degenerates to the fresh one.
            next_in_place: Some(|v| {
                let l = list_of(v)?;
                if l.count() <= 1 {
                    Ok(OpalVal::Nil)
                } else {
                    Ok(OpalVal::persistent_list(l.rest()))
                }
            }),
            empty: Some(|_| Ok(OpalVal::empty_list())),
            count: Some(|v| Ok(list_of(v)?.count())),
            peek: Some(|v| Ok(list_of(v)?.peek().cloned().unwrap_or(OpalVal::Nil))),
            pop: Some(|v| Ok(OpalVal::persistent_list(list_of(v)?.pop()?))),
            conj: Some(|v, x| Ok(OpalVal::persistent_list(list_of(v)?.conj(x.clone())))),
            with_meta: Some(|v, m| v.with_meta(Some(m.clone()))),
            meta: Some(OpalVal::meta),
            ..Behaviors::base()
        }
    }

    fn vector() -> Behaviors {
        fn vec_of(v: &OpalVal) -> Result<&Rc<PersistentVector>> {
            expect_kind!(v, Vector, "vector")
        }
        fn index_of(key: &OpalVal) -> Option<i64> {
            match key {
                OpalVal::Int(i) => Some(*i),
                _ => None,
            }
        }
        fn vec_call(v: &OpalVal, args: &[OpalVal]) -> Result<OpalVal> {
            match args.len() {
                1 => match &args[0] {
                    OpalVal::Int(i) => crate::ops::seqs::nth(v, *i),
                    other => Err(Error::shape(format!(
                        "vectors are indexed by integer, got {}",
                        other.type_name()
                    ))),
                },
                n => Err(Error::arity("vector", n)),
            }
        }
        let mut b = Behaviors {
            is_seqable: true,
            is_sequential: true,
            is_collection: true,
            is_countable: true,
            is_associative: true,
            is_associatively_readable: true,
            is_associatively_writable: true,
            is_indexable: true,
            is_stackable: true,
            is_conjable: true,
            is_transientable: true,
            is_metadatable: true,
            seq: Some(|v| {
                let x = vec_of(v)?;
                if x.is_empty() {
                    Ok(OpalVal::Nil)
                } else {
                    Ok(OpalVal::vector_seq(VectorSeq::new(Rc::clone(x), 0)))
                }
            }),
            fresh_seq: Some(|v| {
                let x = vec_of(v)?;
                if x.is_empty() {
                    Ok(OpalVal::Nil)
                } else {
                    Ok(OpalVal::vector_seq(VectorSeq::new(Rc::clone(x), 0)))
                }
            }),
            empty: Some(|_| Ok(OpalVal::empty_vector())),
            count: Some(|v| Ok(vec_of(v)?.count())),
            // get on a vector treats the key as an index; unlike nth it
            // answers nil rather than erroring out of range.
            get: Some(|v, k| {
                let x = vec_of(v)?;
                Ok(match index_of(k) {
                    Some(i) if i >= 0 => x.nth(i as usize).cloned().unwrap_or(OpalVal::Nil),
                    _ => OpalVal::Nil,
                })
            }),
            get_default: Some(|v, k, d| {
                let x = vec_of(v)?;
                Ok(match index_of(k) {
                    Some(i) if i >= 0 => x.nth(i as usize).cloned().unwrap_or_else(|| d.clone()),
                    _ => d.clone(),
                })
            }),
            get_entry: Some(|v, k| {
                let x = vec_of(v)?;
                Ok(match index_of(k) {
                    Some(i) if i >= 0 => match x.nth(i as usize) {
                        Some(item) => OpalVal::vector(vec![k.clone(), item.clone()]),
                        None => OpalVal::Nil,
                    },
                    _ => OpalVal::Nil,
                })
            }),
            contains: Some(|v, k| {
                let x = vec_of(v)?;
                Ok(matches!(index_of(k), Some(i) if i >= 0 && (i as usize) < x.count()))
            }),
            assoc: Some(|v, k, val| {
                let x = vec_of(v)?;
                match index_of(k) {
                    Some(i) if i >= 0 => {
                        Ok(OpalVal::persistent_vector(x.assoc_n(i as usize, val.clone())?))
                    }
                    Some(i) => Err(Error::out_of_bounds(i, x.count())),
                    None => Err(Error::shape(format!(
                        "vectors are indexed by integer, got {}",
                        k.type_name()
                    ))),
                }
            }),
            nth: Some(|v, i| {
                let x = vec_of(v)?;
                if i < 0 {
                    return Err(Error::out_of_bounds(i, x.count()));
                }
                x.nth(i as usize)
                    .cloned()
                    .ok_or_else(|| Error::out_of_bounds(i, x.count()))
            }),
            nth_default: Some(|v, i, d| {
                let x = vec_of(v)?;
                if i < 0 {
                    return Ok(d.clone());
                }
                Ok(x.nth(i as usize).cloned().unwrap_or_else(|| d.clone()))
            }),
            peek: Some(|v| Ok(vec_of(v)?.peek().cloned().unwrap_or(OpalVal::Nil))),
            pop: Some(|v| Ok(OpalVal::persistent_vector(vec_of(v)?.pop()?))),
            conj: Some(|v, x| Ok(OpalVal::persistent_vector(vec_of(v)?.push(x.clone())))),
            to_transient: Some(|v| Ok(OpalVal::transient_vector(vec_of(v)?.to_transient()))),
            with_meta: Some(|v, m| v.with_meta(Some(m.clone()))),
            meta: Some(OpalVal::meta),
            ..Behaviors::comparable()
        };
        b.calls[1] = Some(vec_call);
        b
    }

    fn map(kind: Kind) -> Behaviors {
        fn entries_seq(v: &OpalVal) -> Result<OpalVal> {
            let entries = crate::ops::equality::map_entries(v)
                .ok_or_else(|| Error::internal("capability table slot reached with a non-map"))?;
            if entries.is_empty() {
                return Ok(OpalVal::Nil);
            }
            let items: Vec<OpalVal> = entries
                .into_iter()
                .map(|(k, val)| OpalVal::vector(vec![k, val]))
                .collect();
            Ok(OpalVal::indexed_seq(IndexedSeq::from_vec(items)))
        }
        fn map_get(v: &OpalVal, k: &OpalVal) -> Result<OpalVal> {
            Ok(match v {
                OpalVal::ArrayMap(m) => m.get(k)?.cloned(),
                OpalVal::HashMap(m) => m.get(k)?.cloned(),
                OpalVal::SortedMap(m) => m.get(k)?.cloned(),
                _ => None,
            }
            .unwrap_or(OpalVal::Nil))
        }
        fn map_call(v: &OpalVal, args: &[OpalVal]) -> Result<OpalVal> {
            match args.len() {
                1 => crate::ops::get(v, &args[0]),
                2 => crate::ops::get_default(v, &args[0], &args[1]),
                n => Err(Error::arity("map", n)),
            }
        }
        let mut b = Behaviors {
            is_map: true,
            is_seqable: true,
            is_collection: true,
            is_countable: true,
            is_associative: true,
            is_associatively_readable: true,
            is_associatively_writable: true,
            is_conjable: true,
            is_transientable: true,
            is_metadatable: true,
            seq: Some(entries_seq),
            fresh_seq: Some(entries_seq),
            empty: Some(match kind {
                Kind::ArrayMap => {
                    (|_| Ok(OpalVal::array_map(PersistentArrayMap::empty()))) as Op1
                }
                Kind::SortedMap => |_| Ok(OpalVal::sorted_map(PersistentSortedMap::empty())),
                _ => |_| Ok(OpalVal::hash_map(PersistentHashMap::empty())),
            }),
            count: Some(|v| match v {
                OpalVal::ArrayMap(m) => Ok(m.count()),
                OpalVal::HashMap(m) => Ok(m.count()),
                OpalVal::SortedMap(m) => Ok(m.count()),
                _ => Err(Error::internal("capability table slot reached with a non-map")),
            }),
            get: Some(map_get),
            get_default: Some(|v, k, d| {
                Ok(match v {
                    OpalVal::ArrayMap(m) => m.get(k)?.cloned(),
                    OpalVal::HashMap(m) => m.get(k)?.cloned(),
                    OpalVal::SortedMap(m) => m.get(k)?.cloned(),
                    _ => None,
                }
                .unwrap_or_else(|| d.clone()))
            }),
            get_entry: Some(|v, k| {
                let entry = match v {
                    OpalVal::ArrayMap(m) => m.get_entry(k)?.map(|(k, val)| (k.clone(), val.clone())),
                    OpalVal::HashMap(m) => m.get_entry(k)?.map(|(k, val)| (k.clone(), val.clone())),
                    OpalVal::SortedMap(m) => {
                        m.get_entry(k)?.map(|(k, val)| (k.clone(), val.clone()))
                    }
                    _ => None,
                };
                Ok(match entry {
                    Some((k, val)) => OpalVal::vector(vec![k, val]),
                    None => OpalVal::Nil,
                })
            }),
            contains: Some(|v, k| match v {
                OpalVal::ArrayMap(m) => m.contains(k),
                OpalVal::HashMap(m) => m.contains(k),
                OpalVal::SortedMap(m) => m.contains(k),
                _ => Err(Error::internal("capability table slot reached with a non-map")),
            }),
            assoc: Some(|v, k, val| match v {
                OpalVal::ArrayMap(m) => m.assoc(k.clone(), val.clone()),
                OpalVal::HashMap(m) => Ok(OpalVal::hash_map(m.assoc(k.clone(), val.clone())?)),
                OpalVal::SortedMap(m) => {
                    Ok(OpalVal::sorted_map(m.assoc(k.clone(), val.clone())?))
                }
                _ => Err(Error::internal("capability table slot reached with a non-map")),
            }),
            dissoc: Some(|v, k| match v {
                OpalVal::ArrayMap(m) => Ok(OpalVal::array_map(m.dissoc(k)?)),
                OpalVal::HashMap(m) => Ok(OpalVal::hash_map(m.dissoc(k)?)),
                OpalVal::SortedMap(m) => Ok(OpalVal::sorted_map(m.dissoc(k)?)),
                _ => Err(Error::internal("capability table slot reached with a non-map")),
            }),
            conj: Some(crate::ops::map_conj),
            to_transient: Some(|v| match v {
                OpalVal::ArrayMap(m) => Ok(OpalVal::transient_hash_map(m.to_transient()?)),
                OpalVal::HashMap(m) => Ok(OpalVal::transient_hash_map(m.to_transient())),
                OpalVal::SortedMap(m) => Ok(OpalVal::transient_sorted_map(m.to_transient())),
                _ => Err(Error::internal("capability table slot reached with a non-map")),
            }),
            with_meta: Some(|v, m| v.with_meta(Some(m.clone()))),
            meta: Some(OpalVal::meta),
            ..Behaviors::base()
        };
        b.calls[1] = Some(map_call);
        b.calls[2] = Some(map_call);
        b
    }

    fn set(kind: Kind) -> Behaviors {
        fn elements_seq(v: &OpalVal) -> Result<OpalVal> {
            let items: Vec<OpalVal> = match v {
                OpalVal::HashSet(s) => s.iter().cloned().collect(),
                OpalVal::SortedSet(s) => s.iter().cloned().collect(),
                _ => {
                    return Err(Error::internal(
                        "capability table slot reached with a non-set",
                    ));
                }
            };
            if items.is_empty() {
                return Ok(OpalVal::Nil);
            }
            Ok(OpalVal::indexed_seq(IndexedSeq::from_vec(items)))
        }
        fn set_call(v: &OpalVal, args: &[OpalVal]) -> Result<OpalVal> {
            match args.len() {
                1 => crate::ops::get(v, &args[0]),
                n => Err(Error::arity("set", n)),
            }
        }
        let mut b = Behaviors {
            is_set: true,
            is_seqable: true,
            is_collection: true,
            is_countable: true,
            is_conjable: true,
            is_transientable: true,
            is_metadatable: true,
            seq: Some(elements_seq),
            fresh_seq: Some(elements_seq),
            empty: Some(match kind {
                Kind::SortedSet => (|_| {
                    Ok(OpalVal::sorted_set(
                        crate::collections::PersistentSortedSet::empty(),
                    ))
                }) as Op1,
                _ => |_| {
                    Ok(OpalVal::hash_set(
                        crate::collections::PersistentHashSet::empty(),
                    ))
                },
            }),
            count: Some(|v| match v {
                OpalVal::HashSet(s) => Ok(s.count()),
                OpalVal::SortedSet(s) => Ok(s.count()),
                _ => Err(Error::internal("capability table slot reached with a non-set")),
            }),
            // Membership is a map lookup with the element as key.
            get: Some(|v, k| {
                Ok(match v {
                    OpalVal::HashSet(s) => s.get(k)?.cloned(),
                    OpalVal::SortedSet(s) => s.get(k)?.cloned(),
                    _ => None,
                }
                .unwrap_or(OpalVal::Nil))
            }),
            get_default: Some(|v, k, d| {
                Ok(match v {
                    OpalVal::HashSet(s) => s.get(k)?.cloned(),
                    OpalVal::SortedSet(s) => s.get(k)?.cloned(),
                    _ => None,
                }
                .unwrap_or_else(|| d.clone()))
            }),
            contains: Some(|v, k| match v {
                OpalVal::HashSet(s) => s.contains(k),
                OpalVal::SortedSet(s) => s.contains(k),
                _ => Err(Error::internal("capability table slot reached with a non-set")),
            }),
            conj: Some(|v, x| match v {
                OpalVal::HashSet(s) => Ok(OpalVal::hash_set(s.conj(x.clone())?)),
                OpalVal::SortedSet(s) => Ok(OpalVal::sorted_set(s.conj(x.clone())?)),
                _ => Err(Error::internal("capability table slot reached with a non-set")),
            }),
            to_transient: Some(|v| match v {
                OpalVal::HashSet(s) => Ok(OpalVal::transient_hash_set(s.to_transient())),
                OpalVal::SortedSet(s) => Ok(OpalVal::transient_sorted_set(s.to_transient())),
                _ => Err(Error::internal("capability table slot reached with a non-set")),
            }),
            with_meta: Some(|v, m| v.with_meta(Some(m.clone()))),
            meta: Some(OpalVal::meta),
            ..Behaviors::base()
        };
        b.calls[1] = Some(set_call);
        b
    }

    fn transient_vector() -> Behaviors {
        Behaviors {
            is_countable: true,
            is_indexable: true,
            is_conjable_in_place: true,
            is_associatively_writable_in_place: true,
            is_persistentable: true,
            count: Some(|v| {
                let cell = expect_kind!(v, TransientVector, "transient-vector")?;
                with_transient(cell, "count", |t| Ok(t.count()))
            }),
            nth: Some(|v, i| {
                let cell = expect_kind!(v, TransientVector, "transient-vector")?;
                with_transient(cell, "nth", |t| {
                    if i < 0 {
                        return Err(Error::out_of_bounds(i, t.count()));
                    }
                    t.nth(i as usize)
                        .cloned()
                        .ok_or_else(|| Error::out_of_bounds(i, t.count()))
                })
            }),
            conj_in_place: Some(|v, x| {
                let cell = expect_kind!(v, TransientVector, "transient-vector")?;
                with_transient(cell, "conj!", |t| {
                    t.push_mut(x.clone());
                    Ok(())
                })?;
                Ok(v.clone())
            }),
            assoc_in_place: Some(|v, k, val| {
                let cell = expect_kind!(v, TransientVector, "transient-vector")?;
                let idx = match k {
                    OpalVal::Int(i) if *i >= 0 => *i as usize,
                    _ => {
                        return Err(Error::shape(format!(
                            "vectors are indexed by integer, got {}",
                            k.type_name()
                        )));
                    }
                };
                with_transient(cell, "assoc!", |t| t.assoc_n_mut(idx, val.clone()))?;
                Ok(v.clone())
            }),
            dissoc_in_place: Some(|v, _| Err(Error::not_capable("associatively writable", v))),
            to_persistent: Some(|v| {
                let cell = expect_kind!(v, TransientVector, "transient-vector")?;
                let t = cell
                    .borrow_mut()
                    .take()
                    .ok_or(Error::StaleTransient("persistent!"))?;
                Ok(OpalVal::persistent_vector(t.persistent()))
            }),
            ..Behaviors::base()
        }
    }

    fn transient_map(kind: Kind) -> Behaviors {
        let sorted = matches!(kind, Kind::TransientSortedMap);
        let mut b = Behaviors {
            is_countable: true,
            is_conjable_in_place: true,
            is_associatively_writable_in_place: true,
            is_associatively_readable: true,
            is_persistentable: true,
            ..Behaviors::base()
        };
        if sorted {
            b.count = Some(|v| {
                let cell = expect_kind!(v, TransientSortedMap, "transient-sorted-map")?;
                with_transient(cell, "count", |t| Ok(t.count()))
            });
            b.get = Some(|v, k| {
                let cell = expect_kind!(v, TransientSortedMap, "transient-sorted-map")?;
                with_transient(cell, "get", |t| Ok(t.get(k)?.cloned().unwrap_or(OpalVal::Nil)))
            });
            b.get_default = Some(|v, k, d| {
                let cell = expect_kind!(v, TransientSortedMap, "transient-sorted-map")?;
                with_transient(cell, "get", |t| {
                    Ok(t.get(k)?.cloned().unwrap_or_else(|| d.clone()))
                })
            });
            b.contains = Some(|v, k| {
                let cell = expect_kind!(v, TransientSortedMap, "transient-sorted-map")?;
                with_transient(cell, "contains?", |t| t.contains(k))
            });
            b.assoc_in_place = Some(|v, k, val| {
                let cell = expect_kind!(v, TransientSortedMap, "transient-sorted-map")?;
                with_transient(cell, "assoc!", |t| t.assoc_mut(k.clone(), val.clone()))?;
                Ok(v.clone())
            });
            b.dissoc_in_place = Some(|v, k| {
                let cell = expect_kind!(v, TransientSortedMap, "transient-sorted-map")?;
                with_transient(cell, "dissoc!", |t| t.dissoc_mut(k))?;
                Ok(v.clone())
            });
            b.conj_in_place = Some(crate::ops::map_conj_in_place);
            b.to_persistent = Some(|v| {
                let cell = expect_kind!(v, TransientSortedMap, "transient-sorted-map")?;
                let t = cell
                    .borrow_mut()
                    .take()
                    .ok_or(Error::StaleTransient("persistent!"))?;
                Ok(OpalVal::sorted_map(t.persistent()))
            });
        } else {
            b.count = Some(|v| {
                let cell = expect_kind!(v, TransientHashMap, "transient-hash-map")?;
                with_transient(cell, "count", |t| Ok(t.count()))
            });
            b.get = Some(|v, k| {
                let cell = expect_kind!(v, TransientHashMap, "transient-hash-map")?;
                with_transient(cell, "get", |t| Ok(t.get(k)?.cloned().unwrap_or(OpalVal::Nil)))
            });
            b.get_default = Some(|v, k, d| {
                let cell = expect_kind!(v, TransientHashMap, "transient-hash-map")?;
                with_transient(cell, "get", |t| {
                    Ok(t.get(k)?.cloned().unwrap_or_else(|| d.clone()))
                })
            });
            b.contains = Some(|v, k| {
                let cell = expect_kind!(v, TransientHashMap, "transient-hash-map")?;
                with_transient(cell, "contains?", |t| t.contains(k))
            });
            b.assoc_in_place = Some(|v, k, val| {
                let cell = expect_kind!(v, TransientHashMap, "transient-hash-map")?;
                with_transient(cell, "assoc!", |t| t.assoc_mut(k.clone(), val.clone()))?;
                Ok(v.clone())
            });
            b.dissoc_in_place = Some(|v, k| {
                let cell = expect_kind!(v, TransientHashMap, "transient-hash-map")?;
                with_transient(cell, "dissoc!", |t| t.dissoc_mut(k))?;
                Ok(v.clone())
            });
            b.conj_in_place = Some(crate::ops::map_conj_in_place);
            b.to_persistent = Some(|v| {
                let cell = expect_kind!(v, TransientHashMap, "transient-hash-map")?;
                let t = cell
                    .borrow_mut()
                    .take()
                    .ok_or(Error::StaleTransient("persistent!"))?;
                Ok(OpalVal::hash_map(t.persistent()))
            });
        }
        b
    }

    fn transient_set(kind: Kind) -> Behaviors {
        let sorted = matches!(kind, Kind::TransientSortedSet);
        fn set_call(v: &OpalVal, args: &[OpalVal]) -> Result<OpalVal> {
            match args.len() {
                1 => crate::ops::get(v, &args[0]),
                n => Err(Error::arity("set", n)),
            }
        }
        let mut b = Behaviors {
            is_countable: true,
            is_conjable_in_place: true,
            is_persistentable: true,
            ..Behaviors::base()
        };
        if sorted {
            b.count = Some(|v| {
                let cell = expect_kind!(v, TransientSortedSet, "transient-sorted-set")?;
                with_transient(cell, "count", |t| Ok(t.count()))
            });
            b.contains = Some(|v, k| {
                let cell = expect_kind!(v, TransientSortedSet, "transient-sorted-set")?;
                with_transient(cell, "contains?", |t| t.contains(k))
            });
            b.get = Some(|v, k| {
                let cell = expect_kind!(v, TransientSortedSet, "transient-sorted-set")?;
                with_transient(cell, "get", |t| {
                    Ok(if t.contains(k)? { k.clone() } else { OpalVal::Nil })
                })
            });
            b.conj_in_place = Some(|v, x| {
                let cell = expect_kind!(v, TransientSortedSet, "transient-sorted-set")?;
                with_transient(cell, "conj!", |t| t.conj_mut(x.clone()))?;
                Ok(v.clone())
            });
            b.to_persistent = Some(|v| {
                let cell = expect_kind!(v, TransientSortedSet, "transient-sorted-set")?;
                let t = cell
                    .borrow_mut()
                    .take()
                    .ok_or(Error::StaleTransient("persistent!"))?;
                Ok(OpalVal::sorted_set(t.persistent()))
            });
        } else {
            b.count = Some(|v| {
                let cell = expect_kind!(v, TransientHashSet, "transient-hash-set")?;
                with_transient(cell, "count", |t| Ok(t.count()))
            });
            b.contains = Some(|v, k| {
                let cell = expect_kind!(v, TransientHashSet, "transient-hash-set")?;
                with_transient(cell, "contains?", |t| t.contains(k))
            });
            b.get = Some(|v, k| {
                let cell = expect_kind!(v, TransientHashSet, "transient-hash-set")?;
                with_transient(cell, "get", |t| {
                    Ok(if t.contains(k)? { k.clone() } else { OpalVal::Nil })
                })
            });
            b.conj_in_place = Some(|v, x| {
                let cell = expect_kind!(v, TransientHashSet, "transient-hash-set")?;
                with_transient(cell, "conj!", |t| t.conj_mut(x.clone()))?;
                Ok(v.clone())
            });
            b.to_persistent = Some(|v| {
                let cell = expect_kind!(v, TransientHashSet, "transient-hash-set")?;
                let t = cell
                    .borrow_mut()
                    .take()
                    .ok_or(Error::StaleTransient("persistent!"))?;
                Ok(OpalVal::hash_set(t.persistent()))
            });
        }
        b.calls[1] = Some(set_call);
        b
    }

    /// Shared shape of the pure sequence kinds: seqable over themselves,
    /// sequential, conjable by consing.
    fn seq_kind() -> Behaviors {
        Behaviors {
            is_seqable: true,
            is_sequential: true,
            is_sequenceable: true,
            is_sequenceable_in_place: true,
            is_collection: true,
            is_countable: true,
            is_conjable: true,
            empty: Some(|_| Ok(OpalVal::empty_list())),
            conj: Some(|v, x| Ok(OpalVal::cons(x.clone(), v.clone()))),
            count: Some(crate::ops::seqs::count_by_walking),
            ..Behaviors::base()
        }
    }

    fn cons() -> Behaviors {
        Behaviors {
            is_metadatable: true,
            seq: Some(|v| Ok(v.clone())),
            fresh_seq: Some(|v| Ok(v.clone())),
            first: Some(|v| Ok(expect_kind!(v, Cons, "cons")?.first().clone())),
            next: Some(|v| crate::ops::seqs::seq(expect_kind!(v, Cons, "cons")?.rest())),
            next_in_place: Some(|v| {
                crate::ops::seqs::seq(expect_kind!(v, Cons, "cons")?.rest())
            }),
            with_meta: Some(|v, m| v.with_meta(Some(m.clone()))),
            meta: Some(OpalVal::meta),
            ..Behaviors::seq_kind()
        }
    }

    fn float_range() -> Behaviors {
        fn range_of(v: &OpalVal) -> Result<&Rc<crate::seq::Range>> {
            expect_kind!(v, Range, "range")
        }
        Behaviors {
            seq: Some(|v| {
                Ok(if range_of(v)?.is_empty() { OpalVal::Nil } else { v.clone() })
            }),
            fresh_seq: Some(|v| {
                Ok(if range_of(v)?.is_empty() { OpalVal::Nil } else { v.clone() })
            }),
            first: Some(|v| Ok(range_of(v)?.first().unwrap_or(OpalVal::Nil))),
            next: Some(|v| {
                Ok(match range_of(v)?.next() {
                    Some(r) => OpalVal::range(r),
                    None => OpalVal::Nil,
                })
            }),
            next_in_place: Some(|v| {
                Ok(if range_of(v)?.next_in_place() { v.clone() } else { OpalVal::Nil })
            }),
            count: Some(|v| Ok(range_of(v)?.count())),
            ..Behaviors::seq_kind()
        }
    }

    fn integer_range() -> Behaviors {
        fn range_of(v: &OpalVal) -> Result<&Rc<crate::seq::IntegerRange>> {
            expect_kind!(v, IntegerRange, "integer-range")
        }
        Behaviors {
            is_chunkable: true,
            seq: Some(|v| {
                Ok(if range_of(v)?.is_empty() { OpalVal::Nil } else { v.clone() })
            }),
            fresh_seq: Some(|v| {
                Ok(if range_of(v)?.is_empty() { OpalVal::Nil } else { v.clone() })
            }),
            first: Some(|v| Ok(range_of(v)?.first().unwrap_or(OpalVal::Nil))),
            next: Some(|v| {
                Ok(match range_of(v)?.next() {
                    Some(r) => OpalVal::integer_range(r),
                    None => OpalVal::Nil,
                })
            }),
            next_in_place: Some(|v| {
                Ok(if range_of(v)?.next_in_place() { v.clone() } else { OpalVal::Nil })
            }),
            count: Some(|v| Ok(range_of(v)?.count())),
            chunked_first: Some(|v| Ok(OpalVal::array_chunk(range_of(v)?.chunked_first()))),
            chunked_next: Some(|v| {
                Ok(match range_of(v)?.chunked_next() {
                    Some(r) => OpalVal::integer_range(r),
                    None => OpalVal::Nil,
                })
            }),
            ..Behaviors::seq_kind()
        }
    }

    fn repeat() -> Behaviors {
        fn repeat_of(v: &OpalVal) -> Result<&Rc<crate::seq::Repeat>> {
            expect_kind!(v, Repeat, "repeat")
        }
        Behaviors {
            seq: Some(|v| Ok(v.clone())),
            fresh_seq: Some(|v| Ok(v.clone())),
            first: Some(|v| Ok(repeat_of(v)?.first().clone())),
            next: Some(|v| {
                Ok(match repeat_of(v)?.next() {
                    Some(r) => OpalVal::Repeat(Rc::new(r)),
                    None => OpalVal::Nil,
                })
            }),
            next_in_place: Some(|v| {
                Ok(if repeat_of(v)?.next_in_place() { v.clone() } else { OpalVal::Nil })
            }),
            count: Some(|v| repeat_of(v)?.count()),
            ..Behaviors::seq_kind()
        }
    }

    fn lazy_seq() -> Behaviors {
        fn force(v: &OpalVal) -> Result<OpalVal> {
            expect_kind!(v, LazySeq, "lazy-seq")?.force()
        }
        Behaviors {
            is_metadatable: true,
            seq: Some(force),
            fresh_seq: Some(force),
            first: Some(|v| crate::ops::seqs::first(&force(v)?)),
            next: Some(|v| crate::ops::seqs::next(&force(v)?)),
            next_in_place: Some(|v| crate::ops::seqs::next(&force(v)?)),
            with_meta: Some(|v, m| v.with_meta(Some(m.clone()))),
            meta: Some(OpalVal::meta),
            ..Behaviors::seq_kind()
        }
    }

    fn chunked_cons() -> Behaviors {
        fn cc_of(v: &OpalVal) -> Result<&Rc<crate::seq::ChunkedCons>> {
            expect_kind!(v, ChunkedCons, "chunked-cons")
        }
        Behaviors {
            is_chunkable: true,
            is_metadatable: true,
            seq: Some(|v| Ok(v.clone())),
            fresh_seq: Some(|v| Ok(v.clone())),
            first: Some(|v| Ok(cc_of(v)?.first().cloned().unwrap_or(OpalVal::Nil))),
            next: Some(|v| cc_of(v)?.next()),
            next_in_place: Some(|v| cc_of(v)?.next()),
            chunked_first: Some(|v| Ok(OpalVal::array_chunk(cc_of(v)?.chunk().clone()))),
            chunked_next: Some(|v| cc_of(v)?.chunked_next()),
            with_meta: Some(|v, m| v.with_meta(Some(m.clone()))),
            meta: Some(OpalVal::meta),
            ..Behaviors::seq_kind()
        }
    }

    fn array_chunk() -> Behaviors {
        fn chunk_of(v: &OpalVal) -> Result<&Rc<crate::seq::ArrayChunk>> {
            expect_kind!(v, ArrayChunk, "array-chunk")
        }
        Behaviors {
            is_chunk_like: true,
            is_countable: true,
            is_indexable: true,
            count: Some(|v| Ok(chunk_of(v)?.len())),
            chunk_next: Some(|v| Ok(OpalVal::array_chunk(chunk_of(v)?.drop_first()?))),
            nth: Some(|v, i| {
                let c = chunk_of(v)?;
                if i < 0 {
                    return Err(Error::out_of_bounds(i, c.len()));
                }
                c.nth(i as usize)
                    .cloned()
                    .ok_or_else(|| Error::out_of_bounds(i, c.len()))
            }),
            nth_default: Some(|v, i, d| {
                let c = chunk_of(v)?;
                if i < 0 {
                    return Ok(d.clone());
                }
                Ok(c.nth(i as usize).cloned().unwrap_or_else(|| d.clone()))
            }),
            ..Behaviors::base()
        }
    }

    fn iterator_seq() -> Behaviors {
        fn it_of(v: &OpalVal) -> Result<&Rc<crate::seq::IteratorSeq>> {
            expect_kind!(v, IteratorSeq, "iterator-seq")
        }
        Behaviors {
            seq: Some(|v| Ok(v.clone())),
            fresh_seq: Some(|v| Ok(v.clone())),
            first: Some(|v| it_of(v)?.first()),
            next: Some(|v| {
                Ok(match it_of(v)?.next() {
                    Some(s) => OpalVal::iterator_seq(s),
                    None => OpalVal::Nil,
                })
            }),
            next_in_place: Some(|v| {
                Ok(if it_of(v)?.next_in_place() { v.clone() } else { OpalVal::Nil })
            }),
            ..Behaviors::seq_kind()
        }
    }

    fn vector_seq() -> Behaviors {
        fn vs_of(v: &OpalVal) -> Result<&Rc<VectorSeq>> {
            expect_kind!(v, VectorSeq, "vector-seq")
        }
        Behaviors {
            seq: Some(|v| Ok(v.clone())),
            fresh_seq: Some(|v| Ok(v.clone())),
            first: Some(|v| Ok(vs_of(v)?.first().cloned().unwrap_or(OpalVal::Nil))),
            next: Some(|v| {
                Ok(match vs_of(v)?.next() {
                    Some(s) => OpalVal::vector_seq(s),
                    None => OpalVal::Nil,
                })
            }),
            next_in_place: Some(|v| {
                Ok(if vs_of(v)?.next_in_place() { v.clone() } else { OpalVal::Nil })
            }),
            count: Some(|v| Ok(vs_of(v)?.count())),
            ..Behaviors::seq_kind()
        }
    }

    fn indexed_seq() -> Behaviors {
        fn is_of(v: &OpalVal) -> Result<&Rc<IndexedSeq>> {
            expect_kind!(v, IndexedSeq, "indexed-seq")
        }
        Behaviors {
            is_indexable: true,
            seq: Some(|v| Ok(v.clone())),
            fresh_seq: Some(|v| Ok(v.clone())),
            first: Some(|v| Ok(is_of(v)?.first().cloned().unwrap_or(OpalVal::Nil))),
            next: Some(|v| {
                Ok(match is_of(v)?.next() {
                    Some(s) => OpalVal::indexed_seq(s),
                    None => OpalVal::Nil,
                })
            }),
            next_in_place: Some(|v| {
                Ok(if is_of(v)?.next_in_place() { v.clone() } else { OpalVal::Nil })
            }),
            count: Some(|v| Ok(is_of(v)?.count())),
            nth: Some(|v, i| {
                let s = is_of(v)?;
                if i < 0 {
                    return Err(Error::out_of_bounds(i, s.count()));
                }
                s.nth(i as usize)
                    .cloned()
                    .ok_or_else(|| Error::out_of_bounds(i, s.count()))
            }),
            nth_default: Some(|v, i, d| {
                let s = is_of(v)?;
                if i < 0 {
                    return Ok(d.clone());
                }
                Ok(s.nth(i as usize).cloned().unwrap_or_else(|| d.clone()))
            }),
            ..Behaviors::seq_kind()
        }
    }

    fn string_seq() -> Behaviors {
        fn ss_of(v: &OpalVal) -> Result<&Rc<StringSeq>> {
            expect_kind!(v, StringSeq, "string-seq")
        }
        Behaviors {
            seq: Some(|v| {
                Ok(if ss_of(v)?.is_empty() { OpalVal::Nil } else { v.clone() })
            }),
            fresh_seq: Some(|v| {
                Ok(if ss_of(v)?.is_empty() { OpalVal::Nil } else { v.clone() })
            }),
            first: Some(|v| Ok(ss_of(v)?.first().map(OpalVal::char).unwrap_or(OpalVal::Nil))),
            next: Some(|v| {
                Ok(match ss_of(v)?.next() {
                    Some(s) => OpalVal::string_seq(s),
                    None => OpalVal::Nil,
                })
            }),
            next_in_place: Some(|v| {
                Ok(if ss_of(v)?.next_in_place() { v.clone() } else { OpalVal::Nil })
            }),
            count: Some(|v| Ok(ss_of(v)?.count())),
            ..Behaviors::seq_kind()
        }
    }

    /// Function kinds: every arity slot forwards to the kind's invoke.
    fn function(call: CallOp, flags: FlagsOp) -> Behaviors {
        let mut b = Behaviors {
            is_callable: true,
            is_named: true,
            name: Some(|v| match v {
                OpalVal::NativeFn(f) => Ok(f.name().to_string()),
                OpalVal::CompiledFn(f) => Ok(f
                    .name()
                    .map(|sym| sym.to_string())
                    .unwrap_or_else(|| "fn".to_string())),
                OpalVal::MultiFn(f) => Ok(f.name().to_string()),
                _ => Err(Error::internal("capability table slot reached with a non-fn")),
            }),
            arity_flags: Some(flags),
            ..Behaviors::base()
        };
        for slot in b.calls.iter_mut() {
            *slot = Some(call);
        }
        b
    }

    fn var() -> Behaviors {
        fn var_of(v: &OpalVal) -> Result<&crate::refs::OpalVar> {
            expect_kind!(v, Var, "var")
        }
        // Calling a var calls its current root binding.
        fn var_call(v: &OpalVal, args: &[OpalVal]) -> Result<OpalVal> {
            let target = var_of(v)?.deref();
            crate::ops::invoke::invoke(&target, args)
        }
        let mut b = Behaviors {
            is_derefable: true,
            is_named: true,
            is_callable: true,
            is_metadatable: true,
            deref: Some(|v| Ok(var_of(v)?.deref())),
            name: Some(|v| Ok(var_of(v)?.name().to_string())),
            namespace: Some(|v| Ok(var_of(v)?.ns().map(str::to_string))),
            with_meta: Some(|v, m| v.with_meta(Some(m.clone()))),
            meta: Some(OpalVal::meta),
            set_meta: Some(|v, m| {
                var_of(v)?.set_meta(if m.is_nil() { None } else { Some(m.clone()) })?;
                Ok(m.clone())
            }),
            arity_flags: Some(|_| ALL_ARITIES | VARIADIC_BIT),
            ..Behaviors::base()
        };
        for slot in b.calls.iter_mut() {
            *slot = Some(var_call);
        }
        b
    }

    fn tagged_literal() -> Behaviors {
        fn tl_of(v: &OpalVal) -> Result<&Rc<crate::refs::TaggedLiteral>> {
            expect_kind!(v, TaggedLiteral, "tagged-literal")
        }
        fn lookup(v: &OpalVal, k: &OpalVal) -> Result<Option<OpalVal>> {
            let tl = tl_of(v)?;
            if let OpalVal::Keyword(kw) = k {
                if kw.namespace().is_none() && kw.name() == "tag" {
                    return Ok(Some(tl.tag.clone()));
                }
                if kw.namespace().is_none() && kw.name() == "form" {
                    return Ok(Some(tl.form.clone()));
                }
            }
            Ok(None)
        }
        Behaviors {
            is_associatively_readable: true,
            get: Some(|v, k| Ok(lookup(v, k)?.unwrap_or(OpalVal::Nil))),
            get_default: Some(|v, k, d| Ok(lookup(v, k)?.unwrap_or_else(|| d.clone()))),
            get_entry: Some(|v, k| {
                Ok(match lookup(v, k)? {
                    Some(val) => OpalVal::vector(vec![k.clone(), val]),
                    None => OpalVal::Nil,
                })
            }),
            contains: Some(|v, k| Ok(lookup(v, k)?.is_some())),
            ..Behaviors::base()
        }
    }
}

// ============================================================================
// Process-wide table cache
// ============================================================================

static TABLES: [OnceLock<Behaviors>; KIND_COUNT] = [const { OnceLock::new() }; KIND_COUNT];

/// The capability table for a kind. Built lazily on first dispatch and
/// cached for the process lifetime; concurrent first dispatches race
/// idempotently.
pub fn kind_behaviors(kind: Kind) -> &'static Behaviors {
    TABLES[kind as usize].get_or_init(|| Behaviors::for_kind(kind))
}

// ============================================================================
// Dynamic path: runtime-supplied capability descriptions
// ============================================================================

/// A capability table built from a runtime description. Operation values
/// are runtime callables invoked with the extended value as their first
/// argument.
#[derive(Debug)]
pub struct DynBehaviors {
    caps: FxHashMap<&'static str, FxHashMap<&'static str, OpalVal>>,
}

fn is_callable_value(v: &OpalVal) -> bool {
    matches!(
        v,
        OpalVal::NativeFn(_) | OpalVal::CompiledFn(_) | OpalVal::MultiFn(_)
    )
}

impl DynBehaviors {
    /// Build from a description map:
    /// `{:seqable {:seq (fn [this] …)} :derefable {:deref (fn [this] …)}}`.
    ///
    /// Validation: capability and operation names must come from the
    /// [`CAPABILITIES`] contract, every operation value must be callable,
    /// every required operation of a declared capability must be present,
    /// and composite capabilities (associative) are derived from their
    /// halves, never declared.
    pub fn from_description(description: &OpalVal) -> Result<DynBehaviors> {
        let entries = crate::ops::equality::map_entries(description).ok_or_else(|| {
            Error::shape(format!(
                "capability description must be a map, got {}",
                description.type_name()
            ))
        })?;
        let mut caps: FxHashMap<&'static str, FxHashMap<&'static str, OpalVal>> =
            FxHashMap::default();
        for (cap_key, ops_val) in entries {
            let cap_name = keyword_name(&cap_key).ok_or_else(|| {
                Error::shape(format!(
                    "capability names must be keywords, got {}",
                    cap_key.type_name()
                ))
            })?;
            if cap_name == "associative" {
                return Err(Error::shape(
                    "associative is derived from its readable and writable halves",
                ));
            }
            let spec = capability_spec(&cap_name)
                .ok_or_else(|| Error::shape(format!("unknown capability :{}", cap_name)))?;
            let op_entries = crate::ops::equality::map_entries(&ops_val).ok_or_else(|| {
                Error::shape(format!(
                    "operations for :{} must be a map, got {}",
                    cap_name,
                    ops_val.type_name()
                ))
            })?;
            let mut ops: FxHashMap<&'static str, OpalVal> = FxHashMap::default();
            for (op_key, op_fn) in op_entries {
                let op_name = keyword_name(&op_key).ok_or_else(|| {
                    Error::shape(format!(
                        "operation names must be keywords, got {}",
                        op_key.type_name()
                    ))
                })?;
                let op_static = spec
                    .required
                    .iter()
                    .chain(spec.optional.iter())
                    .copied()
                    .find(|known| *known == op_name)
                    .ok_or_else(|| {
                        Error::shape(format!(
                            "capability :{} has no operation :{}",
                            cap_name, op_name
                        ))
                    })?;
                if !is_callable_value(&op_fn) {
                    return Err(Error::shape(format!(
                        "operation :{}/:{} must be callable, got {}",
                        cap_name,
                        op_name,
                        op_fn.type_name()
                    )));
                }
                ops.insert(op_static, op_fn);
            }
            for required in spec.required {
                if !ops.contains_key(required) {
                    return Err(Error::shape(format!(
                        "capability :{} requires operation :{}",
                        cap_name, required
                    )));
                }
            }
            caps.insert(spec.name, ops);
        }
        Ok(DynBehaviors { caps })
    }

    /// Does the description declare this capability? Composites hold
    /// when all their halves do.
    pub fn has(&self, capability: &str) -> bool {
        match capability {
            "associative" => {
                self.caps.contains_key("associatively_readable")
                    && self.caps.contains_key("associatively_writable")
            }
            _ => self.caps.contains_key(capability),
        }
    }

    pub fn has_op(&self, capability: &str, op: &str) -> bool {
        self.caps
            .get(capability)
            .is_some_and(|ops| ops.contains_key(op))
    }

    pub fn op(&self, capability: &str, op: &str) -> Option<&OpalVal> {
        self.caps.get(capability)?.get(op)
    }

    /// Invoke a described operation; missing operations surface the
    /// capability error against `this`.
    pub fn call(
        &self,
        capability: &'static str,
        op: &str,
        this: &OpalVal,
        args: &[OpalVal],
    ) -> Result<OpalVal> {
        let Some(f) = self.op(capability, op) else {
            return Err(Error::not_capable(capability_error_name(capability), this));
        };
        let mut full_args = Vec::with_capacity(args.len() + 1);
        full_args.push(this.clone());
        full_args.extend_from_slice(args);
        crate::ops::invoke::invoke(f, &full_args)
    }
}

fn keyword_name(v: &OpalVal) -> Option<String> {
    match v {
        OpalVal::Keyword(kw) if kw.namespace().is_none() => Some(kw.name().to_string()),
        _ => None,
    }
}

/// Human-facing capability names for errors.
fn capability_error_name(capability: &str) -> &'static str {
    match capability {
        "seqable" => "seqable",
        "sequenceable" => "seqable",
        "sequenceable_in_place" => "seqable",
        "collection_like" => "collection-like",
        "associatively_readable" => "associatively readable",
        "associatively_writable" => "associatively writable",
        "associatively_writable_in_place" => "associatively writable in place",
        "countable" => "countable",
        "transientable" => "transientable",
        "persistentable" => "persistentable",
        "chunk_like" => "chunk-like",
        "chunkable" => "chunkable",
        "metadatable" => "metadatable",
        "comparable" => "comparable",
        "callable" => "callable",
        "nameable" => "nameable",
        "derefable" => "derefable",
        "indexable" => "indexable",
        "stackable" => "stackable",
        "number_like" => "number-like",
        "conjable" => "conjable",
        "conjable_in_place" => "conjable in place",
        _ => "object-like",
    }
}

/// A host-defined value: an opaque payload plus its runtime-supplied
/// capability table.
pub struct OpalExtended {
    payload: OpalVal,
    behaviors: Rc<DynBehaviors>,
}

impl OpalExtended {
    pub fn new(payload: OpalVal, behaviors: Rc<DynBehaviors>) -> Self {
        OpalExtended { payload, behaviors }
    }

    /// Build payload and table in one step from a description map.
    pub fn from_description(payload: OpalVal, description: &OpalVal) -> Result<Self> {
        Ok(OpalExtended {
            payload,
            behaviors: Rc::new(DynBehaviors::from_description(description)?),
        })
    }

    pub fn payload(&self) -> &OpalVal {
        &self.payload
    }

    pub fn behaviors(&self) -> &DynBehaviors {
        &self.behaviors
    }

    pub fn to_hash_op(&self, this: &OpalVal) -> Result<u64> {
        match self.behaviors.call("object_like", "to_hash", this, &[])? {
            OpalVal::Int(n) => Ok(n as u64),
            other => Err(Error::shape(format!(
                "to_hash must return an integer, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn to_code_string_op(&self, this: &OpalVal) -> Option<Result<String>> {
        if !self.behaviors.has_op("object_like", "to_code_string") {
            return None;
        }
        Some(
            self.behaviors
                .call("object_like", "to_code_string", this, &[])
                .map(|v| crate::ops::print::to_display_string(&v)),
        )
    }

    pub fn equal_op(&self, this: &OpalVal, other: &OpalVal) -> Result<bool> {
        Ok(self
            .behaviors
            .call("object_like", "equal", this, &[other.clone()])?
            .is_truthy())
    }

    pub fn compare_op(&self, this: &OpalVal, other: &OpalVal) -> Result<Ordering> {
        match self
            .behaviors
            .call("comparable", "compare", this, &[other.clone()])?
        {
            OpalVal::Int(n) => Ok(n.cmp(&0)),
            other => Err(Error::shape(format!(
                "compare must return an integer, got {}",
                other.type_name()
            ))),
        }
    }
}

// ============================================================================
// Caps facade
// ============================================================================

/// Uniform dispatch facade: routes each generic operation through the
/// compiled table for compiled kinds, or through the value's own
/// description table for host-defined kinds. Both tables obey the same
/// [`CAPABILITIES`] contract.
pub struct Caps<'a> {
    value: &'a OpalVal,
    table: &'static Behaviors,
    dynamic: Option<&'a DynBehaviors>,
}

/// Resolve the capability table for a value.
pub fn caps(v: &OpalVal) -> Caps<'_> {
    let dynamic = match v {
        OpalVal::Extended(e) => Some(e.behaviors()),
        _ => None,
    };
    Caps {
        value: v,
        table: kind_behaviors(v.kind()),
        dynamic,
    }
}

macro_rules! flag_method {
    ($method:ident, $field:ident, $cap:literal) => {
        pub fn $method(&self) -> bool {
            match self.dynamic {
                Some(d) => d.has($cap),
                None => self.table.$field,
            }
        }
    };
}

macro_rules! op1_method {
    ($method:ident, $slot:ident, $cap:literal, $op:literal) => {
        pub fn $method(&self) -> Result<OpalVal> {
            if let Some(d) = self.dynamic {
                return d.call($cap, $op, self.value, &[]);
            }
            match self.table.$slot {
                Some(f) => f(self.value),
                None => Err(Error::not_capable(
                    capability_error_name($cap),
                    self.value,
                )),
            }
        }
    };
}

macro_rules! op2_method {
    ($method:ident, $slot:ident, $cap:literal, $op:literal) => {
        pub fn $method(&self, a: &OpalVal) -> Result<OpalVal> {
            if let Some(d) = self.dynamic {
                return d.call($cap, $op, self.value, &[a.clone()]);
            }
            match self.table.$slot {
                Some(f) => f(self.value, a),
                None => Err(Error::not_capable(
                    capability_error_name($cap),
                    self.value,
                )),
            }
        }
    };
}

impl<'a> Caps<'a> {
    flag_method!(is_seqable, is_seqable, "seqable");
    flag_method!(is_sequential, is_sequential, "sequential");
    flag_method!(is_sequenceable, is_sequenceable, "sequenceable");
    flag_method!(
        is_sequenceable_in_place,
        is_sequenceable_in_place,
        "sequenceable_in_place"
    );
    flag_method!(is_collection, is_collection, "collection_like");
    flag_method!(is_associative, is_associative, "associative");
    flag_method!(
        is_associatively_readable,
        is_associatively_readable,
        "associatively_readable"
    );
    flag_method!(
        is_associatively_writable,
        is_associatively_writable,
        "associatively_writable"
    );
    flag_method!(
        is_associatively_writable_in_place,
        is_associatively_writable_in_place,
        "associatively_writable_in_place"
    );
    flag_method!(is_countable, is_countable, "countable");
    flag_method!(is_transientable, is_transientable, "transientable");
    flag_method!(is_persistentable, is_persistentable, "persistentable");
    flag_method!(is_chunk_like, is_chunk_like, "chunk_like");
    flag_method!(is_chunkable, is_chunkable, "chunkable");
    flag_method!(is_metadatable, is_metadatable, "metadatable");
    flag_method!(is_comparable, is_comparable, "comparable");
    flag_method!(is_callable, is_callable, "callable");
    flag_method!(is_named, is_named, "nameable");
    flag_method!(is_derefable, is_derefable, "derefable");
    flag_method!(is_indexable, is_indexable, "indexable");
    flag_method!(is_map_like, is_map, "map_like");
    flag_method!(is_set_like, is_set, "set_like");
    flag_method!(is_stackable, is_stackable, "stackable");
    flag_method!(is_number_like, is_number_like, "number_like");
    flag_method!(is_conjable, is_conjable, "conjable");
    flag_method!(is_conjable_in_place, is_conjable_in_place, "conjable_in_place");

    op1_method!(seq, seq, "seqable", "seq");
    op1_method!(empty, empty, "collection_like", "empty");
    op1_method!(first, first, "sequenceable", "first");
    op1_method!(next, next, "sequenceable", "next");
    op1_method!(
        next_in_place,
        next_in_place,
        "sequenceable_in_place",
        "next_in_place"
    );
    op1_method!(to_transient, to_transient, "transientable", "to_transient");
    op1_method!(to_persistent, to_persistent, "persistentable", "to_persistent");
    op1_method!(chunk_next, chunk_next, "chunk_like", "chunk_next");
    op1_method!(chunked_first, chunked_first, "chunkable", "chunked_first");
    op1_method!(chunked_next, chunked_next, "chunkable", "chunked_next");
    op1_method!(deref, deref, "derefable", "deref");
    op1_method!(peek, peek, "stackable", "peek");
    op1_method!(pop, pop, "stackable", "pop");

    op2_method!(get_entry, get_entry, "associatively_readable", "get_entry");
    op2_method!(dissoc, dissoc, "associatively_writable", "dissoc");
    op2_method!(
        dissoc_in_place,
        dissoc_in_place,
        "associatively_writable_in_place",
        "dissoc_in_place"
    );
    op2_method!(conj, conj, "conjable", "conj");
    op2_method!(
        conj_in_place,
        conj_in_place,
        "conjable_in_place",
        "conj_in_place"
    );
    op2_method!(with_meta, with_meta, "metadatable", "with_meta");
    op2_method!(set_meta, set_meta, "metadatable", "set_meta");

    /// `fresh_seq` falls back to `seq` when a description omits it.
    pub fn fresh_seq(&self) -> Result<OpalVal> {
        if let Some(d) = self.dynamic {
            if d.has_op("seqable", "fresh_seq") {
                return d.call("seqable", "fresh_seq", self.value, &[]);
            }
            return d.call("seqable", "seq", self.value, &[]);
        }
        match self.table.fresh_seq.or(self.table.seq) {
            Some(f) => f(self.value),
            None => Err(Error::not_capable("seqable", self.value)),
        }
    }

    pub fn get(&self, key: &OpalVal) -> Result<OpalVal> {
        if let Some(d) = self.dynamic {
            return d.call("associatively_readable", "get", self.value, &[key.clone()]);
        }
        match self.table.get {
            Some(f) => f(self.value, key),
            None => Err(Error::not_capable("associatively readable", self.value)),
        }
    }

    /// Has a `get` operation at all (maps, sets, vectors, transients)?
    pub fn has_get(&self) -> bool {
        match self.dynamic {
            Some(d) => d.has_op("associatively_readable", "get"),
            None => self.table.get.is_some(),
        }
    }

    /// `get_default` falls back to `get` + nil check when absent.
    pub fn get_default(&self, key: &OpalVal, fallback: &OpalVal) -> Result<OpalVal> {
        if let Some(d) = self.dynamic {
            if d.has_op("associatively_readable", "get_default") {
                return d.call(
                    "associatively_readable",
                    "get_default",
                    self.value,
                    &[key.clone(), fallback.clone()],
                );
            }
            let found = self.get(key)?;
            return Ok(if found.is_nil() { fallback.clone() } else { found });
        }
        match self.table.get_default {
            Some(f) => f(self.value, key, fallback),
            None => {
                let found = self.get(key)?;
                Ok(if found.is_nil() { fallback.clone() } else { found })
            }
        }
    }

    pub fn contains(&self, key: &OpalVal) -> Result<bool> {
        if let Some(d) = self.dynamic {
            if d.has_op("associatively_readable", "contains") {
                return Ok(d
                    .call(
                        "associatively_readable",
                        "contains",
                        self.value,
                        &[key.clone()],
                    )?
                    .is_truthy());
            }
            return Ok(!self.get_entry(key)?.is_nil());
        }
        match self.table.contains {
            Some(f) => f(self.value, key),
            None => Err(Error::not_capable("associatively readable", self.value)),
        }
    }

    pub fn assoc(&self, key: &OpalVal, value: &OpalVal) -> Result<OpalVal> {
        if let Some(d) = self.dynamic {
            return d.call(
                "associatively_writable",
                "assoc",
                self.value,
                &[key.clone(), value.clone()],
            );
        }
        match self.table.assoc {
            Some(f) => f(self.value, key, value),
            None => Err(Error::not_capable("associatively writable", self.value)),
        }
    }

    pub fn assoc_in_place(&self, key: &OpalVal, value: &OpalVal) -> Result<OpalVal> {
        if let Some(d) = self.dynamic {
            return d.call(
                "associatively_writable_in_place",
                "assoc_in_place",
                self.value,
                &[key.clone(), value.clone()],
            );
        }
        match self.table.assoc_in_place {
            Some(f) => f(self.value, key, value),
            None => Err(Error::not_capable(
                "associatively writable in place",
                self.value,
            )),
        }
    }

    pub fn count(&self) -> Result<usize> {
        if let Some(d) = self.dynamic {
            return match d.call("countable", "count", self.value, &[])? {
                OpalVal::Int(n) if n >= 0 => Ok(n as usize),
                other => Err(Error::shape(format!(
                    "count must return a non-negative integer, got {}",
                    crate::ops::print::to_code_string(&other)
                ))),
            };
        }
        match self.table.count {
            Some(f) => f(self.value),
            None => Err(Error::not_capable("countable", self.value)),
        }
    }

    pub fn compare(&self, other: &OpalVal) -> Result<Ordering> {
        if let Some(d) = self.dynamic {
            return match d.call("comparable", "compare", self.value, &[other.clone()])? {
                OpalVal::Int(n) => Ok(n.cmp(&0)),
                bad => Err(Error::shape(format!(
                    "compare must return an integer, got {}",
                    bad.type_name()
                ))),
            };
        }
        match self.table.compare {
            Some(f) => f(self.value, other),
            None => Err(Error::not_capable("comparable", self.value)),
        }
    }

    pub fn meta(&self) -> Result<Option<OpalVal>> {
        if let Some(d) = self.dynamic {
            if d.has_op("metadatable", "get_meta") {
                let m = d.call("metadatable", "get_meta", self.value, &[])?;
                return Ok(if m.is_nil() { None } else { Some(m) });
            }
            return Err(Error::not_capable("metadatable", self.value));
        }
        match self.table.meta {
            Some(f) => Ok(f(self.value)),
            None => Err(Error::not_capable("metadatable", self.value)),
        }
    }

    pub fn name(&self) -> Result<String> {
        if let Some(d) = self.dynamic {
            return Ok(crate::ops::print::to_display_string(&d.call(
                "nameable",
                "name",
                self.value,
                &[],
            )?));
        }
        match self.table.name {
            Some(f) => f(self.value),
            None => Err(Error::not_capable("nameable", self.value)),
        }
    }

    pub fn namespace(&self) -> Result<Option<String>> {
        if let Some(d) = self.dynamic {
            if d.has_op("nameable", "namespace") {
                let ns = d.call("nameable", "namespace", self.value, &[])?;
                return Ok(if ns.is_nil() {
                    None
                } else {
                    Some(crate::ops::print::to_display_string(&ns))
                });
            }
            return Ok(None);
        }
        match self.table.namespace {
            Some(f) => f(self.value),
            None => Err(Error::not_capable("nameable", self.value)),
        }
    }

    pub fn nth(&self, i: i64) -> Result<OpalVal> {
        if let Some(d) = self.dynamic {
            return d.call("indexable", "nth", self.value, &[OpalVal::int(i)]);
        }
        match self.table.nth {
            Some(f) => f(self.value, i),
            None => Err(Error::not_capable("indexable", self.value)),
        }
    }

    pub fn nth_default(&self, i: i64, fallback: &OpalVal) -> Result<OpalVal> {
        if let Some(d) = self.dynamic {
            if d.has_op("indexable", "nth_default") {
                return d.call(
                    "indexable",
                    "nth_default",
                    self.value,
                    &[OpalVal::int(i), fallback.clone()],
                );
            }
            return match self.nth(i) {
                Ok(v) => Ok(v),
                Err(Error::OutOfBounds { .. }) => Ok(fallback.clone()),
                Err(e) => Err(e),
            };
        }
        match self.table.nth_default {
            Some(f) => f(self.value, i, fallback),
            None => match self.nth(i) {
                Ok(v) => Ok(v),
                Err(Error::OutOfBounds { .. }) => Ok(fallback.clone()),
                Err(e) => Err(e),
            },
        }
    }

    pub fn to_integer(&self) -> Result<i64> {
        if let Some(d) = self.dynamic {
            return match d.call("number_like", "to_integer", self.value, &[])? {
                OpalVal::Int(n) => Ok(n),
                bad => Err(Error::shape(format!(
                    "to_integer must return an integer, got {}",
                    bad.type_name()
                ))),
            };
        }
        match self.table.to_integer {
            Some(f) => f(self.value),
            None => Err(Error::not_capable("number-like", self.value)),
        }
    }

    pub fn to_real(&self) -> Result<f64> {
        if let Some(d) = self.dynamic {
            return match d.call("number_like", "to_real", self.value, &[])? {
                OpalVal::Float(n) => Ok(n),
                OpalVal::Int(n) => Ok(n as f64),
                bad => Err(Error::shape(format!(
                    "to_real must return a number, got {}",
                    bad.type_name()
                ))),
            };
        }
        match self.table.to_real {
            Some(f) => f(self.value),
            None => Err(Error::not_capable("number-like", self.value)),
        }
    }

    /// Arity-dispatched invocation through the call slots.
    pub fn call(&self, args: &[OpalVal]) -> Result<OpalVal> {
        if args.len() > MAX_ARITY {
            return Err(Error::arity(
                crate::ops::print::to_code_string(self.value),
                args.len(),
            ));
        }
        if let Some(d) = self.dynamic {
            let op: &'static str = CALL_OPS[args.len()];
            if d.has_op("callable", op) {
                return d.call("callable", op, self.value, args);
            }
            return Err(Error::not_capable("callable", self.value));
        }
        match self.table.calls[args.len()] {
            Some(f) => f(self.value, args),
            None => {
                // Some kinds (keywords, maps) bind only particular
                // arities; distinguish wrong-arity from not-callable.
                if self.table.calls.iter().any(Option::is_some) {
                    Err(Error::arity(
                        crate::ops::print::to_code_string(self.value),
                        args.len(),
                    ))
                } else {
                    Err(Error::not_capable("callable", self.value))
                }
            }
        }
    }

    pub fn arity_flags(&self) -> Result<u32> {
        if let Some(d) = self.dynamic {
            if d.has_op("callable", "get_arity_flags") {
                return match d.call("callable", "get_arity_flags", self.value, &[])? {
                    OpalVal::Int(n) => Ok(n as u32),
                    bad => Err(Error::shape(format!(
                        "get_arity_flags must return an integer, got {}",
                        bad.type_name()
                    ))),
                };
            }
            // Derive from the declared call slots.
            let mut flags = 0u32;
            for (i, op) in CALL_OPS.iter().enumerate() {
                if d.has_op("callable", op) {
                    flags |= 1 << i;
                }
            }
            return Ok(flags);
        }
        match self.table.arity_flags {
            Some(f) => Ok(f(self.value)),
            None => Err(Error::not_capable("callable", self.value)),
        }
    }
}

const CALL_OPS: [&str; MAX_ARITY + 1] = [
    "call0", "call1", "call2", "call3", "call4", "call5", "call6", "call7", "call8", "call9",
    "call10",
];

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_cached_per_kind() {
        let a = kind_behaviors(Kind::Vector);
        let b = kind_behaviors(Kind::Vector);
        assert!(std::ptr::eq(a, b));
        assert!(a.is_seqable);
        assert!(a.is_associative);
        assert!(!kind_behaviors(Kind::Int).is_seqable);
    }

    #[test]
    fn test_capability_contract_lookup() {
        let spec = capability_spec("seqable").unwrap();
        assert_eq!(spec.required, &["seq"]);
        assert!(capability_spec("no-such-capability").is_none());
    }

    #[test]
    fn test_missing_capability_named_in_error() {
        let err = caps(&OpalVal::int(1)).seq().unwrap_err();
        match err {
            Error::NotCapable { capability, kind, .. } => {
                assert_eq!(capability, "seqable");
                assert_eq!(kind, "int");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_dyn_description_requires_callable_ops() {
        let desc = OpalVal::array_map_from_flat(&[
            OpalVal::keyword_str("derefable"),
            OpalVal::array_map_from_flat(&[
                OpalVal::keyword_str("deref"),
                OpalVal::int(42),
            ])
            .unwrap(),
        ])
        .unwrap();
        let err = DynBehaviors::from_description(&desc).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn test_dyn_description_requires_required_ops() {
        let desc = OpalVal::array_map_from_flat(&[
            OpalVal::keyword_str("seqable"),
            OpalVal::array_map_from_flat(&[]).unwrap(),
        ])
        .unwrap();
        let err = DynBehaviors::from_description(&desc).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn test_dyn_composite_derived_not_declared() {
        let read_ops = OpalVal::array_map_from_flat(&[
            OpalVal::keyword_str("get"),
            OpalVal::native_fn("get", Rc::new(|_| Ok(OpalVal::Nil))),
        ])
        .unwrap();
        let write_ops = OpalVal::array_map_from_flat(&[
            OpalVal::keyword_str("assoc"),
            OpalVal::native_fn("assoc", Rc::new(|args| Ok(args[0].clone()))),
            OpalVal::keyword_str("dissoc"),
            OpalVal::native_fn("dissoc", Rc::new(|args| Ok(args[0].clone()))),
        ])
        .unwrap();
        let desc = OpalVal::array_map_from_flat(&[
            OpalVal::keyword_str("associatively_readable"),
            read_ops.clone(),
            OpalVal::keyword_str("associatively_writable"),
            write_ops,
        ])
        .unwrap();
        let dyn_b = DynBehaviors::from_description(&desc).unwrap();
        assert!(dyn_b.has("associative"));

        let half = OpalVal::array_map_from_flat(&[
            OpalVal::keyword_str("associatively_readable"),
            read_ops,
        ])
        .unwrap();
        let dyn_half = DynBehaviors::from_description(&half).unwrap();
        assert!(!dyn_half.has("associative"));
    }
}
