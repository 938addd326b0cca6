// opal-core - Object and collection runtime for the Opal programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # opal-core
//!
//! The object and collection runtime underlying Opal: a uniform tagged
//! value type ([`OpalVal`]), per-kind capability tables
//! ([`behaviors::Behaviors`]), a persistent collection family with
//! transient counterparts, the first/next sequence protocol with lazy
//! and chunked adapters, and the generic operations every other
//! subsystem is written against.
//!
//! Values are immutable after publication and cheap to clone; update
//! operations return new values sharing untouched structure. All
//! failures are recoverable [`Error`] values.

pub mod behaviors;
pub mod callable;
pub mod collections;
pub mod error;
pub mod hashing;
pub mod intern;
pub mod keyword;
pub mod ops;
pub mod refs;
pub mod seq;
pub mod symbol;
pub mod value;

pub use behaviors::{Behaviors, CAPABILITIES, Caps, DynBehaviors, OpalExtended, caps,
    kind_behaviors};
pub use callable::{OpalCompiledFn, OpalMultiFn, OpalNativeFn};
pub use collections::{
    PersistentArrayMap, PersistentHashMap, PersistentHashSet, PersistentList,
    PersistentSortedMap, PersistentSortedSet, PersistentVector, TransientHashMap,
    TransientHashSet, TransientSortedMap, TransientSortedSet, TransientVector,
};
pub use error::{Error, Result};
pub use keyword::Keyword;
pub use refs::{OpalAtom, OpalDelay, OpalNamespace, OpalVar, OpalVolatile, TaggedLiteral};
pub use seq::{ArrayChunk, ChunkedCons, Cons, IntegerRange, OpalLazySeq, Range, Repeat};
pub use symbol::Symbol;
pub use value::{Kind, KIND_COUNT, OpalVal};
