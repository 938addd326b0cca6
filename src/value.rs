// opal-core - Core value type for the Opal runtime
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! `OpalVal` is the central enum representing all Opal values.
//!
//! Every value the runtime touches is one member of this closed variant.
//! Values are immutable (reference kinds have interior mutability by
//! definition) and use reference counting for cheap sharing; cloning a
//! value never copies collection structure.
//!
//! The [`Kind`] discriminant identifies the concrete representation in
//! O(1) and never changes over a value's lifetime. Adding a kind means
//! adding an enum member here and an arm to every exhaustive match; the
//! compiler surfaces each missing arm, which is the accepted extension
//! cost of a closed variant.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::behaviors::OpalExtended;
use crate::callable::{NativeFnImpl, OpalCompiledFn, OpalMultiFn, OpalNativeFn};
use crate::collections::{
    PersistentArrayMap, PersistentHashMap, PersistentHashSet, PersistentList,
    PersistentSortedMap, PersistentSortedSet, PersistentVector, TransientHashMap,
    TransientHashSet, TransientSortedMap, TransientSortedSet, TransientVector,
};
use crate::error::{Error, Result};
use crate::keyword::Keyword;
use crate::refs::{
    OpalAtom, OpalDelay, OpalNamespace, OpalVar, OpalVolatile, TaggedLiteral, VarThreadBinding,
    VarUnboundRoot,
};
use crate::seq::{
    ArrayChunk, ChunkedCons, Cons, IndexedSeq, IntegerRange, IteratorSeq, OpalChunkBuffer,
    OpalLazySeq, Range, Repeat, StringSeq, VectorSeq,
};
use crate::symbol::Symbol;

/// A transient collection as held by the runtime: the raw transient is
/// taken out when frozen, after which the cell is stale and any mutation
/// through it is a checked error.
pub type TransientCell<T> = Rc<RefCell<Option<T>>>;

pub(crate) fn transient_cell<T>(t: T) -> TransientCell<T> {
    Rc::new(RefCell::new(Some(t)))
}

/// The core value type for the Opal runtime.
#[derive(Clone)]
pub enum OpalVal {
    /// The nil value, representing nothing/absence
    Nil,
    /// Boolean true or false
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point number
    Float(f64),
    /// Rational number (numerator/denominator, normalized at creation)
    Ratio(i64, i64),
    /// Unicode character
    Char(char),
    /// Immutable string
    String(Rc<str>),
    /// Symbol (optionally namespaced identifier, with optional metadata)
    Symbol(Symbol, Option<Rc<OpalVal>>),
    /// Keyword (optionally namespaced, self-evaluating)
    Keyword(Keyword),
    /// Persistent linked list
    List(Rc<PersistentList>),
    /// Persistent bit-partitioned trie vector
    Vector(Rc<PersistentVector>),
    /// Small insertion-ordered persistent map
    ArrayMap(Rc<PersistentArrayMap>),
    /// Persistent hash-array-mapped trie map
    HashMap(Rc<PersistentHashMap>),
    /// Persistent sorted map
    SortedMap(Rc<PersistentSortedMap>),
    /// Persistent hash set
    HashSet(Rc<PersistentHashSet>),
    /// Persistent sorted set
    SortedSet(Rc<PersistentSortedSet>),
    /// Transient counterpart of the vector
    TransientVector(TransientCell<TransientVector>),
    /// Transient counterpart of the hash map
    TransientHashMap(TransientCell<TransientHashMap>),
    /// Transient counterpart of the hash set
    TransientHashSet(TransientCell<TransientHashSet>),
    /// Transient counterpart of the sorted map
    TransientSortedMap(TransientCell<TransientSortedMap>),
    /// Transient counterpart of the sorted set
    TransientSortedSet(TransientCell<TransientSortedSet>),
    /// Eager cons cell in front of any seqable tail
    Cons(Rc<Cons>),
    /// Floating-point range sequence
    Range(Rc<Range>),
    /// Integer range sequence (chunkable fast path)
    IntegerRange(Rc<IntegerRange>),
    /// One value repeated, bounded or without bound
    Repeat(Rc<Repeat>),
    /// Lazy sequence (deferred, memoizing value or failure)
    LazySeq(OpalLazySeq),
    /// Realized chunk in front of a lazy tail
    ChunkedCons(Rc<ChunkedCons>),
    /// Push buffer finalized into a chunk
    ChunkBuffer(Rc<OpalChunkBuffer>),
    /// Realized fixed-size batch with O(1) access
    ArrayChunk(Rc<ArrayChunk>),
    /// Memoizing sequence over a native producer
    IteratorSeq(Rc<IteratorSeq>),
    /// Positional view into a persistent vector
    VectorSeq(Rc<VectorSeq>),
    /// Positional view into an owned element snapshot
    IndexedSeq(Rc<IndexedSeq>),
    /// Positional view into a string's characters
    StringSeq(Rc<StringSeq>),
    /// Native (Rust) function
    NativeFn(OpalNativeFn),
    /// Compiled function: per-arity entry points from the compilation
    /// backend
    CompiledFn(Rc<OpalCompiledFn>),
    /// Multi-method function
    MultiFn(Rc<OpalMultiFn>),
    /// Namespace
    Namespace(Rc<OpalNamespace>),
    /// Var (named mutable root binding)
    Var(OpalVar),
    /// Thread-binding sentinel for dynamic vars
    VarThreadBinding(Rc<VarThreadBinding>),
    /// Unbound-root sentinel for vars without a root binding
    VarUnboundRoot(Rc<VarUnboundRoot>),
    /// Atom (synchronous mutable reference)
    Atom(OpalAtom),
    /// Volatile box (uncoordinated mutable reference)
    Volatile(OpalVolatile),
    /// Delay (deferred computation with memoized value or failure)
    Delay(OpalDelay),
    /// Reduced wrapper signalling early reduction termination
    Reduced(Rc<OpalVal>),
    /// Reader tagged literal
    TaggedLiteral(Rc<TaggedLiteral>),
    /// Host-defined kind: boxed payload plus a runtime-supplied
    /// capability table
    Extended(Rc<OpalExtended>),
}

// ============================================================================
// Kind
// ============================================================================

/// The discriminant of the closed object variant. Stable `u8` tags;
/// extending the set requires a rebuild.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Nil,
    Bool,
    Int,
    Float,
    Ratio,
    Char,
    String,
    Symbol,
    Keyword,
    List,
    Vector,
    ArrayMap,
    HashMap,
    SortedMap,
    HashSet,
    SortedSet,
    TransientVector,
    TransientHashMap,
    TransientHashSet,
    TransientSortedMap,
    TransientSortedSet,
    Cons,
    Range,
    IntegerRange,
    Repeat,
    LazySeq,
    ChunkedCons,
    ChunkBuffer,
    ArrayChunk,
    IteratorSeq,
    VectorSeq,
    IndexedSeq,
    StringSeq,
    NativeFn,
    CompiledFn,
    MultiFn,
    Namespace,
    Var,
    VarThreadBinding,
    VarUnboundRoot,
    Atom,
    Volatile,
    Delay,
    Reduced,
    TaggedLiteral,
    Extended,
}

/// Number of kinds in the closed variant.
pub const KIND_COUNT: usize = 46;

impl OpalVal {
    /// The discriminant for this value. O(1), immutable for the value's
    /// lifetime.
    pub fn kind(&self) -> Kind {
        match self {
            OpalVal::Nil => Kind::Nil,
            OpalVal::Bool(_) => Kind::Bool,
            OpalVal::Int(_) => Kind::Int,
            OpalVal::Float(_) => Kind::Float,
            OpalVal::Ratio(_, _) => Kind::Ratio,
            OpalVal::Char(_) => Kind::Char,
            OpalVal::String(_) => Kind::String,
            OpalVal::Symbol(_, _) => Kind::Symbol,
            OpalVal::Keyword(_) => Kind::Keyword,
            OpalVal::List(_) => Kind::List,
            OpalVal::Vector(_) => Kind::Vector,
            OpalVal::ArrayMap(_) => Kind::ArrayMap,
            OpalVal::HashMap(_) => Kind::HashMap,
            OpalVal::SortedMap(_) => Kind::SortedMap,
            OpalVal::HashSet(_) => Kind::HashSet,
            OpalVal::SortedSet(_) => Kind::SortedSet,
            OpalVal::TransientVector(_) => Kind::TransientVector,
            OpalVal::TransientHashMap(_) => Kind::TransientHashMap,
            OpalVal::TransientHashSet(_) => Kind::TransientHashSet,
            OpalVal::TransientSortedMap(_) => Kind::TransientSortedMap,
            OpalVal::TransientSortedSet(_) => Kind::TransientSortedSet,
            OpalVal::Cons(_) => Kind::Cons,
            OpalVal::Range(_) => Kind::Range,
            OpalVal::IntegerRange(_) => Kind::IntegerRange,
            OpalVal::Repeat(_) => Kind::Repeat,
            OpalVal::LazySeq(_) => Kind::LazySeq,
            OpalVal::ChunkedCons(_) => Kind::ChunkedCons,
            OpalVal::ChunkBuffer(_) => Kind::ChunkBuffer,
            OpalVal::ArrayChunk(_) => Kind::ArrayChunk,
            OpalVal::IteratorSeq(_) => Kind::IteratorSeq,
            OpalVal::VectorSeq(_) => Kind::VectorSeq,
            OpalVal::IndexedSeq(_) => Kind::IndexedSeq,
            OpalVal::StringSeq(_) => Kind::StringSeq,
            OpalVal::NativeFn(_) => Kind::NativeFn,
            OpalVal::CompiledFn(_) => Kind::CompiledFn,
            OpalVal::MultiFn(_) => Kind::MultiFn,
            OpalVal::Namespace(_) => Kind::Namespace,
            OpalVal::Var(_) => Kind::Var,
            OpalVal::VarThreadBinding(_) => Kind::VarThreadBinding,
            OpalVal::VarUnboundRoot(_) => Kind::VarUnboundRoot,
            OpalVal::Atom(_) => Kind::Atom,
            OpalVal::Volatile(_) => Kind::Volatile,
            OpalVal::Delay(_) => Kind::Delay,
            OpalVal::Reduced(_) => Kind::Reduced,
            OpalVal::TaggedLiteral(_) => Kind::TaggedLiteral,
            OpalVal::Extended(_) => Kind::Extended,
        }
    }

    /// The kind name as a string, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            Kind::Nil => "nil",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Ratio => "ratio",
            Kind::Char => "char",
            Kind::String => "string",
            Kind::Symbol => "symbol",
            Kind::Keyword => "keyword",
            Kind::List => "list",
            Kind::Vector => "vector",
            Kind::ArrayMap => "array-map",
            Kind::HashMap => "hash-map",
            Kind::SortedMap => "sorted-map",
            Kind::HashSet => "hash-set",
            Kind::SortedSet => "sorted-set",
            Kind::TransientVector => "transient-vector",
            Kind::TransientHashMap => "transient-hash-map",
            Kind::TransientHashSet => "transient-hash-set",
            Kind::TransientSortedMap => "transient-sorted-map",
            Kind::TransientSortedSet => "transient-sorted-set",
            Kind::Cons => "cons",
            Kind::Range => "range",
            Kind::IntegerRange => "integer-range",
            Kind::Repeat => "repeat",
            Kind::LazySeq => "lazy-seq",
            Kind::ChunkedCons => "chunked-cons",
            Kind::ChunkBuffer => "chunk-buffer",
            Kind::ArrayChunk => "array-chunk",
            Kind::IteratorSeq => "iterator-seq",
            Kind::VectorSeq => "vector-seq",
            Kind::IndexedSeq => "indexed-seq",
            Kind::StringSeq => "string-seq",
            Kind::NativeFn => "native-fn",
            Kind::CompiledFn => "fn",
            Kind::MultiFn => "multi-fn",
            Kind::Namespace => "namespace",
            Kind::Var => "var",
            Kind::VarThreadBinding => "var-thread-binding",
            Kind::VarUnboundRoot => "var-unbound-root",
            Kind::Atom => "atom",
            Kind::Volatile => "volatile",
            Kind::Delay => "delay",
            Kind::Reduced => "reduced",
            Kind::TaggedLiteral => "tagged-literal",
            Kind::Extended => "extended",
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

/// Greatest common divisor using the Euclidean algorithm.
fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

impl OpalVal {
    pub fn nil() -> Self {
        OpalVal::Nil
    }

    pub fn bool(b: bool) -> Self {
        OpalVal::Bool(b)
    }

    pub fn int(n: i64) -> Self {
        OpalVal::Int(n)
    }

    pub fn float(n: f64) -> Self {
        OpalVal::Float(n)
    }

    /// Create a ratio, reducing to lowest terms; a denominator of one
    /// collapses to an integer and a zero denominator is a shape error.
    pub fn ratio(num: i64, den: i64) -> Result<Self> {
        if den == 0 {
            return Err(Error::shape("ratio with zero denominator"));
        }
        let g = gcd(num.abs(), den.abs()).max(1);
        let (num, den) = if den < 0 {
            (-num / g, -den / g)
        } else {
            (num / g, den / g)
        };
        if den == 1 {
            Ok(OpalVal::Int(num))
        } else {
            Ok(OpalVal::Ratio(num, den))
        }
    }

    pub fn char(c: char) -> Self {
        OpalVal::Char(c)
    }

    pub fn string(s: impl Into<Rc<str>>) -> Self {
        OpalVal::String(s.into())
    }

    pub fn symbol(sym: Symbol) -> Self {
        OpalVal::Symbol(sym, None)
    }

    pub fn symbol_str(name: &str) -> Self {
        OpalVal::Symbol(Symbol::parse(name), None)
    }

    pub fn keyword(kw: Keyword) -> Self {
        OpalVal::Keyword(kw)
    }

    pub fn keyword_str(name: &str) -> Self {
        OpalVal::Keyword(Keyword::parse(name))
    }

    pub fn empty_list() -> Self {
        OpalVal::List(Rc::new(PersistentList::empty()))
    }

    pub fn list(elements: Vec<OpalVal>) -> Self {
        OpalVal::List(Rc::new(PersistentList::from_vec(elements)))
    }

    pub fn empty_vector() -> Self {
        OpalVal::Vector(Rc::new(PersistentVector::empty()))
    }

    pub fn vector(elements: Vec<OpalVal>) -> Self {
        OpalVal::Vector(Rc::new(PersistentVector::from_vec(elements)))
    }

    pub fn array_map(m: PersistentArrayMap) -> Self {
        OpalVal::ArrayMap(Rc::new(m))
    }

    pub fn hash_map(m: PersistentHashMap) -> Self {
        OpalVal::HashMap(Rc::new(m))
    }

    pub fn sorted_map(m: PersistentSortedMap) -> Self {
        OpalVal::SortedMap(Rc::new(m))
    }

    pub fn hash_set(s: PersistentHashSet) -> Self {
        OpalVal::HashSet(Rc::new(s))
    }

    pub fn sorted_set(s: PersistentSortedSet) -> Self {
        OpalVal::SortedSet(Rc::new(s))
    }

    pub fn persistent_list(l: PersistentList) -> Self {
        OpalVal::List(Rc::new(l))
    }

    pub fn persistent_vector(v: PersistentVector) -> Self {
        OpalVal::Vector(Rc::new(v))
    }

    /// Map from flat `[k1 v1 …]` elements, auto-promoting to a hash map
    /// past the array-map threshold. Odd element counts are a shape
    /// error.
    pub fn array_map_from_flat(elements: &[OpalVal]) -> Result<Self> {
        if elements.len() / 2 > crate::collections::ARRAY_MAP_THRESHOLD {
            Ok(OpalVal::hash_map(PersistentHashMap::from_flat(elements)?))
        } else {
            Ok(OpalVal::array_map(PersistentArrayMap::from_flat(elements)?))
        }
    }

    pub fn hash_map_from_flat(elements: &[OpalVal]) -> Result<Self> {
        Ok(OpalVal::hash_map(PersistentHashMap::from_flat(elements)?))
    }

    pub fn sorted_map_from_flat(elements: &[OpalVal]) -> Result<Self> {
        Ok(OpalVal::sorted_map(PersistentSortedMap::from_flat(elements)?))
    }

    pub fn hash_set_from_vec(elements: Vec<OpalVal>) -> Result<Self> {
        Ok(OpalVal::hash_set(PersistentHashSet::from_vec(elements)?))
    }

    pub fn sorted_set_from_vec(elements: Vec<OpalVal>) -> Result<Self> {
        Ok(OpalVal::sorted_set(PersistentSortedSet::from_vec(elements)?))
    }

    pub fn cons(first: OpalVal, rest: OpalVal) -> Self {
        OpalVal::Cons(Rc::new(Cons::new(first, rest)))
    }

    pub fn chunked_cons(cc: ChunkedCons) -> Self {
        OpalVal::ChunkedCons(Rc::new(cc))
    }

    pub fn array_chunk(chunk: ArrayChunk) -> Self {
        OpalVal::ArrayChunk(Rc::new(chunk))
    }

    pub fn chunk_buffer(capacity: usize) -> Self {
        OpalVal::ChunkBuffer(Rc::new(OpalChunkBuffer::with_capacity(capacity)))
    }

    pub fn integer_range(r: IntegerRange) -> Self {
        OpalVal::IntegerRange(Rc::new(r))
    }

    pub fn range(r: Range) -> Self {
        OpalVal::Range(Rc::new(r))
    }

    pub fn repeat_unbounded(value: OpalVal) -> Self {
        OpalVal::Repeat(Rc::new(Repeat::unbounded(value)))
    }

    /// `n` copies of `value`; zero or negative counts are the empty list.
    pub fn repeat_n(n: i64, value: OpalVal) -> Self {
        if n <= 0 {
            OpalVal::empty_list()
        } else {
            OpalVal::Repeat(Rc::new(Repeat::bounded(value, n as u64)))
        }
    }

    pub fn lazy_seq_native(thunk: Rc<dyn Fn() -> Result<OpalVal>>) -> Self {
        OpalVal::LazySeq(OpalLazySeq::new_native(thunk))
    }

    pub fn lazy_seq_callable(f: OpalVal) -> Self {
        OpalVal::LazySeq(OpalLazySeq::new_callable(f))
    }

    pub fn vector_seq(s: VectorSeq) -> Self {
        OpalVal::VectorSeq(Rc::new(s))
    }

    pub fn indexed_seq(s: IndexedSeq) -> Self {
        OpalVal::IndexedSeq(Rc::new(s))
    }

    pub fn string_seq(s: StringSeq) -> Self {
        OpalVal::StringSeq(Rc::new(s))
    }

    pub fn iterator_seq(s: IteratorSeq) -> Self {
        OpalVal::IteratorSeq(Rc::new(s))
    }

    pub fn native_fn(name: &str, func: NativeFnImpl) -> Self {
        OpalVal::NativeFn(OpalNativeFn::new(name, func))
    }

    pub fn compiled_fn(f: OpalCompiledFn) -> Self {
        OpalVal::CompiledFn(Rc::new(f))
    }

    pub fn multi_fn(f: OpalMultiFn) -> Self {
        OpalVal::MultiFn(Rc::new(f))
    }

    pub fn namespace(ns: OpalNamespace) -> Self {
        OpalVal::Namespace(Rc::new(ns))
    }

    pub fn var(v: OpalVar) -> Self {
        OpalVal::Var(v)
    }

    pub fn var_unbound_root(s: VarUnboundRoot) -> Self {
        OpalVal::VarUnboundRoot(Rc::new(s))
    }

    pub fn var_thread_binding(b: VarThreadBinding) -> Self {
        OpalVal::VarThreadBinding(Rc::new(b))
    }

    pub fn atom(value: OpalVal) -> Self {
        OpalVal::Atom(OpalAtom::new(value))
    }

    pub fn volatile(value: OpalVal) -> Self {
        OpalVal::Volatile(OpalVolatile::new(value))
    }

    pub fn delay_native(thunk: Rc<dyn Fn() -> Result<OpalVal>>) -> Self {
        OpalVal::Delay(OpalDelay::new_native(thunk))
    }

    pub fn reduced(value: OpalVal) -> Self {
        OpalVal::Reduced(Rc::new(value))
    }

    pub fn tagged_literal(tag: OpalVal, form: OpalVal) -> Self {
        OpalVal::TaggedLiteral(Rc::new(TaggedLiteral::new(tag, form)))
    }

    pub fn extended(e: OpalExtended) -> Self {
        OpalVal::Extended(Rc::new(e))
    }

    pub fn transient_vector(t: TransientVector) -> Self {
        OpalVal::TransientVector(transient_cell(t))
    }

    pub fn transient_hash_map(t: TransientHashMap) -> Self {
        OpalVal::TransientHashMap(transient_cell(t))
    }

    pub fn transient_hash_set(t: TransientHashSet) -> Self {
        OpalVal::TransientHashSet(transient_cell(t))
    }

    pub fn transient_sorted_map(t: TransientSortedMap) -> Self {
        OpalVal::TransientSortedMap(transient_cell(t))
    }

    pub fn transient_sorted_set(t: TransientSortedSet) -> Self {
        OpalVal::TransientSortedSet(transient_cell(t))
    }
}

// ============================================================================
// Predicates
// ============================================================================

impl OpalVal {
    pub fn is_nil(&self) -> bool {
        matches!(self, OpalVal::Nil)
    }

    /// Everything except nil and false is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, OpalVal::Nil | OpalVal::Bool(false))
    }

    pub fn is_map(&self) -> bool {
        matches!(
            self,
            OpalVal::ArrayMap(_) | OpalVal::HashMap(_) | OpalVal::SortedMap(_)
        )
    }

    pub fn is_set(&self) -> bool {
        matches!(self, OpalVal::HashSet(_) | OpalVal::SortedSet(_))
    }

    /// Identity pointer used for pointer equality and identity hashing of
    /// reference kinds; zero for inline kinds.
    pub fn identity_ptr(&self) -> usize {
        match self {
            OpalVal::Nil
            | OpalVal::Bool(_)
            | OpalVal::Int(_)
            | OpalVal::Float(_)
            | OpalVal::Ratio(_, _)
            | OpalVal::Char(_) => 0,
            OpalVal::String(s) => Rc::as_ptr(s).cast::<()>() as usize,
            OpalVal::Symbol(_, _) | OpalVal::Keyword(_) => 0,
            OpalVal::List(x) => Rc::as_ptr(x) as usize,
            OpalVal::Vector(x) => Rc::as_ptr(x) as usize,
            OpalVal::ArrayMap(x) => Rc::as_ptr(x) as usize,
            OpalVal::HashMap(x) => Rc::as_ptr(x) as usize,
            OpalVal::SortedMap(x) => Rc::as_ptr(x) as usize,
            OpalVal::HashSet(x) => Rc::as_ptr(x) as usize,
            OpalVal::SortedSet(x) => Rc::as_ptr(x) as usize,
            OpalVal::TransientVector(x) => Rc::as_ptr(x) as usize,
            OpalVal::TransientHashMap(x) => Rc::as_ptr(x) as usize,
            OpalVal::TransientHashSet(x) => Rc::as_ptr(x) as usize,
            OpalVal::TransientSortedMap(x) => Rc::as_ptr(x) as usize,
            OpalVal::TransientSortedSet(x) => Rc::as_ptr(x) as usize,
            OpalVal::Cons(x) => Rc::as_ptr(x) as usize,
            OpalVal::Range(x) => Rc::as_ptr(x) as usize,
            OpalVal::IntegerRange(x) => Rc::as_ptr(x) as usize,
            OpalVal::Repeat(x) => Rc::as_ptr(x) as usize,
            OpalVal::LazySeq(x) => x.state_ptr(),
            OpalVal::ChunkedCons(x) => Rc::as_ptr(x) as usize,
            OpalVal::ChunkBuffer(x) => Rc::as_ptr(x) as usize,
            OpalVal::ArrayChunk(x) => Rc::as_ptr(x) as usize,
            OpalVal::IteratorSeq(x) => Rc::as_ptr(x) as usize,
            OpalVal::VectorSeq(x) => Rc::as_ptr(x) as usize,
            OpalVal::IndexedSeq(x) => Rc::as_ptr(x) as usize,
            OpalVal::StringSeq(x) => Rc::as_ptr(x) as usize,
            OpalVal::NativeFn(x) => x.fn_ptr(),
            OpalVal::CompiledFn(x) => Rc::as_ptr(x) as usize,
            OpalVal::MultiFn(x) => Rc::as_ptr(x) as usize,
            OpalVal::Namespace(x) => Rc::as_ptr(x) as usize,
            OpalVal::Var(x) => x.ptr_id(),
            OpalVal::VarThreadBinding(x) => Rc::as_ptr(x) as usize,
            OpalVal::VarUnboundRoot(x) => Rc::as_ptr(x) as usize,
            OpalVal::Atom(x) => x.ptr_id(),
            OpalVal::Volatile(x) => x.ptr_id(),
            OpalVal::Delay(x) => x.ptr_id(),
            OpalVal::Reduced(x) => Rc::as_ptr(x) as usize,
            OpalVal::TaggedLiteral(x) => Rc::as_ptr(x) as usize,
            OpalVal::Extended(x) => Rc::as_ptr(x) as usize,
        }
    }
}

// ============================================================================
// Metadata
// ============================================================================

impl OpalVal {
    /// The attached metadata, if this kind supports it and any is set.
    pub fn meta(&self) -> Option<OpalVal> {
        match self {
            OpalVal::Symbol(_, meta) => meta.as_deref().cloned(),
            OpalVal::List(l) => l.meta().cloned(),
            OpalVal::Vector(v) => v.meta().cloned(),
            OpalVal::ArrayMap(m) => m.meta().cloned(),
            OpalVal::HashMap(m) => m.meta().cloned(),
            OpalVal::SortedMap(m) => m.meta().cloned(),
            OpalVal::HashSet(s) => s.meta().cloned(),
            OpalVal::SortedSet(s) => s.meta().cloned(),
            OpalVal::Cons(c) => c.meta().cloned(),
            OpalVal::LazySeq(ls) => ls.meta().cloned(),
            OpalVal::CompiledFn(f) => f.meta().cloned(),
            OpalVal::Var(v) => v.meta(),
            OpalVal::Namespace(ns) => ns.meta(),
            _ => None,
        }
    }

    /// Does this kind carry metadata at all?
    pub fn supports_meta(&self) -> bool {
        matches!(
            self,
            OpalVal::Symbol(_, _)
                | OpalVal::List(_)
                | OpalVal::Vector(_)
                | OpalVal::ArrayMap(_)
                | OpalVal::HashMap(_)
                | OpalVal::SortedMap(_)
                | OpalVal::HashSet(_)
                | OpalVal::SortedSet(_)
                | OpalVal::Cons(_)
                | OpalVal::LazySeq(_)
                | OpalVal::CompiledFn(_)
                | OpalVal::Var(_)
        )
    }

    /// A new value carrying `meta`, sharing all structure. Metadata must
    /// be map-shaped or nil (shape error otherwise); kinds without
    /// metadata raise a capability error. Metadata never participates in
    /// equality or hashing.
    pub fn with_meta(&self, meta: Option<OpalVal>) -> Result<OpalVal> {
        let meta = match meta {
            Some(OpalVal::Nil) | None => None,
            Some(m) if m.is_map() => Some(m),
            Some(m) => {
                return Err(Error::shape(format!(
                    "metadata must be a map, got {}",
                    m.type_name()
                )));
            }
        };
        match self {
            OpalVal::Symbol(sym, _) => Ok(OpalVal::Symbol(sym.clone(), meta.map(Rc::new))),
            OpalVal::List(l) => Ok(OpalVal::List(Rc::new(l.with_meta(meta)))),
            OpalVal::Vector(v) => Ok(OpalVal::Vector(Rc::new(v.with_meta(meta)))),
            OpalVal::ArrayMap(m) => Ok(OpalVal::ArrayMap(Rc::new(m.with_meta(meta)))),
            OpalVal::HashMap(m) => Ok(OpalVal::HashMap(Rc::new(m.with_meta(meta)))),
            OpalVal::SortedMap(m) => Ok(OpalVal::SortedMap(Rc::new(m.with_meta(meta)))),
            OpalVal::HashSet(s) => Ok(OpalVal::HashSet(Rc::new(s.with_meta(meta)))),
            OpalVal::SortedSet(s) => Ok(OpalVal::SortedSet(Rc::new(s.with_meta(meta)))),
            OpalVal::Cons(c) => Ok(OpalVal::Cons(Rc::new(c.with_meta(meta)))),
            OpalVal::LazySeq(ls) => Ok(OpalVal::LazySeq(ls.with_meta(meta))),
            OpalVal::CompiledFn(f) => Ok(OpalVal::CompiledFn(Rc::new(f.with_meta(meta)))),
            OpalVal::Var(v) => {
                v.set_meta(meta)?;
                Ok(self.clone())
            }
            _ => Err(Error::not_capable("metadatable", self)),
        }
    }
}

// ============================================================================
// Equality, hashing, display
// ============================================================================

impl PartialEq for OpalVal {
    /// Structural, kind-family-aware equality. Metadata never
    /// participates. Failures inside lazy forcing cannot propagate
    /// through this trait and compare unequal; the generic `equal`
    /// operation propagates them.
    fn eq(&self, other: &Self) -> bool {
        crate::ops::equality::equal(self, other).unwrap_or(false)
    }
}

impl Eq for OpalVal {}

impl Hash for OpalVal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        crate::hashing::hash_value(self).hash(state);
    }
}

impl fmt::Display for OpalVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::ops::print::to_code_string(self))
    }
}

impl fmt::Debug for OpalVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!OpalVal::Nil.is_truthy());
        assert!(!OpalVal::bool(false).is_truthy());
        assert!(OpalVal::bool(true).is_truthy());
        assert!(OpalVal::int(0).is_truthy());
        assert!(OpalVal::empty_list().is_truthy());
    }

    #[test]
    fn test_ratio_normalizes() {
        assert_eq!(OpalVal::ratio(2, 4).unwrap(), OpalVal::Ratio(1, 2));
        assert!(matches!(OpalVal::ratio(4, 2).unwrap(), OpalVal::Int(2)));
        assert_eq!(OpalVal::ratio(1, -2).unwrap(), OpalVal::Ratio(-1, 2));
        assert!(OpalVal::ratio(1, 0).is_err());
    }

    #[test]
    fn test_kind_is_stable() {
        assert_eq!(OpalVal::int(1).kind(), Kind::Int);
        assert_eq!(OpalVal::empty_vector().kind(), Kind::Vector);
        assert_eq!(OpalVal::int(1).type_name(), "int");
    }

    #[test]
    fn test_with_meta_validates_shape() {
        let v = OpalVal::vector(vec![OpalVal::int(1)]);
        assert!(v.with_meta(Some(OpalVal::int(1))).is_err());
        let m = OpalVal::array_map_from_flat(&[OpalVal::keyword_str("a"), OpalVal::int(1)])
            .unwrap();
        let tagged = v.with_meta(Some(m)).unwrap();
        assert!(tagged.meta().is_some());
        // Metadata does not affect equality
        assert_eq!(tagged, v);
    }

    #[test]
    fn test_with_meta_not_supported() {
        let err = OpalVal::int(1).with_meta(None).unwrap_err();
        assert!(matches!(err, Error::NotCapable { .. }));
    }
}
