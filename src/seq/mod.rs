// opal-core - Sequence kinds
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Sequence kinds: cons cells, lazy sequences, chunks, ranges, and the
//! view adapters over base collections.
//!
//! The traversal protocol itself (`seq` / `first` / `next` /
//! `next_in_place`) is dispatched through the capability table; the free
//! functions live in [`crate::ops::seqs`].

pub mod chunk;
pub mod cons;
pub mod lazy;
pub mod range;
pub mod views;

pub use chunk::{ArrayChunk, CHUNK_SIZE, ChunkedCons, OpalChunkBuffer};
pub use cons::Cons;
pub use lazy::{LazyThunk, OpalLazySeq};
pub use range::{IntegerRange, Range, Repeat};
pub use views::{IndexedSeq, IteratorSeq, StringSeq, VectorSeq};
