// opal-core - Generic sequence operations
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The sequence protocol's free functions: traversal, reduction,
//! sorting, shuffling, and the chunk helpers.
//!
//! Nil policy: nil is seqable (`seq(nil)` is nil, `first`/`next` of nil
//! are nil, `rest` of nil is the empty list); calling a sequence
//! operation on any other non-seqable kind raises "not seqable".

use std::cell::Cell;

use crate::behaviors::caps;
use crate::error::{Error, Result};
use crate::ops::equality::compare;
use crate::ops::invoke::invoke;
use crate::seq::{ArrayChunk, ChunkedCons};
use crate::value::OpalVal;

// ============================================================================
// Traversal
// ============================================================================

/// A seq over the value, or nil when the value is empty (or nil).
pub fn seq(v: &OpalVal) -> Result<OpalVal> {
    if v.is_nil() {
        return Ok(OpalVal::Nil);
    }
    caps(v).seq()
}

/// A fresh, independent seq over the value; traversing it never disturbs
/// other live seqs of the same source.
pub fn fresh_seq(v: &OpalVal) -> Result<OpalVal> {
    if v.is_nil() {
        return Ok(OpalVal::Nil);
    }
    caps(v).fresh_seq()
}

/// First element, or nil when empty.
pub fn first(v: &OpalVal) -> Result<OpalVal> {
    if v.is_nil() {
        return Ok(OpalVal::Nil);
    }
    let c = caps(v);
    if c.is_sequenceable() {
        return c.first();
    }
    let s = c.seq()?;
    if s.is_nil() {
        Ok(OpalVal::Nil)
    } else {
        caps(&s).first()
    }
}

/// Second element, or nil.
pub fn second(v: &OpalVal) -> Result<OpalVal> {
    first(&next(v)?)
}

/// An independent node over the remaining elements, or nil at
/// exhaustion. The receiver is never modified.
pub fn next(v: &OpalVal) -> Result<OpalVal> {
    if v.is_nil() {
        return Ok(OpalVal::Nil);
    }
    let c = caps(v);
    if c.is_sequenceable() {
        return c.next();
    }
    let s = c.seq()?;
    if s.is_nil() {
        Ok(OpalVal::Nil)
    } else {
        caps(&s).next()
    }
}

/// Advance the node itself and return it (or nil at exhaustion). The
/// caller must not rely on the node's prior state through retained
/// aliases; use [`next`] when the prior node is still needed.
pub fn next_in_place(v: &OpalVal) -> Result<OpalVal> {
    if v.is_nil() {
        return Ok(OpalVal::Nil);
    }
    let c = caps(v);
    if c.is_sequenceable_in_place() {
        return c.next_in_place();
    }
    next(v)
}

/// Like [`next`] but answers the empty list instead of nil.
pub fn rest(v: &OpalVal) -> Result<OpalVal> {
    let n = next(v)?;
    if n.is_nil() {
        Ok(OpalVal::empty_list())
    } else {
        Ok(n)
    }
}

/// Prepend an element onto the seq of any seqable value.
pub fn cons(head: OpalVal, tail: &OpalVal) -> Result<OpalVal> {
    if tail.is_nil() {
        return Ok(OpalVal::cons(head, OpalVal::Nil));
    }
    let c = caps(tail);
    if !c.is_seqable() {
        return Err(Error::not_capable("seqable", tail));
    }
    Ok(OpalVal::cons(head, tail.clone()))
}

/// Element count. Countable kinds answer in O(1) (or their own cost);
/// other seqables are walked.
pub fn count(v: &OpalVal) -> Result<usize> {
    if v.is_nil() {
        return Ok(0);
    }
    let c = caps(v);
    if c.is_countable() {
        return c.count();
    }
    if c.is_seqable() {
        return count_by_walking(v);
    }
    Err(Error::not_capable("countable", v))
}

/// Count by traversing independent nodes.
pub(crate) fn count_by_walking(v: &OpalVal) -> Result<usize> {
    let mut n = 0;
    let mut node = seq(v)?;
    while !node.is_nil() {
        n += 1;
        node = next(&node)?;
    }
    Ok(n)
}

/// Is the value empty? Nil is empty; seqables check their seq;
/// countables their count.
pub fn is_empty(v: &OpalVal) -> Result<bool> {
    if v.is_nil() {
        return Ok(true);
    }
    let c = caps(v);
    if c.is_seqable() {
        return Ok(c.seq()?.is_nil());
    }
    if c.is_countable() {
        return Ok(c.count()? == 0);
    }
    Err(Error::not_capable("seqable", v))
}

/// Materialize any seqable into a Vec of element handles.
pub fn seq_to_vec(v: &OpalVal) -> Result<Vec<OpalVal>> {
    let mut out = Vec::new();
    let mut node = fresh_seq(v)?;
    while !node.is_nil() {
        out.push(first(&node)?);
        node = next(&node)?;
    }
    Ok(out)
}

// ============================================================================
// Indexing
// ============================================================================

/// Element at index. Indexable kinds answer directly; other seqables are
/// walked. Out of range raises a bounds error.
pub fn nth(v: &OpalVal, i: i64) -> Result<OpalVal> {
    if v.is_nil() {
        return Ok(OpalVal::Nil);
    }
    let c = caps(v);
    if c.is_indexable() {
        return c.nth(i);
    }
    if c.is_seqable() {
        if i < 0 {
            return Err(Error::out_of_bounds(i, 0));
        }
        let mut node = seq(v)?;
        let mut remaining = i;
        while !node.is_nil() {
            if remaining == 0 {
                return first(&node);
            }
            remaining -= 1;
            node = next(&node)?;
        }
        return Err(Error::out_of_bounds(i, (i - remaining) as usize));
    }
    Err(Error::not_capable("indexable", v))
}

/// Element at index, or the fallback when out of range.
pub fn nth_default(v: &OpalVal, i: i64, fallback: &OpalVal) -> Result<OpalVal> {
    if v.is_nil() {
        return Ok(fallback.clone());
    }
    let c = caps(v);
    if c.is_indexable() {
        return c.nth_default(i, fallback);
    }
    match nth(v, i) {
        Ok(found) => Ok(found),
        Err(Error::OutOfBounds { .. }) => Ok(fallback.clone()),
        Err(e) => Err(e),
    }
}

// ============================================================================
// Reduction
// ============================================================================

/// Reduce the collection with a two-argument function. A `reduced`
/// wrapper in the accumulator position short-circuits, yielding its
/// inner value. Chunked sources are consumed batch-wise.
pub fn reduce(f: &OpalVal, init: OpalVal, coll: &OpalVal) -> Result<OpalVal> {
    let mut acc = init;
    let mut node = seq(coll)?;
    while !node.is_nil() {
        let c = caps(&node);
        if c.is_chunkable() {
            let chunk_val = c.chunked_first()?;
            let OpalVal::ArrayChunk(chunk) = &chunk_val else {
                return Err(Error::internal("chunked_first produced a non-chunk"));
            };
            for item in chunk.iter() {
                acc = invoke(f, &[acc, item.clone()])?;
                if let OpalVal::Reduced(inner) = &acc {
                    return Ok((**inner).clone());
                }
            }
            node = c.chunked_next()?;
            continue;
        }
        acc = invoke(f, &[acc, first(&node)?])?;
        if let OpalVal::Reduced(inner) = &acc {
            return Ok((**inner).clone());
        }
        node = next(&node)?;
    }
    Ok(acc)
}

// ============================================================================
// Sorting and shuffling
// ============================================================================

/// Sort into a fresh sequence by the generic `compare` (stable). The
/// source is never mutated.
pub fn sort(coll: &OpalVal) -> Result<OpalVal> {
    let mut items = seq_to_vec(coll)?;
    let mut failure: Option<Error> = None;
    items.sort_by(|a, b| match compare(a, b) {
        Ok(ordering) => ordering,
        Err(e) => {
            if failure.is_none() {
                failure = Some(e);
            }
            std::cmp::Ordering::Equal
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }
    if items.is_empty() {
        Ok(OpalVal::empty_list())
    } else {
        Ok(OpalVal::indexed_seq(crate::seq::IndexedSeq::from_vec(items)))
    }
}

// LCG constants (same as used in glibc)
const LCG_MULTIPLIER: u64 = 6364136223846793005;
const LCG_INCREMENT: u64 = 1442695040888963407;

thread_local! {
    /// Persistent RNG state, seeded lazily from system time.
    static RNG_STATE: Cell<u64> = const { Cell::new(0) };
    static RNG_SEEDED: Cell<bool> = const { Cell::new(false) };
}

fn next_random_u64() -> u64 {
    RNG_STATE.with(|state| {
        RNG_SEEDED.with(|seeded| {
            if !seeded.get() {
                use std::time::{SystemTime, UNIX_EPOCH};
                let seed = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_nanos() as u64)
                    .unwrap_or(0x5eed);
                state.set(seed);
                seeded.set(true);
            }
        });
        let next = state
            .get()
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        state.set(next);
        next
    })
}

/// Shuffle into a fresh vector (Fisher-Yates). The source is never
/// mutated.
pub fn shuffle(coll: &OpalVal) -> Result<OpalVal> {
    let mut items = seq_to_vec(coll)?;
    let len = items.len();
    for i in (1..len).rev() {
        let j = (next_random_u64() % (i as u64 + 1)) as usize;
        items.swap(i, j);
    }
    Ok(OpalVal::vector(items))
}

// ============================================================================
// Chunk helpers
// ============================================================================

/// The leading chunk of a chunkable sequence.
pub fn chunk_first(v: &OpalVal) -> Result<OpalVal> {
    caps(v).chunked_first()
}

/// The sequence after the leading chunk, or nil.
pub fn chunk_next(v: &OpalVal) -> Result<OpalVal> {
    caps(v).chunked_next()
}

/// Like [`chunk_next`] but answers the empty list instead of nil.
pub fn chunk_rest(v: &OpalVal) -> Result<OpalVal> {
    let n = caps(v).chunked_next()?;
    if n.is_nil() {
        Ok(OpalVal::empty_list())
    } else {
        Ok(n)
    }
}

/// A chunked cons from a chunk and a tail; an empty chunk yields the
/// tail unchanged.
pub fn chunk_cons(chunk: &OpalVal, rest: &OpalVal) -> Result<OpalVal> {
    let OpalVal::ArrayChunk(c) = chunk else {
        return Err(Error::not_capable("chunk-like", chunk));
    };
    if c.is_empty() {
        return Ok(rest.clone());
    }
    Ok(OpalVal::chunked_cons(ChunkedCons::new(
        (**c).clone(),
        rest.clone(),
    )))
}

/// Append a value to a chunk buffer, returning the buffer.
pub fn chunk_append(buf: &OpalVal, value: OpalVal) -> Result<OpalVal> {
    let OpalVal::ChunkBuffer(b) = buf else {
        return Err(Error::not_capable("chunk-like", buf));
    };
    b.append(value)?;
    Ok(buf.clone())
}

/// Finalize a chunk buffer into a chunk, draining the buffer.
pub fn chunk_finalize(buf: &OpalVal) -> Result<OpalVal> {
    let OpalVal::ChunkBuffer(b) = buf else {
        return Err(Error::not_capable("chunk-like", buf));
    };
    Ok(OpalVal::array_chunk(b.to_chunk()))
}

/// Build a chunk directly from elements.
pub fn chunk_of(elements: Vec<OpalVal>) -> OpalVal {
    OpalVal::array_chunk(ArrayChunk::new(elements))
}

// ============================================================================
// Tests
// ============================================================================
