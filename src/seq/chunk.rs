// opal-core - Chunks and chunked sequences
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Chunked traversal: realized fixed-size batches in front of a lazy tail.
//!
//! A chunk is a realized batch with O(1) random access. A chunked cons
//! exposes the chunk for batch-wise consumers (`chunked_first` /
//! `chunked_next`) while still supporting element-wise `first`/`next`;
//! the two views agree element-for-element.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::value::OpalVal;

/// Preferred chunk size for chunked sources.
pub const CHUNK_SIZE: usize = 32;

// ============================================================================
// ArrayChunk
// ============================================================================

/// A realized batch of elements. `drop_first` shares the backing buffer
/// and advances an offset.
#[derive(Clone)]
pub struct ArrayChunk {
    items: Rc<Vec<OpalVal>>,
    offset: usize,
}

impl ArrayChunk {
    pub fn new(items: Vec<OpalVal>) -> Self {
        ArrayChunk {
            items: Rc::new(items),
            offset: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `i` within the remaining batch.
    pub fn nth(&self, i: usize) -> Option<&OpalVal> {
        self.items.get(self.offset + i)
    }

    /// The chunk without its first element. Dropping from an empty chunk
    /// is a bounds error.
    pub fn drop_first(&self) -> Result<ArrayChunk> {
        if self.is_empty() {
            return Err(Error::out_of_bounds(0, 0));
        }
        Ok(ArrayChunk {
            items: Rc::clone(&self.items),
            offset: self.offset + 1,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpalVal> {
        self.items[self.offset..].iter()
    }
}

// ============================================================================
// ChunkBuffer
// ============================================================================

/// A push buffer finalized into an [`ArrayChunk`]. Appending past the
/// declared capacity is a shape error.
pub struct OpalChunkBuffer {
    items: RefCell<Vec<OpalVal>>,
    capacity: usize,
}

impl OpalChunkBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        OpalChunkBuffer {
            items: RefCell::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn append(&self, value: OpalVal) -> Result<()> {
        let mut items = self.items.borrow_mut();
        if items.len() >= self.capacity {
            return Err(Error::shape(format!(
                "chunk buffer capacity ({}) exceeded",
                self.capacity
            )));
        }
        items.push(value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Finalize into a chunk, draining the buffer.
    pub fn to_chunk(&self) -> ArrayChunk {
        ArrayChunk::new(std::mem::take(&mut *self.items.borrow_mut()))
    }
}

// ============================================================================
// ChunkedCons
// ============================================================================

/// A realized chunk in front of a (typically lazy) tail.
#[derive(Clone)]
pub struct ChunkedCons {
    chunk: ArrayChunk,
    rest: OpalVal,
    meta: Option<OpalVal>,
}

impl ChunkedCons {
    /// A chunked cons from a non-empty chunk and a seqable-or-nil tail.
    pub fn new(chunk: ArrayChunk, rest: OpalVal) -> Self {
        ChunkedCons {
            chunk,
            rest,
            meta: None,
        }
    }

    pub fn chunk(&self) -> &ArrayChunk {
        &self.chunk
    }

    pub fn rest(&self) -> &OpalVal {
        &self.rest
    }

    pub fn first(&self) -> Option<&OpalVal> {
        self.chunk.nth(0)
    }

    /// Element-wise successor: remaining chunk elements first, then the
    /// tail.
    pub fn next(&self) -> Result<OpalVal> {
        if self.chunk.len() > 1 {
            Ok(OpalVal::chunked_cons(ChunkedCons::new(
                self.chunk.drop_first()?,
                self.rest.clone(),
            )))
        } else {
            crate::ops::seqs::seq(&self.rest)
        }
    }

    /// Batch-wise successor: the seq of the tail.
    pub fn chunked_next(&self) -> Result<OpalVal> {
        crate::ops::seqs::seq(&self.rest)
    }

    pub fn meta(&self) -> Option<&OpalVal> {
        self.meta.as_ref()
    }

    pub fn with_meta(&self, meta: Option<OpalVal>) -> Self {
        ChunkedCons {
            chunk: self.chunk.clone(),
            rest: self.rest.clone(),
            meta,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
