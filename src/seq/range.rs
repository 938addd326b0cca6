// opal-core - Range and repeat sequences
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Numeric range sequences and the repeat sequence.
//!
//! `IntegerRange` is the i64 fast path and is chunkable: batch consumers
//! pull 32-element chunks without per-element allocation. `Range` covers
//! floating-point bounds element-wise. `Repeat` yields one value a bounded
//! or unbounded number of times.

use std::cell::Cell;

use crate::error::{Error, Result};
use crate::seq::chunk::{ArrayChunk, CHUNK_SIZE, ChunkedCons};
use crate::value::OpalVal;

// ============================================================================
// IntegerRange
// ============================================================================

/// Integers from `start` (inclusive) to `end` (exclusive) by `step`.
pub struct IntegerRange {
    start: Cell<i64>,
    end: i64,
    step: i64,
}

impl IntegerRange {
    /// A zero step never reaches the end; reject it at construction.
    pub fn new(start: i64, end: i64, step: i64) -> Result<Self> {
        if step == 0 {
            return Err(Error::shape("range step must be non-zero"));
        }
        Ok(IntegerRange {
            start: Cell::new(start),
            end,
            step,
        })
    }

    fn remaining(&self) -> usize {
        let start = self.start.get() as i128;
        let end = self.end as i128;
        let step = self.step as i128;
        let span = if step > 0 { end - start } else { start - end };
        if span <= 0 {
            0
        } else {
            ((span + step.abs() - 1) / step.abs()) as usize
        }
    }

    pub fn count(&self) -> usize {
        self.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn first(&self) -> Option<OpalVal> {
        if self.is_empty() {
            None
        } else {
            Some(OpalVal::int(self.start.get()))
        }
    }

    /// Independent successor node, or None at exhaustion.
    pub fn next(&self) -> Option<IntegerRange> {
        if self.remaining() > 1 {
            Some(IntegerRange {
                start: Cell::new(self.start.get() + self.step),
                end: self.end,
                step: self.step,
            })
        } else {
            None
        }
    }

    /// Advance this node in place. Returns false at exhaustion; the node
    /// must not be read afterwards through retained aliases.
    pub fn next_in_place(&self) -> bool {
        if self.remaining() > 1 {
            self.start.set(self.start.get() + self.step);
            true
        } else {
            false
        }
    }

    /// The leading batch of up to [`CHUNK_SIZE`] elements.
    pub fn chunked_first(&self) -> ArrayChunk {
        let n = self.remaining().min(CHUNK_SIZE);
        let mut items = Vec::with_capacity(n);
        let mut i = self.start.get();
        for _ in 0..n {
            items.push(OpalVal::int(i));
            i += self.step;
        }
        ArrayChunk::new(items)
    }

    /// The range after the leading batch, or None at exhaustion.
    pub fn chunked_next(&self) -> Option<IntegerRange> {
        let n = self.remaining();
        if n > CHUNK_SIZE {
            Some(IntegerRange {
                start: Cell::new(self.start.get() + (CHUNK_SIZE as i64) * self.step),
                end: self.end,
                step: self.step,
            })
        } else {
            None
        }
    }

    /// View as a chunked cons over the same elements.
    pub fn as_chunked_cons(&self) -> ChunkedCons {
        let chunk = self.chunked_first();
        let rest = match self.chunked_next() {
            Some(r) => OpalVal::integer_range(r),
            None => OpalVal::Nil,
        };
        ChunkedCons::new(chunk, rest)
    }
}

// ============================================================================
// Range
// ============================================================================

/// Doubles from `start` (inclusive) to `end` (exclusive) by `step`;
/// traversed element-wise.
pub struct Range {
    start: Cell<f64>,
    end: f64,
    step: f64,
}

impl Range {
    pub fn new(start: f64, end: f64, step: f64) -> Result<Self> {
        if step == 0.0 || !step.is_finite() {
            return Err(Error::shape("range step must be non-zero and finite"));
        }
        Ok(Range {
            start: Cell::new(start),
            end,
            step,
        })
    }

    pub fn is_empty(&self) -> bool {
        let start = self.start.get();
        if self.step > 0.0 {
            start >= self.end
        } else {
            start <= self.end
        }
    }

    pub fn count(&self) -> usize {
        let span = (self.end - self.start.get()) / self.step;
        if span <= 0.0 { 0 } else { span.ceil() as usize }
    }

    pub fn first(&self) -> Option<OpalVal> {
        if self.is_empty() {
            None
        } else {
            Some(OpalVal::float(self.start.get()))
        }
    }

    /// Independent successor node, or None at exhaustion.
    pub fn next(&self) -> Option<Range> {
        let advanced = self.start.get() + self.step;
        let r = Range {
            start: Cell::new(advanced),
            end: self.end,
            step: self.step,
        };
        if r.is_empty() { None } else { Some(r) }
    }

    /// Advance this node in place. Returns false at exhaustion.
    pub fn next_in_place(&self) -> bool {
        let advanced = self.start.get() + self.step;
        let exhausted = if self.step > 0.0 {
            advanced >= self.end
        } else {
            advanced <= self.end
        };
        if exhausted {
            false
        } else {
            self.start.set(advanced);
            true
        }
    }
}

// ============================================================================
// Repeat
// ============================================================================

/// The same value repeated `remaining` times, or without bound when
/// `remaining` is None. Bounded repeats always hold a count of at least 1;
/// the zero-count case is the empty list at construction.
pub struct Repeat {
    value: OpalVal,
    remaining: Cell<Option<u64>>,
}

impl Repeat {
    pub fn unbounded(value: OpalVal) -> Self {
        Repeat {
            value,
            remaining: Cell::new(None),
        }
    }

    pub(crate) fn bounded(value: OpalVal, remaining: u64) -> Self {
        debug_assert!(remaining >= 1);
        Repeat {
            value,
            remaining: Cell::new(Some(remaining)),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.remaining.get().is_none()
    }

    /// Bounded count; counting an unbounded repeat is a shape error.
    pub fn count(&self) -> Result<usize> {
        match self.remaining.get() {
            Some(n) => Ok(n as usize),
            None => Err(Error::shape("cannot count an unbounded repeat")),
        }
    }

    pub fn first(&self) -> &OpalVal {
        &self.value
    }

    /// Independent successor node, or None at exhaustion.
    pub fn next(&self) -> Option<Repeat> {
        match self.remaining.get() {
            None => Some(Repeat::unbounded(self.value.clone())),
            Some(n) if n > 1 => Some(Repeat::bounded(self.value.clone(), n - 1)),
            Some(_) => None,
        }
    }

    /// Advance this node in place. Returns false at exhaustion.
    pub fn next_in_place(&self) -> bool {
        match self.remaining.get() {
            None => true,
            Some(n) if n > 1 => {
                self.remaining.set(Some(n - 1));
                true
            }
            Some(_) => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
