// opal-core - Cons cell sequence
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Eager cons cell: a realized head in front of any seqable tail.

use crate::value::OpalVal;

/// A sequence node with an eager first element. The tail may be any
/// seqable value (including a lazy sequence) or nil.
#[derive(Clone)]
pub struct Cons {
    first: OpalVal,
    rest: OpalVal,
    meta: Option<OpalVal>,
}

impl Cons {
    pub fn new(first: OpalVal, rest: OpalVal) -> Self {
        Cons {
            first,
            rest,
            meta: None,
        }
    }

    pub fn first(&self) -> &OpalVal {
        &self.first
    }

    /// The tail as given; `next` semantics (seq of the tail) live in the
    /// ops layer.
    pub fn rest(&self) -> &OpalVal {
        &self.rest
    }

    pub fn meta(&self) -> Option<&OpalVal> {
        self.meta.as_ref()
    }

    pub fn with_meta(&self, meta: Option<OpalVal>) -> Self {
        Cons {
            first: self.first.clone(),
            rest: self.rest.clone(),
            meta,
        }
    }
}
