// opal-core - Lazy sequences
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Lazy sequences with idempotent memoization.
//!
//! A lazy sequence starts *pending*: it holds a zero-argument producer
//! that has not run. Forcing runs the producer exactly once and memoizes
//! the outcome, whether that outcome is a realized sequence or a raised
//! error. Forcing again returns the memoized sequence or re-raises the
//! memoized error; the producer never runs twice.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::value::OpalVal;

/// The deferred computation behind a lazy sequence or delay: either a
/// native Rust thunk or a callable runtime value invoked with no
/// arguments.
#[derive(Clone)]
pub enum LazyThunk {
    Native(Rc<dyn Fn() -> Result<OpalVal>>),
    Callable(OpalVal),
}

impl LazyThunk {
    pub(crate) fn run(&self) -> Result<OpalVal> {
        match self {
            LazyThunk::Native(f) => f(),
            LazyThunk::Callable(f) => crate::ops::invoke::invoke(f, &[]),
        }
    }
}

enum LazyState {
    Pending(LazyThunk),
    Realized(OpalVal),
    Failed(Error),
    /// Transient marker while the producer runs; forcing re-entrantly is
    /// an internal-consistency error rather than a deadlock.
    Forcing,
}

/// A lazy sequence value. Cloning shares the memoization state.
#[derive(Clone)]
pub struct OpalLazySeq {
    state: Rc<RefCell<LazyState>>,
    meta: Option<Box<OpalVal>>,
}

impl OpalLazySeq {
    /// Create a pending lazy sequence from a native thunk.
    pub fn new_native(thunk: Rc<dyn Fn() -> Result<OpalVal>>) -> Self {
        OpalLazySeq {
            state: Rc::new(RefCell::new(LazyState::Pending(LazyThunk::Native(thunk)))),
            meta: None,
        }
    }

    /// Create a pending lazy sequence from a callable runtime value.
    pub fn new_callable(f: OpalVal) -> Self {
        OpalLazySeq {
            state: Rc::new(RefCell::new(LazyState::Pending(LazyThunk::Callable(f)))),
            meta: None,
        }
    }

    /// Has the producer already run (successfully or not)?
    pub fn is_realized(&self) -> bool {
        matches!(
            *self.state.borrow(),
            LazyState::Realized(_) | LazyState::Failed(_)
        )
    }

    /// Force the sequence: run the producer once and memoize its seq (or
    /// its failure). The produced value may itself be lazy; forcing
    /// unwraps until a concrete seq or nil remains.
    pub fn force(&self) -> Result<OpalVal> {
        {
            let state = self.state.borrow();
            match &*state {
                LazyState::Realized(v) => return Ok(v.clone()),
                LazyState::Failed(e) => return Err(e.clone()),
                LazyState::Forcing => {
                    return Err(Error::internal("lazy sequence forced re-entrantly"));
                }
                LazyState::Pending(_) => {}
            }
        }
        let thunk = {
            let mut state = self.state.borrow_mut();
            match std::mem::replace(&mut *state, LazyState::Forcing) {
                LazyState::Pending(thunk) => thunk,
                // Another force slipped in between the two borrows.
                other => {
                    let result = match &other {
                        LazyState::Realized(v) => Ok(v.clone()),
                        LazyState::Failed(e) => Err(e.clone()),
                        _ => Err(Error::internal("lazy sequence forced re-entrantly")),
                    };
                    *state = other;
                    return result;
                }
            }
        };
        let outcome = thunk.run().and_then(|produced| {
            // The producer may hand back another lazy sequence; unwrap to
            // a concrete seq (or nil) before memoizing.
            let mut current = produced;
            loop {
                match current {
                    OpalVal::LazySeq(inner) => current = inner.force()?,
                    other => return crate::ops::seqs::seq(&other),
                }
            }
        });
        let mut state = self.state.borrow_mut();
        match outcome {
            Ok(v) => {
                *state = LazyState::Realized(v.clone());
                Ok(v)
            }
            Err(e) => {
                *state = LazyState::Failed(e.clone());
                Err(e)
            }
        }
    }

    /// Identity for pointer-based hashing and equality fallbacks.
    pub fn state_ptr(&self) -> usize {
        Rc::as_ptr(&self.state) as usize
    }

    pub fn meta(&self) -> Option<&OpalVal> {
        self.meta.as_deref()
    }

    pub fn with_meta(&self, meta: Option<OpalVal>) -> Self {
        OpalLazySeq {
            state: Rc::clone(&self.state),
            meta: meta.map(Box::new),
        }
    }
}

impl fmt::Debug for OpalLazySeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.borrow() {
            LazyState::Pending(_) | LazyState::Forcing => write!(f, "#<LazySeq: pending>"),
            LazyState::Realized(v) => write!(f, "#<LazySeq: {:?}>", v),
            LazyState::Failed(e) => write!(f, "#<LazySeq: failed: {}>", e),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
