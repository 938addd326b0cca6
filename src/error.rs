// opal-core - Error types for the Opal object runtime
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Error types for the Opal runtime core.
//!
//! Every failure a generic operation can produce is a recoverable `Error`
//! value, surfaced to the caller through `Result`. The only exception is
//! `Internal`, which marks invariant violations that should be unreachable
//! by construction.

use std::fmt;

/// Result type for runtime core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the object and collection runtime.
#[derive(Debug, Clone)]
pub enum Error {
    /// Operation requested on a value whose kind lacks that capability.
    NotCapable {
        capability: &'static str,
        kind: &'static str,
        value: String,
    },
    /// Structurally malformed input to a constructor or update.
    Shape(String),
    /// Out-of-range index access.
    OutOfBounds { index: i64, count: usize },
    /// Pop on an empty stack-like collection.
    EmptyPop(&'static str),
    /// Mutation attempted on a transient after it was frozen.
    StaleTransient(&'static str),
    /// Callable invoked with an unsupported number of arguments.
    ArityMismatch { name: String, arity: usize },
    /// Invariant violation - should be unreachable.
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotCapable {
                capability,
                kind,
                value,
            } => {
                write!(f, "not {}: {} ({})", capability, value, kind)
            }
            Error::Shape(msg) => {
                write!(f, "{}", msg)
            }
            Error::OutOfBounds { index, count } => {
                write!(f, "index {} out of bounds for count {}", index, count)
            }
            Error::EmptyPop(kind) => {
                write!(f, "cannot pop an empty {}", kind)
            }
            Error::StaleTransient(op) => {
                write!(f, "transient used after being made persistent: {}", op)
            }
            Error::ArityMismatch { name, arity } => {
                write!(f, "wrong number of arguments ({}) passed to {}", arity, name)
            }
            Error::Internal(msg) => {
                write!(f, "internal error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Create a capability error from the capability name and offending value.
    pub fn not_capable(capability: &'static str, value: &crate::value::OpalVal) -> Self {
        Error::NotCapable {
            capability,
            kind: value.type_name(),
            value: crate::ops::print::to_code_string(value),
        }
    }

    /// Create a shape error.
    pub fn shape(msg: impl Into<String>) -> Self {
        Error::Shape(msg.into())
    }

    /// Create a bounds error.
    pub fn out_of_bounds(index: i64, count: usize) -> Self {
        Error::OutOfBounds { index, count }
    }

    /// Create an arity error for a named callable.
    pub fn arity(name: impl Into<String>, arity: usize) -> Self {
        Error::ArityMismatch {
            name: name.into(),
            arity,
        }
    }

    /// Create an internal-consistency error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}
