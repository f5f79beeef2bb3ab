//! # Error Types
//!
//! Comprehensive error handling for the wire-format core.
//!
//! This module defines all error variants that can occur while encoding or
//! decoding transactions, extra fields, Levin packets, and payload bodies.
//!
//! ## Error Categories
//! - **Truncated**: the input ended before a field could be read
//! - **Malformed**: bytes were present but structurally invalid
//! - **UnknownVariant**: a type selector or command code is not recognized
//! - **InvariantViolation**: counts or lengths that must agree do not
//! - **I/O / Config**: stream-codec plumbing and configuration failures
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! Decoding is all-or-nothing outside the tx-extra region: any error returned
//! from a decode means the whole message must be treated as rejected.

use std::io;
use thiserror::Error;

/// Primary error type for all wire-format operations.
#[derive(Error, Debug)]
pub enum WireError {
    /// The input ended before `context` could be read in full.
    #[error("unexpected end of input while reading {context}: needed {needed} more byte(s)")]
    Truncated {
        /// What was being read when the bytes ran out.
        context: &'static str,
        /// How many additional bytes would have been required.
        needed: usize,
    },

    /// Bytes were present but structurally invalid.
    #[error("malformed {context}")]
    Malformed {
        /// The structure that failed validation.
        context: &'static str,
    },

    /// A type selector or command code outside the closed set.
    #[error("unknown {kind}: {value}")]
    UnknownVariant {
        /// The discriminant family (input type, output type, command, ...).
        kind: &'static str,
        /// The offending raw value.
        value: u64,
    },

    /// Counts or lengths that must agree do not.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl WireError {
    /// Shorthand for a [`WireError::Truncated`].
    pub(crate) fn truncated(context: &'static str, needed: usize) -> Self {
        WireError::Truncated { context, needed }
    }

    /// Shorthand for a [`WireError::Malformed`].
    pub(crate) fn malformed(context: &'static str) -> Self {
        WireError::Malformed { context }
    }

    /// Shorthand for a [`WireError::UnknownVariant`].
    pub(crate) fn unknown(kind: &'static str, value: u64) -> Self {
        WireError::UnknownVariant { kind, value }
    }
}

/// Type alias for Results using WireError
pub type Result<T> = std::result::Result<T, WireError>;
