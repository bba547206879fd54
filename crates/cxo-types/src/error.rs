use std::fmt;

use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Coarse classification shared by every CXO error type.
///
/// Each crate keeps its own detailed error enum; `kind()` on those enums maps
/// onto this taxonomy so callers can branch on the category without matching
/// every variant of every layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A digest or feed is absent.
    NotFound,
    /// Bytes do not decode against the declared schema, or schemas conflict.
    SchemaMismatch,
    /// Registration attempted after the registry was frozen.
    FrozenRegistry,
    /// A root pack violates sequence, link or signature rules.
    InvalidChain,
    /// The backing medium failed.
    IoFailure,
    /// The database was closed.
    AlreadyClosed,
    /// Invariant breakage inside the process (poisoned lock, encoder bug).
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::SchemaMismatch => "schema mismatch",
            Self::FrozenRegistry => "frozen registry",
            Self::InvalidChain => "invalid chain",
            Self::IoFailure => "i/o failure",
            Self::AlreadyClosed => "already closed",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}
