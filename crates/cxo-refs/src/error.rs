use cxo_schema::SchemaError;
use cxo_store::StoreError;
use cxo_types::{Digest, ErrorKind};

/// Errors from the reference engine.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    /// The referenced object is absent from the object store.
    #[error("missing {expected} object {digest}")]
    Missing { digest: Digest, expected: String },

    /// A stored Refs tree node is not a valid node.
    #[error("corrupt refs node {digest}: {reason}")]
    CorruptNode { digest: Digest, reason: String },

    /// A root payload could not be decoded.
    #[error("corrupt root payload: {0}")]
    CorruptRoot(String),

    /// A Refs element is an empty reference.
    #[error("refs element {index} is empty")]
    EmptyElement { index: usize },

    /// Index past the end of a Refs collection.
    #[error("index {index} out of range for refs of length {len}")]
    IndexOutOfRange { index: u64, len: u64 },

    /// Refs tree degree below 2.
    #[error("invalid refs degree {0}: must be at least 2")]
    InvalidDegree(usize),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RefError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Missing { .. } | Self::IndexOutOfRange { .. } => ErrorKind::NotFound,
            Self::CorruptNode { .. } | Self::CorruptRoot(_) | Self::EmptyElement { .. } => {
                ErrorKind::SchemaMismatch
            }
            Self::InvalidDegree(_) => ErrorKind::Internal,
            Self::Schema(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}

/// Result alias for reference engine operations.
pub type RefResult<T> = Result<T, RefError>;
