use cxo_crypto::ChainError;
use cxo_types::{Digest, ErrorKind, PubKey};

/// Errors from object and feed store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    ObjectNotFound(Digest),

    /// The feed has not been added to this database.
    #[error("feed not found: {0}")]
    FeedNotFound(PubKey),

    /// A root pack breaks the feed's sequence or hash links.
    #[error("invalid chain: {0}")]
    InvalidChain(#[from] ChainError),

    /// A root pack is unsigned or its signature does not match the feed key.
    #[error("invalid signature on root pack seq {seq}")]
    InvalidSignature { seq: u64 },

    /// Root pack wire bytes are malformed.
    #[error("malformed root pack: {0}")]
    MalformedPack(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The database has been closed.
    #[error("database is closed")]
    AlreadyClosed,

    /// A lock was poisoned by a panicking thread.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ObjectNotFound(_) | Self::FeedNotFound(_) => ErrorKind::NotFound,
            Self::InvalidChain(_) | Self::InvalidSignature { .. } | Self::MalformedPack(_) => {
                ErrorKind::InvalidChain
            }
            Self::Io(_) => ErrorKind::IoFailure,
            Self::AlreadyClosed => ErrorKind::AlreadyClosed,
            Self::Serialization(_) | Self::Config(_) | Self::LockPoisoned(_) => ErrorKind::Internal,
        }
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
