use cxo_types::{Digest, ErrorKind};

/// Errors from schema registration and value encoding/decoding.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    /// No schema is registered under this name.
    #[error("unknown schema: {0}")]
    UnknownSchema(String),

    /// A schema with this name is already registered.
    #[error("schema already registered: {0}")]
    DuplicateName(String),

    /// Two names describe the same structure.
    #[error("schema {name} has the same fingerprint as {existing} ({fingerprint})")]
    FingerprintConflict {
        name: String,
        existing: String,
        fingerprint: Digest,
    },

    /// The schema description itself is unusable.
    #[error("invalid schema {schema}: {reason}")]
    InvalidSchema { schema: String, reason: String },

    /// Registration attempted after the registry was frozen.
    #[error("registry is frozen; cannot register {0}")]
    Frozen(String),

    /// A value does not have the kind its field declares.
    #[error("field {field}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// A record has the wrong number of fields for its schema.
    #[error("schema {schema}: expected {expected} fields, got {actual}")]
    ArityMismatch {
        schema: String,
        expected: usize,
        actual: usize,
    },

    /// A record's field is not the one its schema declares at that position.
    #[error("schema {schema}: expected field {expected}, found {found}")]
    FieldName {
        schema: String,
        expected: String,
        found: String,
    },

    /// A reference still holds an unsaved value and has no digest yet.
    #[error("field {0} holds an unsaved reference")]
    UnsavedReference(String),

    /// A reference collection was changed before its elements were loaded.
    #[error("reference collection {0} is not loaded")]
    NotLoaded(Digest),

    /// Encoded bytes end before the value does.
    #[error("truncated: need {needed} more bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// Encoded bytes continue after the value ends.
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    /// Encoded bytes are not a valid value of the declared kind.
    #[error("malformed value: {0}")]
    Malformed(String),
}

impl SchemaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Frozen(_) => ErrorKind::FrozenRegistry,
            Self::NotLoaded(_) => ErrorKind::Internal,
            _ => ErrorKind::SchemaMismatch,
        }
    }
}

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
