use cxo_refs::RefError;
use cxo_schema::SchemaError;
use cxo_store::StoreError;
use cxo_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("reference error: {0}")]
    Ref(#[from] RefError),
}

impl ContainerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Internal,
            Self::Store(e) => e.kind(),
            Self::Schema(e) => e.kind(),
            Self::Ref(e) => e.kind(),
        }
    }
}

pub type ContainerResult<T> = Result<T, ContainerError>;
