use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("collection '{0}' does not exist")]
    UnknownCollection(String),

    #[error("duplicate value for unique field '{field}': {value}")]
    Duplicate { field: String, value: String },

    #[error("document {0} not found")]
    NotFound(Uuid),

    #[error("write-ahead log error: {0}")]
    Wal(#[from] std::io::Error),
}
