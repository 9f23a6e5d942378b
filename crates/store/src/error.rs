use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Index error: {0}")]
    IndexError(#[from] tantivy::TantivyError),

    #[error("Index at {0} is locked by another writer")]
    Locked(String),

    #[error("Index writer for {0} is closed")]
    Closed(String),

    #[error("Index at {path} was created with a different schema")]
    SchemaMismatch { path: String },

    #[error("Field {0} is not part of the index schema")]
    UnknownField(String),

    #[error("{0}")]
    Other(String),
}
