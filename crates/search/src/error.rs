use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Cannot parse query at offset {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    #[error("Store error: {0}")]
    StoreError(#[from] codesearch_store::StoreError),

    #[error("Indexer error: {0}")]
    IndexerError(#[from] codesearch_indexer::IndexerError),

    #[error("{0}")]
    Other(String),
}

impl SearchError {
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}
