use std::io::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Tokenizer error: {0}")]
    TokenizerError(#[from] codesearch_tokenizer::TokenizerError),

    #[error("Store error: {0}")]
    StoreError(#[from] codesearch_store::StoreError),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Cannot move index from {from} to {to}")]
    InvalidState {
        from: codesearch_protocol::IndexStatus,
        to: codesearch_protocol::IndexStatus,
    },

    #[error("Watcher error: {0}")]
    WatcherError(#[from] notify::Error),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Failures worth retrying later: the file or index is busy rather
    /// than gone or malformed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::IoError(err) => is_transient_io(err.kind()),
            Self::StoreError(codesearch_store::StoreError::IoError(err)) => {
                is_transient_io(err.kind())
            }
            Self::StoreError(codesearch_store::StoreError::Locked(_)) => true,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::IoError(err) if err.kind() == ErrorKind::NotFound)
    }
}

fn is_transient_io(kind: ErrorKind) -> bool {
    !matches!(
        kind,
        ErrorKind::NotFound | ErrorKind::InvalidInput | ErrorKind::InvalidData | ErrorKind::Unsupported
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn busy_files_are_transient_missing_files_are_not() {
        let busy = IndexerError::from(io::Error::from(ErrorKind::PermissionDenied));
        assert!(busy.is_transient());

        let gone = IndexerError::from(io::Error::from(ErrorKind::NotFound));
        assert!(!gone.is_transient());
        assert!(gone.is_not_found());

        assert!(!IndexerError::Cancelled.is_transient());
        let locked = IndexerError::from(codesearch_store::StoreError::Locked("x".into()));
        assert!(locked.is_transient());
    }
}
