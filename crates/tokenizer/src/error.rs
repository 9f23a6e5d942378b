use thiserror::Error;

/// Result type for tokenizer operations
pub type Result<T> = std::result::Result<T, TokenizerError>;

/// Errors that can occur while segmenting text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizerError {
    /// A required argument was missing or malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl TokenizerError {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
