//! Cache store errors.

use edge_core::EdgeError;

/// Result type for cache store operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache store errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Only `GET` requests can be stored.
    #[error("cannot store a {0} request")]
    UnsupportedMethod(String),

    /// The backend failed to look an entry up.
    #[error("match failed: {0}")]
    Match(String),

    /// The backend failed to store an entry.
    #[error("put failed: {0}")]
    Put(String),
}

impl CacheError {
    /// The store operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Match(_) => "match",
            Self::UnsupportedMethod(_) | Self::Put(_) => "put",
        }
    }
}

impl From<CacheError> for EdgeError {
    fn from(err: CacheError) -> Self {
        let message = match &err {
            CacheError::Match(message) | CacheError::Put(message) => message.clone(),
            other => other.to_string(),
        };
        EdgeError::cache(err.operation(), message)
    }
}
