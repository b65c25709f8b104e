//! Error taxonomy shared by every middleware.

/// Result type for edge handler operations.
pub type Result<T> = std::result::Result<T, EdgeError>;

/// Errors raised while producing a response for a request context.
#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    /// The wrapped handler failed.
    #[error("handler failed: {0}")]
    Handler(anyhow::Error),

    /// The cache store failed to match or put an entry.
    #[error("cache {operation} failed: {message}")]
    Cache {
        /// The failing store operation (`match` or `put`).
        operation: &'static str,
        /// Store-specific failure description.
        message: String,
    },

    /// The origin fetch failed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// No route matched and no origin is configured to pass the event through.
    #[error("no origin configured for unmatched request to {0}")]
    NoOrigin(String),

    /// A header name or value could not be represented.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader {
        /// Offending header name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A URL could not be parsed or resolved.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A background task registered on the event failed.
    #[error("background task failed: {0}")]
    Background(String),
}

impl EdgeError {
    /// Wrap any error as a handler fault.
    pub fn handler(err: impl Into<anyhow::Error>) -> Self {
        Self::Handler(err.into())
    }

    /// Build a handler fault from a message.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Self::Handler(anyhow::anyhow!("{}", message))
    }

    /// Build a cache-store fault.
    pub fn cache(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Cache {
            operation,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_header(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidHeader {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Diagnostic text for debug output.
    ///
    /// Handler faults render their full cause chain (and backtrace, when one
    /// was captured); every other variant renders its display form.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Handler(err) => format!("{:?}", err),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for EdgeError {
    fn from(err: anyhow::Error) -> Self {
        Self::Handler(err)
    }
}
