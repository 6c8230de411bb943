use thiserror::Error;

/// Failures that stop the pipeline before any entity is processed.
///
/// This is the only error class that crosses component boundaries; every
/// other failure degrades to "no data" inside the component that saw it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Outcome of a single outbound call or payload parse.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected payload: {0}")]
    Parse(String),
}

impl FetchError {
    /// Network errors, timeouts, throttling and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }

    /// Classify an HTTP status code that is not a success.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => FetchError::NotFound(message),
            408 | 429 | 500..=599 => FetchError::Transient(format!("HTTP {}: {}", status, message)),
            _ => FetchError::Rejected { status, message },
        }
    }
}
