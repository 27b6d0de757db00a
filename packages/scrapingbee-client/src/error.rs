use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapingBeeError>;

/// Errors returned by the ScrapingBee client.
///
/// The variants separate "the target page no longer exists" from transient
/// transport/service problems so callers can decide whether retrying makes
/// sense.
#[derive(Debug, Error)]
pub enum ScrapingBeeError {
    /// The target page returned 404/410; it is gone and retrying won't help.
    #[error("target page gone (status {status})")]
    Gone { status: u16 },

    /// ScrapingBee throttled the request (concurrency or credit limit).
    #[error("request throttled (status {status}): {message}")]
    Throttled { status: u16, message: String },

    /// Any other non-success response from the API or the target.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure (DNS, TLS, timeout).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ScrapingBeeError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ScrapingBeeError::Gone { .. } => false,
            ScrapingBeeError::Throttled { .. } => true,
            ScrapingBeeError::Api { status, .. } => *status >= 500,
            ScrapingBeeError::Http(_) => true,
        }
    }
}
