use thiserror::Error;

/// Substrings identifying failures worth retrying.
pub const TRANSIENT_ERROR_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "disconnected",
    "connection reset",
    "connection closed",
    "socket hang up",
    "econnreset",
    "bad gateway",
    "service unavailable",
];

/// Errors returned by the indexer client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("api error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    ParseResponse(String),

    #[error("missing field in response: {0}")]
    MissingField(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ApiError {
    /// Whether the error matches a known transient signature.
    ///
    /// Only transport failures and 5xx responses are considered; a 4xx body
    /// echoing one of the patterns is still the caller's fault.
    pub fn is_transient(&self) -> bool {
        let msg = match self {
            ApiError::Request(msg) => msg,
            ApiError::Status { status, body } if *status >= 500 => body,
            _ => return false,
        };
        let msg = msg.to_lowercase();
        TRANSIENT_ERROR_PATTERNS.iter().any(|pattern| msg.contains(pattern))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::ParseResponse(e.to_string())
        } else if e.is_timeout() {
            ApiError::Request(format!("timeout: {e}"))
        } else {
            ApiError::Request(e.to_string())
        }
    }
}
