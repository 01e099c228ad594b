use thiserror::Error;

/// Errors returned by the remote backend boundary.
///
/// Every variant means "not acknowledged": callers keep the affected entry
/// and retry later.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Request could not be sent or the response could not be read
    #[error("Transport error: {0}")]
    Transport(String),

    /// No response within the configured timeout
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Server answered with a status other than the expected one
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Status was right but the body lacked the expected shape
    #[error("Unexpected response body: {0}")]
    UnexpectedBody(String),
}

impl RemoteError {
    pub fn unexpected_body(reason: impl Into<String>) -> Self {
        Self::UnexpectedBody(reason.into())
    }

    /// Whether the server was reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
