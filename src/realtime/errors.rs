use thiserror::Error;

/// Errors surfaced by the connection manager and emission gateway
///
/// Cloneable so that every caller waiting on a shared connection attempt
/// observes the same outcome.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RealtimeError {
    #[error("Not authenticated: no user identity is bound")]
    Unauthenticated,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection unavailable: {0}")]
    ConnectionUnavailable(String),

    #[error("Server error: {0}")]
    RemoteError(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Connection attempt cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for RealtimeError {
    fn from(e: serde_json::Error) -> Self {
        RealtimeError::ProtocolViolation(e.to_string())
    }
}
