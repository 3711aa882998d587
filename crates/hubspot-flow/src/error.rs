//! Error types for the OAuth flow

/// Errors surfaced by flow operations.
///
/// `is_client_error()` splits them into caller/flow faults (4xx) and
/// server or upstream faults (5xx).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The provider redirected back with an `error` parameter.
    #[error("provider error: {0}")]
    Provider(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// State or verifier is gone from the session store.
    #[error("OAuth state expired or invalid")]
    FlowExpired,

    /// Returned nonce differs from the stored one (possible CSRF).
    #[error("state parameter mismatch")]
    StateMismatch,

    #[error("failed to exchange code for token: {0}")]
    ExchangeFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("session store error: {0}")]
    Store(#[from] session_store::Error),
}

impl Error {
    /// True for faults caused by the caller or the flow itself.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Error::Upstream(_) | Error::Store(_))
    }
}

/// Result alias for flow operations.
pub type Result<T> = std::result::Result<T, Error>;
