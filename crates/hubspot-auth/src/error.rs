//! Error types for OAuth primitives

/// Errors from OAuth primitive operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid state token: {0}")]
    InvalidState(String),

    #[error("archive parse error: {0}")]
    ArchiveParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
