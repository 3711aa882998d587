//! Callback state machine
//!
//! Pure state machine: receives events, returns the next state. The flow
//! (`flow.rs`) performs the I/O and reports what happened as events.
//!
//! ```text
//! AwaitingCode → Validated → Exchanged → Persisted → CleanedUp
//!      └────────────┴──→ Rejected (any failure before the exchange succeeds)
//!                  Exchanged/Persisted ──→ Failed (store write after exchange)
//! ```

use serde::Deserialize;

use crate::error::Error;

/// Query parameters on the provider redirect.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Provider error detail, if the redirect carries an `error` parameter.
    ///
    /// Prefers `error_description` and falls back to the error code.
    pub fn provider_error(&self) -> Option<&str> {
        let error = self.error.as_deref().filter(|e| !e.is_empty())?;
        Some(
            self.error_description
                .as_deref()
                .filter(|d| !d.is_empty())
                .unwrap_or(error),
        )
    }

    /// `code` and `state` when both are present and non-empty.
    pub fn code_and_state(&self) -> Option<(&str, &str)> {
        let code = self.code.as_deref().filter(|c| !c.is_empty())?;
        let state = self.state.as_deref().filter(|s| !s.is_empty())?;
        Some((code, state))
    }
}

/// Why a callback was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Provider,
    MalformedRequest,
    FlowExpired,
    StateMismatch,
    ExchangeFailed,
    /// The session store failed before the exchange
    StoreUnavailable,
}

impl Rejection {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Provider => "provider_error",
            Rejection::MalformedRequest => "malformed_request",
            Rejection::FlowExpired => "flow_expired",
            Rejection::StateMismatch => "state_mismatch",
            Rejection::ExchangeFailed => "exchange_failed",
            Rejection::StoreUnavailable => "store_unavailable",
        }
    }
}

impl From<&Error> for Rejection {
    fn from(err: &Error) -> Self {
        match err {
            Error::Provider(_) => Rejection::Provider,
            Error::FlowExpired => Rejection::FlowExpired,
            Error::StateMismatch => Rejection::StateMismatch,
            Error::ExchangeFailed(_) => Rejection::ExchangeFailed,
            Error::Store(_) | Error::Upstream(_) => Rejection::StoreUnavailable,
            Error::MalformedRequest(_) | Error::NotFound(_) | Error::InvalidCredentials(_) => {
                Rejection::MalformedRequest
            }
        }
    }
}

/// Callback states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackState {
    /// Request received, nothing checked yet
    AwaitingCode,
    /// Parameters decoded and nonce matched the stored state
    Validated,
    /// Token endpoint returned tokens
    Exchanged,
    /// Tokens archived and stored for retrieval
    Persisted,
    /// Flow entries deleted; terminal success
    CleanedUp,
    /// Terminal failure before the exchange succeeded
    Rejected(Rejection),
    /// Terminal failure after tokens were issued
    Failed,
}

impl CallbackState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallbackState::CleanedUp | CallbackState::Rejected(_) | CallbackState::Failed
        )
    }

    /// Outcome label for metrics (`success`, a rejection kind, or `failed`).
    pub fn outcome(&self) -> &'static str {
        match self {
            CallbackState::CleanedUp => "success",
            CallbackState::Rejected(r) => r.as_str(),
            CallbackState::Failed => "failed",
            _ => "incomplete",
        }
    }
}

/// Events reported by the flow while handling a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackEvent {
    /// Nonce matched the stored state
    NonceMatched,
    /// Token endpoint returned 200
    TokensReceived,
    /// Archive attempted and credential copy written
    Stored,
    /// State and verifier entries deleted
    CleanedUp,
    /// A check failed
    Reject(Rejection),
    /// An operation after the exchange failed
    Fail,
}

/// Handle a state transition. Pure function: no I/O.
///
/// Events that make no sense in the current state leave it unchanged.
pub fn advance(state: CallbackState, event: CallbackEvent) -> CallbackState {
    use CallbackEvent as E;
    use CallbackState as S;

    match (state, event) {
        (S::AwaitingCode, E::NonceMatched) => S::Validated,
        (S::Validated, E::TokensReceived) => S::Exchanged,
        (S::Exchanged, E::Stored) => S::Persisted,
        (S::Persisted, E::CleanedUp) => S::CleanedUp,

        (S::AwaitingCode | S::Validated, E::Reject(reason)) => S::Rejected(reason),
        (S::Exchanged | S::Persisted, E::Fail) => S::Failed,

        (state, _event) => state,
    }
}
