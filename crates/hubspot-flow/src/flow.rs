//! OAuth flow driver
//!
//! `OAuthFlow` owns the client configuration, the session store, the HTTP
//! client and the optional token archive. It performs the I/O for each step
//! and reports progress to the callback state machine.
//!
//! Paired store operations (state + verifier writes, reads and deletes) are
//! issued together with `tokio::join!`; both results are collected and
//! inspected before the next step.
//!
//! Two flows started concurrently for the same `(org_id, user_id)` are not
//! serialized: the later `authorize` overwrites the earlier state and
//! verifier, and the earlier callback then fails with `StateMismatch`.

use std::sync::Arc;

use hubspot_auth::{
    ArchivedTokens, ClientConfig, CREDENTIALS_TTL, FLOW_TTL, FlowState, PkcePair, TokenArchive,
    TokenBundle,
};
use session_store::SessionStore;
use tracing::{debug, info, warn};

use crate::callback::{CallbackEvent, CallbackParams, CallbackState, Rejection, advance};
use crate::error::{Error, Result};
use crate::items::{IntegrationItem, fetch_items};
use crate::keys::StoreKeys;
use crate::metrics::{self, ArchiveResult};

/// Identity whose flow completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub user_id: String,
    pub org_id: String,
}

/// HubSpot authorization code flow on top of a session store.
#[derive(Clone)]
pub struct OAuthFlow {
    config: Arc<ClientConfig>,
    store: Arc<dyn SessionStore>,
    archive: Option<Arc<dyn TokenArchive>>,
    http: reqwest::Client,
}

impl OAuthFlow {
    /// Validate `config` and build a flow without archival.
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn SessionStore>,
        http: reqwest::Client,
    ) -> common::Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            store,
            archive: None,
            http,
        })
    }

    /// Keep a durable snapshot of every token response in `archive`.
    pub fn with_archive(mut self, archive: Arc<dyn TokenArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn archive_enabled(&self) -> bool {
        self.archive.is_some()
    }

    /// Start a flow for `(user_id, org_id)` and return the authorization URL.
    ///
    /// State and verifier are written together with a 10 minute TTL. If
    /// either write fails both keys are removed again and no URL is
    /// returned; the caller retries the whole initiation.
    pub async fn authorize(&self, user_id: &str, org_id: &str) -> Result<String> {
        if user_id.trim().is_empty() || org_id.trim().is_empty() {
            return Err(Error::MalformedRequest(
                "user_id and org_id are required".into(),
            ));
        }

        let keys = StoreKeys::new(org_id, user_id);
        let state = FlowState::new(user_id, org_id);
        let pkce = PkcePair::generate();

        let (state_written, verifier_written) = tokio::join!(
            self.store
                .set(&keys.state, state.to_json().into_bytes(), FLOW_TTL),
            self.store
                .set(&keys.verifier, pkce.verifier.clone().into_bytes(), FLOW_TTL),
        );

        if let Err(e) = &state_written {
            warn!(org_id, user_id, error = %e, "failed to store OAuth state");
        }
        if let Err(e) = &verifier_written {
            warn!(org_id, user_id, error = %e, "failed to store PKCE verifier");
        }
        if let Err(e) = state_written.and(verifier_written) {
            self.discard_flow(&keys).await;
            return Err(Error::Store(e));
        }

        info!(org_id, user_id, "OAuth flow initiated");
        Ok(self.config.authorization_url(&state.encode(), &pkce.challenge))
    }

    /// Handle the provider redirect.
    ///
    /// On success the tokens are stored for one retrieval and the flow
    /// entries are gone. Every failure before the exchange succeeds is a
    /// rejection; see `callback.rs` for the machine.
    pub async fn callback(&self, params: &CallbackParams) -> Result<CallbackOutcome> {
        let mut state = CallbackState::AwaitingCode;
        let result = self.run_callback(&mut state, params).await;

        if let Err(e) = &result {
            let event = match state {
                CallbackState::AwaitingCode | CallbackState::Validated => {
                    CallbackEvent::Reject(Rejection::from(e))
                }
                _ => CallbackEvent::Fail,
            };
            step(&mut state, event);
        }

        metrics::record_callback(state.outcome());
        result
    }

    async fn run_callback(
        &self,
        machine: &mut CallbackState,
        params: &CallbackParams,
    ) -> Result<CallbackOutcome> {
        // Provider-side failure: no store access at all
        if let Some(detail) = params.provider_error() {
            info!(detail, "provider returned an error on callback");
            return Err(Error::Provider(detail.to_string()));
        }

        // Parameters and state token
        let (code, encoded_state) = params
            .code_and_state()
            .ok_or_else(|| Error::MalformedRequest("missing parameters".into()))?;
        let returned = FlowState::decode(encoded_state).map_err(|e| {
            debug!(error = %e, "undecodable state parameter");
            Error::MalformedRequest("invalid state".into())
        })?;

        // Server-side copies
        let keys = StoreKeys::new(&returned.org_id, &returned.user_id);
        let (saved_state, verifier) =
            tokio::join!(self.store.get(&keys.state), self.store.get(&keys.verifier));
        let (saved_state, verifier) = match (saved_state?, verifier?) {
            (Some(s), Some(v)) => (s, v),
            _ => {
                info!(
                    org_id = %returned.org_id,
                    user_id = %returned.user_id,
                    "no pending OAuth flow (expired or never started)"
                );
                return Err(Error::FlowExpired);
            }
        };
        let saved_state = FlowState::from_json(&saved_state).map_err(|e| {
            warn!(error = %e, "stored OAuth state is unreadable");
            Error::FlowExpired
        })?;
        let verifier = String::from_utf8(verifier).map_err(|_| {
            warn!("stored PKCE verifier is not UTF-8");
            Error::FlowExpired
        })?;

        // CSRF check on the nonce value
        if !saved_state.nonce_matches(&returned) {
            warn!(
                security = true,
                org_id = %returned.org_id,
                user_id = %returned.user_id,
                "OAuth state nonce mismatch, rejecting callback"
            );
            return Err(Error::StateMismatch);
        }
        step(machine, CallbackEvent::NonceMatched);

        // Exchange
        let tokens = hubspot_auth::exchange_code(&self.http, &self.config, code, &verifier)
            .await
            .map_err(|e| {
                warn!(org_id = %returned.org_id, user_id = %returned.user_id, error = %e, "token exchange failed");
                Error::ExchangeFailed(exchange_failure(&e).to_string())
            })?;
        step(machine, CallbackEvent::TokensReceived);

        // Persist: archive is best effort, the credential copy is not
        self.archive_tokens(&returned, &tokens).await;
        let credentials = serde_json::to_vec(&tokens).map_err(|e| {
            Error::InvalidCredentials(format!("token response not serializable: {e}"))
        })?;
        self.store
            .set(&keys.credentials, credentials, CREDENTIALS_TTL)
            .await?;
        step(machine, CallbackEvent::Stored);

        // Cleanup; absent keys are fine, TTL reclaims anything left over
        let (state_deleted, verifier_deleted) = tokio::join!(
            self.store.delete(&keys.state),
            self.store.delete(&keys.verifier)
        );
        for (key, result) in [(&keys.state, state_deleted), (&keys.verifier, verifier_deleted)] {
            if let Err(e) = result {
                warn!(key = %key, error = %e, "failed to delete flow entry, leaving it to expire");
            }
        }
        step(machine, CallbackEvent::CleanedUp);

        info!(
            org_id = %returned.org_id,
            user_id = %returned.user_id,
            "OAuth flow completed"
        );
        Ok(CallbackOutcome {
            user_id: returned.user_id,
            org_id: returned.org_id,
        })
    }

    /// Hand out the stored credentials exactly once.
    ///
    /// The entry is removed as it is read, so a second call for the same
    /// identity fails with `NotFound`.
    pub async fn credentials(&self, user_id: &str, org_id: &str) -> Result<TokenBundle> {
        let keys = StoreKeys::new(org_id, user_id);
        let raw = self
            .store
            .take(&keys.credentials)
            .await?
            .ok_or_else(|| Error::NotFound("no credentials found".into()))?;

        let tokens: TokenBundle = serde_json::from_slice(&raw).map_err(|e| {
            warn!(org_id, user_id, error = %e, "stored credentials are unreadable");
            Error::InvalidCredentials(format!("stored credentials are not JSON: {e}"))
        })?;

        info!(org_id, user_id, "credentials handed out");
        Ok(tokens)
    }

    /// Read the durable snapshot written at the last successful callback.
    pub async fn archived_credentials(&self, user_id: &str, org_id: &str) -> Result<TokenBundle> {
        let Some(archive) = &self.archive else {
            return Err(Error::NotFound("token archive is disabled".into()));
        };

        match archive.load(org_id, user_id).await {
            Ok(Some(snapshot)) => Ok(snapshot.tokens),
            Ok(None) => Err(Error::NotFound("no archived tokens".into())),
            Err(e) => {
                warn!(org_id, user_id, error = %e, "failed to read archived tokens");
                Err(Error::InvalidCredentials(format!(
                    "archived tokens unreadable: {e}"
                )))
            }
        }
    }

    /// List contacts with the given tokens.
    pub async fn load_items(&self, tokens: &TokenBundle) -> Result<Vec<IntegrationItem>> {
        fetch_items(&self.http, &self.config.contacts_url, tokens).await
    }

    async fn archive_tokens(&self, identity: &FlowState, tokens: &TokenBundle) {
        let Some(archive) = &self.archive else {
            debug!("token archive disabled, skipping snapshot");
            metrics::record_archive(ArchiveResult::Disabled);
            return;
        };

        let snapshot = ArchivedTokens::new(&identity.user_id, &identity.org_id, tokens.clone());
        match archive.save(&snapshot).await {
            Ok(()) => {
                debug!(org_id = %identity.org_id, user_id = %identity.user_id, "tokens archived");
                metrics::record_archive(ArchiveResult::Written);
            }
            Err(e) => {
                warn!(
                    org_id = %identity.org_id,
                    user_id = %identity.user_id,
                    error = %e,
                    "failed to archive tokens, continuing"
                );
                metrics::record_archive(ArchiveResult::Failed);
            }
        }
    }

    /// Best-effort removal of both flow entries after a failed initiation.
    async fn discard_flow(&self, keys: &StoreKeys) {
        let (state_deleted, verifier_deleted) = tokio::join!(
            self.store.delete(&keys.state),
            self.store.delete(&keys.verifier)
        );
        if state_deleted.is_err() || verifier_deleted.is_err() {
            warn!(key = %keys.state, "could not roll back partial initiation, entries will expire");
        }
    }
}

/// Caller-facing reason for a failed exchange. The provider's response body
/// only goes to the log.
fn exchange_failure(err: &hubspot_auth::Error) -> &'static str {
    match err {
        hubspot_auth::Error::Http(_) => "token endpoint unreachable",
        _ => "token endpoint did not issue tokens",
    }
}

fn step(state: &mut CallbackState, event: CallbackEvent) {
    let next = advance(*state, event);
    debug!(from = ?*state, to = ?next, ?event, "callback transition");
    *state = next;
}
