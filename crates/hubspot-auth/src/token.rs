//! Authorization code exchange
//!
//! POSTs the authorization code and PKCE verifier to the HubSpot token
//! endpoint. The response is kept as an opaque JSON document: the flow only
//! passes it through to the session store and the archive, and reads
//! nothing from it except the bearer token when listing contacts.

use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Raw token response issued by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenBundle(serde_json::Value);

impl TokenBundle {
    pub fn new(raw: serde_json::Value) -> Self {
        Self(raw)
    }

    /// Bearer token, if the bundle carries a non-blank one.
    pub fn access_token(&self) -> Option<&str> {
        self.0
            .get("access_token")
            .and_then(|v| v.as_str())
            .filter(|t| !t.trim().is_empty())
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_json(self) -> serde_json::Value {
        self.0
    }
}

/// Exchange an authorization code for tokens.
///
/// Sends the code together with the PKCE verifier that produced the
/// challenge in the authorization URL. Any non-success status is a failed
/// exchange; nothing is retried.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &ClientConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenBundle> {
    let response = client
        .post(&config.token_url)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose().as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("code", code),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenBundle>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))
}
