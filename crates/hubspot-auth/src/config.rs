//! OAuth client configuration
//!
//! Everything the flow needs to talk to HubSpot: client identity, secret,
//! redirect URI, endpoints and scopes. Built once at startup by the service
//! and validated before any request is served.

use common::Secret;
use url::form_urlencoded;

use crate::constants::{
    AUTHORIZATION_ENDPOINT, CONTACTS_ENDPOINT, DEFAULT_SCOPES, TOKEN_ENDPOINT,
};

/// HubSpot OAuth client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub authorization_url: String,
    pub token_url: String,
    pub contacts_url: String,
    pub scopes: Vec<String>,
}

impl ClientConfig {
    /// Config with the public HubSpot endpoints and default scopes.
    pub fn new(client_id: String, client_secret: Secret<String>, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            authorization_url: AUTHORIZATION_ENDPOINT.to_string(),
            token_url: TOKEN_ENDPOINT.to_string(),
            contacts_url: CONTACTS_ENDPOINT.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Fail fast on settings that would make every flow fail later.
    pub fn validate(&self) -> common::Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(common::Error::MissingSetting("client_id"));
        }
        if self.client_secret.is_blank() {
            return Err(common::Error::MissingSetting("client_secret"));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(common::Error::MissingSetting("redirect_uri"));
        }

        for (name, value) in [
            ("redirect_uri", &self.redirect_uri),
            ("authorization_url", &self.authorization_url),
            ("token_url", &self.token_url),
            ("contacts_url", &self.contacts_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {value}"
                )));
            }
        }

        if self.scopes.iter().all(|s| s.trim().is_empty()) {
            return Err(common::Error::Config(
                "at least one OAuth scope is required".into(),
            ));
        }

        Ok(())
    }

    /// Space-separated scope list as sent to the provider.
    pub fn scope_string(&self) -> String {
        self.scopes
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build the authorization URL the user is redirected to.
    ///
    /// `state` is the encoded `FlowState` token; `challenge` the S256 PKCE
    /// challenge. All values are form-urlencoded.
    pub fn authorization_url(&self, state: &str, challenge: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scope_string())
            .append_pair("state", state)
            .append_pair("code_challenge", challenge)
            .append_pair("code_challenge_method", "S256")
            .finish();

        let separator = if self.authorization_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!("{}{separator}{query}", self.authorization_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ClientConfig {
        ClientConfig::new(
            "client-123".into(),
            Secret::new("secret-456".to_string()),
            "http://localhost:8000/integrations/hubspot/oauth2callback".into(),
        )
    }

    fn query_pairs(url: &str) -> Vec<(String, String)> {
        let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
        form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    #[test]
    fn defaults_point_at_hubspot() {
        let config = test_config();
        assert_eq!(config.authorization_url, AUTHORIZATION_ENDPOINT);
        assert_eq!(config.token_url, TOKEN_ENDPOINT);
        assert_eq!(config.contacts_url, CONTACTS_ENDPOINT);
        assert!(config.scopes.iter().any(|s| s == "crm.objects.contacts.read"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn authorization_url_contains_required_params() {
        let config = test_config();
        let url = config.authorization_url("c3RhdGU=", "challenge-abc");

        assert!(url.starts_with(AUTHORIZATION_ENDPOINT));
        let pairs = query_pairs(&url);
        let get = |k: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("client_id"), Some("client-123"));
        assert_eq!(get("redirect_uri"), Some(config.redirect_uri.as_str()));
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(get("state"), Some("c3RhdGU="));
        assert_eq!(get("code_challenge"), Some("challenge-abc"));
        assert_eq!(get("code_challenge_method"), Some("S256"));
        assert_eq!(get("scope"), Some(config.scope_string().as_str()));
    }

    #[test]
    fn authorization_url_appends_to_existing_query() {
        let mut config = test_config();
        config.authorization_url = "https://app.hubspot.com/oauth/authorize?portal=1".into();
        let url = config.authorization_url("s", "c");
        assert!(url.starts_with("https://app.hubspot.com/oauth/authorize?portal=1&client_id="));
    }

    #[test]
    fn scope_string_skips_blank_entries() {
        let mut config = test_config();
        config.scopes = vec!["oauth".into(), " ".into(), "timeline".into()];
        assert_eq!(config.scope_string(), "oauth timeline");
    }

    #[test]
    fn validate_requires_client_secret() {
        let mut config = test_config();
        config.client_secret = Secret::new(String::new());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("client_secret"), "got: {err}");
    }

    #[test]
    fn validate_requires_redirect_uri() {
        let mut config = test_config();
        config.redirect_uri = "  ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("redirect_uri"), "got: {err}");
    }

    #[test]
    fn validate_rejects_schemeless_urls() {
        let mut config = test_config();
        config.token_url = "api.hubapi.com/oauth/v1/token".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("token_url"), "got: {err}");
    }

    #[test]
    fn validate_requires_scopes() {
        let mut config = test_config();
        config.scopes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let debug = format!("{:?}", test_config());
        assert!(!debug.contains("secret-456"));
        assert!(debug.contains("[REDACTED]"));
    }
}
