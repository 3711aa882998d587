//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The HubSpot client secret is loaded from the HUBSPOT_CLIENT_SECRET env
//! var or client_secret_file, never stored in the TOML directly to avoid
//! leaking secrets.

use common::Secret;
use hubspot_auth::{AUTHORIZATION_ENDPOINT, CONTACTS_ENDPOINT, ClientConfig, DEFAULT_SCOPES, TOKEN_ENDPOINT};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable holding the HubSpot client secret.
pub const CLIENT_SECRET_ENV: &str = "HUBSPOT_CLIENT_SECRET";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub hubspot: HubSpotConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Timeout for calls to HubSpot (token exchange, contact listing)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// HubSpot OAuth client settings
#[derive(Debug, Deserialize)]
pub struct HubSpotConfig {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default = "default_authorization_url")]
    pub authorization_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_contacts_url")]
    pub contacts_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Path to a file containing the client secret (alternative to the env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
}

/// Durable token archive settings
#[derive(Debug, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_enabled")]
    pub enabled: bool,
    #[serde(default = "default_archive_dir")]
    pub dir: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: default_archive_enabled(),
            dir: default_archive_dir(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    256
}

fn default_authorization_url() -> String {
    AUTHORIZATION_ENDPOINT.to_string()
}

fn default_token_url() -> String {
    TOKEN_ENDPOINT.to_string()
}

fn default_contacts_url() -> String {
    CONTACTS_ENDPOINT.to_string()
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
}

fn default_archive_enabled() -> bool {
    true
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("tokens")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. HUBSPOT_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    ///
    /// Fails when no secret is found or the resulting client settings do not
    /// validate.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        // Resolve client secret: env var takes precedence over file
        if let Ok(secret) = std::env::var(CLIENT_SECRET_ENV) {
            config.hubspot.client_secret = Some(Secret::from(secret));
        } else if let Some(ref secret_file) = config.hubspot.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.hubspot.client_secret = Some(Secret::from(secret));
            }
        }

        config.client_config()?.validate()?;
        Ok(config)
    }

    /// OAuth client settings for the flow.
    pub fn client_config(&self) -> common::Result<ClientConfig> {
        let secret = self
            .hubspot
            .client_secret
            .clone()
            .ok_or(common::Error::MissingSetting("client_secret"))?;

        Ok(ClientConfig {
            client_id: self.hubspot.client_id.clone(),
            client_secret: secret,
            redirect_uri: self.hubspot.redirect_uri.clone(),
            authorization_url: self.hubspot.authorization_url.clone(),
            token_url: self.hubspot.token_url.clone(),
            contacts_url: self.hubspot.contacts_url.clone(),
            scopes: self.hubspot.scopes.clone(),
        })
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("integrations-api.toml")
    }
}
