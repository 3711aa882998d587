//! HubSpot integration constants
//!
//! Endpoint defaults and lifetimes for the OAuth flow. Client identity and
//! secrets are never constants; they arrive through `ClientConfig`.

use std::time::Duration;

/// Integration name used as the prefix of session store keys and archive
/// file names.
pub const INTEGRATION_KEY: &str = "hubspot";

/// Display name written into archived token snapshots.
pub const INTEGRATION_NAME: &str = "HubSpot";

/// Default authorization endpoint (user-facing consent page)
pub const AUTHORIZATION_ENDPOINT: &str = "https://app.hubspot.com/oauth/authorize";

/// Default token endpoint for code exchange
pub const TOKEN_ENDPOINT: &str = "https://api.hubapi.com/oauth/v1/token";

/// Default CRM contacts listing endpoint
pub const CONTACTS_ENDPOINT: &str = "https://api.hubapi.com/crm/v3/objects/contacts";

/// Base of the canonical contact URL in the HubSpot UI
pub const CONTACT_URL_BASE: &str = "https://app.hubspot.com/contacts";

/// Scopes requested when the configuration does not list any.
pub const DEFAULT_SCOPES: &[&str] = &[
    "crm.objects.contacts.read",
    "crm.objects.contacts.write",
    "crm.objects.companies.read",
    "crm.objects.deals.read",
    "oauth",
];

/// Lifetime of the anti-forgery state and PKCE verifier (10 minutes).
pub const FLOW_TTL: Duration = Duration::from_secs(600);

/// Lifetime of the one-shot credential copy in the session store (1 hour).
pub const CREDENTIALS_TTL: Duration = Duration::from_secs(3600);

/// Maximum number of contacts requested per listing call.
pub const CONTACTS_PAGE_LIMIT: u32 = 100;
