//! CRM contact listing
//!
//! Lists contacts with a stored bearer token and projects each record onto
//! the provider-neutral `IntegrationItem`.

use hubspot_auth::{CONTACT_URL_BASE, CONTACTS_PAGE_LIMIT, TokenBundle};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::metrics;

const UNKNOWN_CONTACT: &str = "Unknown Contact";

/// One external record, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub name: String,
    pub creation_time: Option<String>,
    pub last_modified_time: Option<String>,
    pub url: String,
}

impl IntegrationItem {
    /// Build an item from a contact record of the CRM v3 API.
    ///
    /// Name is `"<firstname> <lastname>"` trimmed, else the email, else a
    /// placeholder.
    pub fn from_contact(contact: &serde_json::Value) -> Self {
        let id = match contact.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        let property = |name: &str| {
            contact
                .get("properties")
                .and_then(|p| p.get(name))
                .and_then(|v| v.as_str())
                .unwrap_or("")
        };

        let full_name = format!("{} {}", property("firstname"), property("lastname"));
        let full_name = full_name.trim();
        let name = if !full_name.is_empty() {
            full_name.to_string()
        } else if !property("email").is_empty() {
            property("email").to_string()
        } else {
            UNKNOWN_CONTACT.to_string()
        };

        let timestamp = |field: &str| {
            contact
                .get(field)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        Self {
            url: format!("{CONTACT_URL_BASE}/{id}"),
            id,
            item_type: "Contact".to_string(),
            name,
            creation_time: timestamp("createdAt"),
            last_modified_time: timestamp("updatedAt"),
        }
    }
}

#[derive(Deserialize)]
struct ContactsPage {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

/// Fetch up to one page of contacts using the bundle's bearer token.
pub async fn fetch_items(
    client: &reqwest::Client,
    contacts_url: &str,
    tokens: &TokenBundle,
) -> Result<Vec<IntegrationItem>> {
    let access_token = tokens
        .access_token()
        .ok_or_else(|| Error::InvalidCredentials("no access token found".into()))?;

    let response = client
        .get(contacts_url)
        .bearer_auth(access_token)
        .query(&[("limit", CONTACTS_PAGE_LIMIT)])
        .send()
        .await
        .map_err(|e| Error::Upstream(format!("contacts request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        warn!(%status, "contacts listing rejected");
        return Err(Error::Upstream(format!(
            "contacts endpoint returned {status}: {body}"
        )));
    }

    let page = response
        .json::<ContactsPage>()
        .await
        .map_err(|e| Error::Upstream(format!("invalid contacts response: {e}")))?;

    let items: Vec<IntegrationItem> = page.results.iter().map(IntegrationItem::from_contact).collect();
    metrics::record_contacts_fetched(items.len());
    debug!(count = items.len(), "fetched contacts");
    Ok(items)
}
