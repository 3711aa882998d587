//! Session store key layout
//!
//! Every key is scoped by `(org_id, user_id)` so flows of different
//! identities never collide:
//!
//! - `hubspot_state:<org_id>:<user_id>`
//! - `hubspot_verifier:<org_id>:<user_id>`
//! - `hubspot_credentials:<org_id>:<user_id>`
//!
//! Each id is form-urlencoded before joining, so an id containing `:` is
//! escaped and can never shift the boundary between org and user. Ids made
//! of `[A-Za-z0-9._*-]` are unchanged.

use hubspot_auth::INTEGRATION_KEY;
use url::form_urlencoded::byte_serialize;

/// The three store keys belonging to one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    pub state: String,
    pub verifier: String,
    pub credentials: String,
}

impl StoreKeys {
    pub fn new(org_id: &str, user_id: &str) -> Self {
        let org_id = key_component(org_id);
        let user_id = key_component(user_id);
        Self {
            state: format!("{INTEGRATION_KEY}_state:{org_id}:{user_id}"),
            verifier: format!("{INTEGRATION_KEY}_verifier:{org_id}:{user_id}"),
            credentials: format!("{INTEGRATION_KEY}_credentials:{org_id}:{user_id}"),
        }
    }
}

fn key_component(id: &str) -> String {
    byte_serialize(id.as_bytes()).collect()
}
