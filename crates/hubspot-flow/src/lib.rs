//! HubSpot OAuth flow state machine
//!
//! Drives the authorization code flow end to end on top of a
//! `SessionStore`: starting a flow, validating the provider callback,
//! exchanging the code, handing out credentials exactly once, and listing
//! CRM contacts with the resulting token.
//!
//! Flow lifecycle:
//! 1. `OAuthFlow::authorize()` stores state + verifier (10 min TTL), returns the URL
//! 2. Provider redirects back → `OAuthFlow::callback()` validates and exchanges
//! 3. Tokens are archived (best effort) and stored for one read (1 h TTL)
//! 4. `OAuthFlow::credentials()` returns them once and deletes the entry
//! 5. `OAuthFlow::load_items()` lists contacts as `IntegrationItem`s

pub mod callback;
pub mod error;
pub mod flow;
pub mod items;
pub mod keys;
pub mod metrics;

pub use callback::{CallbackEvent, CallbackParams, CallbackState, Rejection};
pub use error::{Error, Result};
pub use flow::{CallbackOutcome, OAuthFlow};
pub use items::{IntegrationItem, fetch_items};
pub use keys::StoreKeys;
