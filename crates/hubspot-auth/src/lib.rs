//! HubSpot OAuth primitives
//!
//! Stateless building blocks for the HubSpot authorization code flow with
//! PKCE: verifier/challenge generation, the anti-forgery state token, the
//! client configuration, the code-for-token exchange and the durable token
//! archive. The stateful flow (session store, callback state machine) lives
//! in `hubspot-flow`; this crate has no dependency on it and can be tested
//! on its own.
//!
//! Credential flow:
//! 1. `pkce::PkcePair::generate()` + `state::FlowState::new()`
//! 2. User authorizes via `ClientConfig::authorization_url()`
//! 3. Callback decodes the returned token with `FlowState::decode()`
//! 4. `token::exchange_code()` trades the code + verifier for a `TokenBundle`
//! 5. `archive::TokenArchive::save()` keeps a durable snapshot

pub mod archive;
pub mod config;
pub mod constants;
pub mod error;
pub mod pkce;
pub mod state;
pub mod token;

pub use archive::{ArchivedTokens, FileArchive, TokenArchive};
pub use config::ClientConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use pkce::{PkcePair, compute_challenge, generate_verifier};
pub use state::FlowState;
pub use token::{TokenBundle, exchange_code};
