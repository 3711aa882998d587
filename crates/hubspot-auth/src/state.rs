//! Anti-forgery state token
//!
//! The `state` parameter binds a random nonce to the identity that started
//! the flow. It goes out in the authorization URL as URL-safe base64 of a
//! small JSON object and a copy is kept in the session store. At callback
//! time the nonce from the returned token must equal the stored nonce.

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{self, GeneralPurpose};
use base64::engine::DecodePaddingMode;
use rand::RngExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Padded on encode, tolerant of stripped padding on decode (some clients
/// trim trailing `=` from query values).
const STATE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    general_purpose::PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const NONCE_BYTES: usize = 32;

/// Identity and nonce carried through the provider round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowState {
    #[serde(rename = "state")]
    pub nonce: String,
    pub user_id: String,
    pub org_id: String,
}

impl FlowState {
    /// New state for `(user_id, org_id)` with a fresh random nonce.
    pub fn new(user_id: &str, org_id: &str) -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        rand::rng().fill(&mut bytes);
        Self {
            nonce: general_purpose::URL_SAFE_NO_PAD.encode(bytes),
            user_id: user_id.to_owned(),
            org_id: org_id.to_owned(),
        }
    }

    /// JSON form, as kept in the session store.
    pub fn to_json(&self) -> String {
        // Three string fields always serialize
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse the JSON form read back from the session store.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let state: FlowState = serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidState(format!("stored state is not valid JSON: {e}")))?;
        state.require_identity()
    }

    /// Opaque token placed in the authorization URL.
    pub fn encode(&self) -> String {
        STATE_ENGINE.encode(self.to_json())
    }

    /// Decode a token returned on the callback.
    pub fn decode(token: &str) -> Result<Self> {
        let bytes = STATE_ENGINE
            .decode(token.trim())
            .map_err(|e| Error::InvalidState(format!("not base64: {e}")))?;
        let json = std::str::from_utf8(&bytes)
            .map_err(|e| Error::InvalidState(format!("not UTF-8: {e}")))?;
        let state: FlowState = serde_json::from_str(json)
            .map_err(|e| Error::InvalidState(format!("not a state object: {e}")))?;
        state.require_identity()
    }

    /// Whether `other` carries the same nonce.
    pub fn nonce_matches(&self, other: &FlowState) -> bool {
        self.nonce == other.nonce
    }

    fn require_identity(self) -> Result<Self> {
        if self.nonce.is_empty() || self.user_id.is_empty() || self.org_id.is_empty() {
            return Err(Error::InvalidState(
                "state must carry nonce, user_id and org_id".into(),
            ));
        }
        Ok(self)
    }
}
