//! PKCE (Proof Key for Code Exchange) per RFC 7636
//!
//! The verifier stays server-side in the session store until the callback
//! sends it to the token endpoint; only the S256 challenge travels in the
//! authorization URL. HubSpot recomputes the challenge from the verifier at
//! exchange time, so both must come from the exact transform below.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

/// Bytes of entropy behind each verifier.
const VERIFIER_BYTES: usize = 32;

/// A verifier and the challenge derived from it.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Draw a fresh verifier and derive its challenge.
    pub fn generate() -> Self {
        let verifier = generate_verifier();
        let challenge = compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// Generate a cryptographically random PKCE code verifier.
///
/// 32 random bytes encoded as URL-safe base64 without padding, which gives
/// the 43-character minimum RFC 7636 allows.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; VERIFIER_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))` with padding stripped.
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}
