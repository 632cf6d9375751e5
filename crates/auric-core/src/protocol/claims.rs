//! Unverified ID token claims extraction.
//!
//! Nonce validation has to look inside the ID token before any signature
//! check can happen, so this module decodes the claims segment without
//! verifying the token. Nothing here establishes identity.
//!
//! # Security
//!
//! [`decode_id_token_claims`] performs no signature verification. Callers
//! must treat the result as untrusted input; verified-identity decisions
//! belong to the host's crypto layer.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// The claims subset this engine consumes from an ID token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer of the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Subject identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Object id of the account in its home tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,

    /// Tenant id the token was issued for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,

    /// The nonce echoed back from the authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Preferred username for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// Expiry as seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Decodes the claims segment of a compact JWT without verifying it.
///
/// # Errors
///
/// Returns `MalformedToken` if the token does not have three segments, the
/// claims segment is not base64url, or the decoded segment is not a JSON
/// object.
pub fn decode_id_token_claims(raw_token: &str) -> Result<IdTokenClaims, AuthError> {
    let mut segments = raw_token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::malformed_token(
            "ID token must have exactly three segments",
        ));
    };

    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::malformed_token(format!("claims segment is not base64url: {e}")))?;

    serde_json::from_slice(&decoded)
        .map_err(|e| AuthError::malformed_token(format!("claims segment is not valid JSON: {e}")))
}
