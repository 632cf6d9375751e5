//! Opaque state parameter codec.
//!
//! The state value carried through the redirect round trip binds three
//! things into one URL-safe string: a library-minted correlation id, the
//! interaction kind that produced the request, and whatever opaque state the
//! caller asked to carry. The identity provider echoes the value back
//! verbatim; decoding it on the return leg is how a response finds the
//! request that produced it.
//!
//! Wire shape: `base64url(libraryState)` optionally followed by `|` and the
//! caller's state. The caller segment is passed through untouched, so it may
//! itself contain the delimiter; only the first `|` splits.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// The way a request reaches the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    /// Full-page redirect.
    Redirect,
    /// Popup window.
    Popup,
    /// Hidden silent renewal.
    Silent,
}

impl InteractionKind {
    /// Returns the wire name of this interaction kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redirect => "redirect",
            Self::Popup => "popup",
            Self::Silent => "silent",
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The library-owned half of the state value.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LibraryState {
    id: String,
    interaction_kind: InteractionKind,
}

/// Decoded contents of a state parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolState {
    /// Correlation id namespacing every temporary cache key of the request.
    pub correlation_id: String,

    /// The interaction kind the request was started with.
    pub interaction: InteractionKind,

    /// Caller-supplied opaque state, echoed back to the caller untouched.
    pub caller_state: Option<String>,
}

impl ProtocolState {
    /// Creates a state with an explicit correlation id.
    #[must_use]
    pub fn new(
        correlation_id: impl Into<String>,
        interaction: InteractionKind,
        caller_state: Option<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            interaction,
            caller_state,
        }
    }

    /// Creates a state with a freshly minted correlation id.
    ///
    /// Every request gets its own id. Cache keys are namespaced by this id
    /// rather than the caller's state string, so two concurrent requests
    /// carrying the same caller state never share keys.
    #[must_use]
    pub fn generate(interaction: InteractionKind, caller_state: Option<&str>) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            interaction,
            caller_state: caller_state.map(str::to_string),
        }
    }

    /// Encodes this state into its wire form.
    ///
    /// # Panics
    ///
    /// Panics if the library segment cannot be serialized, which cannot
    /// happen for these field types.
    #[must_use]
    pub fn encode(&self) -> String {
        let library = LibraryState {
            id: self.correlation_id.clone(),
            interaction_kind: self.interaction,
        };
        let json = serde_json::to_string(&library).expect("library state serializes to JSON");
        let encoded = URL_SAFE_NO_PAD.encode(json.as_bytes());

        match &self.caller_state {
            Some(caller) => format!("{encoded}|{caller}"),
            None => encoded,
        }
    }

    /// Decodes a state value received from the identity provider.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the value is empty, the library segment is
    /// not base64url JSON, or the correlation id is missing. Malformed input
    /// never yields partial data.
    pub fn parse(state: &str) -> Result<Self, AuthError> {
        if state.is_empty() {
            return Err(AuthError::invalid_state("state is empty"));
        }

        let (library_segment, caller_state) = match state.split_once('|') {
            Some((library, caller)) => (library, Some(caller.to_string())),
            None => (state, None),
        };

        let decoded = URL_SAFE_NO_PAD.decode(library_segment).map_err(|e| {
            AuthError::invalid_state(format!("library segment is not base64url: {e}"))
        })?;

        let library: LibraryState = serde_json::from_slice(&decoded).map_err(|e| {
            AuthError::invalid_state(format!("library segment is not valid JSON: {e}"))
        })?;

        if library.id.is_empty() {
            return Err(AuthError::invalid_state("correlation id is missing"));
        }

        Ok(Self {
            correlation_id: library.id,
            interaction: library.interaction_kind,
            caller_state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_with_caller_state() {
        let state = ProtocolState::generate(InteractionKind::Popup, Some("caller-data"));
        let decoded = ProtocolState::parse(&state.encode()).unwrap();

        assert_eq!(decoded, state);
        assert_eq!(decoded.caller_state.as_deref(), Some("caller-data"));
    }

    #[test]
    fn test_round_trip_without_caller_state() {
        let state = ProtocolState::generate(InteractionKind::Redirect, None);
        let encoded = state.encode();
        assert!(!encoded.contains('|'));

        let decoded = ProtocolState::parse(&encoded).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_caller_state_may_contain_delimiter() {
        let state = ProtocolState::generate(InteractionKind::Silent, Some("a|b|c"));
        let decoded = ProtocolState::parse(&state.encode()).unwrap();

        assert_eq!(decoded.caller_state.as_deref(), Some("a|b|c"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let first = ProtocolState::generate(InteractionKind::Redirect, None);
        let second = ProtocolState::generate(InteractionKind::Redirect, None);
        assert_ne!(first.correlation_id, second.correlation_id);
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(
            ProtocolState::parse(""),
            Err(AuthError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_truncated_segment() {
        let state = ProtocolState::generate(InteractionKind::Popup, None);
        let encoded = state.encode();
        let truncated = &encoded[..encoded.len() / 2];

        assert!(ProtocolState::parse(truncated).is_err());
    }

    #[test]
    fn test_parse_rejects_non_json_segment() {
        let bogus = URL_SAFE_NO_PAD.encode(b"plain text");
        assert!(matches!(
            ProtocolState::parse(&bogus),
            Err(AuthError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_missing_id() {
        let json = br#"{"id":"","interactionKind":"popup"}"#;
        let encoded = URL_SAFE_NO_PAD.encode(json);
        assert!(matches!(
            ProtocolState::parse(&encoded),
            Err(AuthError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_plain_caller_state() {
        assert!(ProtocolState::parse("just-some-caller-state").is_err());
    }
}
