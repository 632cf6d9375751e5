//! Deterministic cache key derivation.
//!
//! Every persisted entity's key is a pure function of its own identity
//! fields. Keys are lowercase, dot-separated, and share one flat namespace
//! with the request-scoped temporary items, which are namespaced by
//! correlation id instead.
//!
//! Layout:
//!
//! ```text
//! auric.account.{homeAccountId}.{environment}.{realm}
//! auric.{homeAccountId}.{environment}.{credentialKind}.{clientId}.{realm}.{target}
//! auric.appmetadata.{environment}.{clientId}
//! auric.server-telemetry.{clientId}
//! auric.throttling.{requestHash}
//! auric.{correlationId}.{itemName}
//! ```
//!
//! Credential keys keep empty segments in place (an ID token has no target,
//! a refresh token has neither realm nor target) so every credential key has
//! the same segment count and kinds cannot collide.

use super::entity::CredentialKind;

/// Prefix shared by every key this library writes.
pub const CACHE_PREFIX: &str = "auric";

/// Segment separator inside cache keys.
pub const KEY_SEPARATOR: &str = ".";

fn join_segments(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|segment| segment.to_lowercase())
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// Derives the storage key for an account entity.
#[must_use]
pub fn account_key(home_account_id: &str, environment: &str, realm: &str) -> String {
    join_segments(&[CACHE_PREFIX, "account", home_account_id, environment, realm])
}

/// Derives the storage key for a credential entity.
///
/// `client_id` is the owning client for ID and access tokens; for refresh
/// tokens that belong to a token family it is the family id instead, so one
/// key serves every client in the family. Pass `""` for segments the kind
/// does not carry.
#[must_use]
pub fn credential_key(
    home_account_id: &str,
    environment: &str,
    kind: CredentialKind,
    client_id: &str,
    realm: &str,
    target: &str,
) -> String {
    join_segments(&[
        CACHE_PREFIX,
        home_account_id,
        environment,
        kind.as_str(),
        client_id,
        realm,
        target,
    ])
}

/// Derives the storage key for an app metadata entity.
#[must_use]
pub fn app_metadata_key(environment: &str, client_id: &str) -> String {
    join_segments(&[CACHE_PREFIX, "appmetadata", environment, client_id])
}

/// Derives the storage key for the server telemetry entity of a client.
#[must_use]
pub fn server_telemetry_key(client_id: &str) -> String {
    join_segments(&[CACHE_PREFIX, "server-telemetry", client_id])
}

/// Derives the storage key for a throttling entity from its request hash.
#[must_use]
pub fn throttling_key(request_hash: &str) -> String {
    join_segments(&[CACHE_PREFIX, "throttling", request_hash])
}

/// Derives the storage key for a request-scoped temporary item.
#[must_use]
pub fn temporary_key(correlation_id: &str, item_name: &str) -> String {
    join_segments(&[CACHE_PREFIX, correlation_id, item_name])
}

/// Derives the storage key for a temporary item that is not bound to a
/// correlation id (origin URI, serialized request params, interaction
/// status).
#[must_use]
pub fn fixed_temporary_key(item_name: &str) -> String {
    join_segments(&[CACHE_PREFIX, item_name])
}

/// Normalizes a scope list into the canonical target segment: lowercased,
/// deduplicated, sorted, space-joined.
#[must_use]
pub fn normalize_target(scopes: &[&str]) -> String {
    let mut normalized: Vec<String> = scopes
        .iter()
        .map(|scope| scope.trim().to_lowercase())
        .filter(|scope| !scope.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized.join(" ")
}
