//! Persisted cache entity kinds.
//!
//! Seven entity kinds live in the durable cache: accounts, the three
//! credential kinds (ID, access, refresh tokens), app metadata, server
//! telemetry, and throttling markers. Each entity derives its own storage
//! key from its identity fields; the store never assigns keys. Two entities
//! with the same identity collide on purpose, and last write wins.
//!
//! Entities are a cache, not a source of truth: every kind carries a
//! validation predicate, and anything that fails it is treated as a cache
//! miss by the store.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use super::key;
use crate::protocol::claims::IdTokenClaims;

/// The credential kinds stored in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialKind {
    /// An OpenID Connect ID token.
    #[serde(rename = "idtoken")]
    IdToken,
    /// An OAuth2 access token.
    #[serde(rename = "accesstoken")]
    AccessToken,
    /// An OAuth2 refresh token.
    #[serde(rename = "refreshtoken")]
    RefreshToken,
}

impl CredentialKind {
    /// Returns the key segment for this credential kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdToken => "idtoken",
            Self::AccessToken => "accesstoken",
            Self::RefreshToken => "refreshtoken",
        }
    }
}

/// Discriminates the seven persisted entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEntityKind {
    /// Account records.
    Account,
    /// ID token credentials.
    IdToken,
    /// Access token credentials.
    AccessToken,
    /// Refresh token credentials.
    RefreshToken,
    /// Per-client app metadata.
    AppMetadata,
    /// Per-client server telemetry.
    ServerTelemetry,
    /// Throttling markers.
    Throttling,
}

impl CacheEntityKind {
    /// Returns the kind name used in logging.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::IdToken => "idtoken",
            Self::AccessToken => "accesstoken",
            Self::RefreshToken => "refreshtoken",
            Self::AppMetadata => "appmetadata",
            Self::ServerTelemetry => "servertelemetry",
            Self::Throttling => "throttling",
        }
    }
}

impl std::fmt::Display for CacheEntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed-in account.
///
/// Created on successful token exchange, overwritten on re-auth, removed on
/// sign-out. Accounts are shared across clients, so the client id is not
/// part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEntity {
    /// Cross-tenant account identifier.
    pub home_account_id: String,

    /// The cache environment (preferred cache host of the cloud).
    pub environment: String,

    /// The tenant the account record belongs to.
    pub realm: String,

    /// Display username (UPN or email).
    pub username: String,

    /// Tenant-local account object id.
    pub local_account_id: String,

    /// The kind of authority that issued this account.
    pub authority_type: String,
}

impl AccountEntity {
    /// Creates a new account entity.
    #[must_use]
    pub fn new(
        home_account_id: impl Into<String>,
        environment: impl Into<String>,
        realm: impl Into<String>,
        username: impl Into<String>,
        local_account_id: impl Into<String>,
        authority_type: impl Into<String>,
    ) -> Self {
        Self {
            home_account_id: home_account_id.into(),
            environment: environment.into(),
            realm: realm.into(),
            username: username.into(),
            local_account_id: local_account_id.into(),
            authority_type: authority_type.into(),
        }
    }

    /// Derives the storage key from this entity's identity fields.
    #[must_use]
    pub fn key(&self) -> String {
        key::account_key(&self.home_account_id, &self.environment, &self.realm)
    }

    /// Returns `true` if all identity fields are present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.home_account_id.is_empty() && !self.environment.is_empty() && !self.realm.is_empty()
    }
}

/// A cached ID token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdTokenEntity {
    /// Cross-tenant account identifier.
    pub home_account_id: String,

    /// The cache environment.
    pub environment: String,

    /// Credential discriminator, always [`CredentialKind::IdToken`].
    pub credential_type: CredentialKind,

    /// The client the token was issued to.
    pub client_id: String,

    /// The tenant the token was issued for.
    pub realm: String,

    /// The raw token text.
    pub secret: String,

    /// Claims subset decoded from the token, if the caller recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<IdTokenClaims>,
}

impl IdTokenEntity {
    /// Creates a new ID token entity.
    #[must_use]
    pub fn new(
        home_account_id: impl Into<String>,
        environment: impl Into<String>,
        client_id: impl Into<String>,
        realm: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            home_account_id: home_account_id.into(),
            environment: environment.into(),
            credential_type: CredentialKind::IdToken,
            client_id: client_id.into(),
            realm: realm.into(),
            secret: secret.into(),
            claims: None,
        }
    }

    /// Derives the storage key from this entity's identity fields.
    #[must_use]
    pub fn key(&self) -> String {
        key::credential_key(
            &self.home_account_id,
            &self.environment,
            CredentialKind::IdToken,
            &self.client_id,
            &self.realm,
            "",
        )
    }

    /// Returns `true` if all identity fields are present and the credential
    /// discriminator matches.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.credential_type == CredentialKind::IdToken
            && !self.home_account_id.is_empty()
            && !self.environment.is_empty()
            && !self.client_id.is_empty()
            && !self.secret.is_empty()
    }
}

/// A cached access token.
///
/// Multiple access tokens may coexist for one account, keyed by distinct
/// scope set and realm. Expired entries stay in the cache until a caller
/// policy evicts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenEntity {
    /// Cross-tenant account identifier.
    pub home_account_id: String,

    /// The cache environment.
    pub environment: String,

    /// Credential discriminator, always [`CredentialKind::AccessToken`].
    pub credential_type: CredentialKind,

    /// The client the token was issued to.
    pub client_id: String,

    /// The tenant the token was issued for.
    pub realm: String,

    /// Normalized scope set (lowercase, sorted, space-joined).
    pub target: String,

    /// The raw token text.
    pub secret: String,

    /// When the token entered the cache.
    #[serde(with = "time::serde::rfc3339")]
    pub cached_at: OffsetDateTime,

    /// When the token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_on: OffsetDateTime,

    /// Extended expiry for outage resilience, when the server granted one.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub extended_expires_on: Option<OffsetDateTime>,

    /// The token type, normally `Bearer`.
    pub token_type: String,
}

impl AccessTokenEntity {
    /// Creates a new access token entity cached at the current time.
    #[must_use]
    pub fn new(
        home_account_id: impl Into<String>,
        environment: impl Into<String>,
        client_id: impl Into<String>,
        realm: impl Into<String>,
        scopes: &[&str],
        secret: impl Into<String>,
        expires_on: OffsetDateTime,
    ) -> Self {
        Self {
            home_account_id: home_account_id.into(),
            environment: environment.into(),
            credential_type: CredentialKind::AccessToken,
            client_id: client_id.into(),
            realm: realm.into(),
            target: key::normalize_target(scopes),
            secret: secret.into(),
            cached_at: OffsetDateTime::now_utc(),
            expires_on,
            extended_expires_on: None,
            token_type: "Bearer".to_string(),
        }
    }

    /// Derives the storage key from this entity's identity fields.
    #[must_use]
    pub fn key(&self) -> String {
        key::credential_key(
            &self.home_account_id,
            &self.environment,
            CredentialKind::AccessToken,
            &self.client_id,
            &self.realm,
            &self.target,
        )
    }

    /// Returns `true` if all identity fields are present and the credential
    /// discriminator matches.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.credential_type == CredentialKind::AccessToken
            && !self.home_account_id.is_empty()
            && !self.environment.is_empty()
            && !self.client_id.is_empty()
            && !self.realm.is_empty()
            && !self.secret.is_empty()
    }

    /// Returns `true` if the token is past its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_on
    }

    /// Returns `true` if the token is expired but still inside its extended
    /// expiry window.
    #[must_use]
    pub fn is_within_extended_expiry(&self) -> bool {
        match self.extended_expires_on {
            Some(extended) => self.is_expired() && OffsetDateTime::now_utc() <= extended,
            None => false,
        }
    }

    /// Returns the individual scopes of this token.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.target.split(' ').filter(|s| !s.is_empty()).collect()
    }

    /// Returns `true` if this token covers every requested scope.
    #[must_use]
    pub fn matches_scopes(&self, requested: &[&str]) -> bool {
        let own = self.scopes();
        requested
            .iter()
            .all(|scope| own.contains(&scope.to_lowercase().as_str()))
    }
}

/// A cached refresh token.
///
/// A token that belongs to a client family is keyed by the family id, so
/// rotation by any family member replaces the one shared token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenEntity {
    /// Cross-tenant account identifier.
    pub home_account_id: String,

    /// The cache environment.
    pub environment: String,

    /// Credential discriminator, always [`CredentialKind::RefreshToken`].
    pub credential_type: CredentialKind,

    /// The client the token was issued to.
    pub client_id: String,

    /// The token family this refresh token belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_id: Option<String>,

    /// The raw token text.
    pub secret: String,
}

impl RefreshTokenEntity {
    /// Creates a new refresh token entity.
    #[must_use]
    pub fn new(
        home_account_id: impl Into<String>,
        environment: impl Into<String>,
        client_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            home_account_id: home_account_id.into(),
            environment: environment.into(),
            credential_type: CredentialKind::RefreshToken,
            client_id: client_id.into(),
            family_id: None,
            secret: secret.into(),
        }
    }

    /// Sets the token family id.
    #[must_use]
    pub fn with_family_id(mut self, family_id: impl Into<String>) -> Self {
        self.family_id = Some(family_id.into());
        self
    }

    /// Derives the storage key from this entity's identity fields.
    ///
    /// The family id, when present, takes the client id's place in the key.
    #[must_use]
    pub fn key(&self) -> String {
        let client_or_family = self.family_id.as_deref().unwrap_or(&self.client_id);
        key::credential_key(
            &self.home_account_id,
            &self.environment,
            CredentialKind::RefreshToken,
            client_or_family,
            "",
            "",
        )
    }

    /// Returns `true` if all identity fields are present and the credential
    /// discriminator matches.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.credential_type == CredentialKind::RefreshToken
            && !self.home_account_id.is_empty()
            && !self.environment.is_empty()
            && !self.client_id.is_empty()
            && !self.secret.is_empty()
    }
}

/// Per-client app metadata, currently family membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadataEntity {
    /// The cache environment.
    pub environment: String,

    /// The client this metadata describes.
    pub client_id: String,

    /// The token family the client belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_id: Option<String>,
}

impl AppMetadataEntity {
    /// Creates a new app metadata entity.
    #[must_use]
    pub fn new(environment: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            client_id: client_id.into(),
            family_id: None,
        }
    }

    /// Sets the token family id.
    #[must_use]
    pub fn with_family_id(mut self, family_id: impl Into<String>) -> Self {
        self.family_id = Some(family_id.into());
        self
    }

    /// Derives the storage key from this entity's identity fields.
    #[must_use]
    pub fn key(&self) -> String {
        key::app_metadata_key(&self.environment, &self.client_id)
    }

    /// Returns `true` if all identity fields are present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.environment.is_empty() && !self.client_id.is_empty()
    }
}

/// Per-client server telemetry counters.
///
/// Mutated on every request outcome. The store caps the recorded failure
/// lists; the entity itself only accumulates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTelemetryEntity {
    /// The client these counters belong to.
    pub client_id: String,

    /// Number of responses served from cache since the last reset.
    #[serde(default)]
    pub cache_hits: u64,

    /// Correlation ids of recent failed requests, oldest first.
    #[serde(default)]
    pub failed_requests: Vec<String>,

    /// Error codes of recent failed requests, oldest first.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ServerTelemetryEntity {
    /// Creates an empty telemetry entity for a client.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            cache_hits: 0,
            failed_requests: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Derives the storage key from this entity's identity fields.
    #[must_use]
    pub fn key(&self) -> String {
        key::server_telemetry_key(&self.client_id)
    }

    /// Returns `true` if the identity field is present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.client_id.is_empty()
    }

    /// Records one failed request.
    pub fn record_failure(
        &mut self,
        correlation_id: impl Into<String>,
        error_code: impl Into<String>,
    ) {
        self.failed_requests.push(correlation_id.into());
        self.errors.push(error_code.into());
    }

    /// Records one cache hit.
    pub fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    /// Drops the oldest recorded failures beyond `max_entries`.
    pub fn rotate(&mut self, max_entries: usize) {
        if self.failed_requests.len() > max_entries {
            let excess = self.failed_requests.len() - max_entries;
            self.failed_requests.drain(..excess);
        }
        if self.errors.len() > max_entries {
            let excess = self.errors.len() - max_entries;
            self.errors.drain(..excess);
        }
    }
}

/// A throttling marker for one request shape.
///
/// Written when the server answers with a throttling response; expires
/// naturally the next time it is checked after the deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottlingEntity {
    /// Hash of the request shape this marker applies to.
    pub request_hash: String,

    /// The time until which matching requests must not be sent.
    #[serde(with = "time::serde::rfc3339")]
    pub throttle_until: OffsetDateTime,

    /// The error code carried by the throttling response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The error description carried by the throttling response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl ThrottlingEntity {
    /// Creates a new throttling entity.
    #[must_use]
    pub fn new(request_hash: impl Into<String>, throttle_until: OffsetDateTime) -> Self {
        Self {
            request_hash: request_hash.into(),
            throttle_until,
            error: None,
            error_description: None,
        }
    }

    /// Derives the storage key from this entity's identity fields.
    #[must_use]
    pub fn key(&self) -> String {
        key::throttling_key(&self.request_hash)
    }

    /// Returns `true` if the identity field is present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.request_hash.is_empty()
    }

    /// Returns `true` if the throttle deadline has not passed yet.
    #[must_use]
    pub fn is_active(&self) -> bool {
        OffsetDateTime::now_utc() < self.throttle_until
    }
}

/// The shape of an outgoing token request, hashed into the throttling key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestThumbprint {
    /// The requesting client.
    pub client_id: String,

    /// The authority the request targets.
    pub authority: String,

    /// Normalized scope set of the request.
    pub scopes: String,

    /// The account the request is for, when known.
    pub home_account_id: Option<String>,
}

impl RequestThumbprint {
    /// Creates a thumbprint with a normalized scope set.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        authority: impl Into<String>,
        scopes: &[&str],
    ) -> Self {
        Self {
            client_id: client_id.into(),
            authority: authority.into(),
            scopes: key::normalize_target(scopes),
            home_account_id: None,
        }
    }

    /// Sets the account the request is for.
    #[must_use]
    pub fn with_home_account_id(mut self, home_account_id: impl Into<String>) -> Self {
        self.home_account_id = Some(home_account_id.into());
        self
    }

    /// Returns the hex-encoded SHA-256 hash of this request shape.
    #[must_use]
    pub fn hash(&self) -> String {
        let input = format!(
            "{}|{}|{}|{}",
            self.client_id.to_lowercase(),
            self.authority.to_lowercase(),
            self.scopes,
            self.home_account_id.as_deref().unwrap_or("").to_lowercase()
        );
        let digest = Sha256::digest(input.as_bytes());
        hex::encode(digest)
    }
}

/// One persisted cache entity of any kind.
///
/// Serializes as the bare inner record; the kind is supplied by the caller
/// on read, never stored as an envelope tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CacheEntity {
    /// An account record.
    Account(AccountEntity),
    /// An ID token credential.
    IdToken(IdTokenEntity),
    /// An access token credential.
    AccessToken(AccessTokenEntity),
    /// A refresh token credential.
    RefreshToken(RefreshTokenEntity),
    /// Per-client app metadata.
    AppMetadata(AppMetadataEntity),
    /// Per-client server telemetry.
    ServerTelemetry(ServerTelemetryEntity),
    /// A throttling marker.
    Throttling(ThrottlingEntity),
}

impl CacheEntity {
    /// Returns the kind of the wrapped entity.
    #[must_use]
    pub fn kind(&self) -> CacheEntityKind {
        match self {
            Self::Account(_) => CacheEntityKind::Account,
            Self::IdToken(_) => CacheEntityKind::IdToken,
            Self::AccessToken(_) => CacheEntityKind::AccessToken,
            Self::RefreshToken(_) => CacheEntityKind::RefreshToken,
            Self::AppMetadata(_) => CacheEntityKind::AppMetadata,
            Self::ServerTelemetry(_) => CacheEntityKind::ServerTelemetry,
            Self::Throttling(_) => CacheEntityKind::Throttling,
        }
    }

    /// Derives the storage key of the wrapped entity.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Account(entity) => entity.key(),
            Self::IdToken(entity) => entity.key(),
            Self::AccessToken(entity) => entity.key(),
            Self::RefreshToken(entity) => entity.key(),
            Self::AppMetadata(entity) => entity.key(),
            Self::ServerTelemetry(entity) => entity.key(),
            Self::Throttling(entity) => entity.key(),
        }
    }

    /// Applies the wrapped entity's validation predicate.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Account(entity) => entity.is_valid(),
            Self::IdToken(entity) => entity.is_valid(),
            Self::AccessToken(entity) => entity.is_valid(),
            Self::RefreshToken(entity) => entity.is_valid(),
            Self::AppMetadata(entity) => entity.is_valid(),
            Self::ServerTelemetry(entity) => entity.is_valid(),
            Self::Throttling(entity) => entity.is_valid(),
        }
    }
}

impl From<AccountEntity> for CacheEntity {
    fn from(entity: AccountEntity) -> Self {
        Self::Account(entity)
    }
}

impl From<IdTokenEntity> for CacheEntity {
    fn from(entity: IdTokenEntity) -> Self {
        Self::IdToken(entity)
    }
}

impl From<AccessTokenEntity> for CacheEntity {
    fn from(entity: AccessTokenEntity) -> Self {
        Self::AccessToken(entity)
    }
}

impl From<RefreshTokenEntity> for CacheEntity {
    fn from(entity: RefreshTokenEntity) -> Self {
        Self::RefreshToken(entity)
    }
}

impl From<AppMetadataEntity> for CacheEntity {
    fn from(entity: AppMetadataEntity) -> Self {
        Self::AppMetadata(entity)
    }
}

impl From<ServerTelemetryEntity> for CacheEntity {
    fn from(entity: ServerTelemetryEntity) -> Self {
        Self::ServerTelemetry(entity)
    }
}

impl From<ThrottlingEntity> for CacheEntity {
    fn from(entity: ThrottlingEntity) -> Self {
        Self::Throttling(entity)
    }
}
