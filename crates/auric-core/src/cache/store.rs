//! Typed entity store over a storage adapter.
//!
//! [`EntityStore`] is the only path between entity types and raw adapter
//! text. Writes always derive the storage key from the entity itself;
//! reads treat anything unparsable or invalid as a cache miss, because the
//! durable cache is a cache, not a source of truth. Adapter failures are
//! the one thing that does propagate.

use std::sync::Arc;

use crate::AuthResult;
use crate::cache::entity::{
    AccessTokenEntity, AccountEntity, AppMetadataEntity, CacheEntity, CacheEntityKind,
    IdTokenEntity, RefreshTokenEntity, RequestThumbprint, ServerTelemetryEntity, ThrottlingEntity,
};
use crate::cache::key;
use crate::storage::StorageAdapter;

/// Failure entries kept per telemetry record before the oldest rotate out.
const MAX_TELEMETRY_FAILURES: usize = 10;

/// Reads and writes cache entities through a [`StorageAdapter`].
#[derive(Clone)]
pub struct EntityStore {
    adapter: Arc<dyn StorageAdapter>,
}

impl EntityStore {
    /// Creates a store over the given adapter.
    #[must_use]
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self { adapter }
    }

    /// Reads the entity of `kind` stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent, the stored text is not a
    /// JSON object, the object does not deserialize as `kind`, or the
    /// entity fails its validation predicate. Malformed cache data is a
    /// miss, never an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the adapter itself fails.
    pub async fn read(
        &self,
        kind: CacheEntityKind,
        key: &str,
    ) -> AuthResult<Option<CacheEntity>> {
        let Some(raw) = self.adapter.get(key).await? else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }

        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("Discarding unparsable cache entry {}: {}", key, e);
                return Ok(None);
            }
        };
        if !value.is_object() {
            tracing::debug!("Discarding non-object cache entry {}", key);
            return Ok(None);
        }

        let Some(entity) = Self::entity_from_value(kind, value) else {
            tracing::debug!("Cache entry {} does not deserialize as {}", key, kind);
            return Ok(None);
        };
        if !entity.is_valid() {
            tracing::debug!("Cache entry {} failed {} validation", key, kind);
            return Ok(None);
        }

        Ok(Some(entity))
    }

    /// Writes an entity under the key derived from its identity fields.
    ///
    /// This is the only key derivation path for entity writes; callers
    /// never supply keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter write fails.
    ///
    /// # Panics
    ///
    /// Panics if the entity cannot be serialized, which cannot happen for
    /// these field types.
    pub async fn write(&self, entity: &CacheEntity) -> AuthResult<()> {
        let key = entity.key();
        let json = serde_json::to_string(entity).expect("cache entities serialize to JSON");
        self.adapter.set(&key, &json).await?;
        Ok(())
    }

    /// Removes the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter write fails.
    pub async fn remove(&self, key: &str) -> AuthResult<()> {
        self.adapter.remove(key).await?;
        Ok(())
    }

    /// Returns every key currently stored in the adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter cannot be enumerated.
    pub async fn keys(&self) -> AuthResult<Vec<String>> {
        Ok(self.adapter.keys().await?)
    }

    /// Reads an account entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter read fails.
    pub async fn read_account(&self, key: &str) -> AuthResult<Option<AccountEntity>> {
        Ok(match self.read(CacheEntityKind::Account, key).await? {
            Some(CacheEntity::Account(entity)) => Some(entity),
            _ => None,
        })
    }

    /// Reads an ID token entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter read fails.
    pub async fn read_id_token(&self, key: &str) -> AuthResult<Option<IdTokenEntity>> {
        Ok(match self.read(CacheEntityKind::IdToken, key).await? {
            Some(CacheEntity::IdToken(entity)) => Some(entity),
            _ => None,
        })
    }

    /// Reads an access token entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter read fails.
    pub async fn read_access_token(&self, key: &str) -> AuthResult<Option<AccessTokenEntity>> {
        Ok(match self.read(CacheEntityKind::AccessToken, key).await? {
            Some(CacheEntity::AccessToken(entity)) => Some(entity),
            _ => None,
        })
    }

    /// Reads a refresh token entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter read fails.
    pub async fn read_refresh_token(&self, key: &str) -> AuthResult<Option<RefreshTokenEntity>> {
        Ok(match self.read(CacheEntityKind::RefreshToken, key).await? {
            Some(CacheEntity::RefreshToken(entity)) => Some(entity),
            _ => None,
        })
    }

    /// Reads an app metadata entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter read fails.
    pub async fn read_app_metadata(&self, key: &str) -> AuthResult<Option<AppMetadataEntity>> {
        Ok(match self.read(CacheEntityKind::AppMetadata, key).await? {
            Some(CacheEntity::AppMetadata(entity)) => Some(entity),
            _ => None,
        })
    }

    /// Reads the server telemetry entity of a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter read fails.
    pub async fn read_server_telemetry(
        &self,
        client_id: &str,
    ) -> AuthResult<Option<ServerTelemetryEntity>> {
        let key = key::server_telemetry_key(client_id);
        Ok(match self.read(CacheEntityKind::ServerTelemetry, &key).await? {
            Some(CacheEntity::ServerTelemetry(entity)) => Some(entity),
            _ => None,
        })
    }

    /// Records a failed request in the client's telemetry entity, creating
    /// it if absent. The oldest entries rotate out past a fixed cap.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter read or write fails.
    pub async fn record_failure(
        &self,
        client_id: &str,
        correlation_id: &str,
        error_code: &str,
    ) -> AuthResult<()> {
        let mut telemetry = self
            .read_server_telemetry(client_id)
            .await?
            .unwrap_or_else(|| ServerTelemetryEntity::new(client_id));
        telemetry.record_failure(correlation_id, error_code);
        telemetry.rotate(MAX_TELEMETRY_FAILURES);
        self.write(&CacheEntity::from(telemetry)).await
    }

    /// Records a cache hit in the client's telemetry entity, creating it if
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter read or write fails.
    pub async fn record_cache_hit(&self, client_id: &str) -> AuthResult<()> {
        let mut telemetry = self
            .read_server_telemetry(client_id)
            .await?
            .unwrap_or_else(|| ServerTelemetryEntity::new(client_id));
        telemetry.record_cache_hit();
        self.write(&CacheEntity::from(telemetry)).await
    }

    /// Removes the client's telemetry entity, typically after its contents
    /// have been sent to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter write fails.
    pub async fn clear_telemetry(&self, client_id: &str) -> AuthResult<()> {
        self.remove(&key::server_telemetry_key(client_id)).await
    }

    /// Returns the active throttling entity for a request shape, if any.
    ///
    /// An entity whose deadline has passed is removed on the way out, so
    /// throttle entries expire the first time they are checked late.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter read or write fails.
    pub async fn active_throttle(
        &self,
        thumbprint: &RequestThumbprint,
    ) -> AuthResult<Option<ThrottlingEntity>> {
        let key = key::throttling_key(&thumbprint.hash());
        let entity = match self.read(CacheEntityKind::Throttling, &key).await? {
            Some(CacheEntity::Throttling(entity)) => entity,
            _ => return Ok(None),
        };

        if !entity.is_active() {
            tracing::debug!("Removing expired throttle entry {}", key);
            self.remove(&key).await?;
            return Ok(None);
        }

        Ok(Some(entity))
    }

    /// Removes every entity whose key carries `client_id` as a segment.
    ///
    /// Credential, app metadata, and telemetry keys all embed the client
    /// id; account keys do not, since accounts are shared across clients.
    /// The id must match a whole key segment, so a client id that is a
    /// prefix of another never sweeps the other client's entries.
    /// Returns the number of keys removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter scan or a removal fails.
    pub async fn remove_entities_for_client(&self, client_id: &str) -> AuthResult<u64> {
        let needle = client_id.to_lowercase();
        if needle.is_empty() {
            // Credential keys keep empty segments in place, so an empty id
            // would sweep every token.
            return Ok(0);
        }
        let mut removed = 0;
        for key in self.adapter.keys().await? {
            if key.starts_with(key::CACHE_PREFIX)
                && key.split(key::KEY_SEPARATOR).any(|segment| segment == needle)
            {
                self.adapter.remove(&key).await?;
                removed += 1;
            }
        }
        tracing::debug!("Removed {} cache entries for client {}", removed, client_id);
        Ok(removed)
    }

    /// Removes every key this library owns, leaving foreign keys in the
    /// shared adapter untouched. Returns the number of keys removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter scan or a removal fails.
    pub async fn clear(&self) -> AuthResult<u64> {
        let prefix = format!("{}{}", key::CACHE_PREFIX, key::KEY_SEPARATOR);
        let mut removed = 0;
        for key in self.adapter.keys().await? {
            if key.starts_with(&prefix) {
                self.adapter.remove(&key).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn entity_from_value(kind: CacheEntityKind, value: serde_json::Value) -> Option<CacheEntity> {
        match kind {
            CacheEntityKind::Account => serde_json::from_value::<AccountEntity>(value)
                .ok()
                .map(CacheEntity::from),
            CacheEntityKind::IdToken => serde_json::from_value::<IdTokenEntity>(value)
                .ok()
                .map(CacheEntity::from),
            CacheEntityKind::AccessToken => serde_json::from_value::<AccessTokenEntity>(value)
                .ok()
                .map(CacheEntity::from),
            CacheEntityKind::RefreshToken => serde_json::from_value::<RefreshTokenEntity>(value)
                .ok()
                .map(CacheEntity::from),
            CacheEntityKind::AppMetadata => serde_json::from_value::<AppMetadataEntity>(value)
                .ok()
                .map(CacheEntity::from),
            CacheEntityKind::ServerTelemetry => {
                serde_json::from_value::<ServerTelemetryEntity>(value)
                    .ok()
                    .map(CacheEntity::from)
            }
            CacheEntityKind::Throttling => serde_json::from_value::<ThrottlingEntity>(value)
                .ok()
                .map(CacheEntity::from),
        }
    }
}
