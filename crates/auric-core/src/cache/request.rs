//! Request-scoped temporary cache.
//!
//! Every outgoing request parks three things until its response returns:
//! the encoded state, the nonce, and the chosen authority. They live in the
//! same flat key space as the durable entities but under the request's
//! correlation id, so concurrent flows never touch each other's items. A
//! handful of fixed-name items (origin URI, serialized request params, the
//! interaction-status marker) are process-wide rather than per-request.
//!
//! Hosts whose primary medium can be partitioned away between the outgoing
//! and return legs may configure a side-channel mirror (a cookie-like
//! store). Mirror writes are best-effort; a mirror that fails never fails
//! the request.

use std::sync::Arc;

use crate::AuthResult;
use crate::cache::key;
use crate::error::AuthError;
use crate::protocol::state::{InteractionKind, ProtocolState};
use crate::storage::StorageAdapter;

/// The temporary items a request parks in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporaryItem {
    /// The encoded state of the request. Correlation-scoped.
    RequestState,
    /// The nonce expected back in the ID token. Correlation-scoped.
    Nonce,
    /// The authority chosen for the request. Correlation-scoped.
    Authority,
    /// The URI the interaction started from. Fixed-name.
    OriginUri,
    /// Serialized request parameters for post-redirect resumption.
    /// Fixed-name.
    RequestParams,
    /// Marker that an interaction is in progress. Fixed-name.
    InteractionStatus,
}

impl TemporaryItem {
    /// Returns the item's key segment.
    #[must_use]
    pub fn item_name(&self) -> &'static str {
        match self {
            Self::RequestState => "request.state",
            Self::Nonce => "request.nonce",
            Self::Authority => "request.authority",
            Self::OriginUri => "request.origin",
            Self::RequestParams => "request.params",
            Self::InteractionStatus => "interaction.status",
        }
    }

    /// Returns `true` if this item is namespaced by correlation id.
    #[must_use]
    pub fn is_correlation_scoped(&self) -> bool {
        matches!(self, Self::RequestState | Self::Nonce | Self::Authority)
    }

    /// Derives the storage key for this item under `correlation_id`.
    ///
    /// Fixed-name items ignore the id.
    #[must_use]
    pub fn key(&self, correlation_id: &str) -> String {
        if self.is_correlation_scoped() {
            key::temporary_key(correlation_id, self.item_name())
        } else {
            key::fixed_temporary_key(self.item_name())
        }
    }
}

/// Items mirrored to the side channel unless the host narrows the set.
const DEFAULT_MIRRORED_ITEMS: [TemporaryItem; 4] = [
    TemporaryItem::RequestState,
    TemporaryItem::Nonce,
    TemporaryItem::Authority,
    TemporaryItem::OriginUri,
];

/// Correlation-keyed temporary cache over a primary adapter and an
/// optional side-channel mirror.
#[derive(Clone)]
pub struct RequestCache {
    primary: Arc<dyn StorageAdapter>,
    mirror: Option<Arc<dyn StorageAdapter>>,
    mirrored_items: Vec<TemporaryItem>,
}

impl RequestCache {
    /// Creates a cache over the primary adapter, with no mirror.
    #[must_use]
    pub fn new(primary: Arc<dyn StorageAdapter>) -> Self {
        Self {
            primary,
            mirror: None,
            mirrored_items: DEFAULT_MIRRORED_ITEMS.to_vec(),
        }
    }

    /// Configures a side-channel mirror adapter.
    #[must_use]
    pub fn with_mirror(mut self, mirror: Arc<dyn StorageAdapter>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Narrows the set of items written to and read from the mirror.
    #[must_use]
    pub fn with_mirrored_items(mut self, items: Vec<TemporaryItem>) -> Self {
        self.mirrored_items = items;
        self
    }

    /// Parks state, nonce, and authority for a new request and returns the
    /// correlation id the items are filed under.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if `state` does not decode, or a storage
    /// error if the primary adapter rejects a write. Mirror failures are
    /// logged and swallowed.
    pub async fn begin_request(
        &self,
        state: &str,
        nonce: &str,
        authority: &str,
    ) -> AuthResult<String> {
        let decoded = ProtocolState::parse(state)?;
        let correlation_id = decoded.correlation_id;

        self.store_item(&correlation_id, TemporaryItem::RequestState, state)
            .await?;
        self.store_item(&correlation_id, TemporaryItem::Nonce, nonce)
            .await?;
        self.store_item(&correlation_id, TemporaryItem::Authority, authority)
            .await?;

        tracing::debug!("Cached request items for correlation id {}", correlation_id);
        Ok(correlation_id)
    }

    /// Stores the URI the interaction started from.
    ///
    /// # Errors
    ///
    /// Returns an error if the primary adapter rejects the write.
    pub async fn set_origin_uri(&self, uri: &str) -> AuthResult<()> {
        self.store_item("", TemporaryItem::OriginUri, uri).await
    }

    /// Stores serialized request parameters for post-redirect resumption.
    ///
    /// # Errors
    ///
    /// Returns an error if the primary adapter rejects the write.
    pub async fn set_request_params(&self, params: &str) -> AuthResult<()> {
        self.store_item("", TemporaryItem::RequestParams, params)
            .await
    }

    /// Marks an interaction as in progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the primary adapter rejects the write.
    pub async fn set_interaction_status(&self, status: &str) -> AuthResult<()> {
        self.store_item("", TemporaryItem::InteractionStatus, status)
            .await
    }

    /// Reads a temporary item, falling back to the mirror for mirrored
    /// items.
    ///
    /// # Errors
    ///
    /// Returns an error if the primary adapter read fails. Mirror read
    /// failures are logged and treated as absent.
    pub async fn lookup(
        &self,
        correlation_id: &str,
        item: TemporaryItem,
    ) -> AuthResult<Option<String>> {
        let key = item.key(correlation_id);

        if let Some(value) = self.primary.get(&key).await? {
            return Ok(Some(value));
        }

        if let Some(mirror) = self.mirror_for(item) {
            match mirror.get(&key).await {
                Ok(Some(value)) => {
                    tracing::debug!("Found {} in mirror store for {}", item.item_name(), key);
                    return Ok(Some(value));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Mirror read failed for {}: {}", key, e);
                }
            }
        }

        Ok(None)
    }

    /// Reads a temporary item that must be present.
    ///
    /// # Errors
    ///
    /// Returns `RequestDataMissing` when the item is absent from both
    /// stores. This is the error a cleared or partitioned store surfaces
    /// as on the return leg.
    pub async fn require(&self, correlation_id: &str, item: TemporaryItem) -> AuthResult<String> {
        self.lookup(correlation_id, item)
            .await?
            .ok_or_else(|| AuthError::request_data_missing(item.item_name()))
    }

    /// Removes every temporary item filed under `correlation_id`, plus the
    /// fixed-name items.
    ///
    /// The sweep is deliberately broad: any key mentioning the id goes,
    /// so orphaned items from aborted flows cannot accumulate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` for an empty correlation id (every key
    /// contains the empty string, so the sweep would take the durable
    /// entities with it), or an error if the primary adapter scan or a
    /// removal fails. Mirror failures are logged and swallowed.
    pub async fn end_request(&self, correlation_id: &str) -> AuthResult<()> {
        if correlation_id.is_empty() {
            return Err(AuthError::invalid_state("correlation id is empty"));
        }
        let prefix = format!("{}{}", key::CACHE_PREFIX, key::KEY_SEPARATOR);

        for key in self.primary.keys().await? {
            if key.starts_with(&prefix) && key.contains(correlation_id) {
                self.primary.remove(&key).await?;
            }
        }
        for item in [
            TemporaryItem::OriginUri,
            TemporaryItem::RequestParams,
            TemporaryItem::InteractionStatus,
        ] {
            self.primary.remove(&item.key("")).await?;
        }

        if let Some(mirror) = &self.mirror {
            if let Err(e) = self.sweep_mirror(mirror, correlation_id, &prefix).await {
                tracing::warn!(
                    "Mirror cleanup failed for correlation id {}: {}",
                    correlation_id,
                    e
                );
            }
        }

        tracing::debug!("Cleared request items for correlation id {}", correlation_id);
        Ok(())
    }

    /// Removes the temporary items of the request identified by an encoded
    /// state value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if `state` does not decode, or a storage
    /// error if the sweep fails.
    pub async fn end_request_for_state(&self, state: &str) -> AuthResult<()> {
        let decoded = ProtocolState::parse(state)?;
        self.end_request(&decoded.correlation_id).await
    }

    /// Ends every in-flight request of one interaction kind.
    ///
    /// Scans all state-bearing keys, decodes each stored state, and ends
    /// the requests whose kind matches. A stored value that does not
    /// decode is skipped; it may belong to a concurrent request written by
    /// a different library version. Returns the number of requests ended.
    ///
    /// # Errors
    ///
    /// Returns an error if the primary adapter scan or a removal fails.
    pub async fn end_all_requests_of_kind(&self, kind: InteractionKind) -> AuthResult<u64> {
        let state_suffix = format!(
            "{}{}",
            key::KEY_SEPARATOR,
            TemporaryItem::RequestState.item_name()
        );
        let prefix = format!("{}{}", key::CACHE_PREFIX, key::KEY_SEPARATOR);
        let mut ended = 0;

        for key in self.primary.keys().await? {
            if !key.starts_with(&prefix) || !key.ends_with(&state_suffix) {
                continue;
            }
            let Some(value) = self.primary.get(&key).await? else {
                continue;
            };
            let decoded = match ProtocolState::parse(&value) {
                Ok(decoded) => decoded,
                Err(e) => {
                    tracing::debug!("Skipping undecodable state under {}: {}", key, e);
                    continue;
                }
            };
            if decoded.interaction == kind {
                self.end_request(&decoded.correlation_id).await?;
                ended += 1;
            }
        }

        tracing::debug!("Ended {} in-flight {} requests", ended, kind);
        Ok(ended)
    }

    async fn store_item(
        &self,
        correlation_id: &str,
        item: TemporaryItem,
        value: &str,
    ) -> AuthResult<()> {
        let key = item.key(correlation_id);
        self.primary.set(&key, value).await?;

        if let Some(mirror) = self.mirror_for(item) {
            if let Err(e) = mirror.set(&key, value).await {
                tracing::warn!("Failed to mirror {} under {}: {}", item.item_name(), key, e);
            }
        }

        Ok(())
    }

    fn mirror_for(&self, item: TemporaryItem) -> Option<&Arc<dyn StorageAdapter>> {
        self.mirror
            .as_ref()
            .filter(|_| self.mirrored_items.contains(&item))
    }

    async fn sweep_mirror(
        &self,
        mirror: &Arc<dyn StorageAdapter>,
        correlation_id: &str,
        prefix: &str,
    ) -> Result<(), crate::storage::StorageError> {
        for key in mirror.keys().await? {
            if key.starts_with(prefix) && key.contains(correlation_id) {
                mirror.remove(&key).await?;
            }
        }
        for item in [
            TemporaryItem::OriginUri,
            TemporaryItem::RequestParams,
            TemporaryItem::InteractionStatus,
        ] {
            mirror.remove(&item.key("")).await?;
        }
        Ok(())
    }
}
