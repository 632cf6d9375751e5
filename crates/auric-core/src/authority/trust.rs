//! Trusted cloud instance registry.
//!
//! Endpoint discovery only ever runs against hosts the library trusts.
//! Trust comes from one of three sources: static cloud discovery metadata
//! supplied in configuration, a `known_authorities` allow list, or a
//! single lazy fetch of the provider's instance discovery document. The
//! registry maps every alias of a cloud to one shared metadata entry, so
//! alias checks and preferred-host rewrites are lookups, not scans.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use crate::AuthResult;
use crate::error::AuthError;
use crate::net::NetworkCapability;

/// Metadata for one identity-provider cloud instance.
///
/// A cloud is reachable under several hostnames; `preferred_network` is
/// the one endpoint discovery must use and `preferred_cache` is the one
/// cache keys are filed under, so tokens survive a host migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudInstanceMetadata {
    /// Host that endpoint discovery and token requests should target.
    pub preferred_network: String,

    /// Host under which durable cache entries are keyed.
    pub preferred_cache: String,

    /// Every hostname belonging to this cloud, including the preferred ones.
    pub aliases: Vec<String>,
}

impl CloudInstanceMetadata {
    /// Builds an entry for a host that is its own cloud.
    ///
    /// Used for `known_authorities` entries and for providers that do not
    /// participate in instance discovery.
    #[must_use]
    pub fn self_hosted(host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            preferred_network: host.clone(),
            preferred_cache: host.clone(),
            aliases: vec![host],
        }
    }

    /// Returns `true` if `host` appears in this cloud's alias set.
    #[must_use]
    pub fn has_alias(&self, host: &str) -> bool {
        self.aliases.iter().any(|a| a.eq_ignore_ascii_case(host))
    }
}

/// Instance discovery document returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDiscoveryResponse {
    /// Metadata entries for every cloud the provider knows.
    #[serde(default)]
    pub metadata: Vec<CloudInstanceMetadata>,
}

/// Process-wide registry of trusted cloud instances.
///
/// Populated at most once unless found empty: concurrent population
/// attempts may race, which is safe because entries for the same cloud
/// are identical.
pub struct TrustRegistry {
    entries: RwLock<HashMap<String, Arc<CloudInstanceMetadata>>>,
}

impl TrustRegistry {
    /// Creates an empty registry. The first `ensure_populated` call will
    /// fetch the trusted-host list from the network.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry seeded from statically configured cloud metadata.
    ///
    /// A seeded registry never fetches from the network.
    #[must_use]
    pub fn from_metadata(metadata: Vec<CloudInstanceMetadata>) -> Self {
        let mut entries = HashMap::new();
        for cloud in metadata {
            insert_cloud(&mut entries, cloud);
        }
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Creates a registry that trusts exactly the given hosts, each as its
    /// own cloud.
    #[must_use]
    pub fn from_known_authorities(hosts: &[String]) -> Self {
        let metadata = hosts
            .iter()
            .map(|host| CloudInstanceMetadata::self_hosted(host.clone()))
            .collect();
        Self::from_metadata(metadata)
    }

    /// Ensures the registry holds a trusted-host list, fetching the
    /// provider's instance discovery document if it is empty.
    ///
    /// A provider that does not recognize the authority reports an error
    /// body instead of metadata; the registry is then left empty and the
    /// caller's trust check fails closed.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryFailed` if the instance discovery endpoint
    /// returns a non-success status or an undecodable body, or a network
    /// error if the fetch itself fails. Both are retryable.
    pub async fn ensure_populated(
        &self,
        authority: &Url,
        network: &dyn NetworkCapability,
    ) -> AuthResult<()> {
        {
            let entries = self.entries.read().await;
            if !entries.is_empty() {
                return Ok(());
            }
        }

        let discovery_url = instance_discovery_url(authority);
        tracing::debug!("Fetching instance discovery document from {}", discovery_url);

        let response = network.get_json(&discovery_url).await?;
        if !response.is_success() {
            return Err(AuthError::discovery_failed(format!(
                "instance discovery returned status {}",
                response.status
            )));
        }
        if response.body.get("error").is_some() {
            tracing::debug!("Instance discovery rejected authority {}", authority);
            return Ok(());
        }

        let document: InstanceDiscoveryResponse = response.json().map_err(|e| {
            AuthError::discovery_failed(format!("invalid instance discovery document: {e}"))
        })?;

        let mut entries = self.entries.write().await;
        for cloud in document.metadata {
            insert_cloud(&mut entries, cloud);
        }
        tracing::debug!("Trust registry populated with {} host entries", entries.len());

        Ok(())
    }

    /// Returns `true` if `host` belongs to a known cloud.
    pub async fn is_trusted(&self, host: &str) -> bool {
        let entries = self.entries.read().await;
        entries.contains_key(&host.to_ascii_lowercase())
    }

    /// Returns the cloud metadata `host` belongs to, if any.
    pub async fn metadata_for(&self, host: &str) -> Option<Arc<CloudInstanceMetadata>> {
        let entries = self.entries.read().await;
        entries.get(&host.to_ascii_lowercase()).cloned()
    }

    /// Returns the number of registered host aliases.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if no hosts are registered.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for TrustRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_cloud(
    entries: &mut HashMap<String, Arc<CloudInstanceMetadata>>,
    cloud: CloudInstanceMetadata,
) {
    let cloud = Arc::new(cloud);
    for alias in &cloud.aliases {
        entries.insert(alias.to_ascii_lowercase(), Arc::clone(&cloud));
    }
}

/// Builds the instance discovery URL for an authority.
///
/// The provider echoes trust decisions against a concrete authorization
/// endpoint, so the query carries one derived from the authority.
fn instance_discovery_url(authority: &Url) -> Url {
    let mut discovery_url = authority.clone();
    discovery_url.set_path("/common/discovery/instance");
    discovery_url.set_fragment(None);

    let authorize = format!(
        "{}/oauth2/v2.0/authorize",
        authority.as_str().trim_end_matches('/')
    );
    discovery_url
        .query_pairs_mut()
        .clear()
        .append_pair("api-version", "1.1")
        .append_pair("authorization_endpoint", &authorize);

    discovery_url
}
