//! Client configuration.
//!
//! Configuration for one OAuth2/OIDC client application: its identifier,
//! default authority, protocol dialect, and the trust material used to
//! seed the [`TrustRegistry`](crate::authority::TrustRegistry) without a
//! network round trip.

use serde::{Deserialize, Serialize};

use crate::authority::{Authority, CloudInstanceMetadata, ProtocolMode, TrustRegistry};

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

/// Client application configuration.
///
/// # Example
///
/// ```ignore
/// use auric_core::config::ClientConfig;
///
/// let config = ClientConfig::new("client-1", "https://login.example.com/common")
///     .with_known_authorities(vec!["login.example.com".to_string()]);
/// config.validate()?;
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Client identifier issued by the provider at registration.
    pub client_id: String,

    /// Authority URL requests default to.
    pub authority: String,

    /// Protocol dialect the authority speaks.
    pub protocol_mode: ProtocolMode,

    /// Hosts trusted without instance discovery, each as its own cloud.
    pub known_authorities: Vec<String>,

    /// Statically configured cloud discovery metadata.
    /// Takes precedence over `known_authorities` and suppresses the lazy
    /// network fetch entirely.
    pub cloud_discovery_metadata: Vec<CloudInstanceMetadata>,

    /// Mirror request-scoped temporary items to a side-channel store.
    pub mirror_temporary_items: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            authority: String::new(),
            protocol_mode: ProtocolMode::V2,
            known_authorities: Vec::new(),
            cloud_discovery_metadata: Vec::new(),
            mirror_temporary_items: false,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for the given client and authority.
    #[must_use]
    pub fn new(client_id: impl Into<String>, authority: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            authority: authority.into(),
            ..Self::default()
        }
    }

    /// Sets the protocol dialect.
    #[must_use]
    pub fn with_protocol_mode(mut self, mode: ProtocolMode) -> Self {
        self.protocol_mode = mode;
        self
    }

    /// Sets the hosts trusted without instance discovery.
    #[must_use]
    pub fn with_known_authorities(mut self, hosts: Vec<String>) -> Self {
        self.known_authorities = hosts;
        self
    }

    /// Sets static cloud discovery metadata.
    #[must_use]
    pub fn with_cloud_discovery_metadata(mut self, metadata: Vec<CloudInstanceMetadata>) -> Self {
        self.cloud_discovery_metadata = metadata;
        self
    }

    /// Enables or disables side-channel mirroring of temporary items.
    #[must_use]
    pub fn with_temporary_item_mirroring(mut self, enabled: bool) -> Self {
        self.mirror_temporary_items = enabled;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the client id or authority is
    /// empty, and `ConfigError::InvalidValue` if:
    /// - The authority URL does not parse or uses an unsupported scheme
    /// - A known authority entry is empty or carries a scheme
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("client_id".to_string()));
        }
        if self.authority.trim().is_empty() {
            return Err(ConfigError::Missing("authority".to_string()));
        }

        // Validate the authority URL
        Authority::new(&self.authority, self.protocol_mode)
            .map_err(|e| ConfigError::InvalidValue(format!("authority: {e}")))?;

        // Validate known authority entries
        for host in &self.known_authorities {
            if host.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "known authority entries cannot be empty".to_string(),
                ));
            }
            if host.contains("://") || host.contains('/') {
                return Err(ConfigError::InvalidValue(format!(
                    "known authority '{}' must be a bare hostname",
                    host
                )));
            }
        }

        Ok(())
    }

    /// Builds a trust registry from the configured trust material.
    ///
    /// Static metadata wins over `known_authorities`; with neither
    /// configured the registry starts empty and populates lazily from
    /// the network.
    #[must_use]
    pub fn trust_registry(&self) -> TrustRegistry {
        if !self.cloud_discovery_metadata.is_empty() {
            TrustRegistry::from_metadata(self.cloud_discovery_metadata.clone())
        } else if !self.known_authorities.is_empty() {
            TrustRegistry::from_known_authorities(&self.known_authorities)
        } else {
            TrustRegistry::new()
        }
    }
}
