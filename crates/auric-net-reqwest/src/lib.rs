//! # auric-net-reqwest
//!
//! [`reqwest`]-backed implementation of the `auric-core`
//! [`NetworkCapability`] trait, used for instance discovery and OpenID
//! configuration fetches.
//!
//! # Example
//!
//! ```ignore
//! use auric_core::authority::{Authority, ProtocolMode, TrustRegistry};
//! use auric_net_reqwest::ReqwestNetwork;
//!
//! let network = ReqwestNetwork::with_defaults();
//! let registry = TrustRegistry::new();
//! let authority = Authority::discover(
//!     "https://login.example.com/common",
//!     ProtocolMode::V2,
//!     &registry,
//!     &network,
//! )
//! .await?;
//! ```
//!
//! # Security Considerations
//!
//! - Only HTTPS URLs are allowed unless `allow_http` is enabled for tests
//! - Request timeouts prevent hanging on slow endpoints
//! - Response size is limited to prevent memory exhaustion

use std::time::Duration;

use async_trait::async_trait;
use auric_core::net::{JsonResponse, NetworkCapability, NetworkError};
use url::Url;

/// Configuration for the reqwest network capability.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// HTTP request timeout (default: 10 seconds).
    pub request_timeout: Duration,

    /// Maximum response size in bytes (default: 1 MB).
    pub max_response_size: usize,

    /// Whether to allow HTTP (non-HTTPS) URLs.
    /// This should only be enabled for testing.
    pub allow_http: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_response_size: 1024 * 1024,
            allow_http: false,
        }
    }
}

impl NetworkConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the maximum response size.
    #[must_use]
    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    /// Allows HTTP (non-HTTPS) URLs.
    ///
    /// # Warning
    ///
    /// This should only be used for testing. Discovery documents decide
    /// which hosts are trusted and must travel over HTTPS in production.
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }
}

/// Network capability backed by a shared [`reqwest::Client`].
pub struct ReqwestNetwork {
    http_client: reqwest::Client,
    config: NetworkConfig,
}

impl ReqwestNetwork {
    /// Creates a network capability with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// practice).
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            config,
        }
    }

    /// Creates a network capability with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(NetworkConfig::default())
    }

    /// Validates that the URL uses an allowed scheme.
    fn validate_scheme(&self, url: &Url) -> Result<(), NetworkError> {
        let scheme = url.scheme();

        if scheme == "https" {
            return Ok(());
        }

        if scheme == "http" && self.config.allow_http {
            return Ok(());
        }

        Err(NetworkError::InvalidScheme {
            scheme: scheme.to_string(),
        })
    }
}

#[async_trait]
impl NetworkCapability for ReqwestNetwork {
    async fn get_json(&self, url: &Url) -> Result<JsonResponse, NetworkError> {
        self.validate_scheme(url)?;

        let response = self
            .http_client
            .get(url.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Failed to fetch {}: {}", url, e);
                NetworkError::transport(e.to_string())
            })?;

        let status = response.status().as_u16();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_response_size
        {
            return Err(NetworkError::ResponseTooLarge {
                max_size: self.config.max_response_size,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NetworkError::transport(e.to_string()))?;
        if bytes.len() > self.config.max_response_size {
            return Err(NetworkError::ResponseTooLarge {
                max_size: self.config.max_response_size,
            });
        }

        let body: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!("Failed to parse JSON response from {}: {}", url, e);
            NetworkError::decode(e.to_string())
        })?;

        Ok(JsonResponse::new(status, body))
    }
}
