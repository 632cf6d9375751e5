//! Authority validation and endpoint discovery.
//!
//! An [`Authority`] represents one identity-provider entry point. It moves
//! through three states: constructed (URL parsed and normalized, no I/O),
//! trust-validated (host found in the [`TrustRegistry`]), and discovered
//! (OpenID configuration fetched and endpoints resolved). Discovery always
//! runs against the cloud's preferred network host, never a legacy alias,
//! and never against a host the registry does not trust.

pub mod metadata;
pub mod trust;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use crate::AuthResult;
use crate::error::AuthError;
use crate::net::NetworkCapability;

pub use metadata::OpenIdMetadata;
pub use trust::{CloudInstanceMetadata, InstanceDiscoveryResponse, TrustRegistry};

/// Protocol dialect the authority speaks.
///
/// Determines the shape of the OpenID configuration URL: `V2` authorities
/// nest the document under a `v2.0` path segment, plain OIDC providers
/// (including ADFS) serve it directly under the authority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolMode {
    /// Tenant-templated v2.0 endpoints.
    #[default]
    V2,
    /// Plain OpenID Connect provider.
    Oidc,
}

/// Lifecycle state of an [`Authority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityState {
    /// URL validated, no network contact yet.
    Uninitialized,
    /// Host found in the trust registry; endpoints not yet fetched.
    TrustValidated,
    /// OpenID configuration fetched; endpoints available.
    EndpointsDiscovered,
}

/// A validated identity-provider entry point.
///
/// Construction is pure: the URL is parsed, normalized to a trailing
/// slash, and checked for scheme and host, but no network call happens
/// until [`Authority::resolve_endpoints`]. Endpoint accessors return
/// `DiscoveryIncomplete` until discovery has run.
#[derive(Debug, Clone)]
pub struct Authority {
    canonical: Url,
    tenant: Option<String>,
    mode: ProtocolMode,
    state: AuthorityState,
    metadata: Option<OpenIdMetadata>,
    cloud: Option<Arc<CloudInstanceMetadata>>,
}

impl Authority {
    /// Parses and validates an authority URL without any network I/O.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAuthority` if the URL is empty, unparsable, uses a
    /// scheme other than http or https, or has no host.
    pub fn new(url: impl AsRef<str>, mode: ProtocolMode) -> AuthResult<Self> {
        let raw = url.as_ref().trim();
        if raw.is_empty() {
            return Err(AuthError::invalid_authority("authority URL is empty"));
        }

        let mut canonical = Url::parse(raw)
            .map_err(|e| AuthError::invalid_authority(format!("cannot parse authority URL: {e}")))?;

        match canonical.scheme() {
            "http" | "https" => {}
            other => {
                return Err(AuthError::invalid_authority(format!(
                    "unsupported scheme: {other}"
                )));
            }
        }
        if canonical.host_str().is_none() {
            return Err(AuthError::invalid_authority("authority URL has no host"));
        }

        canonical.set_query(None);
        canonical.set_fragment(None);
        if !canonical.path().ends_with('/') {
            canonical.set_path(&format!("{}/", canonical.path()));
        }

        let tenant = canonical
            .path_segments()
            .into_iter()
            .flatten()
            .find(|segment| !segment.is_empty())
            .map(str::to_string);

        Ok(Self {
            canonical,
            tenant,
            mode,
            state: AuthorityState::Uninitialized,
            metadata: None,
            cloud: None,
        })
    }

    /// Constructs an authority and completes endpoint discovery in one step.
    ///
    /// # Errors
    ///
    /// Returns any error [`Authority::new`] or
    /// [`Authority::resolve_endpoints`] produces.
    pub async fn discover(
        url: impl AsRef<str>,
        mode: ProtocolMode,
        registry: &TrustRegistry,
        network: &dyn NetworkCapability,
    ) -> AuthResult<Self> {
        let mut authority = Self::new(url, mode)?;
        authority.resolve_endpoints(registry, network).await?;
        Ok(authority)
    }

    /// Validates trust and fetches the OpenID configuration document.
    ///
    /// Populates the trust registry if it is empty, fails closed on an
    /// unknown host, rewrites the canonical host to the cloud's preferred
    /// network host, then fetches and stores the endpoint metadata with
    /// the tenant segment substituted. Calling again simply overwrites
    /// the stored endpoints; last response wins.
    ///
    /// # Errors
    ///
    /// Returns `UntrustedAuthority` if the host is not in the registry
    /// after population, `DiscoveryFailed` for a non-success or
    /// undecodable configuration response, or a network error from
    /// either fetch. No configuration fetch is attempted for an
    /// untrusted host.
    pub async fn resolve_endpoints(
        &mut self,
        registry: &TrustRegistry,
        network: &dyn NetworkCapability,
    ) -> AuthResult<()> {
        registry.ensure_populated(&self.canonical, network).await?;

        let host = self.host().to_string();
        let Some(cloud) = registry.metadata_for(&host).await else {
            return Err(AuthError::untrusted_authority(host));
        };
        self.state = AuthorityState::TrustValidated;

        if !host.eq_ignore_ascii_case(&cloud.preferred_network) {
            tracing::debug!(
                "Rewriting authority host {} to preferred network host {}",
                host,
                cloud.preferred_network
            );
            self.canonical
                .set_host(Some(&cloud.preferred_network))
                .map_err(|e| {
                    AuthError::discovery_failed(format!("preferred network host is invalid: {e}"))
                })?;
        }
        self.cloud = Some(cloud);

        let config_url = self.openid_configuration_url();
        tracing::debug!("Fetching OpenID configuration from {}", config_url);

        let response = network.get_json(&config_url).await?;
        if !response.is_success() {
            return Err(AuthError::discovery_failed(format!(
                "openid configuration returned status {}",
                response.status
            )));
        }
        let document: OpenIdMetadata = response.json().map_err(|e| {
            AuthError::discovery_failed(format!("invalid openid configuration document: {e}"))
        })?;

        let document = match &self.tenant {
            Some(tenant) => document.with_tenant(tenant),
            None => document,
        };

        tracing::debug!("Resolved endpoints for authority {}", self.canonical);
        self.metadata = Some(document);
        self.state = AuthorityState::EndpointsDiscovered;

        Ok(())
    }

    /// The normalized authority URL, with any preferred-host rewrite
    /// applied.
    #[must_use]
    pub fn canonical_url(&self) -> &Url {
        &self.canonical
    }

    /// The authority's current host.
    #[must_use]
    pub fn host(&self) -> &str {
        self.canonical.host_str().unwrap_or_default()
    }

    /// The tenant path segment, when the authority has one.
    #[must_use]
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    /// The protocol dialect this authority was constructed with.
    #[must_use]
    pub fn mode(&self) -> ProtocolMode {
        self.mode
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AuthorityState {
        self.state
    }

    /// Returns `true` once endpoint discovery has completed.
    #[must_use]
    pub fn is_discovered(&self) -> bool {
        self.state == AuthorityState::EndpointsDiscovered
    }

    /// The issuer identifier from the discovered configuration.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryIncomplete` before `resolve_endpoints` succeeds.
    pub fn issuer(&self) -> AuthResult<&str> {
        Ok(&self.require_metadata()?.issuer)
    }

    /// The authorization endpoint from the discovered configuration.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryIncomplete` before `resolve_endpoints` succeeds.
    pub fn authorization_endpoint(&self) -> AuthResult<&str> {
        Ok(&self.require_metadata()?.authorization_endpoint)
    }

    /// The token endpoint from the discovered configuration.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryIncomplete` before `resolve_endpoints` succeeds.
    pub fn token_endpoint(&self) -> AuthResult<&str> {
        Ok(&self.require_metadata()?.token_endpoint)
    }

    /// The end session endpoint, when the provider advertises one.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryIncomplete` before `resolve_endpoints` succeeds.
    pub fn end_session_endpoint(&self) -> AuthResult<Option<&str>> {
        Ok(self.require_metadata()?.end_session_endpoint.as_deref())
    }

    /// The device authorization endpoint, when the provider advertises one.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryIncomplete` before `resolve_endpoints` succeeds.
    pub fn device_authorization_endpoint(&self) -> AuthResult<Option<&str>> {
        Ok(self
            .require_metadata()?
            .device_authorization_endpoint
            .as_deref())
    }

    /// Returns `true` if `host` is this authority's host or one of its
    /// cloud's aliases.
    ///
    /// Used to decide whether a provider-reported cloud instance actually
    /// requires constructing a new authority.
    #[must_use]
    pub fn is_alias(&self, host: &str) -> bool {
        if self.host().eq_ignore_ascii_case(host) {
            return true;
        }
        self.cloud
            .as_ref()
            .is_some_and(|cloud| cloud.has_alias(host))
    }

    /// The host under which durable cache entries for this authority are
    /// keyed.
    ///
    /// Falls back to the authority's own host when no cloud metadata is
    /// known.
    #[must_use]
    pub fn preferred_cache_environment(&self) -> &str {
        self.cloud
            .as_ref()
            .map_or_else(|| self.host(), |cloud| cloud.preferred_cache.as_str())
    }

    fn require_metadata(&self) -> AuthResult<&OpenIdMetadata> {
        self.metadata.as_ref().ok_or(AuthError::DiscoveryIncomplete)
    }

    /// Builds the OpenID configuration URL for this authority's mode.
    fn openid_configuration_url(&self) -> Url {
        let mut config_url = self.canonical.clone();
        let path = self.canonical.path().trim_end_matches('/');

        match self.mode {
            ProtocolMode::V2 => {
                config_url.set_path(&format!("{path}/v2.0/.well-known/openid-configuration"));
            }
            ProtocolMode::Oidc => {
                config_url.set_path(&format!("{path}/.well-known/openid-configuration"));
            }
        }

        config_url
    }
}
