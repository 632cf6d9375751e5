//! OpenID Connect provider metadata types.
//!
//! Defines the subset of the provider configuration document returned
//! from the `.well-known/openid-configuration` endpoint that the engine
//! consumes, as specified in
//! [OpenID Connect Discovery 1.0](https://openid.net/specs/openid-connect-discovery-1_0.html).

use serde::{Deserialize, Serialize};

/// OpenID provider configuration document.
///
/// Endpoint URLs may contain the `{tenant}` or `{tenantid}` placeholders
/// that some providers emit for tenant-templated deployments; callers
/// substitute them via [`OpenIdMetadata::with_tenant`].
///
/// # Example
///
/// ```ignore
/// use auric_core::authority::OpenIdMetadata;
///
/// let json = r#"{
///     "issuer": "https://login.example.com/{tenantid}/v2.0",
///     "authorization_endpoint": "https://login.example.com/{tenant}/oauth2/v2.0/authorize",
///     "token_endpoint": "https://login.example.com/{tenant}/oauth2/v2.0/token"
/// }"#;
///
/// let metadata: OpenIdMetadata = serde_json::from_str(json)?;
/// let resolved = metadata.with_tenant("contoso.example");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdMetadata {
    // ----- Required Fields -----
    /// URL that the provider asserts as its issuer identifier.
    pub issuer: String,

    /// URL of the provider's authorization endpoint.
    pub authorization_endpoint: String,

    /// URL of the provider's token endpoint.
    pub token_endpoint: String,

    // ----- Optional Fields -----
    /// URL to which a relying party can redirect to log the end user out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    /// URL of the provider's device authorization endpoint (RFC 8628).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_authorization_endpoint: Option<String>,

    /// URL of the provider's JSON Web Key Set document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
}

impl OpenIdMetadata {
    /// Returns a copy with the `{tenant}` and `{tenantid}` placeholders in
    /// every endpoint URL replaced by the given tenant segment.
    #[must_use]
    pub fn with_tenant(&self, tenant: &str) -> Self {
        Self {
            issuer: substitute_tenant(&self.issuer, tenant),
            authorization_endpoint: substitute_tenant(&self.authorization_endpoint, tenant),
            token_endpoint: substitute_tenant(&self.token_endpoint, tenant),
            end_session_endpoint: self
                .end_session_endpoint
                .as_deref()
                .map(|url| substitute_tenant(url, tenant)),
            device_authorization_endpoint: self
                .device_authorization_endpoint
                .as_deref()
                .map(|url| substitute_tenant(url, tenant)),
            jwks_uri: self
                .jwks_uri
                .as_deref()
                .map(|url| substitute_tenant(url, tenant)),
        }
    }
}

fn substitute_tenant(url: &str, tenant: &str) -> String {
    url.replace("{tenant}", tenant).replace("{tenantid}", tenant)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templated_metadata() -> OpenIdMetadata {
        OpenIdMetadata {
            issuer: "https://login.example.com/{tenantid}/v2.0".to_string(),
            authorization_endpoint: "https://login.example.com/{tenant}/oauth2/v2.0/authorize"
                .to_string(),
            token_endpoint: "https://login.example.com/{tenant}/oauth2/v2.0/token".to_string(),
            end_session_endpoint: Some(
                "https://login.example.com/{tenant}/oauth2/v2.0/logout".to_string(),
            ),
            device_authorization_endpoint: None,
            jwks_uri: Some("https://login.example.com/{tenant}/discovery/v2.0/keys".to_string()),
        }
    }

    #[test]
    fn test_with_tenant_substitutes_both_placeholders() {
        let resolved = templated_metadata().with_tenant("tenant-a");

        assert_eq!(resolved.issuer, "https://login.example.com/tenant-a/v2.0");
        assert_eq!(
            resolved.authorization_endpoint,
            "https://login.example.com/tenant-a/oauth2/v2.0/authorize"
        );
        assert_eq!(
            resolved.token_endpoint,
            "https://login.example.com/tenant-a/oauth2/v2.0/token"
        );
        assert_eq!(
            resolved.end_session_endpoint.as_deref(),
            Some("https://login.example.com/tenant-a/oauth2/v2.0/logout")
        );
        assert_eq!(resolved.device_authorization_endpoint, None);
    }

    #[test]
    fn test_with_tenant_leaves_literal_urls_untouched() {
        let metadata = OpenIdMetadata {
            issuer: "https://idp.example.org".to_string(),
            authorization_endpoint: "https://idp.example.org/authorize".to_string(),
            token_endpoint: "https://idp.example.org/token".to_string(),
            end_session_endpoint: None,
            device_authorization_endpoint: None,
            jwks_uri: None,
        };

        assert_eq!(metadata.with_tenant("tenant-a"), metadata);
    }

    #[test]
    fn test_deserializes_without_optional_fields() {
        let json = r#"{
            "issuer": "https://idp.example.org",
            "authorization_endpoint": "https://idp.example.org/authorize",
            "token_endpoint": "https://idp.example.org/token"
        }"#;

        let metadata: OpenIdMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.issuer, "https://idp.example.org");
        assert_eq!(metadata.end_session_endpoint, None);
        assert_eq!(metadata.jwks_uri, None);
    }
}
