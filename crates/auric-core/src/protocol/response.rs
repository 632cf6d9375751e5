//! Authorization response payload parsing.
//!
//! The return leg of an interactive flow delivers its parameters in the
//! redirect URL's fragment (or query, for providers configured that way).
//! This module parses that raw string into [`AuthorizeResponse`] and
//! surfaces provider-reported errors.

use crate::error::AuthError;

/// Parameters returned by the authorization endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizeResponse {
    /// The authorization code to exchange.
    pub code: Option<String>,

    /// The echoed state parameter.
    pub state: Option<String>,

    /// An ID token, present in hybrid response modes.
    pub id_token: Option<String>,

    /// Opaque client info blob identifying the account.
    pub client_info: Option<String>,

    /// Host name of the cloud instance that actually served the request,
    /// when it differs from the instance the request was sent to.
    pub cloud_instance_host_name: Option<String>,

    /// OAuth error code, when the provider rejected the request.
    pub error: Option<String>,

    /// Human-readable error description accompanying `error`.
    pub error_description: Option<String>,
}

impl AuthorizeResponse {
    /// Parses a raw response fragment or query string.
    ///
    /// A leading `#` or `?` is tolerated. Parameter values are
    /// percent-decoded; unknown parameters are ignored.
    ///
    /// # Errors
    ///
    /// Returns `EmptyResponse` if nothing remains after stripping the
    /// leading delimiter.
    pub fn from_fragment(fragment: &str) -> Result<Self, AuthError> {
        let trimmed = fragment
            .strip_prefix('#')
            .or_else(|| fragment.strip_prefix('?'))
            .unwrap_or(fragment);

        if trimmed.is_empty() {
            return Err(AuthError::EmptyResponse);
        }

        let mut response = Self::default();
        for (name, value) in url::form_urlencoded::parse(trimmed.as_bytes()) {
            let value = value.into_owned();
            match name.as_ref() {
                "code" => response.code = Some(value),
                "state" => response.state = Some(value),
                "id_token" => response.id_token = Some(value),
                "client_info" => response.client_info = Some(value),
                "cloud_instance_host_name" => response.cloud_instance_host_name = Some(value),
                "error" => response.error = Some(value),
                "error_description" => response.error_description = Some(value),
                _ => {}
            }
        }

        Ok(response)
    }

    /// Checks whether the provider reported an error.
    ///
    /// # Errors
    ///
    /// Returns `ServerResponse` carrying the provider's error code and
    /// description when the `error` parameter is present.
    pub fn validate(&self) -> Result<(), AuthError> {
        if let Some(error) = &self.error {
            return Err(AuthError::server_response(
                error.clone(),
                self.error_description.clone().unwrap_or_default(),
            ));
        }
        Ok(())
    }
}
