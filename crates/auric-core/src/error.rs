//! Error types for cache, authority, and interaction operations.
//!
//! This module defines the crate-wide error taxonomy. Adapter-level failures
//! (`StorageError`, `NetworkError`) are defined next to their traits and fold
//! into [`AuthError`] via `From`.

use std::fmt;

use crate::net::NetworkError;
use crate::storage::StorageError;

/// Errors that can occur during authentication cache and authority operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The authority URL is malformed, relative, or uses an unsupported scheme.
    #[error("Invalid authority: {message}")]
    InvalidAuthority {
        /// Description of why the authority URL is invalid.
        message: String,
    },

    /// The authority host is not part of the trusted instance set.
    #[error("Untrusted authority: {host}")]
    UntrustedAuthority {
        /// The host that failed trust validation.
        host: String,
    },

    /// Endpoint metadata was requested before discovery completed.
    #[error("Endpoints have not been resolved for this authority")]
    DiscoveryIncomplete,

    /// The OpenID configuration could not be fetched or parsed.
    #[error("Endpoint discovery failed: {message}")]
    DiscoveryFailed {
        /// Description of the discovery failure.
        message: String,
    },

    /// A required request-scoped cache item is missing or unreadable.
    #[error("Missing request data: {item}")]
    RequestDataMissing {
        /// The name of the missing item.
        item: String,
    },

    /// The returned state does not match the state cached for the request.
    #[error("State mismatch: returned state does not match cached state")]
    StateMismatch,

    /// The ID token nonce does not match the nonce cached for the request.
    #[error("Nonce mismatch: ID token nonce does not match cached nonce")]
    NonceMismatch,

    /// The state parameter could not be decoded.
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of why the state string is invalid.
        message: String,
    },

    /// The server response contained no parameters.
    #[error("Empty response: no parameters present in the server response")]
    EmptyResponse,

    /// The server response carried no authorization code.
    #[error("Authorization code missing from the server response")]
    AuthorizationCodeMissing,

    /// A token artifact could not be decoded.
    #[error("Malformed token: {message}")]
    MalformedToken {
        /// Description of the decoding failure.
        message: String,
    },

    /// The authorization server returned an error response.
    #[error("Server returned an error: {error} - {description}")]
    ServerResponse {
        /// The OAuth error code returned by the server.
        error: String,
        /// The error description returned by the server.
        description: String,
    },

    /// The authorization code exchange failed.
    #[error("Token exchange failed: {message}")]
    TokenExchange {
        /// Description of the exchange failure.
        message: String,
    },

    /// A network operation failed.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// A storage adapter operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Creates a new `InvalidAuthority` error.
    #[must_use]
    pub fn invalid_authority(message: impl Into<String>) -> Self {
        Self::InvalidAuthority {
            message: message.into(),
        }
    }

    /// Creates a new `UntrustedAuthority` error.
    #[must_use]
    pub fn untrusted_authority(host: impl Into<String>) -> Self {
        Self::UntrustedAuthority { host: host.into() }
    }

    /// Creates a new `DiscoveryFailed` error.
    #[must_use]
    pub fn discovery_failed(message: impl Into<String>) -> Self {
        Self::DiscoveryFailed {
            message: message.into(),
        }
    }

    /// Creates a new `RequestDataMissing` error.
    #[must_use]
    pub fn request_data_missing(item: impl Into<String>) -> Self {
        Self::RequestDataMissing { item: item.into() }
    }

    /// Creates a new `InvalidState` error.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a new `MalformedToken` error.
    #[must_use]
    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken {
            message: message.into(),
        }
    }

    /// Creates a new `ServerResponse` error.
    #[must_use]
    pub fn server_response(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::ServerResponse {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Creates a new `TokenExchange` error.
    #[must_use]
    pub fn token_exchange(message: impl Into<String>) -> Self {
        Self::TokenExchange {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying the operation may succeed.
    ///
    /// Discovery and network failures are transient; everything else either
    /// reflects broken configuration or a response that will never validate.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DiscoveryFailed { .. } | Self::Network(_))
    }

    /// Returns `true` if this error reflects invalid caller configuration.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::InvalidAuthority { .. })
    }

    /// Returns `true` if this error was produced while validating the
    /// server response against cached request data.
    #[must_use]
    pub fn is_response_validation_error(&self) -> bool {
        matches!(
            self,
            Self::StateMismatch
                | Self::NonceMismatch
                | Self::InvalidState { .. }
                | Self::EmptyResponse
                | Self::AuthorizationCodeMissing
                | Self::MalformedToken { .. }
                | Self::ServerResponse { .. }
        )
    }

    /// Returns `true` if this error indicates corrupted or missing cache
    /// state that cannot be recovered without restarting the interaction.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RequestDataMissing { .. } | Self::Storage(_))
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidAuthority { .. } => ErrorCategory::Configuration,
            Self::UntrustedAuthority { .. } => ErrorCategory::Trust,
            Self::DiscoveryIncomplete => ErrorCategory::Discovery,
            Self::DiscoveryFailed { .. } => ErrorCategory::Discovery,
            Self::RequestDataMissing { .. } => ErrorCategory::CacheIntegrity,
            Self::StateMismatch => ErrorCategory::Protocol,
            Self::NonceMismatch => ErrorCategory::Protocol,
            Self::InvalidState { .. } => ErrorCategory::Protocol,
            Self::EmptyResponse => ErrorCategory::Protocol,
            Self::AuthorizationCodeMissing => ErrorCategory::Protocol,
            Self::MalformedToken { .. } => ErrorCategory::Protocol,
            Self::ServerResponse { .. } => ErrorCategory::Protocol,
            Self::TokenExchange { .. } => ErrorCategory::Exchange,
            Self::Network(_) => ErrorCategory::Network,
            Self::Storage(_) => ErrorCategory::Storage,
        }
    }

    /// Returns a stable error code for this error.
    ///
    /// Codes are recorded in server telemetry entries and must stay stable
    /// across releases.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAuthority { .. } => "invalid_authority",
            Self::UntrustedAuthority { .. } => "untrusted_authority",
            Self::DiscoveryIncomplete => "endpoints_not_resolved",
            Self::DiscoveryFailed { .. } => "endpoint_discovery_failure",
            Self::RequestDataMissing { .. } => "missing_request_data",
            Self::StateMismatch => "state_mismatch",
            Self::NonceMismatch => "nonce_mismatch",
            Self::InvalidState { .. } => "invalid_state",
            Self::EmptyResponse => "empty_response",
            Self::AuthorizationCodeMissing => "auth_code_missing",
            Self::MalformedToken { .. } => "malformed_token",
            Self::ServerResponse { .. } => "server_error_response",
            Self::TokenExchange { .. } => "token_exchange_failure",
            Self::Network(_) => "network_error",
            Self::Storage(_) => "storage_error",
        }
    }
}

/// Categories of errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid caller-supplied configuration.
    Configuration,
    /// Authority trust validation failures.
    Trust,
    /// Endpoint discovery failures.
    Discovery,
    /// Missing or corrupted request-scoped cache state.
    CacheIntegrity,
    /// Response validation and decoding failures.
    Protocol,
    /// Authorization code exchange failures.
    Exchange,
    /// Transport-level failures.
    Network,
    /// Storage adapter failures.
    Storage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Trust => write!(f, "trust"),
            Self::Discovery => write!(f, "discovery"),
            Self::CacheIntegrity => write!(f, "cache_integrity"),
            Self::Protocol => write!(f, "protocol"),
            Self::Exchange => write!(f, "exchange"),
            Self::Network => write!(f, "network"),
            Self::Storage => write!(f, "storage"),
        }
    }
}
