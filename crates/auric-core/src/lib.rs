//! # auric-core
//!
//! Authentication cache and authority trust engine for OAuth2/OIDC
//! client applications.
//!
//! This crate provides:
//! - A deterministic cache schema for accounts, tokens, and metadata
//! - Correlation-keyed temporary storage for in-flight requests
//! - Authority trust validation and OpenID endpoint discovery
//! - Opaque state encoding binding responses to their requests
//! - Interaction response validation and code-exchange orchestration
//! - Server telemetry and request throttling records
//!
//! ## Overview
//!
//! The engine sits between a host application and two injected
//! capabilities: a [`storage::StorageAdapter`] holding the flat
//! string-to-string cache, and a [`net::NetworkCapability`] performing
//! JSON fetches. Everything else, from key derivation to authority
//! trust, is handled in-crate and is deterministic given those two.
//!
//! ## Modules
//!
//! - [`authority`] - Authority validation, trust registry, endpoint discovery
//! - [`cache`] - Entity schema, key derivation, durable and temporary stores
//! - [`config`] - Client application configuration
//! - [`error`] - Crate-wide error taxonomy
//! - [`interaction`] - Interaction response resolution and code exchange
//! - [`net`] - Network capability trait and response envelope
//! - [`protocol`] - State codec, response parsing, ID token claims
//! - [`storage`] - Storage adapter trait and in-memory implementation

pub mod authority;
pub mod cache;
pub mod config;
pub mod error;
pub mod interaction;
pub mod net;
pub mod protocol;
pub mod storage;

pub use authority::{
    Authority, AuthorityState, CloudInstanceMetadata, InstanceDiscoveryResponse, OpenIdMetadata,
    ProtocolMode, TrustRegistry,
};
pub use cache::{
    AccessTokenEntity, AccountEntity, AppMetadataEntity, CacheEntity, CacheEntityKind,
    CredentialKind, EntityStore, IdTokenEntity, RefreshTokenEntity, RequestCache,
    RequestThumbprint, ServerTelemetryEntity, TemporaryItem, ThrottlingEntity,
};
pub use config::{ClientConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use interaction::{CodeExchangeRequest, ResolvedResponse, ResponseResolver, TokenExchanger};
pub use net::{JsonResponse, NetworkCapability, NetworkError};
pub use protocol::{
    AuthorizeResponse, IdTokenClaims, InteractionKind, ProtocolState, decode_id_token_claims,
};
pub use storage::{InMemoryAdapter, StorageAdapter, StorageError};

/// Type alias for authentication cache and authority results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use auric_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::authority::{Authority, ProtocolMode, TrustRegistry};
    pub use crate::cache::{
        AccessTokenEntity, AccountEntity, CacheEntity, CacheEntityKind, CredentialKind,
        EntityStore, IdTokenEntity, RefreshTokenEntity, RequestCache, TemporaryItem,
    };
    pub use crate::config::{ClientConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::interaction::{
        CodeExchangeRequest, ResolvedResponse, ResponseResolver, TokenExchanger,
    };
    pub use crate::net::{JsonResponse, NetworkCapability, NetworkError};
    pub use crate::protocol::{AuthorizeResponse, InteractionKind, ProtocolState};
    pub use crate::storage::{InMemoryAdapter, StorageAdapter, StorageError};
}
