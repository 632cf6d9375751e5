//! Cache layer.
//!
//! The cache is a flat string-to-string key space shared by two
//! populations:
//!
//! - Durable entities (accounts, credentials, metadata, telemetry,
//!   throttling records) keyed by their identity fields
//! - Temporary per-request items keyed by correlation id
//!
//! [`key`] derives the deterministic keys, [`entity`] defines the stored
//! shapes, [`EntityStore`] reads and writes durable entities with
//! miss-on-corruption semantics, and [`RequestCache`] manages the
//! temporary items and their side-channel mirror.

pub mod entity;
pub mod key;
pub mod request;
pub mod store;

pub use entity::{
    AccessTokenEntity, AccountEntity, AppMetadataEntity, CacheEntity, CacheEntityKind,
    CredentialKind, IdTokenEntity, RefreshTokenEntity, RequestThumbprint, ServerTelemetryEntity,
    ThrottlingEntity,
};
pub use request::{RequestCache, TemporaryItem};
pub use store::EntityStore;
