//! Pluggable persistence for cache entities and request state.
//!
//! The engine never talks to a storage medium directly. Everything goes
//! through the [`StorageAdapter`] trait so hosts can plug in whatever
//! key-value medium they have: process memory, a browser-style string store,
//! an encrypted file, a remote session service.
//!
//! # Implementation Notes
//!
//! Implementations should:
//!
//! - Treat keys and values as opaque UTF-8 strings
//! - Make `set` overwrite unconditionally
//! - Make `remove` of an absent key a no-op, not an error
//! - Report medium failures (quota, unavailability) through [`StorageError`]
//!   rather than panicking

mod memory;

pub use memory::InMemoryAdapter;

use async_trait::async_trait;

/// Errors produced by storage adapters.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The storage medium is not available.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Description of why the medium is unavailable.
        message: String,
    },

    /// The storage medium rejected a write for lack of space.
    #[error("storage capacity exceeded: {message}")]
    CapacityExceeded {
        /// Description of the capacity failure.
        message: String,
    },

    /// A read or write operation failed.
    #[error("storage operation failed: {message}")]
    Operation {
        /// Description of the failed operation.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `CapacityExceeded` error.
    #[must_use]
    pub fn capacity_exceeded(message: impl Into<String>) -> Self {
        Self::CapacityExceeded {
            message: message.into(),
        }
    }

    /// Creates a new `Operation` error.
    #[must_use]
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation {
            message: message.into(),
        }
    }
}

/// Uniform string key-value interface over a persistence medium.
///
/// Both the durable entity cache and the request-scoped temporary cache are
/// built on this trait. Adapters hold no knowledge of what the strings mean;
/// serialization and key derivation happen above them.
///
/// # Example Implementation
///
/// ```ignore
/// use auric_core::storage::{StorageAdapter, StorageError};
///
/// struct EnvAdapter;
///
/// #[async_trait::async_trait]
/// impl StorageAdapter for EnvAdapter {
///     async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
///         Ok(std::env::var(key).ok())
///     }
///     // ... other methods
/// }
/// ```
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Returns the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be written (unavailable, out of
    /// space).
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes the value stored under `key`. Removing an absent key is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Returns `true` if a value is stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    async fn contains(&self, key: &str) -> Result<bool, StorageError>;

    /// Returns every key currently stored, in no particular order.
    ///
    /// Key scans back entity enumeration and request sweeps, so adapters
    /// should keep this reasonably cheap.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be enumerated.
    async fn keys(&self) -> Result<Vec<String>, StorageError>;
}
