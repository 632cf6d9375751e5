//! Wire-level helpers for the redirect round trip.
//!
//! This module covers the pieces of protocol plumbing the cache engine
//! needs:
//!
//! - [`state`] - The opaque state parameter codec binding a correlation id,
//!   interaction kind, and caller state into one string
//! - [`response`] - Parsing of the returned response fragment
//! - [`claims`] - Unverified ID token claims extraction for nonce checks

pub mod claims;
pub mod response;
pub mod state;

pub use claims::{IdTokenClaims, decode_id_token_claims};
pub use response::AuthorizeResponse;
pub use state::{InteractionKind, ProtocolState};
