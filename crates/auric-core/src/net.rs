//! Network capability seam.
//!
//! Instance discovery and OpenID configuration fetches go through
//! [`NetworkCapability`] so the engine never commits to an HTTP client.
//! The `auric-net-reqwest` crate provides the production implementation;
//! tests supply their own.

use async_trait::async_trait;
use url::Url;

/// Errors produced by network capability implementations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// The request could not be sent or the connection failed.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The response body could not be decoded as JSON.
    #[error("failed to decode response body: {message}")]
    Decode {
        /// Description of the decoding failure.
        message: String,
    },

    /// The URL scheme is not allowed (must be HTTPS in production).
    #[error("invalid URL scheme: {scheme} (only HTTPS is allowed)")]
    InvalidScheme {
        /// The rejected scheme.
        scheme: String,
    },

    /// The response exceeded the maximum allowed size.
    #[error("response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },
}

impl NetworkError {
    /// Creates a new `Transport` error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a new `Decode` error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

/// A JSON response with its HTTP status.
///
/// Non-2xx responses are returned as values, not errors; callers decide what
/// a 400 from a discovery endpoint means.
#[derive(Debug, Clone)]
pub struct JsonResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The decoded response body.
    pub body: serde_json::Value,
}

impl JsonResponse {
    /// Creates a response from a status code and decoded body.
    #[must_use]
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    /// Returns `true` if the status code is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserializes the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns a `Decode` error if the body does not match the expected
    /// shape.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, NetworkError> {
        serde_json::from_value(self.body.clone()).map_err(|e| NetworkError::decode(e.to_string()))
    }
}

/// HTTP GET capability for JSON documents.
#[async_trait]
pub trait NetworkCapability: Send + Sync {
    /// Fetches `url` and decodes the response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the body is not
    /// JSON. A non-2xx status is not an error at this level.
    async fn get_json(&self, url: &Url) -> Result<JsonResponse, NetworkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_success_bounds() {
        assert!(JsonResponse::new(200, serde_json::Value::Null).is_success());
        assert!(JsonResponse::new(299, serde_json::Value::Null).is_success());
        assert!(!JsonResponse::new(199, serde_json::Value::Null).is_success());
        assert!(!JsonResponse::new(300, serde_json::Value::Null).is_success());
        assert!(!JsonResponse::new(404, serde_json::Value::Null).is_success());
    }

    #[test]
    fn test_json_decode() {
        #[derive(serde::Deserialize)]
        struct Doc {
            issuer: String,
        }

        let response = JsonResponse::new(200, serde_json::json!({"issuer": "https://a.com"}));
        let doc: Doc = response.json().unwrap();
        assert_eq!(doc.issuer, "https://a.com");

        let response = JsonResponse::new(200, serde_json::json!({"other": 1}));
        assert!(response.json::<Doc>().is_err());
    }

    #[test]
    fn test_error_display() {
        let err = NetworkError::transport("connection refused");
        assert_eq!(err.to_string(), "transport error: connection refused");

        let err = NetworkError::ResponseTooLarge { max_size: 1024 };
        assert_eq!(
            err.to_string(),
            "response exceeds maximum size of 1024 bytes"
        );
    }
}
