//! Interaction response handling.
//!
//! [`ResponseResolver`] takes the raw fragment an interactive flow
//! returns with and turns it into a validated code exchange: it decodes
//! the state, replays the request's cached items against the response,
//! re-resolves the authority the request actually went out with, honors
//! a provider-reported cloud instance, and hands the code to an external
//! [`TokenExchanger`]. Temporary cache items for the request are cleared
//! on every exit path, success or failure, so a retry starts from a
//! clean correlation id.

use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::authority::{Authority, TrustRegistry};
use crate::cache::{EntityStore, RequestCache, TemporaryItem};
use crate::error::AuthError;
use crate::net::NetworkCapability;
use crate::protocol::{AuthorizeResponse, ProtocolState, decode_id_token_claims};

/// Everything the external token-exchange step needs to redeem a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeExchangeRequest {
    /// The authorization code returned by the provider.
    pub code: String,
    /// Correlation id of the request being completed.
    pub correlation_id: String,
    /// Nonce the final ID token must carry.
    pub nonce: String,
    /// The caller's own opaque state, if one was attached.
    pub caller_state: Option<String>,
    /// Token endpoint of the resolved authority.
    pub token_endpoint: String,
    /// Canonical URL of the resolved authority.
    pub authority: String,
    /// Raw client info blob from the response, when present.
    pub client_info: Option<String>,
}

/// External collaborator that redeems an authorization code.
///
/// Implementations own the token request wire format and the caching of
/// whatever the token endpoint returns.
///
/// # Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
/// use auric_core::error::AuthError;
/// use auric_core::interaction::{CodeExchangeRequest, TokenExchanger};
///
/// struct HttpExchanger;
///
/// #[async_trait]
/// impl TokenExchanger for HttpExchanger {
///     async fn exchange(&self, request: CodeExchangeRequest) -> Result<(), AuthError> {
///         // POST request.code to request.token_endpoint, validate the
///         // returned ID token nonce against request.nonce, cache tokens.
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Redeems the authorization code at the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails; the resolver still clears
    /// the request's temporary cache items.
    async fn exchange(&self, request: CodeExchangeRequest) -> Result<(), AuthError>;
}

/// Outcome of a successfully resolved interaction response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResponse {
    /// Correlation id of the completed request.
    pub correlation_id: String,
    /// The caller's opaque state, handed back for resumption.
    pub caller_state: Option<String>,
}

/// Validates interaction responses against cached request data and
/// drives the code exchange.
pub struct ResponseResolver {
    client_id: String,
    request_cache: RequestCache,
    store: EntityStore,
    registry: Arc<TrustRegistry>,
    network: Arc<dyn NetworkCapability>,
}

impl ResponseResolver {
    /// Creates a resolver for one client application.
    pub fn new(
        client_id: impl Into<String>,
        request_cache: RequestCache,
        store: EntityStore,
        registry: Arc<TrustRegistry>,
        network: Arc<dyn NetworkCapability>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            request_cache,
            store,
            registry,
            network,
        }
    }

    /// Resolves a raw response fragment into a completed code exchange.
    ///
    /// The response is validated against the request's cached state,
    /// nonce, and authority before the code is handed to `exchanger`.
    /// Once the correlation id is known, the request's temporary items
    /// are cleared on every exit path and failures are recorded in
    /// server telemetry.
    ///
    /// # Errors
    ///
    /// Returns `EmptyResponse` for a blank fragment, `InvalidState` if
    /// the returned state does not decode, `RequestDataMissing` if the
    /// cached request items are gone, `StateMismatch`/`NonceMismatch`
    /// for integrity failures, `ServerResponse` when the provider
    /// reported an error, and any authority or exchange error from the
    /// later stages.
    pub async fn resolve(
        &self,
        fragment: &str,
        authority: &Authority,
        exchanger: &dyn TokenExchanger,
    ) -> AuthResult<ResolvedResponse> {
        let response = AuthorizeResponse::from_fragment(fragment)?;
        let returned_state = response
            .state
            .clone()
            .ok_or_else(|| AuthError::invalid_state("server response contains no state"))?;
        let decoded = ProtocolState::parse(&returned_state)?;
        let correlation_id = decoded.correlation_id.clone();

        tracing::debug!("Handling interaction response for request {}", correlation_id);
        let result = self
            .process(&response, &returned_state, &decoded, authority, exchanger)
            .await;

        // Cleanup runs on success and failure alike.
        if let Err(e) = self.request_cache.end_request(&correlation_id).await {
            tracing::warn!(
                "Failed to clear temporary items for request {}: {}",
                correlation_id,
                e
            );
        }

        match result {
            Ok(()) => {
                if let Err(e) = self.store.clear_telemetry(&self.client_id).await {
                    tracing::debug!("Failed to clear telemetry for {}: {}", self.client_id, e);
                }
                Ok(ResolvedResponse {
                    correlation_id,
                    caller_state: decoded.caller_state,
                })
            }
            Err(error) => {
                if let Err(e) = self
                    .store
                    .record_failure(&self.client_id, &correlation_id, error.error_code())
                    .await
                {
                    tracing::debug!("Failed to record telemetry failure: {}", e);
                }
                Err(error)
            }
        }
    }

    async fn process(
        &self,
        response: &AuthorizeResponse,
        returned_state: &str,
        decoded: &ProtocolState,
        authority: &Authority,
        exchanger: &dyn TokenExchanger,
    ) -> AuthResult<()> {
        let correlation_id = decoded.correlation_id.as_str();

        let cached_state = self
            .request_cache
            .require(correlation_id, TemporaryItem::RequestState)
            .await?;
        if cached_state != returned_state {
            return Err(AuthError::StateMismatch);
        }

        response.validate()?;

        let cached_nonce = self
            .request_cache
            .require(correlation_id, TemporaryItem::Nonce)
            .await?;
        if let Some(raw_token) = &response.id_token {
            let claims = decode_id_token_claims(raw_token)?;
            if claims.nonce.as_deref() != Some(cached_nonce.as_str()) {
                return Err(AuthError::NonceMismatch);
            }
        }

        let cached_authority = self
            .request_cache
            .require(correlation_id, TemporaryItem::Authority)
            .await?;
        let effective = self
            .resolve_authority(&cached_authority, authority, response)
            .await?;

        let code = response
            .code
            .clone()
            .ok_or(AuthError::AuthorizationCodeMissing)?;

        let request = CodeExchangeRequest {
            code,
            correlation_id: correlation_id.to_string(),
            nonce: cached_nonce,
            caller_state: decoded.caller_state.clone(),
            token_endpoint: effective.token_endpoint()?.to_string(),
            authority: effective.canonical_url().to_string(),
            client_info: response.client_info.clone(),
        };
        exchanger.exchange(request).await
    }

    /// Picks the authority the exchange runs against.
    ///
    /// The authority the request was cached with wins over the one the
    /// caller currently holds; a provider-reported cloud instance that is
    /// not an alias forces discovery of a fresh authority for that host.
    /// The caller's authority is never mutated.
    async fn resolve_authority(
        &self,
        cached_authority: &str,
        authority: &Authority,
        response: &AuthorizeResponse,
    ) -> AuthResult<Authority> {
        let cached = Authority::new(cached_authority, authority.mode())?;
        let mut effective = if cached.canonical_url() == authority.canonical_url() {
            authority.clone()
        } else {
            tracing::debug!(
                "Response belongs to authority {}, overriding {}",
                cached.canonical_url(),
                authority.canonical_url()
            );
            cached
        };

        if !effective.is_discovered() {
            effective
                .resolve_endpoints(&self.registry, self.network.as_ref())
                .await?;
        }

        if let Some(reported) = &response.cloud_instance_host_name {
            if !effective.is_alias(reported) {
                tracing::debug!(
                    "Provider reported cloud instance {}, discovering a fresh authority",
                    reported
                );
                let mut swapped = effective.canonical_url().clone();
                swapped.set_host(Some(reported)).map_err(|e| {
                    AuthError::invalid_authority(format!(
                        "cloud instance host '{reported}' is invalid: {e}"
                    ))
                })?;
                effective = Authority::discover(
                    swapped.as_str(),
                    effective.mode(),
                    &self.registry,
                    self.network.as_ref(),
                )
                .await?;
            }
        }

        Ok(effective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::ProtocolMode;
    use crate::cache::key;
    use crate::protocol::InteractionKind;
    use crate::storage::{InMemoryAdapter, StorageAdapter};
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    struct RecordingExchanger {
        calls: AtomicUsize,
        fail: bool,
        last_request: Mutex<Option<CodeExchangeRequest>>,
    }

    impl RecordingExchanger {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                last_request: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
                last_request: Mutex::new(None),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_request(&self) -> Option<CodeExchangeRequest> {
            self.last_request.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TokenExchanger for RecordingExchanger {
        async fn exchange(&self, request: CodeExchangeRequest) -> Result<(), AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request);
            if self.fail {
                Err(AuthError::token_exchange("exchange refused"))
            } else {
                Ok(())
            }
        }
    }

    /// Serves instance discovery for two single-host clouds
    /// (login.example.com and login.other.example) and OpenID
    /// configuration for whichever host is asked, without tenant
    /// templating. Every requested URL is recorded.
    struct TestNetwork {
        requests: Mutex<Vec<Url>>,
    }

    impl TestNetwork {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requested_hosts(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|url| url.host_str().unwrap_or_default().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl NetworkCapability for TestNetwork {
        async fn get_json(
            &self,
            url: &Url,
        ) -> Result<crate::net::JsonResponse, crate::net::NetworkError> {
            self.requests.lock().unwrap().push(url.clone());
            let host = url.host_str().unwrap_or_default();
            let body = if url.path().ends_with("/discovery/instance") {
                serde_json::json!({
                    "metadata": [
                        {
                            "preferred_network": "login.example.com",
                            "preferred_cache": "login.example.com",
                            "aliases": ["login.example.com"]
                        },
                        {
                            "preferred_network": "login.other.example",
                            "preferred_cache": "login.other.example",
                            "aliases": ["login.other.example"]
                        }
                    ]
                })
            } else {
                serde_json::json!({
                    "issuer": format!("https://{host}/common/v2.0"),
                    "authorization_endpoint":
                        format!("https://{host}/common/oauth2/v2.0/authorize"),
                    "token_endpoint": format!("https://{host}/common/oauth2/v2.0/token")
                })
            };
            Ok(crate::net::JsonResponse::new(200, body))
        }
    }

    struct TestFlow {
        resolver: ResponseResolver,
        cache: RequestCache,
        store: EntityStore,
        authority: Authority,
        adapter: Arc<InMemoryAdapter>,
        network: Arc<TestNetwork>,
    }

    fn create_test_flow() -> TestFlow {
        let adapter = Arc::new(InMemoryAdapter::new());
        let cache = RequestCache::new(adapter.clone());
        let store = EntityStore::new(adapter.clone());
        let registry = Arc::new(TrustRegistry::new());
        let network = Arc::new(TestNetwork::new());
        let resolver = ResponseResolver::new(
            "client-1",
            cache.clone(),
            store.clone(),
            registry,
            network.clone(),
        );
        let authority =
            Authority::new("https://login.example.com/common", ProtocolMode::V2).unwrap();
        TestFlow {
            resolver,
            cache,
            store,
            authority,
            adapter,
            network,
        }
    }

    fn build_fragment(pairs: &[(&str, &str)]) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in pairs {
            serializer.append_pair(key, value);
        }
        format!("#{}", serializer.finish())
    }

    fn encode_test_token(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        format!("{header}.{payload}.sig")
    }

    async fn begin_test_request(flow: &TestFlow) -> (String, String) {
        let state = ProtocolState::generate(InteractionKind::Popup, Some("app-state")).encode();
        let id = flow
            .cache
            .begin_request(&state, "nonce-1", "https://login.example.com/common/")
            .await
            .unwrap();
        (id, state)
    }

    #[tokio::test]
    async fn test_resolves_valid_response_and_clears_request() {
        let flow = create_test_flow();
        let (id, state) = begin_test_request(&flow).await;
        let exchanger = RecordingExchanger::new();

        let fragment = build_fragment(&[("code", "auth-code-1"), ("state", &state)]);
        let resolved = flow
            .resolver
            .resolve(&fragment, &flow.authority, &exchanger)
            .await
            .unwrap();

        assert_eq!(resolved.correlation_id, id);
        assert_eq!(resolved.caller_state.as_deref(), Some("app-state"));
        assert_eq!(exchanger.call_count(), 1);

        // Every temporary item for the request is gone.
        let keys = flow.adapter.keys().await.unwrap();
        assert!(keys.iter().all(|k| !k.contains(&id)));
    }

    #[tokio::test]
    async fn test_state_mismatch_rejected_before_exchange() {
        let flow = create_test_flow();
        let (_, state) = begin_test_request(&flow).await;
        let exchanger = RecordingExchanger::new();

        // A different request's state decodes to the same correlation id
        // only if forged; simulate by tampering with the caller suffix.
        let tampered = format!("{state}-tampered");
        let fragment = build_fragment(&[("code", "auth-code-1"), ("state", &tampered)]);
        let err = flow
            .resolver
            .resolve(&fragment, &flow.authority, &exchanger)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::StateMismatch));
        assert_eq!(exchanger.call_count(), 0);
    }

    #[tokio::test]
    async fn test_nonce_mismatch_rejected_before_exchange() {
        let flow = create_test_flow();
        let (_, state) = begin_test_request(&flow).await;
        let exchanger = RecordingExchanger::new();

        let token = encode_test_token(&serde_json::json!({"nonce": "nonce-2"}));
        let fragment = build_fragment(&[
            ("code", "auth-code-1"),
            ("state", &state),
            ("id_token", &token),
        ]);
        let err = flow
            .resolver
            .resolve(&fragment, &flow.authority, &exchanger)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::NonceMismatch));
        assert_eq!(exchanger.call_count(), 0);
    }

    #[tokio::test]
    async fn test_matching_nonce_is_accepted() {
        let flow = create_test_flow();
        let (_, state) = begin_test_request(&flow).await;
        let exchanger = RecordingExchanger::new();

        let token = encode_test_token(&serde_json::json!({"nonce": "nonce-1"}));
        let fragment = build_fragment(&[
            ("code", "auth-code-1"),
            ("state", &state),
            ("id_token", &token),
        ]);

        flow.resolver
            .resolve(&fragment, &flow.authority, &exchanger)
            .await
            .unwrap();
        assert_eq!(exchanger.call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_cached_items_surface_request_data_missing() {
        let flow = create_test_flow();
        let exchanger = RecordingExchanger::new();

        // No begin_request: the cache has nothing for this id.
        let state = ProtocolState::generate(InteractionKind::Popup, None).encode();
        let fragment = build_fragment(&[("code", "auth-code-1"), ("state", &state)]);
        let err = flow
            .resolver
            .resolve(&fragment, &flow.authority, &exchanger)
            .await
            .unwrap_err();

        match err {
            AuthError::RequestDataMissing { item } => assert_eq!(item, "request.state"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(exchanger.call_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_is_surfaced() {
        let flow = create_test_flow();
        let (_, state) = begin_test_request(&flow).await;
        let exchanger = RecordingExchanger::new();

        let fragment = build_fragment(&[
            ("error", "access_denied"),
            ("error_description", "user cancelled"),
            ("state", &state),
        ]);
        let err = flow
            .resolver
            .resolve(&fragment, &flow.authority, &exchanger)
            .await
            .unwrap_err();

        match err {
            AuthError::ServerResponse { error, description } => {
                assert_eq!(error, "access_denied");
                assert_eq!(description, "user cancelled");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(exchanger.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cloud_instance_mismatch_discovers_fresh_authority() {
        let flow = create_test_flow();
        let (_, state) = begin_test_request(&flow).await;
        let exchanger = RecordingExchanger::new();

        let fragment = build_fragment(&[
            ("code", "auth-code-1"),
            ("state", &state),
            ("cloud_instance_host_name", "login.other.example"),
        ]);
        flow.resolver
            .resolve(&fragment, &flow.authority, &exchanger)
            .await
            .unwrap();

        // The exchange targets the reported host's endpoints, not the
        // original authority's.
        let request = exchanger.last_request().unwrap();
        assert_eq!(
            request.token_endpoint,
            "https://login.other.example/common/oauth2/v2.0/token"
        );
        assert_eq!(request.authority, "https://login.other.example/common/");

        // Discovery actually ran against the reported host, and the
        // caller's authority was not mutated.
        assert!(
            flow.network
                .requested_hosts()
                .contains(&"login.other.example".to_string())
        );
        assert_eq!(flow.authority.host(), "login.example.com");
    }

    #[tokio::test]
    async fn test_missing_code_is_rejected() {
        let flow = create_test_flow();
        let (_, state) = begin_test_request(&flow).await;
        let exchanger = RecordingExchanger::new();

        let fragment = build_fragment(&[("state", &state)]);
        let err = flow
            .resolver
            .resolve(&fragment, &flow.authority, &exchanger)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::AuthorizationCodeMissing));
    }

    #[tokio::test]
    async fn test_cleanup_and_telemetry_on_exchange_failure() {
        let flow = create_test_flow();
        let (id, state) = begin_test_request(&flow).await;
        let exchanger = RecordingExchanger::failing();

        let fragment = build_fragment(&[("code", "auth-code-1"), ("state", &state)]);
        let err = flow
            .resolver
            .resolve(&fragment, &flow.authority, &exchanger)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::TokenExchange { .. }));
        assert_eq!(exchanger.call_count(), 1);

        // Temporary items are cleared even though the exchange failed.
        let keys = flow.adapter.keys().await.unwrap();
        assert!(keys.iter().all(|k| !k.contains(&id)));

        // The failure landed in server telemetry.
        let telemetry = flow
            .store
            .read_server_telemetry("client-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(telemetry.errors, vec!["token_exchange_failure".to_string()]);
        assert_eq!(telemetry.failed_requests, vec![id]);
    }

    #[tokio::test]
    async fn test_success_clears_recorded_telemetry() {
        let flow = create_test_flow();
        flow.store
            .record_failure("client-1", "old-request", "network_error")
            .await
            .unwrap();

        let (_, state) = begin_test_request(&flow).await;
        let exchanger = RecordingExchanger::new();
        let fragment = build_fragment(&[("code", "auth-code-1"), ("state", &state)]);
        flow.resolver
            .resolve(&fragment, &flow.authority, &exchanger)
            .await
            .unwrap();

        let telemetry_key = key::server_telemetry_key("client-1");
        assert_eq!(flow.adapter.get(&telemetry_key).await.unwrap(), None);
    }
}
