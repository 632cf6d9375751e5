//! End-to-end discovery tests over a real HTTP socket.

use auric_core::authority::{Authority, ProtocolMode, TrustRegistry};
use auric_core::net::{NetworkCapability, NetworkError};
use auric_net_reqwest::{NetworkConfig, ReqwestNetwork};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_network() -> ReqwestNetwork {
    ReqwestNetwork::new(NetworkConfig::new().with_allow_http(true))
}

async fn mount_instance_discovery(server: &MockServer) {
    let instance_doc = serde_json::json!({
        "tenant_discovery_endpoint":
            format!("{}/common/v2.0/.well-known/openid-configuration", server.uri()),
        "metadata": [{
            "preferred_network": "127.0.0.1",
            "preferred_cache": "cache.example.net",
            "aliases": ["127.0.0.1", "legacy.example.net"]
        }]
    });

    Mock::given(method("GET"))
        .and(path("/common/discovery/instance"))
        .and(query_param("api-version", "1.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&instance_doc))
        .mount(server)
        .await;
}

async fn mount_openid_configuration(server: &MockServer) {
    let uri = server.uri();
    let openid_doc = serde_json::json!({
        "issuer": format!("{uri}/{{tenantid}}/v2.0"),
        "authorization_endpoint": format!("{uri}/{{tenant}}/oauth2/v2.0/authorize"),
        "token_endpoint": format!("{uri}/{{tenant}}/oauth2/v2.0/token"),
        "end_session_endpoint": format!("{uri}/{{tenant}}/oauth2/v2.0/logout")
    });

    Mock::given(method("GET"))
        .and(path("/common/v2.0/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&openid_doc))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_authority_discovery_end_to_end() {
    let server = MockServer::start().await;
    mount_instance_discovery(&server).await;
    mount_openid_configuration(&server).await;

    let network = test_network();
    let registry = TrustRegistry::new();
    let authority = Authority::discover(
        format!("{}/common", server.uri()),
        ProtocolMode::V2,
        &registry,
        &network,
    )
    .await
    .unwrap();

    assert!(authority.is_discovered());
    assert_eq!(
        authority.authorization_endpoint().unwrap(),
        format!("{}/common/oauth2/v2.0/authorize", server.uri())
    );
    assert_eq!(
        authority.token_endpoint().unwrap(),
        format!("{}/common/oauth2/v2.0/token", server.uri())
    );
    assert_eq!(
        authority.issuer().unwrap(),
        format!("{}/common/v2.0", server.uri())
    );
    assert!(authority.is_alias("legacy.example.net"));
    assert_eq!(authority.preferred_cache_environment(), "cache.example.net");
    assert!(registry.is_trusted("legacy.example.net").await);
}

#[tokio::test]
async fn test_untrusted_host_never_reaches_openid_configuration() {
    let server = MockServer::start().await;

    let instance_doc = serde_json::json!({
        "metadata": [{
            "preferred_network": "login.elsewhere.example",
            "preferred_cache": "login.elsewhere.example",
            "aliases": ["login.elsewhere.example"]
        }]
    });
    Mock::given(method("GET"))
        .and(path("/common/discovery/instance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&instance_doc))
        .mount(&server)
        .await;
    // No openid-configuration mock: a fetch attempt would 404 with a
    // non-JSON body and fail the test with the wrong error.

    let network = test_network();
    let registry = TrustRegistry::new();
    let result = Authority::discover(
        format!("{}/common", server.uri()),
        ProtocolMode::V2,
        &registry,
        &network,
    )
    .await;

    assert!(matches!(
        result,
        Err(auric_core::error::AuthError::UntrustedAuthority { .. })
    ));
}

#[tokio::test]
async fn test_non_success_status_is_returned_as_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": "not_found"
        })))
        .mount(&server)
        .await;

    let network = test_network();
    let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
    let response = network.get_json(&url).await.unwrap();

    assert_eq!(response.status, 404);
    assert!(!response.is_success());
    assert_eq!(response.body["error"], "not_found");
}

#[tokio::test]
async fn test_non_json_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>sign in</html>"))
        .mount(&server)
        .await;

    let network = test_network();
    let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
    let err = network.get_json(&url).await.unwrap_err();

    assert!(matches!(err, NetworkError::Decode { .. }));
}

#[tokio::test]
async fn test_oversized_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "filler": "x".repeat(4096)
        })))
        .mount(&server)
        .await;

    let network = ReqwestNetwork::new(
        NetworkConfig::new()
            .with_allow_http(true)
            .with_max_response_size(256),
    );
    let url = Url::parse(&format!("{}/huge", server.uri())).unwrap();
    let err = network.get_json(&url).await.unwrap_err();

    assert!(matches!(err, NetworkError::ResponseTooLarge { max_size: 256 }));
}

#[tokio::test]
async fn test_http_is_rejected_by_default() {
    let network = ReqwestNetwork::with_defaults();
    let url = Url::parse("http://login.example.com/common").unwrap();
    let err = network.get_json(&url).await.unwrap_err();

    match err {
        NetworkError::InvalidScheme { scheme } => assert_eq!(scheme, "http"),
        other => panic!("unexpected error: {other:?}"),
    }
}
