//! Registration against a mocked hub endpoint.

use std::time::Duration;

use assert_matches::assert_matches;
use parley_client::{IdentityClient, Registrar};
use parley_core::{Identity, RegistrationError};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> IdentityClient {
    IdentityClient::new(server.uri(), Duration::from_secs(2))
}

#[tokio::test]
async fn accepted_name_yields_identity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/new-user"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"name": "alice"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "user": {"id": "u-1", "name": "alice"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let identity = client(&server).register("alice").await.unwrap();
    assert_eq!(identity, Identity::new("u-1", "alice"));
}

#[tokio::test]
async fn rejection_carries_hub_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/new-user"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"status": "error", "message": "taken"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).register("alice").await.unwrap_err();
    assert_matches!(err, RegistrationError::Rejected { ref message } if message == "taken");
}

#[tokio::test]
async fn rejection_without_message_uses_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/new-user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "error"})))
        .mount(&server)
        .await;

    let err = client(&server).register("alice").await.unwrap_err();
    assert_matches!(err, RegistrationError::Rejected { ref message } if message == "Registration failed");
}

#[tokio::test]
async fn non_json_body_is_connectivity_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/new-user"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let err = client(&server).register("alice").await.unwrap_err();
    assert_matches!(err, RegistrationError::Connectivity { .. });
}

#[tokio::test]
async fn unexpected_shape_is_connectivity_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/new-user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {"id": "1"}})))
        .mount(&server)
        .await;

    let err = client(&server).register("alice").await.unwrap_err();
    assert_matches!(err, RegistrationError::Connectivity { .. });
}

#[tokio::test]
async fn slow_hub_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/new-user"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(json!({"status": "ok", "user": {"id": "1", "name": "a"}})),
        )
        .mount(&server)
        .await;

    let client = IdentityClient::new(server.uri(), Duration::from_millis(200));
    let err = client.register("alice").await.unwrap_err();
    assert_matches!(err, RegistrationError::Connectivity { .. });
}

#[tokio::test]
async fn unreachable_hub_is_connectivity_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = IdentityClient::new(format!("http://{addr}"), Duration::from_secs(2));
    let err = client.register("alice").await.unwrap_err();
    assert_matches!(err, RegistrationError::Connectivity { .. });
    assert!(std::error::Error::source(&err).is_some());
}
