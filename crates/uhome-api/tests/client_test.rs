#![allow(clippy::unwrap_used)]
// Integration tests for `UhomeClient` using wiremock.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use uhome_api::{
    DeviceCommand, Error, OAuthClient, OAuthConfig, Token, TokenProvider, UhomeClient,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn provider(server: &MockServer) -> Arc<TokenProvider> {
    let config = OAuthConfig::new("client-id", SecretString::from("client-secret".to_string()))
        .unwrap()
        .with_token_url(Url::parse(&format!("{}/token", server.uri())).unwrap());
    let oauth = OAuthClient::with_client(reqwest::Client::new(), config);
    let token = Token::new(
        "access-1",
        Some("refresh-1".into()),
        Duration::from_secs(3600),
    );
    Arc::new(TokenProvider::new(oauth, token))
}

async fn setup() -> (MockServer, UhomeClient) {
    let server = MockServer::start().await;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let endpoint = Url::parse(&format!("{}/action", server.uri())).unwrap();
    let client = UhomeClient::with_client(http, endpoint, provider(&server));
    (server, client)
}

fn envelope(payload: Value) -> Value {
    json!({ "header": { "namespace": "Uhome.Device", "name": "Response" }, "payload": payload })
}

// ── Envelope tests ──────────────────────────────────────────────────

#[tokio::test]
async fn test_request_sends_envelope_with_bearer_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_partial_json(json!({
            "header": {
                "namespace": "Uhome.Device",
                "name": "Discovery",
                "payloadVersion": "1"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({"devices": []}))))
        .expect(1)
        .mount(&server)
        .await;

    let devices = client.discover_devices().await.unwrap();
    assert!(devices.is_empty());
}

#[tokio::test]
async fn test_message_id_is_fresh_per_call() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({"devices": []}))))
        .expect(2)
        .mount(&server)
        .await;

    client.discover_devices().await.unwrap();
    client.discover_devices().await.unwrap();

    let requests: Vec<Request> = server.received_requests().await.unwrap();
    let ids: Vec<Value> = requests
        .iter()
        .map(|r| serde_json::from_slice::<Value>(&r.body).unwrap()["header"]["messageId"].clone())
        .collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

// ── Status mapping tests ────────────────────────────────────────────

#[tokio::test]
async fn test_no_content_is_empty_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let result = client
        .send_command("lock-1", &DeviceCommand::new("st.lock", "lock"))
        .await
        .unwrap();
    assert_eq!(result, Value::Null);
}

#[tokio::test]
async fn test_accepted_returns_payload() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .respond_with(ResponseTemplate::new(202).set_body_json(envelope(json!({"accepted": true}))))
        .mount(&server)
        .await;

    let result = client
        .send_command("lock-1", &DeviceCommand::new("st.lock", "unlock"))
        .await
        .unwrap();
    assert_eq!(result, json!({"accepted": true}));
}

#[tokio::test]
async fn test_server_error_is_api_error_with_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let err = client.discover_devices().await.unwrap_err();
    match &err {
        Error::Api { status, body } => {
            assert_eq!(*status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
    assert!(err.is_transient());
    assert!(!err.is_network());
}

#[tokio::test]
async fn test_unauthorized_requires_reauth() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&server)
        .await;

    let err = client.discover_devices().await.unwrap_err();
    assert!(err.is_auth_expired(), "expected auth error, got: {err:?}");
}

#[tokio::test]
async fn test_timeout_is_network_error_not_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!({"devices": []})))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client.discover_devices().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got: {err:?}");
    assert!(err.is_network());
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_payload_error_is_vendor_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "error": { "code": "INVALID_DEVICE", "message": "device not found" }
        }))))
        .mount(&server)
        .await;

    let err = client
        .send_command("ghost", &DeviceCommand::new("st.switch", "on"))
        .await
        .unwrap_err();
    assert!(
        matches!(&err, Error::Vendor { code, .. } if code == "INVALID_DEVICE"),
        "got: {err:?}"
    );
}

// ── Device endpoint tests ───────────────────────────────────────────

#[tokio::test]
async fn test_discover_devices_parses_entries() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "devices": [{
                "id": "lock-1",
                "name": "Front Door",
                "category": "LOCK",
                "handleType": "utec-lock",
                "deviceInfo": { "manufacturer": "U-tec", "model": "U-Bolt Pro", "hwVersion": "03" }
            }, {
                "id": "bulb-1",
                "handleType": "utec-bulb-color-rgbw"
            }]
        }))))
        .mount(&server)
        .await;

    let devices = client.discover_devices().await.unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].name.as_deref(), Some("Front Door"));
    assert_eq!(devices[0].device_info.model.as_deref(), Some("U-Bolt Pro"));
    assert_eq!(devices[1].handle_type.as_deref(), Some("utec-bulb-color-rgbw"));
    assert_eq!(devices[1].name, None);
}

#[tokio::test]
async fn test_query_device_sends_id_and_parses_states() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .and(body_partial_json(json!({
            "header": { "name": "Query" },
            "payload": { "devices": [{ "id": "lock-1" }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "devices": [{
                "id": "lock-1",
                "states": [
                    { "capability": "st.lock", "name": "lockState", "value": "locked" },
                    { "capability": "st.batteryLevel", "name": "level", "value": 87 }
                ]
            }]
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let status = client.query_device("lock-1").await.unwrap().unwrap();
    assert_eq!(status.states.len(), 2);
    assert_eq!(status.states[0].value, json!("locked"));
    assert_eq!(status.states[1].value, json!(87));
}

#[tokio::test]
async fn test_query_device_missing_entry_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({"devices": []}))))
        .mount(&server)
        .await;

    assert!(client.query_device("lock-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_send_command_payload_shape() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .and(body_partial_json(json!({
            "header": { "namespace": "Uhome.Device", "name": "Command" },
            "payload": { "devices": [{
                "id": "bulb-1",
                "command": {
                    "capability": "st.switchLevel",
                    "name": "setLevel",
                    "arguments": { "level": 40 }
                }
            }]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({}))))
        .expect(1)
        .mount(&server)
        .await;

    let command =
        DeviceCommand::new("st.switchLevel", "setLevel").with_arguments(json!({"level": 40}));
    client.send_command("bulb-1", &command).await.unwrap();
}

// ── Account endpoint tests ──────────────────────────────────────────

#[tokio::test]
async fn test_get_user() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .and(body_partial_json(json!({
            "header": { "namespace": "Uhome.User", "name": "Get" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "payload": { "user": { "id": "u-1", "firstName": "Ada", "email": "ada@example.com" } }
        })))
        .mount(&server)
        .await;

    let user = client.get_user().await.unwrap();
    assert_eq!(user.id.as_deref(), Some("u-1"));
    assert_eq!(user.first_name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn test_set_notification_url() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .and(body_partial_json(json!({
            "header": { "namespace": "Uhome.Configure", "name": "Set" },
            "payload": { "configure": { "notification": {
                "access_token": "push-secret",
                "url": "https://hooks.example.com/api/webhook/u_tec_push_abc"
            }}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"payload": {}})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .set_notification_url(
            "https://hooks.example.com/api/webhook/u_tec_push_abc",
            &SecretString::from("push-secret".to_string()),
        )
        .await
        .unwrap();
}
