//! HTTP surface behavior against a fake backend and a live supervisor task.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;
use wweb::{BackendClient, ClientEvent, FakeBackend, Supervisor, SupervisorConfig, SupervisorHandle};
use wweb_gateway::http::{AppState, router};

struct Harness {
    app: Router,
    client: Arc<FakeBackend>,
    events: mpsc::UnboundedSender<ClientEvent>,
    supervisor: SupervisorHandle,
}

fn harness() -> Harness {
    let client = FakeBackend::new();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (supervisor, handle) = Supervisor::new(
        Arc::clone(&client) as Arc<dyn BackendClient>,
        event_rx,
        SupervisorConfig::default(),
    );
    tokio::spawn(supervisor.run());

    let app = router(AppState {
        supervisor: handle.clone(),
        client: Arc::clone(&client) as Arc<dyn BackendClient>,
    });
    Harness {
        app,
        client,
        events: event_tx,
        supervisor: handle,
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

async fn make_ready(h: &Harness) {
    h.events.send(ClientEvent::Ready).unwrap();
    let supervisor = h.supervisor.clone();
    wait_for(move || supervisor.is_ready()).await;
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn send_rejects_when_not_ready_regardless_of_body() {
    let h = harness();

    let response = h
        .app
        .clone()
        .oneshot(post_json("/send", json!({ "to": "5551234", "message": "hi" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = h
        .app
        .clone()
        .oneshot(post_json("/send", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Non-object bodies and requests without a JSON content type get the
    // same not-ready 400; the body is never inspected first.
    let response = h
        .app
        .clone()
        .oneshot(post_json("/send", json!([1, 2])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = h
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/send")
                .body(Body::from("to=5551234"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("not ready"));
    assert_eq!(h.client.calls().sends.len(), 0);
}

#[tokio::test]
async fn send_rejects_malformed_body_when_ready() {
    let h = harness();
    make_ready(&h).await;

    let response = h
        .app
        .oneshot(post_json("/send", json!([1, 2])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.client.calls().sends.len(), 0);
}

#[tokio::test]
async fn send_rejects_missing_params_when_ready() {
    let h = harness();
    make_ready(&h).await;

    let response = h
        .app
        .oneshot(post_json("/send", json!({ "to": "5551234" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("missing parameters"));
}

#[tokio::test]
async fn send_normalizes_recipient_and_suppresses_read_receipt() {
    let h = harness();
    make_ready(&h).await;

    let response = h
        .app
        .clone()
        .oneshot(post_json("/send", json!({ "to": "5551234", "message": "hello" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "sent");
    assert_eq!(body["to"], "5551234@c.us");

    // Already-suffixed recipients pass through unchanged.
    let response = h
        .app
        .oneshot(post_json("/send", json!({ "to": "5559999@c.us", "message": "again" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let sends = h.client.calls().sends;
    assert_eq!(sends.len(), 2);
    assert_eq!(sends[0], ("5551234@c.us".to_string(), "hello".to_string(), true));
    assert_eq!(sends[1].0, "5559999@c.us");
}

#[tokio::test]
async fn send_rejects_unregistered_recipient() {
    let h = harness();
    make_ready(&h).await;
    h.client.mark_unregistered("5550000@c.us");

    let response = h
        .app
        .oneshot(post_json("/send", json!({ "to": "5550000", "message": "hi" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("not registered"));
    assert_eq!(h.client.calls().sends.len(), 0);
}

#[tokio::test]
async fn invalidated_session_returns_503_and_flips_readiness() {
    let h = harness();
    make_ready(&h).await;
    h.client.set_send_error("Execution context was destroyed");

    let response = h
        .app
        .oneshot(post_json("/send", json!({ "to": "5551234", "message": "hi" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("reconnecting"));

    let supervisor = h.supervisor.clone();
    wait_for(move || !supervisor.is_ready()).await;
}

#[tokio::test]
async fn generic_send_failure_returns_500() {
    let h = harness();
    make_ready(&h).await;
    h.client.set_send_error("some backend exploded");

    let response = h
        .app
        .oneshot(post_json("/send", json!({ "to": "5551234", "message": "hi" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // A generic failure does not flip readiness.
    assert!(h.supervisor.is_ready());
}

#[tokio::test]
async fn status_reports_pending_then_ready() {
    let h = harness();

    let response = h.app.clone().oneshot(get("/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["whatsapp"], "pending");
    assert_eq!(body["qr_available"], false);
    assert_eq!(body["session_state"], "uninitialized");

    make_ready(&h).await;
    let response = h.app.oneshot(get("/status")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["whatsapp"], "ready");
    assert_eq!(body["session_state"], "ready");
}

#[tokio::test]
async fn qr_endpoints_require_a_live_credential() {
    let h = harness();

    let response = h.app.clone().oneshot(get("/qr")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = h.app.clone().oneshot(get("/qr.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    h.events.send(ClientEvent::PairingCode("1@pairme".to_string())).unwrap();
    let supervisor = h.supervisor.clone();
    wait_for(move || supervisor.credential().is_some()).await;

    let response = h.app.clone().oneshot(get("/status")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["qr_available"], true);
    assert_eq!(body["session_state"], "awaiting_pairing");

    let response = h.app.clone().oneshot(get("/qr")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("data:image/png;base64,"));

    let response = h.app.oneshot(get("/qr.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn session_clear_reinitializes_the_backend() {
    let h = harness();
    make_ready(&h).await;

    let response = h
        .app
        .oneshot(Request::builder().method("POST").uri("/session/clear").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);

    assert_eq!(h.client.calls().initialize, 1);
    assert!(!h.supervisor.is_ready());
}
