// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the relay HTTP API.
//!
//! Uses `axum_test::TestServer` — no real TCP needed. Deliveries go to an
//! in-memory transport.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum_test::TestServer;
use parking_lot::Mutex;

use pushrelay::broadcast::BroadcastResult;
use pushrelay::config::RelayConfig;
use pushrelay::push::vapid::VapidCredentials;
use pushrelay::push::{DeliveryOutcome, DeliveryTransport, FailureReason};
use pushrelay::state::RelayState;
use pushrelay::subscription::Subscription;
use pushrelay::transport::build_router;

/// Records every delivery; fails endpoints containing "fail", delays all by `delay`.
struct RecordingTransport {
    delay: Duration,
    delivered: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingTransport {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay, delivered: Mutex::new(Vec::new()) })
    }
}

impl DeliveryTransport for RecordingTransport {
    fn deliver<'a>(
        &'a self,
        subscription: &'a Subscription,
        payload: &'a [u8],
        _credentials: &'a VapidCredentials,
    ) -> Pin<Box<dyn Future<Output = DeliveryOutcome> + Send + 'a>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.delivered.lock().push((subscription.endpoint.clone(), payload.to_vec()));
            if subscription.endpoint.contains("fail") {
                DeliveryOutcome::Failure(FailureReason::Rejected { status: 500, body: String::new() })
            } else {
                DeliveryOutcome::Success
            }
        })
    }
}

fn test_state(transport: Arc<RecordingTransport>) -> Arc<RelayState> {
    let credentials = Arc::new(VapidCredentials::generate().expect("credentials"));
    Arc::new(RelayState::new(&RelayConfig::default(), credentials, transport))
}

fn test_server(state: Arc<RelayState>) -> TestServer {
    TestServer::new(build_router(state)).expect("failed to create test server")
}

fn subscription_body(endpoint: &str, auth: &str) -> serde_json::Value {
    serde_json::json!({
        "subscription": {
            "endpoint": endpoint,
            "expirationTime": null,
            "keys": { "p256dh": "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM", "auth": auth }
        }
    })
}

/// Poll `/broadcasts` until `n` results are reported.
async fn wait_for_results(server: &TestServer, n: usize) -> Vec<BroadcastResult> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let results: Vec<BroadcastResult> = server.get("/broadcasts").await.json();
        if results.len() >= n {
            return results;
        }
        assert!(Instant::now() < deadline, "broadcast results never reported");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// -- Public key ---------------------------------------------------------------

#[tokio::test]
async fn vapid_public_key_is_served() -> anyhow::Result<()> {
    let state = test_state(RecordingTransport::new(Duration::ZERO));
    let expected = state.credentials.public_key().to_owned();
    let server = test_server(state);

    let resp = server.get("/vapid-public-key").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["publicKey"], expected);
    Ok(())
}

// -- Subscribe ----------------------------------------------------------------

#[tokio::test]
async fn subscribe_registers_endpoint() -> anyhow::Result<()> {
    let state = test_state(RecordingTransport::new(Duration::ZERO));
    let server = test_server(Arc::clone(&state));

    let resp = server.post("/subscribe").json(&subscription_body("https://push.example/a", "x1")).await;
    resp.assert_status_ok();
    assert!(resp.as_bytes().is_empty());

    let stored = state.registry.get("https://push.example/a").expect("registered");
    assert_eq!(stored.keys.auth, "x1");
    Ok(())
}

#[tokio::test]
async fn resubscribe_overwrites_same_endpoint() -> anyhow::Result<()> {
    let state = test_state(RecordingTransport::new(Duration::ZERO));
    let server = test_server(Arc::clone(&state));

    server.post("/subscribe").json(&subscription_body("https://push.example/a", "first")).await;
    server.post("/subscribe").json(&subscription_body("https://push.example/a", "second")).await;

    assert_eq!(state.registry.len(), 1);
    let stored = state.registry.get("https://push.example/a").expect("registered");
    assert_eq!(stored.keys.auth, "second");
    Ok(())
}

#[tokio::test]
async fn subscribe_rejects_malformed_bodies() -> anyhow::Result<()> {
    let state = test_state(RecordingTransport::new(Duration::ZERO));
    let server = test_server(Arc::clone(&state));

    let resp = server.post("/subscribe").text("{not json").await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let missing_keys = serde_json::json!({ "subscription": { "endpoint": "https://push.example/a" } });
    server.post("/subscribe").json(&missing_keys).await.assert_status(StatusCode::BAD_REQUEST);

    let wrong_shape = serde_json::json!({ "endpoint": "https://push.example/a" });
    server.post("/subscribe").json(&wrong_shape).await.assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/subscribe")
        .json(&subscription_body("  ", "x"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    assert!(state.registry.is_empty());
    Ok(())
}

// -- Unsubscribe --------------------------------------------------------------

#[tokio::test]
async fn unsubscribe_removes_endpoint() -> anyhow::Result<()> {
    let state = test_state(RecordingTransport::new(Duration::ZERO));
    let server = test_server(Arc::clone(&state));
    server.post("/subscribe").json(&subscription_body("https://push.example/a", "x")).await;

    let resp = server
        .post("/unsubscribe")
        .json(&serde_json::json!({ "endpoint": "https://push.example/a" }))
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["removed"], true);
    assert!(state.registry.is_empty());

    let resp = server
        .post("/unsubscribe")
        .json(&serde_json::json!({ "endpoint": "https://push.example/a" }))
        .await;
    let body: serde_json::Value = resp.json();
    assert_eq!(body["removed"], false);

    server.post("/unsubscribe").text("nope").await.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

// -- Notify -------------------------------------------------------------------

#[tokio::test]
async fn notify_all_broadcasts_to_every_subscription() -> anyhow::Result<()> {
    let transport = RecordingTransport::new(Duration::ZERO);
    let server = test_server(test_state(Arc::clone(&transport)));
    for e in ["https://push.example/A", "https://push.example/fail-B", "https://push.example/C"] {
        server.post("/subscribe").json(&subscription_body(e, "x")).await.assert_status_ok();
    }

    let resp = server.post("/notify-all").json(&serde_json::json!({ "message": "hi all" })).await;
    resp.assert_status_ok();
    assert_eq!(resp.header("x-broadcast-id"), "1");

    let results = wait_for_results(&server, 1).await;
    assert_eq!(results[0].job_id, 1);
    assert_eq!(results[0].succeeded, 2);
    assert_eq!(results[0].failed, 1);

    let delivered = transport.delivered.lock().clone();
    assert_eq!(delivered.len(), 3);
    assert!(delivered.iter().all(|(_, payload)| payload == b"hi all"));
    Ok(())
}

#[tokio::test]
async fn notify_all_with_no_subscriptions() -> anyhow::Result<()> {
    let transport = RecordingTransport::new(Duration::ZERO);
    let server = test_server(test_state(Arc::clone(&transport)));

    server.post("/notify-all").json(&serde_json::json!({ "message": "anyone?" })).await.assert_status_ok();

    let results = wait_for_results(&server, 1).await;
    assert_eq!((results[0].succeeded, results[0].failed), (0, 0));
    assert!(transport.delivered.lock().is_empty());
    Ok(())
}

#[tokio::test]
async fn notify_all_does_not_wait_for_deliveries() -> anyhow::Result<()> {
    let transport = RecordingTransport::new(Duration::from_millis(500));
    let state = test_state(Arc::clone(&transport));
    for i in 0..50 {
        state.registry.register(Subscription::new(format!("https://push.example/{i}"), "k", "a"));
    }
    let server = test_server(state);

    let started = Instant::now();
    let resp = server.post("/notify-all").json(&serde_json::json!({ "message": "slow" })).await;
    resp.assert_status_ok();
    assert!(started.elapsed() < Duration::from_millis(250), "response waited on deliveries");
    assert!(transport.delivered.lock().is_empty());

    let results = wait_for_results(&server, 1).await;
    assert_eq!(results[0].succeeded, 50);
    Ok(())
}

#[tokio::test]
async fn notify_all_rejects_malformed_bodies() -> anyhow::Result<()> {
    let transport = RecordingTransport::new(Duration::ZERO);
    let state = test_state(Arc::clone(&transport));
    let server = test_server(Arc::clone(&state));

    server.post("/notify-all").text("hello").await.assert_status(StatusCode::BAD_REQUEST);
    server
        .post("/notify-all")
        .json(&serde_json::json!({ "msg": "typo" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(state.dispatcher.dispatched(), 0);
    Ok(())
}

#[tokio::test]
async fn notify_all_rejects_oversized_message() -> anyhow::Result<()> {
    let state = test_state(RecordingTransport::new(Duration::ZERO));
    let server = test_server(Arc::clone(&state));

    let message = "x".repeat(pushrelay::push::encrypt::MAX_PAYLOAD_LEN + 1);
    let resp = server.post("/notify-all").json(&serde_json::json!({ "message": message })).await;
    resp.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(state.dispatcher.dispatched(), 0);
    Ok(())
}

// -- Health -------------------------------------------------------------------

#[tokio::test]
async fn health_reports_counts() -> anyhow::Result<()> {
    let state = test_state(RecordingTransport::new(Duration::ZERO));
    state.registry.register(Subscription::new("https://push.example/1", "k", "a"));
    state.registry.register(Subscription::new("https://push.example/2", "k", "a"));
    let server = test_server(state);

    server.post("/notify-all").json(&serde_json::json!({ "message": "m" })).await.assert_status_ok();

    let resp = server.get("/health").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "running");
    assert_eq!(body["subscriptions"], 2);
    assert_eq!(body["broadcasts"], 1);
    Ok(())
}

// -- Config wiring ------------------------------------------------------------

#[tokio::test]
async fn zero_delivery_limit_configures_unbounded_dispatch() -> anyhow::Result<()> {
    let credentials = Arc::new(VapidCredentials::generate()?);
    let transport = RecordingTransport::new(Duration::ZERO);

    let config = RelayConfig { max_concurrent_deliveries: Some(0), ..RelayConfig::default() };
    assert_eq!(config.delivery_limit(), Some(0));
    let state = RelayState::new(&config, Arc::clone(&credentials), transport.clone());
    assert_eq!(state.dispatcher.max_concurrent(), None);

    let config = RelayConfig { max_concurrent_deliveries: Some(4), ..RelayConfig::default() };
    let state = RelayState::new(&config, credentials, transport);
    assert_eq!(state.dispatcher.max_concurrent(), Some(4));
    Ok(())
}
