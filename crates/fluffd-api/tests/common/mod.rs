//! Shared helpers for HTTP tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use fluffd_api::{create_router_with_state, ServerState, TimeoutConfig};
use fluffd_devices::SimulatedTransport;
use http_body_util::BodyExt;
use tower::ServiceExt;

pub const FURBY_A: &str = "AA:00:00:00:00:01";
pub const FURBY_B: &str = "AA:00:00:00:00:02";

pub fn test_timeouts() -> TimeoutConfig {
    TimeoutConfig {
        scan_window_secs: 0,
        ..TimeoutConfig::default()
    }
}

/// Two simulated Furbys and a non-Furby peripheral, nothing connected.
pub fn create_test_server() -> (Arc<SimulatedTransport>, ServerState, Router) {
    let sim = SimulatedTransport::with_devices([
        ("Furby", FURBY_A),
        ("Furby", FURBY_B),
        ("Headphones", "CC:00:00:00:00:09"),
    ]);
    let state = ServerState::new(sim.clone(), test_timeouts());
    let app = create_router_with_state(state.clone());
    (sim, state, app)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post(app: &Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
    send(
        app,
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}
