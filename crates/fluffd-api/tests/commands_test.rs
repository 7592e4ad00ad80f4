//! Command catalog and execution over HTTP.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::*;
use fluffd_devices::WriteChannel;
use tower::ServiceExt;

fn antenna_frames(sim: &fluffd_devices::SimulatedTransport, address: &str) -> Vec<Vec<u8>> {
    sim.writes_on(address, WriteChannel::Control)
        .into_iter()
        .filter(|f| f.first() == Some(&0x14))
        .collect()
}

#[tokio::test]
async fn test_list_catalog() {
    let (_sim, _state, app) = create_test_server();
    let (status, body) = get(&app, "/list").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["antenna"]["readable"], "Antenna Color");
    assert!(body["antenna"]["params"]["red"].is_string());
    assert!(body["other"]["buttons"]["giggle"].is_object());
    assert_eq!(body["other"]["buttons"]["antennared"]["cmd"], "antenna");
}

#[tokio::test]
async fn test_targeted_command() {
    let (sim, state, app) = create_test_server();
    get(&app, &format!("/connect/{}", FURBY_A)).await;

    let body = format!(
        r#"{{"params": {{"red": 1, "green": "2", "blue": 3}}, "target": "{}"}}"#,
        FURBY_A
    );
    let (status, json) = post(&app, "/cmd/antenna", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({"status": "ok", "details": true}));
    assert_eq!(antenna_frames(&sim, FURBY_A), vec![vec![0x14, 1, 2, 3]]);

    state.devices.disconnect_all().await;
}

#[tokio::test]
async fn test_broadcast_shortcut() {
    let (sim, state, app) = create_test_server();
    get(&app, &format!("/connect/{}", FURBY_A)).await;
    get(&app, &format!("/connect/{}", FURBY_B)).await;

    let (status, json) = post(&app, "/cmd/other/antennagreen", "{}").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["details"],
        "Broadcast 'other/antennagreen': 2 successful, 0 failed."
    );
    assert_eq!(antenna_frames(&sim, FURBY_A), vec![vec![0x14, 0, 255, 0]]);
    assert_eq!(antenna_frames(&sim, FURBY_B), vec![vec![0x14, 0, 255, 0]]);

    state.devices.disconnect_all().await;
}

#[tokio::test]
async fn test_invalid_json_is_400() {
    let (_sim, _state, app) = create_test_server();
    let (status, json) = post(&app, "/cmd/debug", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Bad Request: Invalid JSON.");

    let (status, _) = post(&app, "/cmd/debug", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_broadcast_without_devices_is_400() {
    let (_sim, _state, app) = create_test_server();
    let (status, json) = post(&app, "/cmd/debug", "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Error: No Furbys connected for broadcast.");
}

#[tokio::test]
async fn test_unknown_target_is_400() {
    let (_sim, _state, app) = create_test_server();
    let body = format!(r#"{{"target": "{}"}}"#, FURBY_B);
    let (status, json) = post(&app, "/cmd/debug", &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["message"],
        format!("Error: Target Furby {} not found or not connected.", FURBY_B)
    );
}

#[tokio::test]
async fn test_failed_command_is_500() {
    let (sim, state, app) = create_test_server();
    get(&app, &format!("/connect/{}", FURBY_A)).await;

    let body = format!(r#"{{"params": {{"name": 200}}, "target": "{}"}}"#, FURBY_A);
    let (status, json) = post(&app, "/cmd/set_name", &body).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["status"], "error");
    assert!(sim
        .writes_on(FURBY_A, WriteChannel::Control)
        .iter()
        .all(|f| f.first() != Some(&0x21)));

    let (status, _) = post(&app, "/cmd/other", &body).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    state.devices.disconnect_all().await;
}

#[tokio::test]
async fn test_nested_param_is_command_failure() {
    let (sim, state, app) = create_test_server();
    get(&app, &format!("/connect/{}", FURBY_A)).await;

    let body = format!(r#"{{"params": {{"red": [1]}}, "target": "{}"}}"#, FURBY_A);
    let (status, json) = post(&app, "/cmd/antenna", &body).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["status"], "error");
    assert_ne!(json["message"], "Bad Request: Invalid JSON.");
    assert!(antenna_frames(&sim, FURBY_A).is_empty());

    state.devices.disconnect_all().await;
}

#[tokio::test]
async fn test_cors_preflight() {
    let (_sim, _state, app) = create_test_server();

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/cmd/debug")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(preflight).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    for method in ["GET", "POST", "OPTIONS"] {
        assert!(methods.contains(method), "missing {} in {}", method, methods);
    }
    let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap();
    assert!(allowed.eq_ignore_ascii_case("content-type"));
}

#[tokio::test]
async fn test_any_options_is_no_content() {
    let (_sim, _state, app) = create_test_server();

    for uri in ["/cmd/debug", "/list", "/nope"] {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT, "OPTIONS {}", uri);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}

#[tokio::test]
async fn test_every_response_allows_any_origin() {
    let (_sim, _state, app) = create_test_server();

    let response = app
        .clone()
        .oneshot(Request::get("/list").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let response = app
        .clone()
        .oneshot(Request::post("/cmd/debug").body(Body::from("{")).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (_sim, _state, app) = create_test_server();
    let (status, json) = get(&app, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Not Found");
}
