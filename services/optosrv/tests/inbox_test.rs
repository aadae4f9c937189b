//! Control Inbox Tests
//!
//! Drives the router in-process: action requests land in the pending slot,
//! the status page and JSON snapshot reflect the shared state.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use optolink::{CommandRegistry, CommandSetConfig, Value};
use optosrv::api::{create_routes, AppState};
use optosrv::state::BridgeState;
use serde_json::Value as Json;
use tower::ServiceExt;

fn setup() -> (Router, Arc<BridgeState>, Arc<CommandRegistry>) {
    let registry = Arc::new(CommandRegistry::build(&CommandSetConfig::kw1()).unwrap());
    let state = Arc::new(BridgeState::new(registry.reads().len()));
    let router = create_routes(AppState {
        state: Arc::clone(&state),
        registry: Arc::clone(&registry),
        refresh_secs: 15,
    });
    (router, state, registry)
}

async fn get(router: &Router, uri: &str) -> axum::response::Response {
    router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_known_action_fills_slot_and_redirects() {
    let (router, state, _) = setup();

    let response = get(&router, "/party_on").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/");
    assert_eq!(state.pending_action().as_deref(), Some("party_on"));

    // Second request replaces the first
    get(&router, "/dhw_50").await;
    assert_eq!(state.pending_action().as_deref(), Some("dhw_50"));
}

#[tokio::test]
async fn test_unknown_action_is_ignored() {
    let (router, state, registry) = setup();
    state.enqueue_write(registry.write("mode_dhw").unwrap());

    let response = get(&router, "/make_coffee").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/");
    assert_eq!(state.pending_action().as_deref(), Some("mode_dhw"));
}

#[tokio::test]
async fn test_nested_path_redirects_without_queueing() {
    let (router, state, _) = setup();

    for uri in ["/party_on/now", "/api/unknown", "/a/b/c"] {
        let response = get(&router, uri).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{}", uri);
        assert_eq!(response.headers()[header::LOCATION], "/");
    }
    assert!(state.pending_action().is_none());
}

#[tokio::test]
async fn test_status_page() {
    let (router, state, registry) = setup();
    let position = registry.read_position("outside_temp").unwrap();
    state.set_value(position, Value::Float(7.5));

    let response = get(&router, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

    let html = body_text(response).await;
    assert!(html.contains("content='15'"));
    assert!(html.contains("<tr><td>Outside temperature</td><td>7.5</td></tr>"));

    let first = html.find("Operating mode").unwrap();
    let outside = html.find("Outside temperature").unwrap();
    assert!(first < outside);

    for command in registry.writes() {
        assert!(html.contains(&format!("href='/{}'", command.id)));
    }
}

#[tokio::test]
async fn test_values_snapshot() {
    let (router, state, registry) = setup();
    state.set_value(0, Value::Label("Normal".into()));
    state.enqueue_write(registry.write("party_off").unwrap());

    let response = get(&router, "/api/values").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: Json = serde_json::from_str(&body_text(response).await).unwrap();
    let values = json["values"].as_array().unwrap();
    assert_eq!(values.len(), registry.reads().len());
    assert_eq!(values[0]["name"], "operating_mode");
    assert_eq!(values[0]["value"], "Normal");
    assert!(values[1]["value"].is_null());
    assert_eq!(json["pending_action"], "party_off");
    assert!(json["last_cycle"].is_null());
}

#[tokio::test]
async fn test_health() {
    let (router, _, _) = setup();

    let response = get(&router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: Json = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["cycles"], 0);
}
