//! Tests for the HTTP routes.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use placefinder_data::test_support::StubReply;
use rstest::rstest;
use serde_json::Value;
use tower::ServiceExt;

use super::helpers::{EIFFEL_TOWER, MIRROR, StubGatewayBuilder, stub_settings};
use crate::serve::{ORIGIN_HEADER, router};
use crate::settings::GatewayBuilder;

fn app(builder: &StubGatewayBuilder) -> axum::Router {
    let gateway = builder
        .build(&stub_settings().gateway_config())
        .expect("stub gateway should build");
    router(Arc::new(gateway))
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Option<String>, Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    let response = app.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let origin = response
        .headers()
        .get(ORIGIN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let body = serde_json::from_slice(&bytes).expect("body should be JSON");
    (status, origin, body)
}

#[rstest]
#[tokio::test]
async fn health_reports_mirror_count() {
    let builder = StubGatewayBuilder::scripted(Vec::new());

    let (status, _, body) = get(app(&builder), "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["mirrors"], 1);
}

#[rstest]
#[tokio::test]
async fn search_route_serves_then_replays_from_memory() {
    let builder = StubGatewayBuilder::scripted(vec![StubReply::elements(EIFFEL_TOWER)]);
    let app = app(&builder);

    let (status, origin, body) = get(app.clone(), "/api/search?search=Eiffel%20Tower").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(origin.as_deref(), Some("upstream"));
    assert_eq!(body["page"], 1);
    assert_eq!(body["per_page"], 1);
    assert_eq!(body["data"][0]["name"], "Eiffel Tower");

    let (status, origin, replay) = get(app, "/api/search?search=Eiffel%20Tower").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(origin.as_deref(), Some("memory-cache"));
    assert_eq!(replay, body);
    assert_eq!(builder.calls(), 1);
}

#[rstest]
#[case::missing_term("/api/search", "empty_search")]
#[case::blank_term("/api/search?search=%20%20", "empty_search")]
#[case::wide_bbox(
    "/api/search?search=Museum&bbox=48.7,9.1,49.3,9.9",
    "bbox_too_large"
)]
#[tokio::test]
async fn invalid_searches_are_rejected(#[case] uri: &str, #[case] error: &str) {
    let builder = StubGatewayBuilder::scripted(Vec::new());

    let (status, origin, body) = get(app(&builder), uri).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(origin.as_deref(), Some("rejected"));
    assert_eq!(body["error"], error);
    assert_eq!(body["data"], Value::Array(Vec::new()));
    assert_eq!(builder.calls(), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn exhausted_mirrors_map_to_bad_gateway() {
    let builder = StubGatewayBuilder::scripted(vec![
        StubReply::status(500),
        StubReply::status(500),
    ]);

    let (status, _, body) = get(app(&builder), "/api/search?search=Eiffel%20Tower").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "overpass_unreachable");
}

#[rstest]
#[tokio::test]
async fn mirrors_route_reports_recorded_statistics() {
    let builder = StubGatewayBuilder::scripted(vec![StubReply::elements(EIFFEL_TOWER)]);
    let app = app(&builder);
    let (status, _, _) = get(app.clone(), "/api/search?search=Eiffel%20Tower").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = get(app, "/api/mirrors").await;

    assert_eq!(status, StatusCode::OK);
    let ranked = body.as_array().expect("ranking should be an array");
    assert_eq!(ranked.len(), 1);
    let entry = ranked.first().expect("one mirror");
    assert_eq!(entry["endpoint"], MIRROR);
    assert_eq!(entry["stats"]["attempts"], 1);
    assert_eq!(entry["stats"]["successes"], 1);
}
