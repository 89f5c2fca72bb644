//! HTTP API integration tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`; no
//! socket is bound.

mod helpers;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use helpers::{channel_url, Harness};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use tvmp_live::api::build_router;

fn router(h: &Harness) -> Router {
    build_router(h.app_context())
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn get(h: &Harness, uri: &str) -> (StatusCode, Value) {
    send(router(h), Method::GET, uri, None).await
}

async fn post(h: &Harness, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send(router(h), Method::POST, uri, body).await
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new(&["a"]);
    let (status, body) = get(&h, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "tvmp-live");
}

#[tokio::test]
async fn test_channels_in_guide_order() {
    let h = Harness::new(&["b", "a", "c"]);
    let (status, body) = get(&h, "/channels").await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["channels"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["b", "a", "c"]);
}

#[tokio::test]
async fn test_tune_and_live_status() {
    let h = Harness::new(&["a", "b", "c"]);

    let (status, body) = post(&h, "/live/tune", Some(json!({ "channel_id": "b" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channel_id"], "b");
    assert_eq!(body["instant_start"], false);

    let (status, body) = get(&h, "/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channel"]["id"], "b");
    assert!(body["last_error"].is_null());
}

#[tokio::test]
async fn test_unknown_channel_is_ignored() {
    let h = Harness::new(&["a", "b"]);
    let (status, body) = post(&h, "/live/tune", Some(json!({ "channel_id": "zzz" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");
    assert!(h.controller.current_channel().await.is_none());
}

#[tokio::test]
async fn test_unavailable_stream_is_bad_gateway() {
    let h = Harness::new(&["a", "b"]);
    h.engine.mark_unavailable(&channel_url("b"));

    let (status, body) = post(&h, "/live/tune", Some(json!({ "channel_id": "b" }))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "error");
    assert_eq!(body["retryable"], true);

    // Retry succeeds once the stream is back
    h.engine.clear_failures();
    let (status, body) = post(&h, "/live/retry", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channel_id"], "b");
}

#[tokio::test]
async fn test_retry_without_channel_is_ignored() {
    let h = Harness::new(&["a"]);
    let (status, body) = post(&h, "/live/retry", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");
}

#[tokio::test]
async fn test_surf_routes() {
    let h = Harness::builder(&["a", "b", "c"]).surf_tick_ms(500).build();
    post(&h, "/live/tune", Some(json!({ "channel_id": "a" }))).await;

    let (status, body) = post(&h, "/surf/begin", Some(json!({ "direction": "next" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preview_channel"]["id"], "b");
    assert_eq!(body["countdown_remaining"], 3);

    let (_, body) = get(&h, "/surf").await;
    assert_eq!(body["active"], true);

    let (status, body) = post(&h, "/surf/cancel", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "canceled");

    let (_, body) = post(&h, "/surf/cancel", None).await;
    assert_eq!(body["status"], "ignored");

    let (status, body) = post(&h, "/surf/confirm", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");

    post(&h, "/surf/begin", Some(json!({ "direction": "previous" }))).await;
    let (status, body) = post(&h, "/surf/confirm", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channel_id"], "c");
}

#[tokio::test]
async fn test_buffer_status() {
    let h = Harness::new(&["a", "b", "c", "d"]);
    post(&h, "/live/tune", Some(json!({ "channel_id": "b" }))).await;
    assert!(h.wait_for_buffered(&["a", "c"]).await);

    let (status, body) = get(&h, "/buffer").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["buffered"].as_array().unwrap().len(), 2);
    assert_eq!(body["absorbed_failures"], 0);
}

#[tokio::test]
async fn test_multiview_lifecycle() {
    let h = Harness::new(&["a", "b", "c", "d", "e"]);

    let (status, body) = post(&h, "/multiview", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["layout"], "two_up");
    assert_eq!(body["slots"].as_array().unwrap().len(), 2);
    assert_eq!(body["slots"][0]["is_muted"], false);
    assert_eq!(body["slots"][1]["is_muted"], true);

    let (_, body) = post(&h, "/multiview/slots", None).await;
    assert_eq!(body["layout"], "three_grid");
    assert_eq!(body["slots"][2]["channel_id"], "c");

    let (_, body) = post(&h, "/multiview/slots/2/focus", None).await;
    assert_eq!(body["slots"][0]["is_muted"], true);
    assert_eq!(body["slots"][2]["is_muted"], false);

    let (status, body) = post(&h, "/multiview/slots/1/rewind", Some(json!({ "seconds": 60 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["index"], 1);
    assert_eq!(body["dvr"]["state"], "time_shifted");
    assert_eq!(body["dvr"]["offset_secs"], 60);

    let (_, body) = post(&h, "/multiview/sync", None).await;
    assert_eq!(body["offset_secs"], 60);

    let (status, body) = send(router(&h), Method::DELETE, "/multiview/slots/0", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["layout"], "two_up");
    assert_eq!(body["slots"][0]["index"], 0);
    assert_eq!(body["slots"][1]["index"], 1);

    let (status, body) = send(router(&h), Method::DELETE, "/multiview", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["layout"].is_null());
    assert_eq!(h.engine.live_count(), 0);
}

#[tokio::test]
async fn test_multiview_guards_are_ignored() {
    let h = Harness::builder(&["a", "b"]).initial_slots(1).build();
    post(&h, "/multiview", None).await;

    let (status, body) = send(router(&h), Method::DELETE, "/multiview/slots/0", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");

    let (status, body) = post(&h, "/multiview/slots/7/pause", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");

    assert_eq!(h.grid.slot_count().await, 1);
}

#[tokio::test]
async fn test_event_stream_is_sse() {
    let h = Harness::new(&["a"]);
    let request = Request::builder().uri("/events").body(Body::empty()).unwrap();
    let response = router(&h).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
}
