//! Integration tests for the announcement HTTP API.
//!
//! The router is driven in-process through `tower::ServiceExt::oneshot`;
//! no TCP listener is started.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use portal_announce::{
    build_router,
    config::Config,
    services::fallback::{ensure_fallback, fallback_path},
    AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const KEY: &str = "test-key";

struct TestApp {
    router: Router,
    state: AppState,
    _static_dir: TempDir,
}

fn test_app_with(tweak: impl FnOnce(&mut Config)) -> TestApp {
    let static_dir = tempfile::tempdir().unwrap();
    let mut config = Config {
        admin_api_key: Some(KEY.into()),
        static_dir: static_dir.path().to_path_buf(),
        mirror_fallback: false,
        ..Config::default()
    };
    tweak(&mut config);
    let state = AppState::new(config);
    TestApp {
        router: build_router(state.clone()),
        state,
        _static_dir: static_dir,
    }
}

fn test_app() -> TestApp {
    test_app_with(|_| {})
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

fn post(body: Value, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/api/announcements").header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn delete(key: Option<&str>) -> Request<Body> {
    let mut builder = Request::delete("/api/announcements");
    if let Some(key) = key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::empty()).unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_initial_slot_is_empty_and_disabled() {
    let app = test_app();
    let (status, body) = send(&app, get("/api/announcements")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "message": "", "type": "info", "timestamp": 0, "id": "", "enabled": false })
    );
}

#[tokio::test]
async fn test_create_requires_api_key() {
    let app = test_app();
    let body = json!({ "message": "hello", "type": "info" });

    let (status, err) = send(&app, post(body.clone(), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"], "Invalid or missing API key");

    let (status, _) = send(&app, post(body, Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, delete(Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // prefixes and extensions of the real key are not accepted
    let (status, _) = send(&app, delete(Some("test-ke"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, delete(Some("test-key-2"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.state.store.get().timestamp, 0);
}

#[tokio::test]
async fn test_missing_server_key_is_a_configuration_error() {
    let app = test_app_with(|c| c.admin_api_key = None);
    let (status, err) = send(&app, post(json!({ "message": "hi", "type": "info" }), Some(KEY))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err["error"], "Server configuration error");
}

#[tokio::test]
async fn test_create_then_get() {
    let app = test_app();
    let (status, created) = send(
        &app,
        post(json!({ "message": "  Early release today ", "type": "warning" }), Some(KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["success"], true);
    let announcement = &created["announcement"];
    assert_eq!(announcement["message"], "Early release today");
    assert_eq!(announcement["type"], "warning");
    assert_eq!(announcement["enabled"], true);
    assert!(announcement["id"].as_str().unwrap().starts_with("ann_"));

    let (status, current) = send(&app, get("/api/announcements")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&current, announcement);
}

#[tokio::test]
async fn test_create_replaces_previous_with_newer_timestamp() {
    let app = test_app();
    let (_, first) = send(&app, post(json!({ "message": "one", "type": "info" }), Some(KEY))).await;
    let (_, second) = send(&app, post(json!({ "message": "two", "type": "success" }), Some(KEY))).await;

    assert!(
        second["announcement"]["timestamp"].as_i64().unwrap()
            > first["announcement"]["timestamp"].as_i64().unwrap()
    );
    let (_, current) = send(&app, get("/api/announcements")).await;
    assert_eq!(current["message"], "two");
}

#[tokio::test]
async fn test_validation_errors() {
    let app = test_app();
    for body in [
        json!({ "message": "", "type": "info" }),
        json!({ "message": "    ", "type": "info" }),
        json!({ "message": "x".repeat(501), "type": "info" }),
        json!({ "message": "hello", "type": "urgent" }),
        json!({ "message": "hello" }),
    ] {
        let (status, err) = send(&app, post(body.clone(), Some(KEY))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(err["kind"], "validation", "body: {body}");
    }

    let (status, _) = send(&app, post(json!({ "message": "x".repeat(500), "type": "info" }), Some(KEY))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let app = test_app();
    let request = Request::post("/api/announcements")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-API-Key", KEY)
        .body(Body::from("{not json"))
        .unwrap();
    let (status, err) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "validation");
}

#[tokio::test]
async fn test_content_rejections() {
    let app = test_app();

    let (status, err) = send(&app, post(json!({ "message": "what a damn mess", "type": "info" }), Some(KEY))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "content_rejected");
    assert_eq!(err["filtered"], "what a **** mess");

    let (status, err) = send(
        &app,
        post(json!({ "message": "<script>alert('x')</script>", "type": "info" }), Some(KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "content_rejected");
    assert!(err.get("filtered").is_none());

    // nothing was stored
    assert_eq!(app.state.store.get().timestamp, 0);
}

#[tokio::test]
async fn test_markup_is_stripped() {
    let app = test_app();
    let (status, created) = send(
        &app,
        post(json!({ "message": "<b>Pizza</b> day", "type": "success" }), Some(KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["announcement"]["message"], "Pizza day");
}

#[tokio::test]
async fn test_comparison_signs_survive_stripping() {
    let app = test_app();
    let (status, created) = send(
        &app,
        post(json!({ "message": "Scores: 3 < 5 and 7 > 2 today", "type": "info" }), Some(KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["announcement"]["message"], "Scores: 3 < 5 and 7 > 2 today");

    let (status, err) = send(
        &app,
        post(json!({ "message": "this is sh<b></b>it news", "type": "info" }), Some(KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "content_rejected");
}

#[tokio::test]
async fn test_delete_is_idempotent_soft_delete() {
    let app = test_app();
    let (_, created) = send(&app, post(json!({ "message": "bye soon", "type": "warning" }), Some(KEY))).await;

    let (status, body) = send(&app, delete(Some(KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "message": "Announcement disabled" }));

    let (_, current) = send(&app, get("/api/announcements")).await;
    assert_eq!(current["enabled"], false);
    assert_eq!(current["message"], "");
    assert_eq!(current["id"], created["announcement"]["id"]);
    assert_eq!(current["timestamp"], created["announcement"]["timestamp"]);

    let (status, _) = send(&app, delete(Some(KEY))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, again) = send(&app, get("/api/announcements")).await;
    assert_eq!(again, current);
}

#[tokio::test]
async fn test_admin_rate_limit() {
    let app = test_app_with(|c| c.admin_rate_limit = 2);
    for _ in 0..2 {
        let (status, _) = send(&app, delete(Some(KEY))).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, err) = send(&app, post(json!({ "message": "hi", "type": "info" }), Some(KEY))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(err["error"].as_str().unwrap().contains("Too many"));

    // reads are on the general tier and unaffected
    let (status, _) = send(&app, get("/api/announcements")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_general_rate_limit() {
    let app = test_app_with(|c| c.general_rate_limit = 3);
    for _ in 0..3 {
        let (status, _) = send(&app, get("/api/announcements")).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = send(&app, get("/api/announcements")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].as_i64().unwrap() > 0);
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = test_app();
    let (status, body) = send(&app, get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Endpoint not found" }));
}

#[tokio::test]
async fn test_static_fallback_is_served() {
    let app = test_app();
    let path = fallback_path(&app.state.config.static_dir);
    ensure_fallback(&path, &app.state.store).await.unwrap();

    let (status, body) = send(&app, get("/announcement.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], false);
    assert_eq!(body["timestamp"], 0);
}

#[tokio::test]
async fn test_metrics_exposes_announcement_counters() {
    let app = test_app();
    send(&app, post(json!({ "message": "counted", "type": "info" }), Some(KEY))).await;

    let response = app.router.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("announcements_created_total"));
}
