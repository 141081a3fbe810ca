pub mod announcements;
pub mod health;
pub mod metrics;
pub mod websocket;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;

use crate::{
    middleware::{admin_key::ADMIN_KEY_HEADER, rate_limit::general_rate_limit},
    services::{self, fallback::fallback_path},
    AppState,
};

/// Assembles every route:
/// - `GET|POST|DELETE /api/announcements`
/// - `GET /api/announcements/ws` push channel
/// - `GET /api/health`
/// - `GET /announcement.json` static fallback
/// - `GET /metrics`
pub fn build_router(state: AppState) -> Router {
    services::metrics::init();

    let api = Router::new()
        .route(
            "/api/announcements",
            get(announcements::get_announcement)
                .post(announcements::create_announcement)
                .delete(announcements::delete_announcement),
        )
        .route("/api/announcements/ws", get(websocket::ws_handler))
        .route("/api/health", get(health::health_check))
        .route_layer(from_fn_with_state(state.clone(), general_rate_limit));

    let fallback_file = ServeFile::new(fallback_path(&state.config.static_dir));

    Router::new()
        .merge(api)
        .route_service("/announcement.json", fallback_file)
        .route("/metrics", get(metrics::metrics_handler))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.frontend_origins))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(state)
}

/// Localhost is always allowed for development; everything else must be
/// listed in `FRONTEND_URL`.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins.to_vec();
    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        if o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") {
            return true;
        }
        allowed.iter().any(|a| a == o)
    });

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::CACHE_CONTROL,
            header::HeaderName::from_static(ADMIN_KEY_HEADER),
        ]))
        .allow_origin(allow_origin)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<Value>) {
    tracing::debug!(target: "security", event = "NOT_FOUND", path = %uri.path());
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Endpoint not found" })))
}

