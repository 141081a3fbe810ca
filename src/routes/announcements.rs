use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    error::AnnouncementError,
    middleware::{
        admin_key::AdminApiKey,
        rate_limit::{check_rate_limit, client_ip},
    },
    models::announcement::{AnnouncementRecord, CreateAnnouncementRequest, CreateAnnouncementResponse},
    services::{
        metrics::{ANNOUNCEMENTS_CREATED, ANNOUNCEMENTS_DISABLED, SUBMISSIONS_REJECTED},
        moderation,
    },
    AppState,
};

/// GET /api/announcements: public; always returns the slot, disabled or not.
pub async fn get_announcement(State(state): State<AppState>) -> Json<AnnouncementRecord> {
    Json(state.store.get())
}

/// POST /api/announcements: validate, sanitize and store a new announcement.
pub async fn create_announcement(
    State(state): State<AppState>,
    _auth: AdminApiKey,
    headers: HeaderMap,
    body: Result<Json<CreateAnnouncementRequest>, JsonRejection>,
) -> Response {
    let ip = client_ip(&headers);
    if let Err(rejection) = admin_rate_limit(&state, &ip) {
        return rejection.into_response();
    }

    let result = body
        .map_err(|e| AnnouncementError::validation(e.body_text()))
        .and_then(|Json(req)| moderation::validate(&req))
        .and_then(|valid| state.store.create(&valid.message, valid.kind, valid.enabled));

    match result {
        Ok(announcement) => {
            ANNOUNCEMENTS_CREATED
                .with_label_values(&[announcement.kind.as_str()])
                .inc();
            tracing::info!(
                target: "security",
                event = "ANNOUNCEMENT_CREATED",
                id = %announcement.id,
                announcement_type = %announcement.kind,
                message_length = announcement.message.chars().count(),
                %ip,
                "announcement created"
            );
            (
                StatusCode::CREATED,
                Json(CreateAnnouncementResponse {
                    success: true,
                    announcement,
                }),
            )
                .into_response()
        }
        Err(err) => {
            SUBMISSIONS_REJECTED.with_label_values(&[err.kind()]).inc();
            tracing::warn!(
                target: "security",
                event = "ANNOUNCEMENT_REJECTED",
                kind = err.kind(),
                reason = %err,
                %ip,
                "announcement submission rejected"
            );
            err.into_response()
        }
    }
}

/// DELETE /api/announcements: soft-delete the current announcement.
pub async fn delete_announcement(
    State(state): State<AppState>,
    _auth: AdminApiKey,
    headers: HeaderMap,
) -> Response {
    let ip = client_ip(&headers);
    if let Err(rejection) = admin_rate_limit(&state, &ip) {
        return rejection.into_response();
    }

    let previous = state.store.disable();

    let had_message = if previous.message.is_empty() { "false" } else { "true" };
    ANNOUNCEMENTS_DISABLED.with_label_values(&[had_message]).inc();
    tracing::info!(
        target: "security",
        event = "ANNOUNCEMENT_DISABLED",
        previous_id = %previous.id,
        previous_type = %previous.kind,
        %ip,
        "announcement disabled"
    );

    Json(json!({ "success": true, "message": "Announcement disabled" })).into_response()
}

fn admin_rate_limit(
    state: &AppState,
    ip: &str,
) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    check_rate_limit(
        &state.admin_limiter,
        "admin",
        &format!("rate:admin:ip:{ip}"),
        state.config.admin_rate_limit,
        state.config.rate_limit_window_secs,
    )
}
