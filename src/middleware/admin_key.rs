use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::{middleware::rate_limit::client_ip, AppState};

/// `X-API-Key`, lowercased for `HeaderName::from_static`.
pub const ADMIN_KEY_HEADER: &str = "x-api-key";

/// Extractor that validates the `X-API-Key` header against `config.admin_api_key`.
pub struct AdminApiKey;

impl FromRequestParts<AppState> for AdminApiKey {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_api_key.as_deref() else {
            tracing::error!("ADMIN_API_KEY is not configured; refusing admin request");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Server configuration error" })),
            ));
        };

        let provided = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok());

        match provided {
            Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => Ok(AdminApiKey),
            _ => {
                tracing::warn!(
                    target: "security",
                    event = "AUTH_FAILED",
                    ip = %client_ip(&parts.headers),
                    path = %parts.uri.path(),
                    "rejected admin request"
                );
                Err((
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": "Invalid or missing API key" })),
                ))
            }
        }
    }
}

/// Byte comparison whose running time does not depend on where the
/// inputs first differ. Length is not hidden.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
