use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Reasons a mutation of the announcement slot is refused.
///
/// Both variants map to `400`; `kind` in the body lets the admin UI tell
/// a malformed submission apart from one that was rejected for its content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnouncementError {
    #[error("{0}")]
    Validation(String),

    #[error("{reason}")]
    ContentRejected {
        reason: String,
        /// A cleaned version of the message, when one can be offered.
        filtered: Option<String>,
    },
}

impl AnnouncementError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AnnouncementError::Validation(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AnnouncementError::Validation(_) => "validation",
            AnnouncementError::ContentRejected { .. } => "content_rejected",
        }
    }
}

impl IntoResponse for AnnouncementError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        if let AnnouncementError::ContentRejected {
            filtered: Some(filtered),
            ..
        } = &self
        {
            body["filtered"] = json!(filtered);
        }

        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
