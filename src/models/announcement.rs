use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Upper bound on the trimmed message length, counted in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Severity of an announcement. Serialized as `"info" | "warning" | "success"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementKind {
    #[default]
    Info,
    Warning,
    Success,
}

impl AnnouncementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnouncementKind::Info => "info",
            AnnouncementKind::Warning => "warning",
            AnnouncementKind::Success => "success",
        }
    }
}

impl fmt::Display for AnnouncementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnnouncementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(AnnouncementKind::Info),
            "warning" => Ok(AnnouncementKind::Warning),
            "success" => Ok(AnnouncementKind::Success),
            other => Err(format!("unknown announcement type: {other}")),
        }
    }
}

/// The single global announcement slot, as stored by the server and
/// returned verbatim by `GET /api/announcements`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementRecord {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: AnnouncementKind,
    /// Milliseconds since the Unix epoch. Strictly increases across creates.
    pub timestamp: i64,
    pub id: String,
    pub enabled: bool,
}

impl AnnouncementRecord {
    /// The slot's shape before any admin has written to it.
    pub fn empty() -> Self {
        Self {
            message: String::new(),
            kind: AnnouncementKind::Info,
            timestamp: 0,
            id: String::new(),
            enabled: false,
        }
    }

    /// Whether clients should surface this record at all.
    pub fn is_deliverable(&self) -> bool {
        self.enabled && !self.message.trim().is_empty()
    }
}

impl Default for AnnouncementRecord {
    fn default() -> Self {
        Self::empty()
    }
}

/// Body of `POST /api/announcements`.
///
/// `type` is kept as a raw string so an unknown value surfaces as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAnnouncementRequest {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Response of a successful create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAnnouncementResponse {
    pub success: bool,
    pub announcement: AnnouncementRecord,
}

/// Error body returned on any rejected mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub filtered: Option<String>,
}
