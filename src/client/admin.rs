//! Operator side of announcement broadcasting.
//!
//! [`PasscodeGate`] is a local convenience lock in front of the admin
//! actions: a hashed passcode, a lockout after repeated failures and an
//! expiring session, all kept in a small JSON state file. Anyone with the
//! API key can bypass it, so it is UX gating only. The server's
//! `X-API-Key` check and validation pipeline are the real boundary.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::{
    client::{
        error::{AdminError, FetchError, GateError},
        service::AnnouncementService,
    },
    middleware::admin_key::{constant_time_eq, ADMIN_KEY_HEADER},
    models::announcement::{
        AnnouncementKind, AnnouncementRecord, CreateAnnouncementRequest,
        CreateAnnouncementResponse, ErrorResponse, MAX_MESSAGE_CHARS,
    },
};

pub const MAX_LOGIN_ATTEMPTS: u32 = 3;
pub const LOCKOUT_DURATION: Duration = Duration::from_secs(15 * 60);
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// SHA-256 of the passcode, lowercase hex.
pub fn hash_passcode(passcode: &str) -> String {
    hex::encode(Sha256::digest(passcode.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct GatePolicy {
    pub passcode_hash: String,
    pub max_attempts: u32,
    pub lockout: Duration,
    pub session_timeout: Duration,
}

impl GatePolicy {
    pub fn new(passcode_hash: impl Into<String>) -> Self {
        Self {
            passcode_hash: passcode_hash.into().to_lowercase(),
            max_attempts: MAX_LOGIN_ATTEMPTS,
            lockout: LOCKOUT_DURATION,
            session_timeout: SESSION_TIMEOUT,
        }
    }
}

/// Persisted gate state; all times are epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateState {
    pub failed_attempts: u32,
    pub lockout_until: Option<i64>,
    pub session_started: Option<i64>,
}

pub struct PasscodeGate {
    policy: GatePolicy,
    state: GateState,
    path: Option<PathBuf>,
}

impl PasscodeGate {
    pub fn in_memory(policy: GatePolicy) -> Self {
        Self {
            policy,
            state: GateState::default(),
            path: None,
        }
    }

    /// Loads gate state from `path`; a missing file starts fresh.
    pub fn open(policy: GatePolicy, path: impl Into<PathBuf>) -> Result<Self, GateError> {
        let path = path.into();
        let state = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => GateState::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            policy,
            state,
            path: Some(path),
        })
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn lockout_remaining(&self, now_ms: i64) -> Option<Duration> {
        let until = self.state.lockout_until?;
        (until > now_ms).then(|| Duration::from_millis(u64::try_from(until - now_ms).unwrap_or(0)))
    }

    pub fn authenticate(&mut self, passcode: &str, now_ms: i64) -> Result<(), GateError> {
        if let Some(remaining) = self.lockout_remaining(now_ms) {
            return Err(GateError::LockedOut { remaining });
        }
        self.state.lockout_until = None;

        if constant_time_eq(hash_passcode(passcode).as_bytes(), self.policy.passcode_hash.as_bytes()) {
            self.state.failed_attempts = 0;
            self.state.session_started = Some(now_ms);
            self.persist()?;
            info!(target: "security", event = "ADMIN_LOGIN", "admin session started");
            return Ok(());
        }

        self.state.failed_attempts += 1;
        if self.state.failed_attempts >= self.policy.max_attempts {
            self.state.failed_attempts = 0;
            self.state.session_started = None;
            self.state.lockout_until = Some(now_ms.saturating_add(millis(self.policy.lockout)));
            self.persist()?;
            warn!(target: "security", event = "ADMIN_LOCKOUT", "too many failed passcode attempts");
            return Err(GateError::LockedOut {
                remaining: self.policy.lockout,
            });
        }

        self.persist()?;
        Err(GateError::IncorrectPasscode {
            remaining_attempts: self.policy.max_attempts - self.state.failed_attempts,
        })
    }

    /// Succeeds while a session is open; an expired session is cleared.
    pub fn require_session(&mut self, now_ms: i64) -> Result<(), GateError> {
        match self.state.session_started {
            Some(started) if now_ms.saturating_sub(started) < millis(self.policy.session_timeout) => {
                Ok(())
            }
            Some(_) => {
                self.state.session_started = None;
                self.persist()?;
                info!("admin session expired");
                Err(GateError::NotAuthenticated)
            }
            None => Err(GateError::NotAuthenticated),
        }
    }

    pub fn is_authenticated(&mut self, now_ms: i64) -> bool {
        self.require_session(now_ms).is_ok()
    }

    pub fn logout(&mut self) -> Result<(), GateError> {
        self.state.session_started = None;
        self.persist()
    }

    fn persist(&self) -> Result<(), GateError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_state(path, &self.state)
    }
}

fn write_state(path: &Path, state: &GateState) -> Result<(), GateError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(state)?)?;
    Ok(())
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Composes and submits announcements on behalf of an authenticated operator.
pub struct AdminPanel {
    service: Arc<AnnouncementService>,
    api_key: Option<String>,
    gate: PasscodeGate,
}

impl AdminPanel {
    pub fn new(service: Arc<AnnouncementService>, api_key: Option<String>, gate: PasscodeGate) -> Self {
        Self {
            service,
            api_key,
            gate,
        }
    }

    pub fn gate(&mut self) -> &mut PasscodeGate {
        &mut self.gate
    }

    /// Creates (or replaces) the current announcement.
    pub async fn create(
        &mut self,
        message: &str,
        kind: AnnouncementKind,
        enabled: bool,
    ) -> Result<AnnouncementRecord, AdminError> {
        self.gate.require_session(now_ms())?;

        let message = message.trim();
        if message.is_empty() {
            return Err(AdminError::Validation("Message cannot be empty".into()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AdminError::Validation(format!(
                "Message must be {MAX_MESSAGE_CHARS} characters or less"
            )));
        }
        let api_key = self.api_key.as_deref().ok_or(AdminError::MissingApiKey)?;

        let body = CreateAnnouncementRequest {
            message: message.to_string(),
            kind: Some(kind.to_string()),
            enabled: Some(enabled),
        };
        let response = self
            .service
            .http()
            .post(self.service.announcements_url())
            .header(ADMIN_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(FetchError::from)?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let created: CreateAnnouncementResponse =
            response.json().await.map_err(FetchError::from)?;
        self.service.clear_cache();
        info!(id = %created.announcement.id, "announcement broadcast");
        Ok(created.announcement)
    }

    /// Disables the current announcement.
    pub async fn disable(&mut self) -> Result<(), AdminError> {
        self.gate.require_session(now_ms())?;
        let api_key = self.api_key.as_deref().ok_or(AdminError::MissingApiKey)?;

        let response = self
            .service
            .http()
            .delete(self.service.announcements_url())
            .header(ADMIN_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(FetchError::from)?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        self.service.clear_cache();
        info!("announcement disabled");
        Ok(())
    }

    pub async fn backend_healthy(&self) -> bool {
        self.service.health().await.is_ok()
    }
}

async fn rejection(response: reqwest::Response) -> AdminError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(body) => AdminError::Rejected {
            status: status.as_u16(),
            error: body.error,
            kind: body.kind,
            filtered: body.filtered,
        },
        Err(_) => AdminError::Rejected {
            status: status.as_u16(),
            error: if text.is_empty() {
                status.to_string()
            } else {
                text
            },
            kind: None,
            filtered: None,
        },
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
