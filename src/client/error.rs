use std::time::Duration;

/// A single fetch attempt failed. Never reaches end users; the service
/// logs it and moves on to the next source.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
}

/// Local operator gate failures. The gate is UX gating only; the server's
/// API key check is what actually authorizes a mutation.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Account locked. Try again in {} minutes.", minutes_ceil(.remaining))]
    LockedOut { remaining: Duration },

    #[error("Incorrect passcode. {remaining_attempts} attempts remaining.")]
    IncorrectPasscode { remaining_attempts: u32 },

    #[error("Admin session missing or expired; log in again")]
    NotAuthenticated,

    #[error("gate state could not be saved: {0}")]
    Storage(#[from] std::io::Error),

    #[error("gate state file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Everything an admin action can fail with, surfaced verbatim to the operator.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("{0}")]
    Validation(String),

    #[error("No admin API key configured (set ANNOUNCE_API_KEY)")]
    MissingApiKey,

    #[error("Server rejected the request ({status}): {error}")]
    Rejected {
        status: u16,
        error: String,
        /// `validation` or `content_rejected` when the server said which.
        kind: Option<String>,
        filtered: Option<String>,
    },

    #[error(transparent)]
    Transport(#[from] FetchError),
}

fn minutes_ceil(d: &Duration) -> u64 {
    d.as_secs().div_ceil(60)
}
