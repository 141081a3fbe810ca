use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration, read from the environment (optionally via `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Key expected in `X-API-Key` on mutations. When unset, mutations
    /// answer 500 rather than running unauthenticated.
    pub admin_api_key: Option<String>,
    /// Origins allowed by CORS in addition to localhost.
    pub frontend_origins: Vec<String>,
    pub general_rate_limit: u64,
    pub admin_rate_limit: u64,
    pub rate_limit_window_secs: u64,
    /// Directory served for the static fallback file.
    pub static_dir: PathBuf,
    /// Rewrite `static_dir/announcement.json` after every mutation.
    pub mirror_fallback: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: var("PORT").unwrap_or_else(|| "3001".into()).parse()?,
            admin_api_key: var("ADMIN_API_KEY").filter(|s| !s.is_empty()),
            frontend_origins: var("FRONTEND_URL")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().trim_end_matches('/').to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            general_rate_limit: var("GENERAL_RATE_LIMIT")
                .unwrap_or_else(|| "10000".into())
                .parse()?,
            admin_rate_limit: var("ADMIN_RATE_LIMIT")
                .unwrap_or_else(|| "20".into())
                .parse()?,
            rate_limit_window_secs: var("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|| "60".into())
                .parse()?,
            static_dir: var("STATIC_DIR")
                .unwrap_or_else(|| "./public".into())
                .into(),
            mirror_fallback: parse_bool(var("MIRROR_FALLBACK").as_deref(), true)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
            admin_api_key: None,
            frontend_origins: Vec::new(),
            general_rate_limit: 10_000,
            admin_rate_limit: 20,
            rate_limit_window_secs: 60,
            static_dir: "./public".into(),
            mirror_fallback: true,
        }
    }
}

/// Configuration of the `announce` client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `http://localhost:3001`.
    pub api_url: String,
    /// Static fallback document; defaults to `<api_url>/announcement.json`.
    pub fallback_url: String,
    pub api_key: Option<String>,
    /// SHA-256 hex of the operator passcode. `login` refuses to run without it.
    pub passcode_hash: Option<String>,
    pub state_file: PathBuf,
    pub poll_interval: Duration,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_url = var("ANNOUNCE_API_URL")
            .unwrap_or_else(|| "http://localhost:3001".into())
            .trim_end_matches('/')
            .to_string();
        let fallback_url = var("ANNOUNCE_FALLBACK_URL")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("{api_url}/announcement.json"));
        let state_file = match var("ANNOUNCE_STATE_FILE").filter(|s| !s.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => var("HOME")
                .map(|home| PathBuf::from(home).join(".announce-gate.json"))
                .unwrap_or_else(|| PathBuf::from(".announce-gate.json")),
        };
        let poll_ms: u64 = var("ANNOUNCE_POLL_MS")
            .unwrap_or_else(|| "2000".into())
            .parse()?;
        if poll_ms == 0 {
            anyhow::bail!("ANNOUNCE_POLL_MS must be greater than zero");
        }

        Ok(Self {
            api_url,
            fallback_url,
            api_key: var("ANNOUNCE_API_KEY").filter(|s| !s.is_empty()),
            passcode_hash: var("ANNOUNCE_PASSCODE_HASH")
                .map(|h| h.trim().to_lowercase())
                .filter(|s| !s.is_empty()),
            state_file,
            poll_interval: Duration::from_millis(poll_ms),
        })
    }
}

fn parse_bool(value: Option<&str>, default: bool) -> anyhow::Result<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(anyhow::anyhow!("Invalid boolean value: {}", other)),
        },
    }
}
