use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    client::error::FetchError, config::ClientConfig, models::announcement::AnnouncementRecord,
};

/// How long a fetched record is served without going back to the network.
pub const CACHE_TTL: Duration = Duration::from_secs(10);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Anything the delivery poller can pull announcements from.
pub trait AnnouncementSource: Send + Sync {
    /// The current deliverable announcement, or `None`. Never fails.
    fn fetch_announcement(&self) -> impl Future<Output = Option<AnnouncementRecord>> + Send;

    /// Estimated `server clock - local clock` in milliseconds, so record
    /// timestamps can be compared with local time.
    fn server_clock_offset_ms(&self) -> i64 {
        0
    }
}

struct CachedRecord {
    record: AnnouncementRecord,
    /// `None` once invalidated; the record is kept but no longer served.
    fetched_at: Option<Instant>,
}

/// Client for the announcement API with a short-lived cache and a static
/// fallback document.
///
/// Read-path errors never escape: a cycle where both sources fail simply
/// yields no announcement, and the next poll tries again.
pub struct AnnouncementService {
    http: Client,
    announcements_url: String,
    fallback_url: String,
    health_url: String,
    cache_ttl: Duration,
    cache: Mutex<Option<CachedRecord>>,
    /// Last offset derived from a response `Date` header.
    server_offset_ms: AtomicI64,
}

impl AnnouncementService {
    /// `api_url` is the server root, e.g. `http://localhost:3001`.
    pub fn new(api_url: &str, fallback_url: &str) -> Self {
        let api_url = api_url.trim_end_matches('/');
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            http,
            announcements_url: format!("{api_url}/api/announcements"),
            fallback_url: fallback_url.to_string(),
            health_url: format!("{api_url}/api/health"),
            cache_ttl: CACHE_TTL,
            cache: Mutex::new(None),
            server_offset_ms: AtomicI64::new(0),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.api_url, &config.fallback_url)
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn announcements_url(&self) -> &str {
        &self.announcements_url
    }

    /// Returns the deliverable announcement, if any.
    ///
    /// Order: fresh cache → primary API → static fallback → `None`.
    /// A successful network read replaces the cache even when the record is
    /// disabled; a cycle where both sources fail leaves the cache as it was.
    pub async fn fetch_announcement(&self) -> Option<AnnouncementRecord> {
        if let Some(cached) = self.fresh_cached() {
            return deliverable(cached);
        }

        let record = match self.get_record(&self.announcements_url).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Backend announcement fetch failed, trying fallback: {e}");
                match self.get_record(&self.fallback_url).await {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("Fallback announcement fetch failed: {e}");
                        None
                    }
                }
            }
        }?;

        self.store(record.clone());
        deliverable(record)
    }

    /// Like [`fetch_announcement`](Self::fetch_announcement) but always
    /// goes to the network.
    pub async fn check_for_updates(&self) -> Option<AnnouncementRecord> {
        if let Some(cached) = self.lock().as_mut() {
            cached.fetched_at = None;
        }
        self.fetch_announcement().await
    }

    /// The last record read from either source, fresh or not.
    pub fn cached(&self) -> Option<AnnouncementRecord> {
        self.lock().as_ref().map(|cached| cached.record.clone())
    }

    pub fn server_clock_offset_ms(&self) -> i64 {
        self.server_offset_ms.load(Ordering::Relaxed)
    }

    /// Drops the cached record entirely. Called after admin mutations so
    /// the next poll sees the change immediately.
    pub fn clear_cache(&self) {
        *self.lock() = None;
    }

    /// GET /api/health on the primary backend.
    pub async fn health(&self) -> Result<Value, FetchError> {
        let response = self.http.get(&self.health_url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    async fn get_record(&self, url: &str) -> Result<AnnouncementRecord, FetchError> {
        let response = self
            .http
            .get(url)
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let offset = response
            .headers()
            .get(header::DATE)
            .and_then(|v| v.to_str().ok())
            .and_then(|date| clock_offset_from_date(date, Utc::now().timestamp_millis()));
        if let Some(offset) = offset {
            self.server_offset_ms.store(offset, Ordering::Relaxed);
        }

        let record: AnnouncementRecord = response.json().await?;
        debug!(url, id = %record.id, timestamp = record.timestamp, "fetched announcement");
        Ok(record)
    }

    fn fresh_cached(&self) -> Option<AnnouncementRecord> {
        let cache = self.lock();
        let cached = cache.as_ref()?;
        let fetched_at = cached.fetched_at?;
        (fetched_at.elapsed() < self.cache_ttl).then(|| cached.record.clone())
    }

    fn store(&self, record: AnnouncementRecord) {
        *self.lock() = Some(CachedRecord {
            record,
            fetched_at: Some(Instant::now()),
        });
    }

    fn lock(&self) -> MutexGuard<'_, Option<CachedRecord>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AnnouncementSource for AnnouncementService {
    fn fetch_announcement(&self) -> impl Future<Output = Option<AnnouncementRecord>> + Send {
        AnnouncementService::fetch_announcement(self)
    }

    fn server_clock_offset_ms(&self) -> i64 {
        AnnouncementService::server_clock_offset_ms(self)
    }
}

/// `server - local` in milliseconds from an HTTP `Date` header. The header
/// has one-second resolution, so the server time is taken as the middle
/// of that second.
fn clock_offset_from_date(date: &str, local_now_ms: i64) -> Option<i64> {
    let server: DateTime<Utc> = DateTime::parse_from_rfc2822(date).ok()?.into();
    Some(server.timestamp_millis() + 500 - local_now_ms)
}

fn deliverable(record: AnnouncementRecord) -> Option<AnnouncementRecord> {
    record.is_deliverable().then_some(record)
}
