use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use tokio::sync::broadcast;

use crate::{
    error::AnnouncementError,
    models::announcement::{AnnouncementKind, AnnouncementRecord},
    services::moderation::check_length,
};

/// Pending updates a slow push subscriber may fall behind by before it
/// starts skipping to the newest record.
const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Holds the one current announcement.
///
/// Every operation runs under the same mutex, so concurrent creates and
/// disables never lose each other's writes. Each mutation is also
/// published on a broadcast channel for push subscribers and the
/// fallback-file mirror.
pub struct AnnouncementStore {
    slot: Mutex<AnnouncementRecord>,
    updates: broadcast::Sender<AnnouncementRecord>,
}

impl AnnouncementStore {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            slot: Mutex::new(AnnouncementRecord::empty()),
            updates,
        }
    }

    /// Returns the current record verbatim, disabled or not.
    pub fn get(&self) -> AnnouncementRecord {
        self.lock().clone()
    }

    /// Replaces the slot with a fresh record.
    ///
    /// The timestamp is the current time, bumped past the previous record's
    /// timestamp when the clock has not moved on (or went backwards) so
    /// clients always see the new record as newer.
    pub fn create(
        &self,
        message: &str,
        kind: AnnouncementKind,
        enabled: bool,
    ) -> Result<AnnouncementRecord, AnnouncementError> {
        self.create_at(message, kind, enabled, Utc::now().timestamp_millis())
    }

    fn create_at(
        &self,
        message: &str,
        kind: AnnouncementKind,
        enabled: bool,
        now_ms: i64,
    ) -> Result<AnnouncementRecord, AnnouncementError> {
        let message = check_length(message)?;

        let mut slot = self.lock();
        let timestamp = now_ms.max(slot.timestamp.saturating_add(1));
        let record = AnnouncementRecord {
            message: message.to_owned(),
            kind,
            timestamp,
            id: generate_id(timestamp),
            enabled,
        };
        *slot = record.clone();
        self.publish(&record);

        Ok(record)
    }

    /// Soft-deletes the current record: `enabled=false`, `message=""`.
    /// `id`, `type` and `timestamp` are left as they were.
    ///
    /// Returns the record as it was just before, read under the same lock.
    pub fn disable(&self) -> AnnouncementRecord {
        let mut slot = self.lock();
        let previous = slot.clone();
        slot.enabled = false;
        slot.message.clear();
        self.publish(&slot);
        previous
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnnouncementRecord> {
        self.updates.subscribe()
    }

    fn publish(&self, record: &AnnouncementRecord) {
        // Err only means nobody is listening right now.
        let _ = self.updates.send(record.clone());
    }

    fn lock(&self) -> MutexGuard<'_, AnnouncementRecord> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AnnouncementStore {
    fn default() -> Self {
        Self::new()
    }
}

/// `ann_<timestamp>_<9 random lowercase alphanumerics>`
fn generate_id(timestamp: i64) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("ann_{timestamp}_{suffix}")
}
