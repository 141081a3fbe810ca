//! Presentation timing for a single announcement.
//!
//! ```text
//! Idle ──new timestamp──▶ PendingShow ──2s──▶ Visible ──15s──▶ FadingOut ──500ms──▶ Idle
//! ```
//!
//! The machine is pure: callers feed it poll results via
//! [`DeliveryMachine::observe`] and wall-clock progress via
//! [`DeliveryMachine::advance`]. Only one announcement is in flight at a
//! time; anything published meanwhile is not queued and is only considered
//! again once the machine is back in `Idle`.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::{client::display::DisplayFrame, models::announcement::AnnouncementRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisplayPhase {
    Idle,
    PendingShow,
    Visible,
    FadingOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryTimings {
    pub poll_interval: Duration,
    /// Delay between detecting an announcement and showing it.
    pub show_delay: Duration,
    /// How long the message stays fully visible.
    pub dwell: Duration,
    /// Length of the fade-out before the message is cleared.
    pub fade: Duration,
}

impl DeliveryTimings {
    /// Delay + dwell + fade. A client that first sees an announcement
    /// after this much time has passed since it was published skips it.
    pub fn delivery_window(&self) -> Duration {
        self.show_delay + self.dwell + self.fade
    }
}

impl Default for DeliveryTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            show_delay: Duration::from_secs(2),
            dwell: Duration::from_secs(15),
            fade: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryMachine {
    timings: DeliveryTimings,
    last_seen_timestamp: i64,
    phase: DisplayPhase,
    /// When the current phase was entered, epoch ms.
    phase_since: i64,
    /// The candidate while pending, the shown record while visible/fading.
    current: Option<AnnouncementRecord>,
    /// `server clock - local clock`, applied when aging a record.
    server_offset_ms: i64,
}

impl DeliveryMachine {
    pub fn new(timings: DeliveryTimings) -> Self {
        Self {
            timings,
            last_seen_timestamp: 0,
            phase: DisplayPhase::Idle,
            phase_since: 0,
            current: None,
            server_offset_ms: 0,
        }
    }

    /// Sets the estimated `server - local` clock offset. Only the
    /// late-joiner check uses it; phase timing runs on the local clock.
    pub fn set_server_offset(&mut self, offset_ms: i64) {
        self.server_offset_ms = offset_ms;
    }

    pub fn phase(&self) -> DisplayPhase {
        self.phase
    }

    pub fn last_seen_timestamp(&self) -> i64 {
        self.last_seen_timestamp
    }

    pub fn timings(&self) -> &DeliveryTimings {
        &self.timings
    }

    /// Feeds one poll result. Returns `true` if it started a delivery.
    ///
    /// Ignored unless `Idle`. A record is accepted when its timestamp is
    /// newer than anything seen before and its delivery window has not
    /// already run out; either way the timestamp is marked as seen.
    pub fn observe(&mut self, record: Option<&AnnouncementRecord>, now_ms: i64) -> bool {
        if self.phase != DisplayPhase::Idle {
            return false;
        }
        let Some(record) = record.filter(|r| r.is_deliverable()) else {
            return false;
        };
        if record.timestamp <= self.last_seen_timestamp {
            return false;
        }

        self.last_seen_timestamp = record.timestamp;

        let server_now = now_ms.saturating_add(self.server_offset_ms);
        if server_now.saturating_sub(record.timestamp) >= millis(self.timings.delivery_window()) {
            debug!(id = %record.id, "announcement delivery window already elapsed; skipping");
            return false;
        }

        self.current = Some(record.clone());
        self.enter(DisplayPhase::PendingShow, now_ms);
        true
    }

    /// When the current phase ends, epoch ms. `None` while idle.
    pub fn next_deadline(&self) -> Option<i64> {
        let length = match self.phase {
            DisplayPhase::Idle => return None,
            DisplayPhase::PendingShow => self.timings.show_delay,
            DisplayPhase::Visible => self.timings.dwell,
            DisplayPhase::FadingOut => self.timings.fade,
        };
        Some(self.phase_since.saturating_add(millis(length)))
    }

    /// Applies every transition whose deadline is at or before `now_ms`.
    /// Each phase starts at its predecessor's deadline, not at `now_ms`,
    /// so late wake-ups do not stretch the schedule.
    pub fn advance(&mut self, now_ms: i64) -> bool {
        let mut changed = false;
        while let Some(deadline) = self.next_deadline() {
            if deadline > now_ms {
                break;
            }
            match self.phase {
                DisplayPhase::PendingShow => self.enter(DisplayPhase::Visible, deadline),
                DisplayPhase::Visible => self.enter(DisplayPhase::FadingOut, deadline),
                DisplayPhase::FadingOut => {
                    self.current = None;
                    self.enter(DisplayPhase::Idle, deadline);
                }
                DisplayPhase::Idle => break,
            }
            changed = true;
        }
        changed
    }

    /// What the display should show right now.
    pub fn frame(&self) -> DisplayFrame {
        match (self.phase, &self.current) {
            (DisplayPhase::Visible, Some(record)) => DisplayFrame::showing(record, true),
            (DisplayPhase::FadingOut, Some(record)) => DisplayFrame::showing(record, false),
            (phase, _) => DisplayFrame::hidden(phase),
        }
    }

    fn enter(&mut self, phase: DisplayPhase, at_ms: i64) {
        debug!(from = ?self.phase, to = ?phase, at_ms, "delivery phase change");
        self.phase = phase;
        self.phase_since = at_ms;
    }
}

impl Default for DeliveryMachine {
    fn default() -> Self {
        Self::new(DeliveryTimings::default())
    }
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
