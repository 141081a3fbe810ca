use serde::Serialize;

use crate::{
    client::delivery::DisplayPhase,
    models::announcement::{AnnouncementKind, AnnouncementRecord},
};

/// Snapshot handed to whatever renders announcements. Purely derived from
/// the delivery machine; renderers hold no timing state of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayFrame {
    pub phase: DisplayPhase,
    pub message: Option<String>,
    pub kind: Option<AnnouncementKind>,
    /// `false` while fading out, even though the message is still present.
    pub visible: bool,
}

impl DisplayFrame {
    pub fn idle() -> Self {
        Self::hidden(DisplayPhase::Idle)
    }

    pub(crate) fn hidden(phase: DisplayPhase) -> Self {
        Self {
            phase,
            message: None,
            kind: None,
            visible: false,
        }
    }

    pub(crate) fn showing(record: &AnnouncementRecord, visible: bool) -> Self {
        Self {
            phase: if visible {
                DisplayPhase::Visible
            } else {
                DisplayPhase::FadingOut
            },
            message: Some(record.message.clone()),
            kind: Some(record.kind),
            visible,
        }
    }

    /// One terminal line for the frame, or `None` when nothing is shown.
    pub fn render(&self) -> Option<String> {
        let message = self.message.as_deref()?;
        let label = self.kind.unwrap_or_default().as_str().to_uppercase();
        if self.visible {
            Some(format!("[{label}] {message}"))
        } else {
            Some(format!("[{label}] {message} (fading)"))
        }
    }
}

impl Default for DisplayFrame {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_by_phase() {
        let record = AnnouncementRecord {
            message: "Snow day".into(),
            kind: AnnouncementKind::Success,
            timestamp: 1,
            id: "ann_1_x".into(),
            enabled: true,
        };
        assert_eq!(DisplayFrame::idle().render(), None);
        assert_eq!(DisplayFrame::hidden(DisplayPhase::PendingShow).render(), None);
        assert_eq!(
            DisplayFrame::showing(&record, true).render().as_deref(),
            Some("[SUCCESS] Snow day")
        );
        assert_eq!(
            DisplayFrame::showing(&record, false).render().as_deref(),
            Some("[SUCCESS] Snow day (fading)")
        );
    }
}
