use std::sync::Arc;

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{sleep_until, Instant, MissedTickBehavior},
};
use tracing::info;

use crate::client::{
    clock::Clock,
    delivery::{DeliveryMachine, DeliveryTimings, DisplayPhase},
    display::DisplayFrame,
    service::AnnouncementSource,
};

/// Drives a [`DeliveryMachine`] from a fixed-interval poll and publishes
/// the resulting [`DisplayFrame`]s.
///
/// Every timer (the poll interval and the phase deadlines) lives inside one
/// task; dropping the poller aborts that task, so nothing fires after
/// teardown.
pub struct AnnouncementPoller {
    frames: watch::Receiver<DisplayFrame>,
    task: JoinHandle<()>,
}

impl AnnouncementPoller {
    pub fn spawn<S>(source: Arc<S>, timings: DeliveryTimings, clock: Clock) -> Self
    where
        S: AnnouncementSource + 'static,
    {
        let (tx, frames) = watch::channel(DisplayFrame::idle());
        let task = tokio::spawn(run(source, timings, clock, tx));
        Self { frames, task }
    }

    /// A receiver that is notified every time the frame changes.
    pub fn frames(&self) -> watch::Receiver<DisplayFrame> {
        self.frames.clone()
    }

    pub fn current(&self) -> DisplayFrame {
        self.frames.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops polling and cancels any pending phase timer.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for AnnouncementPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<S>(
    source: Arc<S>,
    timings: DeliveryTimings,
    clock: Clock,
    frames: watch::Sender<DisplayFrame>,
) where
    S: AnnouncementSource,
{
    let mut machine = DeliveryMachine::new(timings);
    let mut poll = tokio::time::interval(timings.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_ms = timings.poll_interval.as_millis() as u64, "announcement polling started");

    loop {
        let deadline = machine.next_deadline().map(|ms| clock.instant_at(ms));

        tokio::select! {
            _ = poll.tick() => {
                if machine.phase() != DisplayPhase::Idle {
                    continue;
                }
                let record = source.fetch_announcement().await;
                machine.set_server_offset(source.server_clock_offset_ms());
                if machine.observe(record.as_ref(), clock.now_ms()) {
                    info!(
                        timestamp = machine.last_seen_timestamp(),
                        "new announcement received"
                    );
                }
            }
            _ = sleep_until_deadline(deadline) => {
                machine.advance(clock.now_ms());
            }
        }

        let next = machine.frame();
        frames.send_if_modified(|frame| {
            if *frame == next {
                false
            } else {
                *frame = next;
                true
            }
        });
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::models::announcement::{AnnouncementKind, AnnouncementRecord};

    #[derive(Default)]
    struct FakeSource {
        current: Mutex<Option<AnnouncementRecord>>,
        polls: Mutex<u32>,
        offset_ms: i64,
    }

    impl FakeSource {
        fn publish(&self, message: &str, timestamp: i64) {
            *self.current.lock().unwrap() = Some(AnnouncementRecord {
                message: message.into(),
                kind: AnnouncementKind::Warning,
                timestamp,
                id: format!("ann_{timestamp}_fake"),
                enabled: true,
            });
        }

        fn polls(&self) -> u32 {
            *self.polls.lock().unwrap()
        }
    }

    impl AnnouncementSource for FakeSource {
        async fn fetch_announcement(&self) -> Option<AnnouncementRecord> {
            *self.polls.lock().unwrap() += 1;
            self.current.lock().unwrap().clone()
        }

        fn server_clock_offset_ms(&self) -> i64 {
            self.offset_ms
        }
    }

    async fn at(start: Instant, ms: u64) {
        sleep_until(start + Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn follows_the_delivery_schedule() {
        let start = Instant::now();
        let source = Arc::new(FakeSource::default());
        let poller =
            AnnouncementPoller::spawn(source.clone(), DeliveryTimings::default(), Clock::starting_at(0));

        at(start, 1_000).await;
        source.publish("Early release today", 1_000);

        at(start, 2_100).await;
        assert_eq!(poller.current().phase, DisplayPhase::PendingShow);
        assert_eq!(poller.current().message, None);

        at(start, 4_100).await;
        let frame = poller.current();
        assert_eq!(frame.phase, DisplayPhase::Visible);
        assert_eq!(frame.message.as_deref(), Some("Early release today"));

        at(start, 18_900).await;
        assert_eq!(poller.current().phase, DisplayPhase::Visible);

        at(start, 19_100).await;
        assert_eq!(poller.current().phase, DisplayPhase::FadingOut);

        at(start, 19_600).await;
        assert_eq!(poller.current(), DisplayFrame::idle());

        // the same announcement is not replayed on later polls
        at(start, 30_000).await;
        assert_eq!(poller.current(), DisplayFrame::idle());
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_poll_while_an_announcement_is_in_flight() {
        let start = Instant::now();
        let source = Arc::new(FakeSource::default());
        source.publish("first", 1);
        let poller =
            AnnouncementPoller::spawn(source.clone(), DeliveryTimings::default(), Clock::starting_at(0));

        at(start, 100).await;
        assert_eq!(poller.current().phase, DisplayPhase::PendingShow);
        let polls_at_detection = source.polls();

        at(start, 5_000).await;
        source.publish("second", 5_000);
        at(start, 17_000).await;
        assert_eq!(source.polls(), polls_at_detection);
        assert_eq!(poller.current().message.as_deref(), Some("first"));

        // back to idle at 17_500; the 18_000 poll picks up "second"
        at(start, 18_100).await;
        assert_eq!(poller.current().phase, DisplayPhase::PendingShow);
        at(start, 20_100).await;
        assert_eq!(poller.current().message.as_deref(), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_when_local_clock_runs_ahead_of_the_server() {
        let start = Instant::now();
        // local clock reads 20 s later than the server's
        let source = Arc::new(FakeSource {
            offset_ms: -20_000,
            ..FakeSource::default()
        });
        source.publish("Fire drill at 2pm", 1_000_000);
        let poller = AnnouncementPoller::spawn(
            source.clone(),
            DeliveryTimings::default(),
            Clock::starting_at(1_000_000 + 20_000 + 2_000),
        );

        at(start, 2_100).await;
        let frame = poller.current();
        assert_eq!(frame.phase, DisplayPhase::Visible);
        assert_eq!(frame.message.as_deref(), Some("Fire drill at 2pm"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_timers() {
        let start = Instant::now();
        let source = Arc::new(FakeSource::default());
        source.publish("never shown", 1);
        let poller =
            AnnouncementPoller::spawn(source.clone(), DeliveryTimings::default(), Clock::starting_at(0));
        let frames = poller.frames();

        at(start, 500).await;
        assert_eq!(frames.borrow().phase, DisplayPhase::PendingShow);

        poller.shutdown();
        at(start, 10_000).await;
        // the show-delay timer never fired
        assert_eq!(frames.borrow().phase, DisplayPhase::PendingShow);
        assert!(frames.has_changed().is_err());
    }
}
