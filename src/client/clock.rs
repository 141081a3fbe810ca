use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

/// Millisecond wall clock anchored to a tokio [`Instant`].
///
/// Delivery deadlines are computed in epoch milliseconds (comparable with
/// server timestamps) and slept on as tokio instants, so a paused test
/// runtime drives the whole pipeline deterministically.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
    origin_ms: i64,
}

impl Clock {
    pub fn system() -> Self {
        Self::starting_at(Utc::now().timestamp_millis())
    }

    pub fn starting_at(origin_ms: i64) -> Self {
        Self {
            origin: Instant::now(),
            origin_ms,
        }
    }

    pub fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.origin_ms.saturating_add(elapsed)
    }

    /// The instant at which [`Clock::now_ms`] will read `ms`.
    pub fn instant_at(&self, ms: i64) -> Instant {
        let offset = u64::try_from(ms.saturating_sub(self.origin_ms)).unwrap_or(0);
        self.origin + Duration::from_millis(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn follows_tokio_time() {
        let clock = Clock::starting_at(1_000);
        assert_eq!(clock.now_ms(), 1_000);

        tokio::time::advance(Duration::from_millis(2_500)).await;
        assert_eq!(clock.now_ms(), 3_500);

        assert_eq!(clock.instant_at(1_000) + Duration::from_millis(2_500), Instant::now());
        // instants before the origin clamp to it
        assert_eq!(clock.instant_at(0), clock.instant_at(1_000));
    }
}
