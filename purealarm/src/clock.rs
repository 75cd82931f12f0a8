//! Wall-clock sources.
//!
//! Scheduling needs calendar time (today's date, "08:00 local") while the
//! timers that drive escalation run on the tokio clock. [`TokioClock`] ties
//! the two together so tests that pause and advance tokio time see the wall
//! clock move by exactly the same amount.

use std::time::Duration;

use time::{OffsetDateTime, UtcOffset};

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// The host clock in the local UTC offset.
///
/// The offset is looked up on every read so DST changes are picked up. When
/// the lookup fails the offset seen at construction (or UTC) is used.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    fallback: UtcOffset,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            fallback: UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        now.to_offset(UtcOffset::local_offset_at(now).unwrap_or(self.fallback))
    }
}

/// Wall time anchored at a fixed instant and advanced by the tokio clock.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base: OffsetDateTime,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn starting_at(base: OffsetDateTime) -> Self {
        Self {
            base,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> OffsetDateTime {
        self.base + self.started.elapsed()
    }
}

/// Positive distance from `now` to `target`, zero if `target` has passed.
pub fn until(now: OffsetDateTime, target: OffsetDateTime) -> Duration {
    let delta = target - now;
    if delta.is_negative() {
        Duration::ZERO
    } else {
        delta.unsigned_abs()
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let base = datetime!(2025-03-03 07:59:50 +9);
        let clock = TokioClock::starting_at(base);
        assert_eq!(clock.now(), base);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(clock.now(), datetime!(2025-03-03 08:00:00 +9));
    }

    #[test]
    fn system_clock_reads_current_instant() {
        let clock = SystemClock::new();
        let before = OffsetDateTime::now_utc();
        let now = clock.now();
        assert!(now >= before);
        assert!(now - before < time::Duration::seconds(5));
    }

    #[test]
    fn until_saturates_at_zero() {
        let now = datetime!(2025-03-03 08:00:00 UTC);
        assert_eq!(until(now, datetime!(2025-03-03 07:00:00 UTC)), Duration::ZERO);
        assert_eq!(
            until(now, datetime!(2025-03-03 08:00:30 UTC)),
            Duration::from_secs(30)
        );
    }
}
