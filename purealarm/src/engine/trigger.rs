//! When an alarm should fire.
//!
//! One-shot alarms fire today at their time of day. If that moment is not in
//! the future they fire a short grace period from now instead; they are never
//! moved to tomorrow. Weekly alarms fire on each listed day at their hour and
//! minute, indefinitely.

use std::time::Duration;

use time::{OffsetDateTime, Time};

use crate::alarm::{Alarm, Weekday};
use crate::notification::DateComponents;

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerPlan {
    OneShot {
        at: OffsetDateTime,
        /// The time of day had passed and the grace fallback was used.
        fell_back: bool,
    },
    Weekly {
        days: Vec<Weekday>,
        time: Time,
        /// Soonest upcoming occurrence across all days.
        next: OffsetDateTime,
    },
}

impl TriggerPlan {
    /// When the first notification of the plan fires.
    pub fn first_fire(&self) -> OffsetDateTime {
        match self {
            TriggerPlan::OneShot { at, .. } => *at,
            TriggerPlan::Weekly { next, .. } => *next,
        }
    }
}

/// Plan the trigger for `alarm` as of `now`.
///
/// `anchor` overrides the time-of-day computation for one-shot alarms that
/// must fire at an exact instant (snoozes).
pub fn plan(
    alarm: &Alarm,
    now: OffsetDateTime,
    grace: Duration,
    anchor: Option<OffsetDateTime>,
) -> TriggerPlan {
    if alarm.is_one_shot() || anchor.is_some() {
        let (at, fell_back) = match anchor {
            Some(at) if at > now => (at, false),
            Some(_) => (now + grace, true),
            None => one_shot_instant(alarm.time, now, grace),
        };
        return TriggerPlan::OneShot { at, fell_back };
    }

    let days: Vec<Weekday> = alarm.days.iter().copied().collect();
    let next = days
        .iter()
        .filter_map(|day| DateComponents::weekly(*day, alarm.time).next_match(now))
        .min()
        .unwrap_or(now + grace);
    TriggerPlan::Weekly {
        days,
        time: alarm.time,
        next,
    }
}

/// Today's date at `time`, or `now + grace` if that is not strictly later
/// than `now`.
pub fn one_shot_instant(time: Time, now: OffsetDateTime, grace: Duration) -> (OffsetDateTime, bool) {
    let today = now.replace_time(time);
    if today > now {
        (today, false)
    } else {
        (now + grace, true)
    }
}
