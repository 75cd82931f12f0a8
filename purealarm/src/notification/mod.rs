//! Local-notification scheduler interface.
//!
//! The platform notification center is an asynchronous, eventually-consistent
//! store of pending and delivered requests addressed by string identifier.
//! Nothing here is transactional: an `add` racing a `remove_pending` can land
//! in either order, so callers that need ordering must await one call before
//! issuing the next.

pub mod identifier;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bitflags::bitflags;
use time::{Date, OffsetDateTime, Time};

use crate::alarm::{AlarmId, Weekday};

pub use memory::InMemoryNotificationCenter;

/// Payload attached to every request the engine creates.
///
/// `alarm_id` is kept as the raw string so requests carrying a malformed id
/// can still be inspected and removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserInfo {
    pub alarm_id: Option<String>,
    pub sequence: Option<u32>,
    pub repeat_interval: Option<u32>,
    pub batch_id: Option<String>,
    pub is_repeat: bool,
    pub is_snooze: bool,
    pub is_check: bool,
    /// Unix seconds when the request was built.
    pub timestamp: Option<i64>,
}

impl UserInfo {
    pub fn alarm_id(&self) -> Option<AlarmId> {
        self.alarm_id.as_deref().and_then(|raw| raw.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationSound {
    Default,
    Named(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub sound: Option<NotificationSound>,
    pub category: Option<String>,
    pub user_info: UserInfo,
}

/// Calendar fields a trigger must match. Unset date fields match any value;
/// unset time fields are treated as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateComponents {
    pub year: Option<i32>,
    pub month: Option<u8>,
    pub day: Option<u8>,
    pub weekday: Option<Weekday>,
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub second: Option<u8>,
}

/// Matching never looks further ahead than this many days.
const MATCH_HORIZON_DAYS: i64 = 366 * 4;

impl DateComponents {
    /// Components pinning one exact second.
    pub fn exact(at: OffsetDateTime) -> Self {
        Self {
            year: Some(at.year()),
            month: Some(at.month() as u8),
            day: Some(at.day()),
            weekday: None,
            hour: Some(at.hour()),
            minute: Some(at.minute()),
            second: Some(at.second()),
        }
    }

    /// Components matching `time` (to the minute) on every `weekday`.
    pub fn weekly(weekday: Weekday, time: Time) -> Self {
        Self {
            weekday: Some(weekday),
            hour: Some(time.hour()),
            minute: Some(time.minute()),
            ..Self::default()
        }
    }

    fn time(&self) -> Option<Time> {
        Time::from_hms(
            self.hour.unwrap_or(0),
            self.minute.unwrap_or(0),
            self.second.unwrap_or(0),
        )
        .ok()
    }

    fn matches_date(&self, date: Date) -> bool {
        self.year.is_none_or(|y| y == date.year())
            && self.month.is_none_or(|m| m == date.month() as u8)
            && self.day.is_none_or(|d| d == date.day())
            && self
                .weekday
                .is_none_or(|w| w == Weekday::from(date.weekday()))
    }

    /// First instant strictly after `after` matching these components, in
    /// the same UTC offset as `after`.
    pub fn next_match(&self, after: OffsetDateTime) -> Option<OffsetDateTime> {
        let time = self.time()?;
        let mut date = after.date();
        for _ in 0..MATCH_HORIZON_DAYS {
            if self.matches_date(date) {
                let candidate = after.replace_date(date).replace_time(time);
                if candidate > after {
                    return Some(candidate);
                }
            }
            date = date.next_day()?;
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// Fire `interval` after the request was added.
    TimeInterval { interval: Duration, repeats: bool },
    /// Fire when the wall clock matches `components`.
    Calendar {
        components: DateComponents,
        repeats: bool,
    },
}

impl Trigger {
    pub fn at(instant: OffsetDateTime) -> Self {
        Trigger::Calendar {
            components: DateComponents::exact(instant),
            repeats: false,
        }
    }

    pub fn after(interval: Duration) -> Self {
        Trigger::TimeInterval {
            interval,
            repeats: false,
        }
    }

    pub fn repeats(&self) -> bool {
        match self {
            Trigger::TimeInterval { repeats, .. } | Trigger::Calendar { repeats, .. } => *repeats,
        }
    }

    /// Next fire time after `now` for a request added at `added_at`.
    pub fn next_fire(&self, added_at: OffsetDateTime, now: OffsetDateTime) -> Option<OffsetDateTime> {
        match self {
            Trigger::TimeInterval { interval, repeats } => {
                let first = added_at.checked_add((*interval).try_into().ok()?)?;
                if first > now || !*repeats {
                    return (first > now).then_some(first);
                }
                if interval.is_zero() {
                    return None;
                }
                let elapsed = crate::clock::until(added_at, now);
                let periods = elapsed.as_nanos() / interval.as_nanos() + 1;
                let offset = interval.checked_mul(u32::try_from(periods).ok()?)?;
                added_at.checked_add(offset.try_into().ok()?)
            }
            Trigger::Calendar { components, .. } => components.next_match(now),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub identifier: String,
    pub content: NotificationContent,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredNotification {
    pub request: NotificationRequest,
    pub date: OffsetDateTime,
}

bitflags! {
    /// How a notification is shown while the app is in the foreground.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PresentationOptions: u8 {
        const BADGE = 1 << 0;
        const SOUND = 1 << 1;
        const LIST = 1 << 2;
        const BANNER = 1 << 3;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ActionOptions: u8 {
        const AUTHENTICATION_REQUIRED = 1 << 0;
        const DESTRUCTIVE = 1 << 1;
        const FOREGROUND = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CategoryOptions: u8 {
        /// Report swipe-away dismissals as responses.
        const CUSTOM_DISMISS_ACTION = 1 << 0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationAction {
    pub identifier: String,
    pub title: String,
    pub options: ActionOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationCategory {
    pub identifier: String,
    pub actions: Vec<NotificationAction>,
    pub options: CategoryOptions,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotificationError {
    #[error("Request {identifier} rejected: {reason}")]
    Rejected { identifier: String, reason: String },

    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    #[error("Notification center unavailable")]
    Unavailable,
}

/// The platform's local-notification API.
#[async_trait]
pub trait NotificationCenter: Send + Sync {
    /// Ask the user for permission to show alerts and play sounds.
    async fn request_authorization(&self) -> Result<bool, NotificationError>;

    async fn set_categories(&self, categories: Vec<NotificationCategory>);

    /// Enqueue a request. A request with an existing identifier replaces it.
    async fn add(&self, request: NotificationRequest) -> Result<(), NotificationError>;

    async fn pending_requests(&self) -> Vec<NotificationRequest>;

    async fn delivered_notifications(&self) -> Vec<DeliveredNotification>;

    async fn remove_pending(&self, identifiers: &[String]);

    async fn remove_delivered(&self, identifiers: &[String]);

    async fn remove_all_pending(&self);

    async fn remove_all_delivered(&self);
}

#[cfg(test)]
mod tests {
    use time::macros::{datetime, time};

    use super::*;

    #[test]
    fn exact_components_match_once() {
        let at = datetime!(2025-03-03 08:00:00 +9);
        let components = DateComponents::exact(at);

        assert_eq!(components.next_match(datetime!(2025-03-03 07:59:50 +9)), Some(at));
        assert_eq!(components.next_match(at), None);
    }

    #[test]
    fn weekly_components_find_next_weekday() {
        // 2025-03-03 is a Monday.
        let components = DateComponents::weekly(Weekday::Wednesday, time!(06:30));
        assert_eq!(
            components.next_match(datetime!(2025-03-03 12:00:00 UTC)),
            Some(datetime!(2025-03-05 06:30:00 UTC))
        );
    }

    #[test]
    fn weekly_components_skip_today_once_passed() {
        let components = DateComponents::weekly(Weekday::Monday, time!(06:30));
        assert_eq!(
            components.next_match(datetime!(2025-03-03 06:30:00 UTC)),
            Some(datetime!(2025-03-10 06:30:00 UTC))
        );
        assert_eq!(
            components.next_match(datetime!(2025-03-03 06:29:59 UTC)),
            Some(datetime!(2025-03-03 06:30:00 UTC))
        );
    }

    #[test]
    fn interval_trigger_fires_after_interval() {
        let added = datetime!(2025-03-03 08:00:00 UTC);
        let trigger = Trigger::after(Duration::from_secs(300));
        assert_eq!(
            trigger.next_fire(added, added),
            Some(datetime!(2025-03-03 08:05:00 UTC))
        );
        assert_eq!(trigger.next_fire(added, datetime!(2025-03-03 08:05:00 UTC)), None);
    }

    #[test]
    fn interval_past_calendar_range_never_fires() {
        let added = datetime!(2025-03-03 08:00:00 UTC);
        let trigger = Trigger::after(Duration::from_secs(u64::from(u32::MAX) * 60));
        assert_eq!(trigger.next_fire(added, added), None);
    }

    #[test]
    fn repeating_interval_trigger_rolls_forward() {
        let added = datetime!(2025-03-03 08:00:00 UTC);
        let trigger = Trigger::TimeInterval {
            interval: Duration::from_secs(60),
            repeats: true,
        };
        assert_eq!(
            trigger.next_fire(added, datetime!(2025-03-03 08:02:30 UTC)),
            Some(datetime!(2025-03-03 08:03:00 UTC))
        );
    }

    #[test]
    fn payload_alarm_id_parses_lazily() {
        let id = AlarmId::new();
        let info = UserInfo {
            alarm_id: Some(id.to_string()),
            ..UserInfo::default()
        };
        assert_eq!(info.alarm_id(), Some(id));

        let garbage = UserInfo {
            alarm_id: Some("not-a-uuid".to_string()),
            ..UserInfo::default()
        };
        assert_eq!(garbage.alarm_id(), None);
    }
}
