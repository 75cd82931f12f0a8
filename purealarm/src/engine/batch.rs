//! Notification requests built for one scheduling pass.

use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use super::trigger::TriggerPlan;
use crate::alarm::{Alarm, DEFAULT_SOUND};
use crate::config::EngineConfig;
use crate::notification::{
    DateComponents, NotificationContent, NotificationRequest, NotificationSound, Trigger,
    UserInfo, identifier,
};
use crate::router::{ALARM_CATEGORY, ALARM_CATEGORY_NO_SNOOZE};

/// Why a batch is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    User,
    Snooze,
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub id: Uuid,
    pub requests: Vec<NotificationRequest>,
    /// When the main request fires.
    pub main_fire: OffsetDateTime,
}

impl Batch {
    /// `requests[0]` is always the main request.
    pub fn main(&self) -> Option<&NotificationRequest> {
        self.requests.first()
    }
}

fn sound(alarm: &Alarm) -> NotificationSound {
    if alarm.sound.is_empty() || alarm.sound == DEFAULT_SOUND {
        NotificationSound::Default
    } else {
        NotificationSound::Named(alarm.sound.clone())
    }
}

fn category(alarm: &Alarm) -> String {
    if alarm.snooze {
        ALARM_CATEGORY.to_string()
    } else {
        ALARM_CATEGORY_NO_SNOOZE.to_string()
    }
}

fn payload(alarm: &Alarm, batch: Uuid, sequence: u32, origin: Origin, now: OffsetDateTime) -> UserInfo {
    UserInfo {
        alarm_id: Some(alarm.id.to_string()),
        sequence: Some(sequence),
        repeat_interval: Some(alarm.repeat_interval),
        batch_id: Some(batch.to_string()),
        is_snooze: origin == Origin::Snooze,
        timestamp: Some(now.unix_timestamp()),
        ..UserInfo::default()
    }
}

pub fn build(
    alarm: &Alarm,
    plan: &TriggerPlan,
    origin: Origin,
    config: &EngineConfig,
    now: OffsetDateTime,
    batch_id: Uuid,
) -> Batch {
    let title = alarm.display_title(&config.default_title);
    let requests = match plan {
        TriggerPlan::OneShot { at, .. } => (0..config.batch_size.max(1))
            .map(|sequence| {
                let fire_at = *at + config.follow_up_spacing * sequence;
                let (identifier, title, body) = if sequence == 0 {
                    let identifier = match origin {
                        Origin::User => identifier::main(alarm.id, sequence, batch_id),
                        Origin::Snooze => identifier::snooze(alarm.id, sequence, batch_id),
                    };
                    (identifier, format!("⏰ {title}"), "Your alarm is ringing!".to_string())
                } else {
                    (
                        identifier::follow_up(alarm.id, sequence, batch_id),
                        format!("{title} (Repeat {sequence})"),
                        "You have a missed alarm!".to_string(),
                    )
                };
                NotificationRequest {
                    identifier,
                    content: NotificationContent {
                        title,
                        body,
                        sound: Some(sound(alarm)),
                        category: Some(category(alarm)),
                        user_info: payload(alarm, batch_id, sequence, origin, now),
                    },
                    trigger: Trigger::at(fire_at),
                }
            })
            .collect(),
        TriggerPlan::Weekly { days, time, .. } => days
            .iter()
            .map(|day| NotificationRequest {
                identifier: identifier::weekly(alarm.id, *day),
                content: NotificationContent {
                    title: format!("⏰ {title}"),
                    body: format!("Your {} alarm is ringing!", day.short_name()),
                    sound: Some(sound(alarm)),
                    category: Some(category(alarm)),
                    user_info: payload(alarm, batch_id, 0, origin, now),
                },
                trigger: Trigger::Calendar {
                    components: DateComponents::weekly(*day, *time),
                    repeats: true,
                },
            })
            .collect(),
    };

    Batch {
        id: batch_id,
        requests,
        main_fire: plan.first_fire(),
    }
}

/// One missed-alarm reminder, `repeat_interval` minutes from when it is added.
pub fn missed_alarm(alarm: &Alarm, config: &EngineConfig, now: OffsetDateTime) -> NotificationRequest {
    let minutes = alarm.repeat_interval;
    NotificationRequest {
        identifier: identifier::repeat(alarm.id, Uuid::new_v4()),
        content: NotificationContent {
            title: "⏰ Missed alarm".to_string(),
            body: format!(
                "Please check your {} alarm!",
                alarm.display_title(&config.default_title)
            ),
            sound: Some(sound(alarm)),
            category: Some(category(alarm)),
            user_info: UserInfo {
                alarm_id: Some(alarm.id.to_string()),
                repeat_interval: Some(minutes),
                is_repeat: true,
                timestamp: Some(now.unix_timestamp()),
                ..UserInfo::default()
            },
        },
        trigger: Trigger::after(Duration::from_secs(u64::from(minutes) * 60)),
    }
}

/// A throwaway request five seconds out, for checking delivery end to end.
pub fn test_alarm(now: OffsetDateTime) -> NotificationRequest {
    NotificationRequest {
        identifier: identifier::test_alarm(Uuid::new_v4()),
        content: NotificationContent {
            title: "Test alarm".to_string(),
            body: format!(
                "This is a test alarm. Time: {:02}:{:02}",
                now.hour(),
                now.minute()
            ),
            sound: Some(NotificationSound::Default),
            category: None,
            user_info: UserInfo {
                is_check: true,
                timestamp: Some(now.unix_timestamp()),
                ..UserInfo::default()
            },
        },
        trigger: Trigger::after(Duration::from_secs(5)),
    }
}
