//! Notification response routing.
//!
//! The platform reports two events: a notification is about to be shown
//! while the app is in the foreground, and the user acted on a delivered
//! notification. Both are translated into engine calls here.

use std::sync::Arc;

use crate::alarm::{Alarm, AlarmId, DEFAULT_SOUND};
use crate::engine::AlarmNotificationEngine;
use crate::notification::{
    ActionOptions, CategoryOptions, DeliveredNotification, NotificationAction,
    NotificationCategory, PresentationOptions, identifier,
};
use crate::tracing::prelude::*;

pub const SNOOZE_ACTION: &str = "SNOOZE_ACTION";
pub const STOP_ACTION: &str = "STOP_ACTION";
/// Reported when the user taps the notification itself.
pub const DEFAULT_ACTION: &str = "com.apple.UNNotificationDefaultActionIdentifier";
/// Reported when the user swipes the notification away.
pub const DISMISS_ACTION: &str = "com.apple.UNNotificationDismissActionIdentifier";

pub const ALARM_CATEGORY: &str = "ALARM_CATEGORY";
/// Category for alarms with snooze disabled: stop only.
pub const ALARM_CATEGORY_NO_SNOOZE: &str = "ALARM_CATEGORY_NO_SNOOZE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseAction {
    Open,
    Dismiss,
    Snooze,
    Stop,
    Unknown(String),
}

impl ResponseAction {
    pub fn parse(identifier: &str) -> Self {
        match identifier {
            DEFAULT_ACTION => ResponseAction::Open,
            DISMISS_ACTION => ResponseAction::Dismiss,
            SNOOZE_ACTION => ResponseAction::Snooze,
            STOP_ACTION => ResponseAction::Stop,
            other => ResponseAction::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationResponse {
    pub action_identifier: String,
    pub notification: DeliveredNotification,
}

/// UI hook that shows the full-screen ringing view.
pub trait RingScreenPresenter: Send + Sync {
    fn present_ringing(&self, alarm: &Alarm);
}

/// Presenter that only logs, for headless hosts.
#[derive(Debug, Default)]
pub struct LogRingScreen;

impl RingScreenPresenter for LogRingScreen {
    fn present_ringing(&self, alarm: &Alarm) {
        info!(alarm_id = %alarm.id, title = %alarm.title, "Presenting ringing screen");
    }
}

fn snooze_action() -> NotificationAction {
    NotificationAction {
        identifier: SNOOZE_ACTION.to_string(),
        title: "Snooze 5 minutes".to_string(),
        options: ActionOptions::FOREGROUND,
    }
}

fn stop_action() -> NotificationAction {
    NotificationAction {
        identifier: STOP_ACTION.to_string(),
        title: "Stop alarm".to_string(),
        options: ActionOptions::DESTRUCTIVE | ActionOptions::FOREGROUND,
    }
}

/// Categories the engine's requests refer to.
pub fn alarm_categories() -> Vec<NotificationCategory> {
    vec![
        NotificationCategory {
            identifier: ALARM_CATEGORY.to_string(),
            actions: vec![snooze_action(), stop_action()],
            options: CategoryOptions::CUSTOM_DISMISS_ACTION,
        },
        NotificationCategory {
            identifier: ALARM_CATEGORY_NO_SNOOZE.to_string(),
            actions: vec![stop_action()],
            options: CategoryOptions::CUSTOM_DISMISS_ACTION,
        },
    ]
}

pub struct NotificationRouter {
    engine: AlarmNotificationEngine,
    presenter: Arc<dyn RingScreenPresenter>,
}

impl NotificationRouter {
    pub fn new(engine: AlarmNotificationEngine, presenter: Arc<dyn RingScreenPresenter>) -> Self {
        Self { engine, presenter }
    }

    pub async fn register_categories(&self) {
        self.engine.center().set_categories(alarm_categories()).await;
    }

    /// A notification is about to be shown in the foreground. Always show it,
    /// and start local playback when it belongs to an alarm.
    pub fn will_present(&self, notification: &DeliveredNotification) -> PresentationOptions {
        let info = &notification.request.content.user_info;
        if let Some(id) = info.alarm_id() {
            let (sound, vibrate) = match self.engine.get_alarm_by_id(id) {
                Some(alarm) => (alarm.sound, alarm.vibration),
                None => (DEFAULT_SOUND.to_string(), true),
            };
            self.engine.sound().start(id, &sound, vibrate);
        }
        PresentationOptions::BANNER | PresentationOptions::SOUND
    }

    pub async fn did_receive_response(&self, response: &NotificationResponse) {
        let action = ResponseAction::parse(&response.action_identifier);
        let request = &response.notification.request;

        let Some(id) = request
            .content
            .user_info
            .alarm_id()
            .or_else(|| identifier::owner(&request.identifier))
        else {
            debug!(identifier = %request.identifier, ?action, "Response without alarm id");
            self.engine.sound().stop_all();
            return;
        };

        info!(alarm_id = %id, ?action, "Notification response");
        self.engine.sound().stop_for(id);

        match action {
            // Opening the ringing screen acknowledges the alarm.
            ResponseAction::Open => {
                self.engine.cancel_alarm(id).await;
                match self.engine.get_alarm_by_id(id) {
                    Some(alarm) => self.presenter.present_ringing(&alarm),
                    None => warn!(alarm_id = %id, "Cannot present ringing screen for unknown alarm"),
                }
            }
            // Acknowledging a banner is not stopping the alarm.
            ResponseAction::Dismiss => {}
            ResponseAction::Snooze => {
                self.engine.cancel_notifications(id).await;
                let minutes = self.engine.config().default_snooze_minutes;
                self.engine.schedule_snooze_alarm(id, minutes).await;
            }
            ResponseAction::Stop => {
                self.engine.cancel_alarm(id).await;
                self.purge_stragglers(id).await;
            }
            ResponseAction::Unknown(identifier) => {
                debug!(alarm_id = %id, identifier = %identifier, "Unknown response action");
            }
        }
    }

    /// Second removal pass after a stop: a batch add that raced the stop can
    /// land after the first cancellation.
    async fn purge_stragglers(&self, id: AlarmId) {
        let center = self.engine.center();
        let raw = id.to_string();
        let ours = |identifier: &str, alarm_id: Option<&str>| {
            identifier::belongs_to(identifier, id) || alarm_id == Some(raw.as_str())
        };

        let pending: Vec<String> = center
            .pending_requests()
            .await
            .into_iter()
            .filter(|r| ours(&r.identifier, r.content.user_info.alarm_id.as_deref()))
            .map(|r| r.identifier)
            .collect();
        let delivered: Vec<String> = center
            .delivered_notifications()
            .await
            .into_iter()
            .filter(|n| {
                ours(
                    &n.request.identifier,
                    n.request.content.user_info.alarm_id.as_deref(),
                )
            })
            .map(|n| n.request.identifier)
            .collect();

        if !pending.is_empty() {
            warn!(alarm_id = %id, count = pending.len(), "Removing requests that outlived stop");
            center.remove_pending(&pending).await;
        }
        if !delivered.is_empty() {
            center.remove_delivered(&delivered).await;
        }
    }
}
