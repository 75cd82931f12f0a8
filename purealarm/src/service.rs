//! Operations behind the alarm list and detail screens.
//!
//! Every edit is written to the store first and then reflected in the
//! notification schedule. Scheduling problems never fail the edit; they come
//! back as a notice the screen can show without blocking.

use std::sync::Arc;

use crate::alarm::{Alarm, AlarmId};
use crate::engine::{AlarmNotificationEngine, ScheduleError, ScheduleReport, Scheduled};
use crate::error::{Error, Result};
use crate::storage::AlarmStore;
use crate::tracing::prelude::*;

/// Shown when an alarm was saved but could not be scheduled.
pub const SCHEDULE_FAILED_NOTICE: &str = "alarm scheduling failed";

/// Non-blocking message for the user, if any.
pub type Notice = Option<&'static str>;

pub struct AlarmService {
    store: Arc<dyn AlarmStore>,
    engine: AlarmNotificationEngine,
}

impl AlarmService {
    pub fn new(store: Arc<dyn AlarmStore>, engine: AlarmNotificationEngine) -> Self {
        Self { store, engine }
    }

    /// All alarms, earliest time of day first.
    pub fn alarms(&self) -> Vec<Alarm> {
        let mut alarms = self.store.load_alarms();
        alarms.sort_by_key(|a| (a.time, a.title.clone()));
        alarms
    }

    pub fn validate(alarm: &Alarm) -> Result<()> {
        if alarm.title.trim().is_empty() {
            return Err(Error::Other("alarm title must not be empty".into()));
        }
        Ok(())
    }

    pub async fn add_alarm(&self, alarm: Alarm) -> Result<Notice> {
        Self::validate(&alarm)?;
        if self.store.get_alarm(alarm.id).is_some() {
            return Err(Error::Other(format!("alarm {} already exists", alarm.id)));
        }
        self.store.save_alarm(&alarm);
        info!(alarm_id = %alarm.id, title = %alarm.title, "Alarm added");
        Ok(self.sync(&alarm).await)
    }

    pub async fn update_alarm(&self, alarm: Alarm) -> Result<Notice> {
        Self::validate(&alarm)?;
        if self.store.get_alarm(alarm.id).is_none() {
            return Err(Error::Other("alarm not found".into()));
        }
        self.store.save_alarm(&alarm);
        debug!(alarm_id = %alarm.id, "Alarm updated");
        Ok(self.sync(&alarm).await)
    }

    pub async fn set_active(&self, id: AlarmId, active: bool) -> Result<Notice> {
        let mut alarm = self
            .store
            .get_alarm(id)
            .ok_or_else(|| Error::Other("alarm not found".into()))?;
        alarm.is_active = active;
        self.store.save_alarm(&alarm);
        info!(alarm_id = %id, active, "Alarm toggled");
        Ok(self.sync(&alarm).await)
    }

    pub async fn delete_alarm(&self, id: AlarmId) {
        self.store.delete_alarm(id);
        self.engine.cancel_alarm(id).await;
        info!(alarm_id = %id, "Alarm deleted");
    }

    /// Schedule every active alarm in the store. Returns how many failed.
    pub async fn reschedule_all(&self) -> usize {
        let mut failed = 0;
        for alarm in self.store.load_alarms().iter().filter(|a| a.is_active) {
            if notice(&self.engine.schedule_alarm(alarm).await).is_some() {
                failed += 1;
            }
        }
        info!(failed, "Active alarms rescheduled");
        failed
    }

    async fn sync(&self, alarm: &Alarm) -> Notice {
        if alarm.is_active {
            notice(&self.engine.schedule_alarm(alarm).await)
        } else {
            self.engine.cancel_alarm(alarm.id).await;
            None
        }
    }
}

fn notice(result: &std::result::Result<Scheduled, ScheduleError>) -> Notice {
    let report = ScheduleReport::from(result);
    (!report.success).then_some(SCHEDULE_FAILED_NOTICE)
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;
    use time::macros::{datetime, time};

    use super::*;
    use crate::alarm::Weekday;
    use crate::clock::{Clock, TokioClock};
    use crate::config::EngineConfig;
    use crate::notification::{InMemoryNotificationCenter, NotificationCenter};
    use crate::sound::testing::{RecordingAudio, controller};
    use crate::storage::MemoryStore;

    fn service(now: OffsetDateTime) -> (AlarmService, AlarmNotificationEngine, Arc<InMemoryNotificationCenter>) {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::starting_at(now));
        let center = Arc::new(InMemoryNotificationCenter::new(clock.clone()));
        let store: Arc<dyn AlarmStore> = Arc::new(MemoryStore::new());
        let engine = AlarmNotificationEngine::new(
            EngineConfig::default(),
            center.clone(),
            store.clone(),
            clock,
            controller(&Arc::new(RecordingAudio::default())),
        );
        (AlarmService::new(store, engine.clone()), engine, center)
    }

    #[tokio::test(start_paused = true)]
    async fn add_schedules_and_lists_by_time() {
        let (service, _, center) = service(datetime!(2025-03-03 06:00:00 UTC));
        let late = Alarm::new("Late", time!(09:00));
        let early = Alarm::new("Early", time!(07:00)).with_days([Weekday::Monday]);

        assert_eq!(service.add_alarm(late.clone()).await.unwrap(), None);
        assert_eq!(service.add_alarm(early.clone()).await.unwrap(), None);

        let titles: Vec<String> = service.alarms().into_iter().map(|a| a.title).collect();
        assert_eq!(titles, vec!["Early", "Late"]);
        assert_eq!(center.pending_requests().await.len(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_title_is_rejected() {
        let (service, _, center) = service(datetime!(2025-03-03 06:00:00 UTC));
        assert!(service.add_alarm(Alarm::new("  ", time!(07:00))).await.is_err());
        assert!(service.alarms().is_empty());
        assert_eq!(center.add_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deactivating_stops_alarm() {
        let (service, engine, center) = service(datetime!(2025-03-03 06:00:00 UTC));
        let alarm = Alarm::new("Wake", time!(07:00));
        service.add_alarm(alarm.clone()).await.unwrap();

        assert_eq!(service.set_active(alarm.id, false).await.unwrap(), None);
        assert!(center.pending_requests().await.is_empty());
        assert!(engine.is_stopped(alarm.id));
        assert!(!service.alarms()[0].is_active);

        service.set_active(alarm.id, true).await.unwrap();
        assert_eq!(center.pending_requests().await.len(), 6);
        assert!(!engine.is_stopped(alarm.id));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_schedule_returns_notice() {
        let (service, _, center) = service(datetime!(2025-03-03 06:00:00 UTC));
        center.reject_adds_matching("-follow-");

        let notice = service.add_alarm(Alarm::new("Wake", time!(07:00))).await.unwrap();
        assert_eq!(notice, Some(SCHEDULE_FAILED_NOTICE));
        // The edit itself is kept.
        assert_eq!(service.alarms().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn update_unknown_alarm_fails() {
        let (service, _, _) = service(datetime!(2025-03-03 06:00:00 UTC));
        let err = service.update_alarm(Alarm::new("Ghost", time!(07:00))).await;
        assert!(matches!(err, Err(Error::Other(msg)) if msg == "alarm not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_removes_record_and_notifications() {
        let (service, _, center) = service(datetime!(2025-03-03 06:00:00 UTC));
        let alarm = Alarm::new("Wake", time!(07:00));
        service.add_alarm(alarm.clone()).await.unwrap();

        service.delete_alarm(alarm.id).await;
        assert!(service.alarms().is_empty());
        assert!(center.pending_requests().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_all_skips_inactive() {
        let (service, _, center) = service(datetime!(2025-03-03 06:00:00 UTC));
        let mut off = Alarm::new("Off", time!(08:00));
        off.is_active = false;
        service.add_alarm(Alarm::new("On", time!(07:00))).await.unwrap();
        service.add_alarm(off).await.unwrap();
        center.remove_all_pending().await;

        assert_eq!(service.reschedule_all().await, 0);
        assert_eq!(center.pending_requests().await.len(), 6);
    }
}
