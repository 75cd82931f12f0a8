//! Alarm notification engine.
//!
//! Turns [`Alarm`] records into batches of local notifications, keeps at most
//! one scheduling pass per alarm in flight, and drives the missed-alarm
//! escalation chain until the user stops the alarm.

mod batch;
mod escalation;
mod state;
mod trigger;

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

pub use batch::{Batch, Origin};
pub use state::{ProcessingSlot, SchedulingState};
pub use trigger::TriggerPlan;

use crate::alarm::{Alarm, AlarmId};
use crate::clock::{self, Clock};
use crate::config::EngineConfig;
use crate::notification::{NotificationCenter, NotificationError, identifier};
use crate::sound::SoundController;
use crate::storage::AlarmStore;
use crate::tracing::prelude::*;

/// Outcome of a scheduling pass that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scheduled {
    /// A fresh batch was enqueued.
    Batch { batch_id: Uuid, requests: usize },
    /// Another pass for the same alarm was already running; nothing was done.
    DuplicateProcessing,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Alarm {0} is not active")]
    InactiveAlarm(AlarmId),

    #[error("{failed} notification requests failed, {succeeded} succeeded")]
    NotificationError { succeeded: usize, failed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "camelCase")]
pub enum ScheduleFailureReason {
    InactiveAlarm,
    DuplicateProcessing,
    NotificationError,
}

/// The `(success, reason)` view of a scheduling result.
///
/// Duplicate processing counts as success but still carries its reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleReport {
    pub success: bool,
    pub reason: Option<ScheduleFailureReason>,
}

impl From<&Result<Scheduled, ScheduleError>> for ScheduleReport {
    fn from(result: &Result<Scheduled, ScheduleError>) -> Self {
        let (success, reason) = match result {
            Ok(Scheduled::Batch { .. }) => (true, None),
            Ok(Scheduled::DuplicateProcessing) => {
                (true, Some(ScheduleFailureReason::DuplicateProcessing))
            }
            Err(ScheduleError::InactiveAlarm(_)) => {
                (false, Some(ScheduleFailureReason::InactiveAlarm))
            }
            Err(ScheduleError::NotificationError { .. }) => {
                (false, Some(ScheduleFailureReason::NotificationError))
            }
        };
        Self { success, reason }
    }
}

struct Inner {
    config: EngineConfig,
    center: Arc<dyn NotificationCenter>,
    store: Arc<dyn AlarmStore>,
    clock: Arc<dyn Clock>,
    state: SchedulingState,
    sound: SoundController,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

/// Handle to the engine. Clones share the same state.
#[derive(Clone)]
pub struct AlarmNotificationEngine {
    inner: Arc<Inner>,
}

impl AlarmNotificationEngine {
    pub fn new(
        config: EngineConfig,
        center: Arc<dyn NotificationCenter>,
        store: Arc<dyn AlarmStore>,
        clock: Arc<dyn Clock>,
        sound: SoundController,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                center,
                store,
                clock,
                state: SchedulingState::new(),
                sound,
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn center(&self) -> &Arc<dyn NotificationCenter> {
        &self.inner.center
    }

    pub fn sound(&self) -> &SoundController {
        &self.inner.sound
    }

    pub fn now(&self) -> OffsetDateTime {
        self.inner.clock.now()
    }

    pub fn is_stopped(&self, id: AlarmId) -> bool {
        self.inner.state.is_stopped(id)
    }

    pub fn stopped_at(&self, id: AlarmId) -> Option<OffsetDateTime> {
        self.inner.state.stopped_at(id)
    }

    pub fn is_snooze_originated(&self, id: AlarmId) -> bool {
        self.inner.state.is_snooze_originated(id)
    }

    pub fn get_alarm_by_id(&self, id: AlarmId) -> Option<Alarm> {
        let alarm = self.inner.store.get_alarm(id);
        if alarm.is_none() {
            debug!(alarm_id = %id, "Alarm not found");
        }
        alarm
    }

    /// Replace every notification for `alarm` with a fresh batch.
    ///
    /// Returns [`Scheduled::DuplicateProcessing`] without touching anything
    /// if a pass for the same id is already running.
    pub async fn schedule_alarm(&self, alarm: &Alarm) -> Result<Scheduled, ScheduleError> {
        self.schedule(alarm, Origin::User, None).await
    }

    async fn schedule(
        &self,
        alarm: &Alarm,
        origin: Origin,
        anchor: Option<OffsetDateTime>,
    ) -> Result<Scheduled, ScheduleError> {
        let inner = &self.inner;
        let id = alarm.id;

        if !alarm.is_active {
            debug!(
                alarm_id = %id,
                reason = %ScheduleFailureReason::InactiveAlarm,
                "Not scheduling alarm"
            );
            return Err(ScheduleError::InactiveAlarm(id));
        }

        let Some(_slot) = inner.state.try_acquire(id) else {
            debug!(
                alarm_id = %id,
                reason = %ScheduleFailureReason::DuplicateProcessing,
                "Scheduling already in progress"
            );
            return Ok(Scheduled::DuplicateProcessing);
        };

        if let Some(stopped_at) = inner.state.clear_stopped(id) {
            debug!(alarm_id = %id, %stopped_at, "Cleared stop flag");
        }
        inner
            .state
            .set_snooze_originated(id, origin == Origin::Snooze);
        let generation = inner.state.next_generation(id);

        // Must finish before the new batch goes in.
        self.cancel_notifications(id).await;

        let now = inner.clock.now();
        let plan = trigger::plan(alarm, now, inner.config.past_time_grace, anchor);
        if let TriggerPlan::OneShot {
            at,
            fell_back: true,
        } = &plan
        {
            info!(alarm_id = %id, fire_at = %at, "Alarm time has passed, firing shortly");
        }
        let batch = batch::build(alarm, &plan, origin, &inner.config, now, Uuid::new_v4());

        let wanted: HashSet<&str> = batch
            .requests
            .iter()
            .map(|r| r.identifier.as_str())
            .collect();
        let mut existing = HashSet::new();
        let mut stragglers = Vec::new();
        for request in inner.center.pending_requests().await {
            if !identifier::belongs_to(&request.identifier, id) {
                continue;
            }
            if wanted.contains(request.identifier.as_str()) {
                existing.insert(request.identifier);
            } else {
                stragglers.push(request.identifier);
            }
        }
        if !stragglers.is_empty() {
            warn!(alarm_id = %id, count = stragglers.len(), "Removing stale requests");
            inner.center.remove_pending(&stragglers).await;
        }

        let results = join_all(
            batch
                .requests
                .iter()
                .filter(|r| !existing.contains(&r.identifier))
                .map(|request| async move {
                    let result = inner.center.add(request.clone()).await;
                    (request.identifier.as_str(), result)
                }),
        )
        .await;

        let main_identifier = batch.main().map(|r| r.identifier.as_str());
        let mut main_enqueued = main_identifier.is_some_and(|m| existing.contains(m));
        let mut succeeded = 0;
        let mut failed = 0;
        for (identifier, result) in results {
            match result {
                Ok(()) => {
                    succeeded += 1;
                    main_enqueued |= Some(identifier) == main_identifier;
                }
                Err(e) => {
                    failed += 1;
                    warn!(alarm_id = %id, identifier, error = %e, "Failed to add notification");
                }
            }
        }

        if main_enqueued && alarm.repeat_interval > 0 {
            let first_wait = clock::until(inner.clock.now(), batch.main_fire)
                + inner.config.escalation_initial_delay;
            self.arm_escalation(alarm.clone(), generation, first_wait);
        }

        if succeeded > 0 && failed == 0 {
            info!(
                alarm_id = %id,
                batch_id = %batch.id,
                requests = succeeded,
                fire_at = %batch.main_fire,
                snooze = origin == Origin::Snooze,
                "Alarm scheduled"
            );
            Ok(Scheduled::Batch {
                batch_id: batch.id,
                requests: succeeded,
            })
        } else {
            error!(
                alarm_id = %id,
                reason = %ScheduleFailureReason::NotificationError,
                succeeded,
                failed,
                "Alarm scheduling failed"
            );
            Err(ScheduleError::NotificationError { succeeded, failed })
        }
    }

    /// Stop `id`: set its stop flag, remove its notifications and silence it.
    pub async fn cancel_alarm(&self, id: AlarmId) {
        let inner = &self.inner;
        inner.state.mark_stopped(id, inner.clock.now());
        inner.state.set_snooze_originated(id, false);
        self.cancel_notifications(id).await;
        if inner.sound.stop_for(id) {
            debug!(alarm_id = %id, "Stopped ringing alarm");
        }
        info!(alarm_id = %id, "Alarm cancelled");
    }

    /// Remove pending and delivered notifications owned by `id` without
    /// touching its stop flag.
    pub async fn cancel_notifications(&self, id: AlarmId) {
        let center = &self.inner.center;

        let pending: Vec<String> = center
            .pending_requests()
            .await
            .into_iter()
            .map(|r| r.identifier)
            .filter(|i| identifier::belongs_to(i, id))
            .collect();
        if !pending.is_empty() {
            center.remove_pending(&pending).await;
        }

        let delivered: Vec<String> = center
            .delivered_notifications()
            .await
            .into_iter()
            .map(|n| n.request.identifier)
            .filter(|i| identifier::belongs_to(i, id))
            .collect();
        if !delivered.is_empty() {
            center.remove_delivered(&delivered).await;
        }

        trace!(
            alarm_id = %id,
            pending = pending.len(),
            delivered = delivered.len(),
            "Notifications removed"
        );
    }

    /// Re-schedule `id` as a one-shot `minutes` from now.
    ///
    /// Returns `None` if the alarm is not in the store.
    pub async fn schedule_snooze_alarm(
        &self,
        id: AlarmId,
        minutes: u32,
    ) -> Option<Result<Scheduled, ScheduleError>> {
        let inner = &self.inner;
        let Some(original) = self.get_alarm_by_id(id) else {
            warn!(alarm_id = %id, "Cannot snooze unknown alarm");
            return None;
        };

        let Some(at) = inner
            .clock
            .now()
            .checked_add(time::Duration::minutes(i64::from(minutes)))
        else {
            warn!(alarm_id = %id, minutes, "Snooze length out of range");
            return None;
        };

        self.cancel_notifications(id).await;

        let mut snoozed = original.clone();
        snoozed.time = at.time();
        snoozed.days.clear();
        snoozed.title = format!(
            "{}{}",
            original.display_title(&inner.config.default_title),
            inner.config.snooze_title_suffix
        );

        inner.state.clear_stopped(id);
        info!(alarm_id = %id, minutes, fire_at = %at, "Snoozing alarm");
        Some(self.schedule(&snoozed, Origin::Snooze, Some(at)).await)
    }

    /// Run one escalation step for `alarm` now and keep re-arming until it
    /// is stopped or rescheduled.
    pub async fn start_repeating_alarms(&self, alarm: &Alarm) {
        let generation = self.inner.state.current_generation(alarm.id);
        if let Some(next) = self.escalate_once(alarm, generation).await {
            self.arm_escalation(alarm.clone(), generation, next);
        }
    }

    /// Remove every notification and silence playback. Stop flags are left
    /// as they are.
    pub async fn cancel_all_alarms(&self) {
        let inner = &self.inner;
        inner.center.remove_all_pending().await;
        inner.center.remove_all_delivered().await;
        inner.sound.stop_all();
        info!("All alarms cancelled");
    }

    /// Enqueue a one-off request five seconds out. Returns its identifier.
    pub async fn schedule_test_alarm(&self) -> Result<String, NotificationError> {
        let request = batch::test_alarm(self.inner.clock.now());
        let identifier = request.identifier.clone();
        self.inner.center.add(request).await?;
        info!(identifier = %identifier, "Test alarm scheduled");
        Ok(identifier)
    }

    /// Flag every known alarm as stopped, end all escalation chains and wait
    /// for them to finish.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        let stopped = inner.state.stop_all(inner.clock.now());
        inner.shutdown.cancel();
        inner.tracker.close();
        inner.tracker.wait().await;
        inner.sound.stop_all();
        info!(stopped, "Engine shut down");
    }
}
