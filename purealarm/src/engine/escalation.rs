//! Missed-alarm escalation chain.
//!
//! A chain is one tracked task per schedule. It sleeps, runs a step and
//! sleeps again for as long as the step asks it to. Every step reads the
//! stop flag and the chain generation when it wakes, so a stop or a newer
//! schedule ends the chain at its next check without having to reach into
//! the sleeping task.

use std::time::Duration;

use super::{AlarmNotificationEngine, batch};
use crate::alarm::Alarm;
use crate::tracing::prelude::*;

impl AlarmNotificationEngine {
    pub(super) fn arm_escalation(&self, alarm: Alarm, generation: u64, first_wait: Duration) {
        let engine = self.clone();
        let shutdown = self.inner.shutdown.clone();

        debug!(
            alarm_id = %alarm.id,
            generation,
            wait_s = first_wait.as_secs(),
            "Escalation armed"
        );

        self.inner.tracker.spawn(async move {
            let mut wait = first_wait;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }

                match engine.escalate_once(&alarm, generation).await {
                    Some(next) => wait = next,
                    None => break,
                }
            }
            trace!(alarm_id = %alarm.id, generation, "Escalation chain ended");
        });
    }

    /// One escalation step. Returns how long to wait before the next, or
    /// `None` when the chain is over.
    pub(super) async fn escalate_once(&self, alarm: &Alarm, generation: u64) -> Option<Duration> {
        let inner = &self.inner;
        let id = alarm.id;

        if alarm.repeat_interval == 0 {
            return None;
        }
        if !inner.state.may_escalate(id, generation) {
            debug!(alarm_id = %id, generation, "Escalation superseded or stopped");
            return None;
        }

        if inner.state.is_snooze_originated(id) {
            let minutes = inner.config.escalation_snooze_minutes;
            info!(alarm_id = %id, minutes, "Snoozed alarm unacknowledged, snoozing again");
            // The new schedule arms its own chain.
            self.schedule_snooze_alarm(id, minutes).await;
            return None;
        }

        let request = batch::missed_alarm(alarm, &inner.config, inner.clock.now());
        match inner.center.add(request).await {
            Ok(()) => info!(
                alarm_id = %id,
                repeat_interval = alarm.repeat_interval,
                "Missed alarm notification scheduled"
            ),
            Err(e) => warn!(alarm_id = %id, error = %e, "Failed to add missed alarm notification"),
        }

        let interval = Duration::from_secs(u64::from(alarm.repeat_interval) * 60);
        Some(interval + inner.config.escalation_recheck_grace)
    }
}
