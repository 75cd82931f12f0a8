//! Mutable bookkeeping shared by every engine operation.
//!
//! One lock guards all of it: the set of ids with a scheduling pass in
//! flight, the per-id stopped flags, the snooze-originated marks and the
//! escalation chain generations. The lock is never held across an await.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use time::OffsetDateTime;

use crate::alarm::AlarmId;

#[derive(Debug, Default)]
struct Inner {
    processing: HashSet<AlarmId>,
    stopped: HashMap<AlarmId, OffsetDateTime>,
    snoozed: HashSet<AlarmId>,
    generations: HashMap<AlarmId, u64>,
}

#[derive(Debug, Default)]
pub struct SchedulingState {
    inner: Mutex<Inner>,
}

/// Exclusive right to run a scheduling pass for one id. Released on drop.
#[derive(Debug)]
pub struct ProcessingSlot<'a> {
    state: &'a SchedulingState,
    alarm_id: AlarmId,
}

impl Drop for ProcessingSlot<'_> {
    fn drop(&mut self) {
        self.state.inner.lock().processing.remove(&self.alarm_id);
    }
}

impl SchedulingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the processing slot for `alarm_id`, or `None` if another pass
    /// already holds it.
    pub fn try_acquire(&self, alarm_id: AlarmId) -> Option<ProcessingSlot<'_>> {
        let inserted = self.inner.lock().processing.insert(alarm_id);
        // Built only on success: dropping a slot releases the id.
        inserted.then(|| ProcessingSlot {
            state: self,
            alarm_id,
        })
    }

    pub fn is_processing(&self, alarm_id: AlarmId) -> bool {
        self.inner.lock().processing.contains(&alarm_id)
    }

    pub fn mark_stopped(&self, alarm_id: AlarmId, at: OffsetDateTime) {
        self.inner.lock().stopped.insert(alarm_id, at);
    }

    /// Clear the stopped flag, returning when it had been set.
    pub fn clear_stopped(&self, alarm_id: AlarmId) -> Option<OffsetDateTime> {
        self.inner.lock().stopped.remove(&alarm_id)
    }

    pub fn stopped_at(&self, alarm_id: AlarmId) -> Option<OffsetDateTime> {
        self.inner.lock().stopped.get(&alarm_id).copied()
    }

    pub fn is_stopped(&self, alarm_id: AlarmId) -> bool {
        self.inner.lock().stopped.contains_key(&alarm_id)
    }

    pub fn set_snooze_originated(&self, alarm_id: AlarmId, snoozed: bool) {
        let mut inner = self.inner.lock();
        if snoozed {
            inner.snoozed.insert(alarm_id);
        } else {
            inner.snoozed.remove(&alarm_id);
        }
    }

    pub fn is_snooze_originated(&self, alarm_id: AlarmId) -> bool {
        self.inner.lock().snoozed.contains(&alarm_id)
    }

    /// Start a new escalation generation for `alarm_id`. Chains armed under
    /// an older generation end at their next check.
    pub fn next_generation(&self, alarm_id: AlarmId) -> u64 {
        let mut inner = self.inner.lock();
        let generation = inner.generations.entry(alarm_id).or_insert(0);
        *generation += 1;
        *generation
    }

    pub fn current_generation(&self, alarm_id: AlarmId) -> u64 {
        self.inner
            .lock()
            .generations
            .get(&alarm_id)
            .copied()
            .unwrap_or(0)
    }

    /// Whether a chain armed under `generation` may keep going: the id is
    /// not stopped and no newer schedule has replaced it.
    pub fn may_escalate(&self, alarm_id: AlarmId, generation: u64) -> bool {
        let inner = self.inner.lock();
        !inner.stopped.contains_key(&alarm_id)
            && inner.generations.get(&alarm_id).copied().unwrap_or(0) == generation
    }

    /// Set the stopped flag on every id ever scheduled. Used at teardown.
    pub fn stop_all(&self, at: OffsetDateTime) -> usize {
        let mut inner = self.inner.lock();
        let ids: Vec<AlarmId> = inner.generations.keys().copied().collect();
        for id in &ids {
            inner.stopped.insert(*id, at);
        }
        inner.snoozed.clear();
        ids.len()
    }
}
