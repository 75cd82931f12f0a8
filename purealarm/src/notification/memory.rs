//! In-process notification center.
//!
//! Stands in for the platform scheduler in tests and in the simulation
//! daemon. Every call yields to the runtime before touching the store, so
//! concurrent callers interleave the way they would against the real,
//! asynchronous API. Delivery is explicit: [`deliver_due`] moves requests
//! whose fire time has passed into the delivered list.
//!
//! [`deliver_due`]: InMemoryNotificationCenter::deliver_due

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use time::OffsetDateTime;

use super::{
    DeliveredNotification, NotificationCategory, NotificationCenter, NotificationError,
    NotificationRequest,
};
use crate::clock::Clock;
use crate::tracing::prelude::*;

#[derive(Debug)]
struct Pending {
    request: NotificationRequest,
    added_at: OffsetDateTime,
    next_fire: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
struct Inner {
    pending: Vec<Pending>,
    delivered: Vec<DeliveredNotification>,
    categories: Vec<NotificationCategory>,
    /// Adds whose identifier contains one of these are rejected.
    reject_patterns: Vec<String>,
    add_calls: usize,
}

pub struct InMemoryNotificationCenter {
    clock: Arc<dyn Clock>,
    authorized: bool,
    inner: Mutex<Inner>,
}

impl InMemoryNotificationCenter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            authorized: true,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn with_authorization(mut self, granted: bool) -> Self {
        self.authorized = granted;
        self
    }

    /// Reject every future `add` whose identifier contains `pattern`.
    pub fn reject_adds_matching(&self, pattern: impl Into<String>) {
        self.inner.lock().reject_patterns.push(pattern.into());
    }

    pub fn clear_rejections(&self) {
        self.inner.lock().reject_patterns.clear();
    }

    /// Total number of `add` calls seen, rejected ones included.
    pub fn add_calls(&self) -> usize {
        self.inner.lock().add_calls
    }

    pub fn categories(&self) -> Vec<NotificationCategory> {
        self.inner.lock().categories.clone()
    }

    /// Deliver every pending request whose fire time is at or before now.
    ///
    /// Repeating requests stay pending with their next fire time; the rest
    /// are removed. Returns what was delivered, oldest first.
    pub fn deliver_due(&self) -> Vec<DeliveredNotification> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let mut fired = Vec::new();

        inner.pending.retain_mut(|entry| {
            let Some(fire_at) = entry.next_fire.filter(|at| *at <= now) else {
                return true;
            };
            fired.push(DeliveredNotification {
                request: entry.request.clone(),
                date: fire_at,
            });
            if entry.request.trigger.repeats() {
                entry.next_fire = entry.request.trigger.next_fire(entry.added_at, now);
                entry.next_fire.is_some()
            } else {
                false
            }
        });

        fired.sort_by_key(|n| n.date);
        inner.delivered.extend(fired.iter().cloned());
        fired
    }

    /// Fire time of a pending request, if it is still pending.
    pub fn next_fire_of(&self, identifier: &str) -> Option<OffsetDateTime> {
        self.inner
            .lock()
            .pending
            .iter()
            .find(|p| p.request.identifier == identifier)
            .and_then(|p| p.next_fire)
    }
}

#[async_trait]
impl NotificationCenter for InMemoryNotificationCenter {
    async fn request_authorization(&self) -> Result<bool, NotificationError> {
        tokio::task::yield_now().await;
        Ok(self.authorized)
    }

    async fn set_categories(&self, categories: Vec<NotificationCategory>) {
        tokio::task::yield_now().await;
        self.inner.lock().categories = categories;
    }

    async fn add(&self, request: NotificationRequest) -> Result<(), NotificationError> {
        tokio::task::yield_now().await;
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.add_calls += 1;

        if let Some(pattern) = inner
            .reject_patterns
            .iter()
            .find(|p| request.identifier.contains(p.as_str()))
        {
            return Err(NotificationError::Rejected {
                identifier: request.identifier,
                reason: format!("matches rejection pattern {pattern:?}"),
            });
        }

        let next_fire = request.trigger.next_fire(now, now);
        if next_fire.is_none() {
            return Err(NotificationError::InvalidTrigger(format!(
                "{} never fires",
                request.identifier
            )));
        }

        trace!(identifier = %request.identifier, fire_at = ?next_fire, "Request added");
        inner
            .pending
            .retain(|p| p.request.identifier != request.identifier);
        inner.pending.push(Pending {
            request,
            added_at: now,
            next_fire,
        });
        Ok(())
    }

    async fn pending_requests(&self) -> Vec<NotificationRequest> {
        tokio::task::yield_now().await;
        self.inner
            .lock()
            .pending
            .iter()
            .map(|p| p.request.clone())
            .collect()
    }

    async fn delivered_notifications(&self) -> Vec<DeliveredNotification> {
        tokio::task::yield_now().await;
        self.inner.lock().delivered.clone()
    }

    async fn remove_pending(&self, identifiers: &[String]) {
        tokio::task::yield_now().await;
        self.inner
            .lock()
            .pending
            .retain(|p| !identifiers.contains(&p.request.identifier));
    }

    async fn remove_delivered(&self, identifiers: &[String]) {
        tokio::task::yield_now().await;
        self.inner
            .lock()
            .delivered
            .retain(|n| !identifiers.contains(&n.request.identifier));
    }

    async fn remove_all_pending(&self) {
        tokio::task::yield_now().await;
        self.inner.lock().pending.clear();
    }

    async fn remove_all_delivered(&self) {
        tokio::task::yield_now().await;
        self.inner.lock().delivered.clear();
    }
}
