//! Process-wide wiring of store, engine, router and service.

use std::sync::Arc;

use crate::alarm::Alarm;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::engine::AlarmNotificationEngine;
use crate::notification::NotificationCenter;
use crate::router::{NotificationRouter, RingScreenPresenter};
use crate::service::AlarmService;
use crate::sound::{AudioOutput, BackgroundExecution, SoundController};
use crate::storage::AlarmStore;
use crate::tracing::prelude::*;

/// Platform services the app is built on.
pub struct Platform {
    pub center: Arc<dyn NotificationCenter>,
    pub store: Arc<dyn AlarmStore>,
    pub clock: Arc<dyn Clock>,
    pub audio: Arc<dyn AudioOutput>,
    pub background: Arc<dyn BackgroundExecution>,
    pub presenter: Arc<dyn RingScreenPresenter>,
}

pub struct App {
    pub engine: AlarmNotificationEngine,
    pub router: NotificationRouter,
    pub service: AlarmService,
}

impl App {
    pub fn new(config: EngineConfig, platform: Platform) -> Self {
        let sound = SoundController::new(
            platform.audio,
            platform.background,
            config.vibration_period,
        );
        let engine = AlarmNotificationEngine::new(
            config,
            platform.center,
            platform.store.clone(),
            platform.clock,
            sound,
        );
        Self {
            router: NotificationRouter::new(engine.clone(), platform.presenter),
            service: AlarmService::new(platform.store, engine.clone()),
            engine,
        }
    }

    /// Ask for notification permission and register the action categories.
    ///
    /// Denial is only logged; scheduling goes ahead either way.
    pub async fn setup_notifications(&self) -> bool {
        let granted = match self.engine.center().request_authorization().await {
            Ok(granted) => granted,
            Err(e) => {
                warn!(error = %e, "Notification authorization request failed");
                false
            }
        };
        if granted {
            info!("Notification permission granted");
        } else {
            warn!("Notification permission denied, alarms may not be shown");
        }
        self.router.register_categories().await;
        granted
    }

    /// Launch sequence: authorization, categories, then every active alarm
    /// is scheduled again.
    pub async fn start(&self) -> bool {
        let granted = self.setup_notifications().await;
        let failed = self.service.reschedule_all().await;
        if failed > 0 {
            warn!(failed, "Some alarms could not be scheduled at startup");
        }
        granted
    }

    pub fn alarms(&self) -> Vec<Alarm> {
        self.service.alarms()
    }

    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use time::macros::{datetime, time};

    use super::*;
    use crate::clock::TokioClock;
    use crate::notification::InMemoryNotificationCenter;
    use crate::router::{ALARM_CATEGORY, LogRingScreen};
    use crate::sound::{LogAudioOutput, LogBackgroundExecution};
    use crate::storage::MemoryStore;

    fn app(center: InMemoryNotificationCenter, clock: Arc<dyn Clock>, alarms: Vec<Alarm>) -> (App, Arc<InMemoryNotificationCenter>) {
        let center = Arc::new(center);
        let app = App::new(
            EngineConfig::default(),
            Platform {
                center: center.clone(),
                store: Arc::new(MemoryStore::with_alarms(alarms)),
                clock,
                audio: Arc::new(LogAudioOutput),
                background: Arc::new(LogBackgroundExecution::default()),
                presenter: Arc::new(LogRingScreen),
            },
        );
        (app, center)
    }

    #[tokio::test(start_paused = true)]
    async fn start_registers_categories_and_reschedules() {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::starting_at(datetime!(2025-03-03 06:00:00 UTC)));
        let mut off = Alarm::new("Off", time!(08:00));
        off.is_active = false;
        let (app, center) = app(
            InMemoryNotificationCenter::new(clock.clone()),
            clock,
            vec![Alarm::new("On", time!(07:00)), off],
        );

        assert!(app.start().await);
        assert!(center.categories().iter().any(|c| c.identifier == ALARM_CATEGORY));
        assert_eq!(center.pending_requests().await.len(), 6);
        app.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn denied_permission_does_not_block_scheduling() {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::starting_at(datetime!(2025-03-03 06:00:00 UTC)));
        let (app, center) = app(
            InMemoryNotificationCenter::new(clock.clone()).with_authorization(false),
            clock,
            vec![Alarm::new("On", time!(07:00))],
        );

        assert!(!app.start().await);
        assert_eq!(center.pending_requests().await.len(), 6);
    }
}
