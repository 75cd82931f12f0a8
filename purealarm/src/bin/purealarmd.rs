//! Alarm daemon.
//!
//! Hosts the notification engine over an in-process notification center and
//! delivers due notifications on a fixed tick. Responses are typed on stdin:
//!
//! ```text
//! list                 show alarms and pending requests
//! open|dismiss|snooze|stop <alarm-id>
//! test                 schedule a test alarm
//! reload               reschedule every active alarm from the store
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};

use purealarm::clock::{Clock, SystemClock};
use purealarm::config::DaemonConfig;
use purealarm::notification::{DeliveredNotification, InMemoryNotificationCenter, NotificationCenter};
use purealarm::router::{
    DEFAULT_ACTION, DISMISS_ACTION, LogRingScreen, NotificationResponse, SNOOZE_ACTION,
    STOP_ACTION,
};
use purealarm::sound::{LogAudioOutput, LogBackgroundExecution};
use purealarm::storage::JsonFileStore;
use purealarm::tracing::prelude::*;
use purealarm::{AlarmId, App, Platform};

#[tokio::main]
async fn main() -> Result<()> {
    purealarm::tracing::init_journald_or_stdout();

    let config = DaemonConfig::from_env();
    info!(
        store = %config.store_path.display(),
        tick_ms = config.delivery_tick.as_millis() as u64,
        "Starting purealarmd"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let center = Arc::new(InMemoryNotificationCenter::new(clock.clone()));
    let app = App::new(
        config.engine.clone(),
        Platform {
            center: center.clone(),
            store: Arc::new(JsonFileStore::open(&config.store_path)),
            clock,
            audio: Arc::new(LogAudioOutput),
            background: Arc::new(LogBackgroundExecution::default()),
            presenter: Arc::new(LogRingScreen),
        },
    );
    app.start().await;

    let mut ticker = tokio::time::interval(config.delivery_tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    // Latest delivered notification per alarm, the target of typed responses.
    let mut ringing: HashMap<AlarmId, DeliveredNotification> = HashMap::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = ticker.tick() => {
                for delivered in center.deliver_due() {
                    info!(
                        identifier = %delivered.request.identifier,
                        title = %delivered.request.content.title,
                        "Notification delivered"
                    );
                    app.router.will_present(&delivered);
                    if let Some(id) = delivered.request.content.user_info.alarm_id() {
                        ringing.insert(id, delivered);
                    }
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Err(e) = handle_command(&app, &center, &mut ringing, line.trim()).await {
                        warn!(error = %e, "Command failed");
                    }
                }
                Ok(None) => {
                    debug!("stdin closed");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    stdin_open = false;
                }
            },
        }
    }

    app.shutdown().await;
    Ok(())
}

async fn handle_command(
    app: &App,
    center: &InMemoryNotificationCenter,
    ringing: &mut HashMap<AlarmId, DeliveredNotification>,
    line: &str,
) -> Result<()> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(());
    };

    match command {
        "list" => {
            for alarm in app.alarms() {
                println!(
                    "{} {} {:<20} active={} repeat={}m",
                    alarm.id,
                    alarm.time,
                    alarm.title,
                    alarm.is_active,
                    alarm.repeat_interval
                );
            }
            println!("{} pending requests", center.pending_requests().await.len());
        }
        "test" => {
            let identifier = app.engine.schedule_test_alarm().await?;
            println!("scheduled {identifier}");
        }
        "reload" => {
            let failed = app.service.reschedule_all().await;
            println!("rescheduled, {failed} failed");
        }
        "open" | "dismiss" | "snooze" | "stop" => {
            let id: AlarmId = words
                .next()
                .context("missing alarm id")?
                .parse()
                .context("invalid alarm id")?;
            let notification = ringing
                .get(&id)
                .cloned()
                .with_context(|| format!("alarm {id} has not rung"))?;
            let action = match command {
                "open" => DEFAULT_ACTION,
                "dismiss" => DISMISS_ACTION,
                "snooze" => SNOOZE_ACTION,
                _ => STOP_ACTION,
            };
            if action != DISMISS_ACTION {
                ringing.remove(&id);
            }
            app.router
                .did_receive_response(&NotificationResponse {
                    action_identifier: action.to_string(),
                    notification,
                })
                .await;
        }
        other => bail!("unknown command: {other}"),
    }

    Ok(())
}
