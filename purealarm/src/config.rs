use std::path::PathBuf;
use std::time::Duration;

use crate::tracing::prelude::*;

/// Scheduling policy for the notification engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Requests per one-shot batch: one main notification plus follow-ups.
    pub batch_size: u32,

    /// Gap between consecutive follow-up notifications.
    pub follow_up_spacing: Duration,

    /// A one-shot alarm whose time of day has already passed today fires
    /// this far from now instead of moving to tomorrow.
    pub past_time_grace: Duration,

    /// Wait after the trigger instant before the first missed-alarm check.
    pub escalation_initial_delay: Duration,

    /// Extra wait added to each repeat interval before re-checking.
    pub escalation_recheck_grace: Duration,

    /// Snooze length used by the notification snooze action.
    pub default_snooze_minutes: u32,

    /// Snooze length used when escalation nags a snoozed alarm.
    pub escalation_snooze_minutes: u32,

    /// Label used in notifications when an alarm has no title.
    pub default_title: String,

    /// Appended to the title of snoozed alarms.
    pub snooze_title_suffix: String,

    /// Period of the vibration pulse while an alarm rings.
    pub vibration_period: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 6,
            follow_up_spacing: Duration::from_secs(2),
            past_time_grace: Duration::from_secs(10),
            escalation_initial_delay: Duration::from_secs(30),
            escalation_recheck_grace: Duration::from_secs(5),
            default_snooze_minutes: 5,
            escalation_snooze_minutes: 1,
            default_title: "Alarm".to_string(),
            snooze_title_suffix: " (Snooze)".to_string(),
            vibration_period: Duration::from_secs(1),
        }
    }
}

const STORE_ENV: &str = "PUREALARM_STORE";
const TICK_ENV: &str = "PUREALARM_TICK_MS";
const DEFAULT_STORE: &str = "purealarm.json";
const DEFAULT_TICK: Duration = Duration::from_millis(500);

/// Settings for the `purealarmd` binary, read from the environment.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Path of the JSON file holding the alarm collection.
    pub store_path: PathBuf,

    /// How often the simulated notification center delivers due requests.
    pub delivery_tick: Duration,

    pub engine: EngineConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE),
            delivery_tick: DEFAULT_TICK,
            engine: EngineConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup(STORE_ENV).filter(|p| !p.is_empty()) {
            config.store_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(TICK_ENV) {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => config.delivery_tick = Duration::from_millis(ms),
                _ => warn!(
                    value = %raw,
                    default_ms = DEFAULT_TICK.as_millis() as u64,
                    "Ignoring invalid {TICK_ENV}"
                ),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = DaemonConfig::from_lookup(lookup(&[]));
        assert_eq!(config.store_path, PathBuf::from(DEFAULT_STORE));
        assert_eq!(config.delivery_tick, DEFAULT_TICK);
        assert_eq!(config.engine.batch_size, 6);
    }

    #[test]
    fn reads_store_path_and_tick() {
        let config = DaemonConfig::from_lookup(lookup(&[
            (STORE_ENV, "/tmp/alarms.json"),
            (TICK_ENV, "250"),
        ]));
        assert_eq!(config.store_path, PathBuf::from("/tmp/alarms.json"));
        assert_eq!(config.delivery_tick, Duration::from_millis(250));
    }

    #[test]
    fn invalid_tick_falls_back_to_default() {
        let config = DaemonConfig::from_lookup(lookup(&[(TICK_ENV, "soon")]));
        assert_eq!(config.delivery_tick, DEFAULT_TICK);

        let config = DaemonConfig::from_lookup(lookup(&[(TICK_ENV, "0")]));
        assert_eq!(config.delivery_tick, DEFAULT_TICK);
    }
}
