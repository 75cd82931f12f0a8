//! PureAlarm alarm notification engine.
//!
//! Alarms are stored as [`alarm::Alarm`] records and turned into local
//! notifications by [`engine::AlarmNotificationEngine`]. User responses to
//! delivered notifications come back through [`router::NotificationRouter`].

pub mod alarm;
pub mod app;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod notification;
pub mod router;
pub mod service;
pub mod sound;
pub mod storage;
pub mod tracing;

pub use alarm::{Alarm, AlarmId, Weekday};
pub use app::{App, Platform};
pub use engine::{AlarmNotificationEngine, ScheduleError, ScheduleReport, Scheduled};
pub use error::{Error, Result};
