//! The alarm record and its identity.
//!
//! An [`Alarm`] is a plain value: the UI edits a copy, hands it to the store,
//! and the engine derives notifications from whatever copy it is given. Only
//! the [`AlarmId`] is stable across edits.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};
use time::{Time, macros::time};
use uuid::Uuid;

/// Stable alarm identity, assigned at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(Uuid);

impl AlarmId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AlarmId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AlarmId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for AlarmId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Day of the week, numbered the way calendar triggers number them
/// (Sunday = 1 through Saturday = 7).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Weekday {
    Sunday = 1,
    Monday = 2,
    Tuesday = 3,
    Wednesday = 4,
    Thursday = 5,
    Friday = 6,
    Saturday = 7,
}

impl Weekday {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::iter().find(|d| d.number() == n)
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Weekday::Sunday => "Sun",
            Weekday::Monday => "Mon",
            Weekday::Tuesday => "Tue",
            Weekday::Wednesday => "Wed",
            Weekday::Thursday => "Thu",
            Weekday::Friday => "Fri",
            Weekday::Saturday => "Sat",
        }
    }

    pub fn weekdays() -> BTreeSet<Self> {
        [
            Weekday::Monday,
            Weekday::Tuesday,
            Weekday::Wednesday,
            Weekday::Thursday,
            Weekday::Friday,
        ]
        .into_iter()
        .collect()
    }

    pub fn weekend() -> BTreeSet<Self> {
        [Weekday::Saturday, Weekday::Sunday].into_iter().collect()
    }

    pub fn every_day() -> BTreeSet<Self> {
        Self::iter().collect()
    }
}

impl From<Weekday> for time::Weekday {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Sunday => time::Weekday::Sunday,
            Weekday::Monday => time::Weekday::Monday,
            Weekday::Tuesday => time::Weekday::Tuesday,
            Weekday::Wednesday => time::Weekday::Wednesday,
            Weekday::Thursday => time::Weekday::Thursday,
            Weekday::Friday => time::Weekday::Friday,
            Weekday::Saturday => time::Weekday::Saturday,
        }
    }
}

impl From<time::Weekday> for Weekday {
    fn from(day: time::Weekday) -> Self {
        match day {
            time::Weekday::Sunday => Weekday::Sunday,
            time::Weekday::Monday => Weekday::Monday,
            time::Weekday::Tuesday => Weekday::Tuesday,
            time::Weekday::Wednesday => Weekday::Wednesday,
            time::Weekday::Thursday => Weekday::Thursday,
            time::Weekday::Friday => Weekday::Friday,
            time::Weekday::Saturday => Weekday::Saturday,
        }
    }
}

pub const DEFAULT_SOUND: &str = "Default";
pub const DEFAULT_COLOR: &str = "#6699FF";

/// A user-defined alarm.
///
/// `days` empty means a one-shot alarm at the next occurrence of `time`;
/// otherwise the alarm repeats weekly on each listed day. `repeat_interval`
/// is in minutes, and zero disables missed-alarm escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: AlarmId,
    pub title: String,
    pub time: Time,
    #[serde(default)]
    pub days: BTreeSet<Weekday>,
    pub is_active: bool,
    #[serde(default = "default_sound")]
    pub sound: String,
    #[serde(default = "enabled")]
    pub vibration: bool,
    #[serde(default = "enabled")]
    pub snooze: bool,
    #[serde(default)]
    pub repeat_interval: u32,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_sound() -> String {
    DEFAULT_SOUND.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

const fn enabled() -> bool {
    true
}

impl Alarm {
    /// Create an active one-shot alarm with default presentation settings.
    pub fn new(title: impl Into<String>, time: Time) -> Self {
        Self {
            id: AlarmId::new(),
            title: title.into(),
            time,
            days: BTreeSet::new(),
            is_active: true,
            sound: default_sound(),
            vibration: true,
            snooze: true,
            repeat_interval: 0,
            color: default_color(),
        }
    }

    pub fn with_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.days = days.into_iter().collect();
        self
    }

    pub fn with_repeat_interval(mut self, minutes: u32) -> Self {
        self.repeat_interval = minutes;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn is_one_shot(&self) -> bool {
        self.days.is_empty()
    }

    /// Title to show in notifications. Empty titles are only replaced here,
    /// the stored value is left alone.
    pub fn display_title<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.title.trim().is_empty() {
            fallback
        } else {
            &self.title
        }
    }

    /// Alarms stored on first launch.
    pub fn default_presets() -> Vec<Alarm> {
        vec![
            Alarm::new("Wake up", time!(07:30)).with_days(Weekday::weekdays()),
            Alarm::new("Bedtime", time!(22:30))
                .with_days(Weekday::every_day())
                .with_color("#9933CC"),
            Alarm::new("Weekend", time!(09:00))
                .with_days(Weekday::weekend())
                .with_color("#FF804D"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(Weekday::Sunday, 1)]
    #[test_case(Weekday::Wednesday, 4)]
    #[test_case(Weekday::Saturday, 7)]
    fn weekday_numbers_follow_calendar_convention(day: Weekday, n: u8) {
        assert_eq!(day.number(), n);
        assert_eq!(Weekday::from_number(n), Some(day));
    }

    #[test]
    fn weekday_number_out_of_range() {
        assert_eq!(Weekday::from_number(0), None);
        assert_eq!(Weekday::from_number(8), None);
    }

    #[test]
    fn weekday_converts_to_time_crate() {
        for day in Weekday::iter() {
            let converted: time::Weekday = day.into();
            assert_eq!(converted.number_from_sunday(), day.number());
            assert_eq!(Weekday::from(converted), day);
        }
    }

    #[test]
    fn weekday_parses_case_insensitively() {
        assert_eq!("Monday".parse::<Weekday>().unwrap(), Weekday::Monday);
        assert_eq!("friday".parse::<Weekday>().unwrap(), Weekday::Friday);
    }

    #[test]
    fn empty_title_falls_back_only_for_display() {
        let alarm = Alarm::new("", time!(08:00));
        assert_eq!(alarm.display_title("Alarm"), "Alarm");
        assert_eq!(alarm.title, "");

        let named = Alarm::new("Gym", time!(06:00));
        assert_eq!(named.display_title("Alarm"), "Gym");
    }

    #[test]
    fn alarm_id_round_trips_through_string() {
        let id = AlarmId::new();
        let parsed: AlarmId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let mut original = Alarm::new("Nap", time!(14:15));
        original.is_active = false;
        let mut value = serde_json::to_value(&original).unwrap();
        let fields = value.as_object_mut().unwrap();
        for key in ["days", "sound", "vibration", "snooze", "repeat_interval", "color"] {
            fields.remove(key);
        }

        let alarm: Alarm = serde_json::from_value(value).unwrap();
        assert_eq!(alarm.id, original.id);
        assert!(!alarm.is_active);
        assert_eq!(alarm.time, time!(14:15));
        assert!(alarm.days.is_empty());
        assert!(alarm.vibration);
        assert!(alarm.snooze);
        assert_eq!(alarm.repeat_interval, 0);
        assert_eq!(alarm.sound, DEFAULT_SOUND);
    }

    #[test]
    fn presets_are_weekly_and_active() {
        let presets = Alarm::default_presets();
        assert_eq!(presets.len(), 3);
        assert!(presets.iter().all(|a| a.is_active && !a.is_one_shot()));
        assert_eq!(presets[0].days.len(), 5);
        assert_eq!(presets[1].days.len(), 7);
    }
}
