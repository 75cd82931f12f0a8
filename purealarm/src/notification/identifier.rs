//! Request identifier namespace.
//!
//! Every identifier the engine creates starts with `"{alarm_id}-"`:
//!
//! ```text
//! {alarm_id}-main-{seq}-{batch_id}     first request of a one-shot batch
//! {alarm_id}-snooze-{seq}-{batch_id}   first request of a snoozed batch
//! {alarm_id}-follow-{seq}-{batch_id}   rapid follow-ups
//! {alarm_id}-repeat-{token}            missed-alarm escalation
//! {alarm_id}-{weekday}                 weekly trigger (Sunday = 1)
//! ```
//!
//! Ownership is decided by that prefix, never by substring containment, so
//! one alarm's requests can't be mistaken for another's.

use uuid::Uuid;

use crate::alarm::{AlarmId, Weekday};

/// Length of a hyphenated UUID.
const ID_LEN: usize = 36;

pub fn main(alarm: AlarmId, sequence: u32, batch: Uuid) -> String {
    format!("{alarm}-main-{sequence}-{batch}")
}

pub fn snooze(alarm: AlarmId, sequence: u32, batch: Uuid) -> String {
    format!("{alarm}-snooze-{sequence}-{batch}")
}

pub fn follow_up(alarm: AlarmId, sequence: u32, batch: Uuid) -> String {
    format!("{alarm}-follow-{sequence}-{batch}")
}

pub fn repeat(alarm: AlarmId, token: Uuid) -> String {
    format!("{alarm}-repeat-{token}")
}

pub fn weekly(alarm: AlarmId, day: Weekday) -> String {
    format!("{alarm}-{}", day.number())
}

pub fn test_alarm(token: Uuid) -> String {
    format!("test-alarm-{token}")
}

/// Whether `identifier` is in `alarm`'s namespace.
pub fn belongs_to(identifier: &str, alarm: AlarmId) -> bool {
    owner(identifier) == Some(alarm)
}

/// The alarm whose namespace `identifier` is in, if any.
pub fn owner(identifier: &str) -> Option<AlarmId> {
    let (head, rest) = identifier.split_at_checked(ID_LEN)?;
    if !rest.starts_with('-') {
        return None;
    }
    head.parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Main { sequence: u32, batch: Uuid },
    Snooze { sequence: u32, batch: Uuid },
    FollowUp { sequence: u32, batch: Uuid },
    Repeat { token: Uuid },
    Weekly(Weekday),
}

impl Kind {
    pub fn batch(&self) -> Option<Uuid> {
        match self {
            Kind::Main { batch, .. } | Kind::Snooze { batch, .. } | Kind::FollowUp { batch, .. } => {
                Some(*batch)
            }
            Kind::Repeat { .. } | Kind::Weekly(_) => None,
        }
    }
}

/// Split an identifier back into its owner and kind.
pub fn parse(identifier: &str) -> Option<(AlarmId, Kind)> {
    let alarm = owner(identifier)?;
    let rest = &identifier[ID_LEN + 1..];

    if let Some(token) = rest.strip_prefix("repeat-") {
        return Some((
            alarm,
            Kind::Repeat {
                token: token.parse().ok()?,
            },
        ));
    }

    for (prefix, build) in [
        ("main-", sequenced_main as fn(u32, Uuid) -> Kind),
        ("snooze-", sequenced_snooze),
        ("follow-", sequenced_follow_up),
    ] {
        if let Some(tail) = rest.strip_prefix(prefix) {
            let (sequence, batch) = tail.split_once('-')?;
            return Some((alarm, build(sequence.parse().ok()?, batch.parse().ok()?)));
        }
    }

    let day = Weekday::from_number(rest.parse().ok()?)?;
    Some((alarm, Kind::Weekly(day)))
}

fn sequenced_main(sequence: u32, batch: Uuid) -> Kind {
    Kind::Main { sequence, batch }
}

fn sequenced_snooze(sequence: u32, batch: Uuid) -> Kind {
    Kind::Snooze { sequence, batch }
}

fn sequenced_follow_up(sequence: u32, batch: Uuid) -> Kind {
    Kind::FollowUp { sequence, batch }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn fixed_alarm() -> AlarmId {
        "6f1c1a52-4a7b-4c55-9a84-0d7f55f0e001".parse().unwrap()
    }

    fn fixed_batch() -> Uuid {
        "00000000-0000-4000-8000-00000000beef".parse().unwrap()
    }

    #[test]
    fn identifiers_carry_alarm_prefix() {
        let alarm = fixed_alarm();
        let batch = fixed_batch();
        for id in [
            main(alarm, 0, batch),
            snooze(alarm, 0, batch),
            follow_up(alarm, 3, batch),
            repeat(alarm, batch),
            weekly(alarm, Weekday::Friday),
        ] {
            assert!(id.starts_with(&alarm.to_string()), "{id}");
            assert!(belongs_to(&id, alarm), "{id}");
        }
    }

    #[test]
    fn identifiers_parse_back() {
        let alarm = fixed_alarm();
        let batch = fixed_batch();

        assert_eq!(
            parse(&main(alarm, 0, batch)),
            Some((alarm, Kind::Main { sequence: 0, batch }))
        );
        assert_eq!(
            parse(&follow_up(alarm, 4, batch)),
            Some((alarm, Kind::FollowUp { sequence: 4, batch }))
        );
        assert_eq!(
            parse(&snooze(alarm, 0, batch)),
            Some((alarm, Kind::Snooze { sequence: 0, batch }))
        );
        assert_eq!(
            parse(&repeat(alarm, batch)),
            Some((alarm, Kind::Repeat { token: batch }))
        );
        assert_eq!(
            parse(&weekly(alarm, Weekday::Sunday)),
            Some((alarm, Kind::Weekly(Weekday::Sunday)))
        );
    }

    #[test_case("test-alarm-00000000-0000-4000-8000-00000000beef"; "test alarm")]
    #[test_case("6f1c1a52-4a7b-4c55-9a84-0d7f55f0e001"; "bare id without separator")]
    #[test_case("6f1c1a52-4a7b-4c55-9a84-0d7f55f0e001-9"; "weekday out of range")]
    #[test_case("6f1c1a52-4a7b-4c55-9a84-0d7f55f0e001-main-x-00000000-0000-4000-8000-00000000beef"; "bad sequence")]
    #[test_case(""; "empty")]
    fn unparseable_identifiers(identifier: &str) {
        assert_eq!(parse(identifier), None);
    }

    #[test]
    fn other_alarm_embedded_later_does_not_match() {
        let alarm = fixed_alarm();
        let other = AlarmId::new();
        // Substring containment would claim this for `alarm`.
        let foreign = format!("{other}-repeat-{}", alarm.as_uuid());
        assert!(foreign.contains(&alarm.to_string()));
        assert!(!belongs_to(&foreign, alarm));
        assert!(belongs_to(&foreign, other));
    }
}
