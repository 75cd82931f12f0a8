//! Command-line editor for the alarm store.
//!
//! Edits the same JSON file the daemon reads. Run `reload` in the daemon to
//! pick up changes.

use std::collections::BTreeSet;
use std::env;

use anyhow::{Context, Result, bail};
use time::Time;
use time::macros::format_description;

use purealarm::config::DaemonConfig;
use purealarm::service::AlarmService;
use purealarm::storage::{AlarmStore, JsonFileStore};
use purealarm::{Alarm, AlarmId, Weekday};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: purealarm-cli <command> [args]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  list                                   Show stored alarms");
        eprintln!("  add <HH:MM> <title> [days] [repeat]    Add an alarm");
        eprintln!("                                         days: monday,friday | weekdays | weekend | daily");
        eprintln!("                                         repeat: missed-alarm interval in minutes");
        eprintln!("  remove <id>                            Delete an alarm");
        eprintln!("  enable <id> | disable <id>             Toggle an alarm");
        eprintln!();
        eprintln!("Environment:");
        eprintln!("  PUREALARM_STORE    Alarm file (default: purealarm.json)");
        std::process::exit(1);
    }

    let config = DaemonConfig::from_env();
    let store = JsonFileStore::open(&config.store_path);

    match args[1].as_str() {
        "list" => cmd_list(&store),
        "add" => cmd_add(&store, &args[2..])?,
        "remove" => {
            let id = parse_id(args.get(2))?;
            store.delete_alarm(id);
            println!("Removed {id}");
        }
        "enable" => cmd_toggle(&store, parse_id(args.get(2))?, true)?,
        "disable" => cmd_toggle(&store, parse_id(args.get(2))?, false)?,
        command => {
            eprintln!("Unknown command: {}", command);
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn parse_id(arg: Option<&String>) -> Result<AlarmId> {
    arg.context("missing alarm id")?
        .parse()
        .context("invalid alarm id")
}

fn parse_days(arg: &str) -> Result<BTreeSet<Weekday>> {
    Ok(match arg {
        "weekdays" => Weekday::weekdays(),
        "weekend" => Weekday::weekend(),
        "daily" => Weekday::every_day(),
        "once" => BTreeSet::new(),
        list => list
            .split(',')
            .map(|d| d.trim().parse::<Weekday>().with_context(|| format!("unknown day: {d}")))
            .collect::<Result<_>>()?,
    })
}

fn format_days(days: &BTreeSet<Weekday>) -> String {
    if days.is_empty() {
        return "once".to_string();
    }
    days.iter()
        .map(|d| d.short_name())
        .collect::<Vec<_>>()
        .join(",")
}

fn cmd_list(store: &JsonFileStore) {
    let mut alarms = store.load_alarms();
    alarms.sort_by_key(|a| a.time);

    if alarms.is_empty() {
        println!("No alarms in {}", store.path().display());
        return;
    }

    for alarm in alarms {
        println!(
            "{}  {:02}:{:02}  {:<3}  {:<20}  {:<28}  repeat {}m",
            alarm.id,
            alarm.time.hour(),
            alarm.time.minute(),
            if alarm.is_active { "on" } else { "off" },
            alarm.title,
            format_days(&alarm.days),
            alarm.repeat_interval
        );
    }
}

fn cmd_add(store: &JsonFileStore, args: &[String]) -> Result<()> {
    let [time, title, rest @ ..] = args else {
        bail!("usage: add <HH:MM> <title> [days] [repeat]");
    };
    let time = Time::parse(time, format_description!("[hour]:[minute]"))
        .with_context(|| format!("invalid time: {time}"))?;

    let mut alarm = Alarm::new(title.as_str(), time);
    if let Some(days) = rest.first() {
        alarm.days = parse_days(days)?;
    }
    if let Some(repeat) = rest.get(1) {
        alarm.repeat_interval = repeat
            .parse()
            .with_context(|| format!("invalid repeat interval: {repeat}"))?;
    }
    AlarmService::validate(&alarm)?;

    store.save_alarm(&alarm);
    println!("Added {}", alarm.id);
    Ok(())
}

fn cmd_toggle(store: &JsonFileStore, id: AlarmId, active: bool) -> Result<()> {
    let Some(mut alarm) = store.get_alarm(id) else {
        bail!("alarm {id} not found");
    };
    alarm.is_active = active;
    store.save_alarm(&alarm);
    println!("{} {}", if active { "Enabled" } else { "Disabled" }, id);
    Ok(())
}
