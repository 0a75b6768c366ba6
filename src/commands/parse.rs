//! Text command parsing
//!
//! Arguments are space separated. Multi-word tasks are allowed because the
//! numeric and calendar arguments are always read from the end.

use std::str::FromStr;

use chrono::Weekday;
use thiserror::Error;

use crate::models::{RuleFields, Slot};

/// A parsed chat command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Add {
        task: String,
        amount: f64,
        /// Monday-based weekday the entry is attributed to
        weekday: Option<u8>,
    },
    Schedule(RuleFields),
    ScheduleList,
    DeleteSchedule {
        id: i64,
    },
    EditSchedule {
        id: i64,
        fields: RuleFields,
    },
    List,
    Total,
}

/// Malformed command input. The message is shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    #[error("❓ Unknown command. Send /start for help")]
    UnknownCommand,

    #[error("❌ Usage:\n/add <task> <money> [day]\nExample:\n/add Gym 5 Sunday")]
    Add,

    #[error("❌ Usage:\n/schedule <task> <money> <day> <HH:MM>\nExample:\n/schedule Gym 5 Sunday 08:30")]
    Schedule,

    #[error("❌ Usage:\n/delete_schedule <id>")]
    DeleteSchedule,

    #[error("❌ Usage:\n/edit_schedule <id> <task> <money> <day> <HH:MM>")]
    EditSchedule,

    #[error("❌ Money must be a number")]
    Amount,

    #[error("❌ Unknown day. Use a name like Monday or Mon")]
    Day,

    #[error("❌ Time must be HH:MM (00:00 - 23:59)")]
    Time,

    #[error("❌ Schedule id must be a number")]
    Id,
}

/// Parse one message.
///
/// Only text whose first word starts with `/` is a command; anything else
/// yields `Ok(None)` and gets no reply. A trailing `@botname` on the command
/// word is accepted.
pub fn parse_command(text: &str) -> Result<Option<Command>, UsageError> {
    let mut words = text.split_whitespace();
    let Some(name) = words.next().and_then(|head| head.strip_prefix('/')) else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let name = name.split('@').next().unwrap_or(name).to_ascii_lowercase();

    let command = match name.as_str() {
        "start" | "help" => Command::Start,
        "add" => parse_add(&args)?,
        "schedule" => Command::Schedule(parse_rule_fields(&args).ok_or(UsageError::Schedule)??),
        "schedule_list" | "schedules" => Command::ScheduleList,
        "delete_schedule" => parse_delete(&args)?,
        "edit_schedule" => parse_edit(&args)?,
        "list" => Command::List,
        "summary" | "total" => Command::Total,
        _ => return Err(UsageError::UnknownCommand),
    };
    Ok(Some(command))
}

fn parse_add(args: &[&str]) -> Result<Command, UsageError> {
    if args.len() < 2 {
        return Err(UsageError::Add);
    }

    let last = args[args.len() - 1];
    let (amount_raw, weekday, task_words) = match parse_weekday(last) {
        // `<amount> <day>` with no task
        Some(_) if args.len() == 2 => return Err(UsageError::Add),
        Some(day) => (args[args.len() - 2], Some(day), &args[..args.len() - 2]),
        None => (last, None, &args[..args.len() - 1]),
    };

    let amount = parse_amount(amount_raw)?;
    let task = task_words.join(" ");
    if task.is_empty() {
        return Err(UsageError::Add);
    }

    Ok(Command::Add {
        task,
        amount,
        weekday,
    })
}

/// `<task...> <amount> <day> <HH:MM>`; `None` when there are too few words
fn parse_rule_fields(args: &[&str]) -> Option<Result<RuleFields, UsageError>> {
    if args.len() < 4 {
        return None;
    }

    let (task_words, tail) = args.split_at(args.len() - 3);
    Some(build_rule_fields(task_words.join(" "), tail[0], tail[1], tail[2]))
}

fn build_rule_fields(task: String, amount: &str, day: &str, time: &str) -> Result<RuleFields, UsageError> {
    let amount = parse_amount(amount)?;
    let weekday = parse_weekday(day).ok_or(UsageError::Day)?;
    let (hour, minute) = parse_time(time)?;
    let slot = Slot::new(weekday, hour, minute).map_err(|_| UsageError::Time)?;
    Ok(RuleFields::new(task, amount, slot))
}

fn parse_delete(args: &[&str]) -> Result<Command, UsageError> {
    match args {
        [raw] => Ok(Command::DeleteSchedule {
            id: parse_id(raw)?,
        }),
        _ => Err(UsageError::DeleteSchedule),
    }
}

fn parse_edit(args: &[&str]) -> Result<Command, UsageError> {
    let Some((raw_id, rest)) = args.split_first() else {
        return Err(UsageError::EditSchedule);
    };
    let id = parse_id(raw_id)?;
    let fields = parse_rule_fields(rest).ok_or(UsageError::EditSchedule)??;
    Ok(Command::EditSchedule { id, fields })
}

pub fn parse_amount(raw: &str) -> Result<f64, UsageError> {
    let raw = raw.strip_prefix('$').unwrap_or(raw);
    match raw.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(UsageError::Amount),
    }
}

/// Day name (full or abbreviated, any case) to Monday-based index
pub fn parse_weekday(raw: &str) -> Option<u8> {
    Weekday::from_str(raw)
        .ok()
        .map(|day| day.num_days_from_monday() as u8)
}

/// `HH:MM` or `H:MM`
pub fn parse_time(raw: &str) -> Result<(u8, u8), UsageError> {
    let (h, m) = raw.split_once(':').ok_or(UsageError::Time)?;
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if h.is_empty() || h.len() > 2 || m.len() != 2 || !digits(h) || !digits(m) {
        return Err(UsageError::Time);
    }
    let hour: u8 = h.parse().map_err(|_| UsageError::Time)?;
    let minute: u8 = m.parse().map_err(|_| UsageError::Time)?;
    if hour > 23 || minute > 59 {
        return Err(UsageError::Time);
    }
    Ok((hour, minute))
}

fn parse_id(raw: &str) -> Result<i64, UsageError> {
    raw.trim_start_matches('#').parse().map_err(|_| UsageError::Id)
}
