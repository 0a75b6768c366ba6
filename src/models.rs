//! Ledger and recurrence data model

use std::fmt;

use chrono::{Datelike, NaiveDate, Timelike, Weekday};

use crate::error::ValidationError;

/// Opaque identifier of the owning user (the chat id on the transport side)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Day of week plus time of day, interpreted in the configured timezone.
///
/// `weekday` counts from Monday = 0 to Sunday = 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    weekday: u8,
    hour: u8,
    minute: u8,
}

impl Slot {
    pub fn new(weekday: u8, hour: u8, minute: u8) -> Result<Self, ValidationError> {
        if weekday > 6 {
            return Err(ValidationError::WeekdayOutOfRange(weekday));
        }
        if hour > 23 {
            return Err(ValidationError::HourOutOfRange(hour));
        }
        if minute > 59 {
            return Err(ValidationError::MinuteOutOfRange(minute));
        }
        Ok(Self { weekday, hour, minute })
    }

    /// The slot a wall-clock instant falls into
    pub fn of<T: Datelike + Timelike>(at: &T) -> Self {
        Self {
            weekday: at.weekday().num_days_from_monday() as u8,
            hour: at.hour() as u8,
            minute: at.minute() as u8,
        }
    }

    pub fn weekday(&self) -> u8 {
        self.weekday
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn chrono_weekday(&self) -> Weekday {
        weekday_from_index(self.weekday)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:02}:{:02}",
            weekday_name(self.weekday),
            self.hour,
            self.minute
        )
    }
}

/// Weekday for a Monday-based index; out-of-range values wrap.
pub fn weekday_from_index(index: u8) -> Weekday {
    match index % 7 {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

pub fn weekday_name(index: u8) -> &'static str {
    match weekday_from_index(index) {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// One realized, dated spending record
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: UserId,
    pub task: String,
    pub amount: f64,
    pub date: NaiveDate,
}

/// Everything a user controls on a recurrence rule.
///
/// Used both for creation and for the full rewrite done by an edit.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFields {
    pub task: String,
    pub amount: f64,
    pub slot: Slot,
}

impl RuleFields {
    pub fn new(task: impl Into<String>, amount: f64, slot: Slot) -> Self {
        Self {
            task: task.into(),
            amount,
            slot,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        validate_task(&self.task)?;
        validate_amount(self.amount)
    }
}

/// A repeating weekly schedule that materializes ledger entries
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceRule {
    pub id: i64,
    pub user_id: UserId,
    pub task: String,
    pub amount: f64,
    pub slot: Slot,
}

pub(crate) fn validate_task(task: &str) -> Result<(), ValidationError> {
    if task.trim().is_empty() {
        return Err(ValidationError::EmptyTask);
    }
    Ok(())
}

pub(crate) fn validate_amount(amount: f64) -> Result<(), ValidationError> {
    if !amount.is_finite() {
        return Err(ValidationError::NonFiniteAmount);
    }
    Ok(())
}
