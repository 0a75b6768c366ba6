//! Error types for habit-ledger

use thiserror::Error;

use crate::models::UserId;

/// Malformed rule or entry fields
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("weekday out of range (expected 0-6): {0}")]
    WeekdayOutOfRange(u8),

    #[error("hour out of range (expected 0-23): {0}")]
    HourOutOfRange(u8),

    #[error("minute out of range (expected 0-59): {0}")]
    MinuteOutOfRange(u8),

    #[error("task must not be empty")]
    EmptyTask,

    #[error("amount must be a finite number")]
    NonFiniteAmount,
}

/// Storage layer failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Delivery failure for a single recipient
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rejected by channel for {user}: {reason}")]
    Rejected { user: UserId, reason: String },
}

/// Configuration problems detected at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Invalid broadcast schedule: {0}")]
    InvalidBroadcast(String),

    #[error("Invalid tick interval: {0}")]
    InvalidTickInterval(String),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
