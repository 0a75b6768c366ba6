//! Configuration for habit-ledger
//!
//! Settings come from an optional TOML file, then environment variables and
//! command line flags (via clap) override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::commands::parse::{parse_time, parse_weekday};
use crate::engine::EngineConfig;
use crate::error::ConfigError;
use crate::models::Slot;

/// Chat-driven spending ledger with a recurring habit engine
#[derive(Parser, Debug, Clone)]
#[command(name = "habit-ledger")]
#[command(about = "Chat-driven spending ledger with a recurring habit engine")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "HABIT_CONFIG", default_value = "habit-ledger.toml")]
    pub config: String,

    /// Bot API token for the messaging channel
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// IANA timezone used for schedules (e.g. Europe/Berlin)
    #[arg(long, env = "HABIT_TIMEZONE")]
    pub timezone: Option<String>,

    /// Directory holding the database
    #[arg(short, long, env = "HABIT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Bot API base URL (for self-hosted Bot API servers)
    #[arg(long, env = "TELEGRAM_API_URL")]
    pub api_url: Option<String>,

    /// Seconds between recurrence ticks (1-60)
    #[arg(long, env = "HABIT_TICK_INTERVAL_SECS")]
    pub tick_interval_secs: Option<u64>,

    /// Weekly summary day, e.g. Sunday
    #[arg(long, env = "HABIT_BROADCAST_DAY")]
    pub broadcast_day: Option<String>,

    /// Weekly summary time as HH:MM
    #[arg(long, env = "HABIT_BROADCAST_TIME")]
    pub broadcast_time: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Operator commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the bot, recurrence engine and weekly broadcast (default)
    Serve,
    /// Run a single recurrence tick now and exit
    Tick,
    /// Send the weekly summary now and exit
    Broadcast,
    /// Print one user's ledger total
    Total {
        /// User (chat) id
        #[arg(long)]
        user: i64,
    },
}

/// File-backed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// IANA zone name for all schedule comparisons
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot API token; prefer BOT_TOKEN over putting it in the file
    #[serde(default)]
    pub token: Option<String>,

    /// Bot API base URL
    #[serde(default)]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// Seconds between recurrence ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Days of fire records to keep
    #[serde(default = "default_retention_days")]
    pub fire_record_retention_days: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            fire_record_retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Whether the weekly summary runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Day name, e.g. "Sunday"
    #[serde(default = "default_broadcast_day")]
    pub day: String,

    /// Local time as HH:MM
    #[serde(default = "default_broadcast_time")]
    pub time: String,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            day: default_broadcast_day(),
            time: default_broadcast_time(),
        }
    }
}

// Defaults
fn default_timezone() -> String { "UTC".to_string() }
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_tick_interval() -> u64 { 60 }
fn default_retention_days() -> u64 { 14 }
fn default_true() -> bool { true }
fn default_broadcast_day() -> String { "Sunday".to_string() }
fn default_broadcast_time() -> String { "20:00".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            storage: StorageConfig::default(),
            timezone: default_timezone(),
            engine: EngineSection::default(),
            broadcast: BroadcastConfig::default(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// File config (or defaults when the file is absent) with CLI/env overrides applied
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let mut config = if Path::new(&args.config).exists() {
            Self::load(&args.config)?
        } else {
            Self::default()
        };

        if let Some(token) = &args.token {
            config.bot.token = Some(token.clone());
        }
        if let Some(api_url) = &args.api_url {
            config.bot.api_url = Some(api_url.clone());
        }
        if let Some(timezone) = &args.timezone {
            config.timezone = timezone.clone();
        }
        if let Some(data_dir) = &args.data_dir {
            config.storage.data_dir = data_dir.clone();
        }
        if let Some(secs) = args.tick_interval_secs {
            config.engine.tick_interval_secs = secs;
        }
        if let Some(day) = &args.broadcast_day {
            config.broadcast.day = day.clone();
        }
        if let Some(time) = &args.broadcast_time {
            config.broadcast.time = time.clone();
        }

        Ok(config)
    }

    /// Check everything that can be checked without network or disk
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;
        self.broadcast_slot()?;
        if self.engine.tick_interval_secs == 0 || self.engine.tick_interval_secs > 60 {
            return Err(ConfigError::InvalidTickInterval(format!(
                "{}s (expected 1-60)",
                self.engine.tick_interval_secs
            )));
        }
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }

    pub fn broadcast_slot(&self) -> Result<Slot, ConfigError> {
        let weekday = parse_weekday(&self.broadcast.day)
            .ok_or_else(|| ConfigError::InvalidBroadcast(format!("day {:?}", self.broadcast.day)))?;
        let (hour, minute) = parse_time(&self.broadcast.time)
            .map_err(|_| ConfigError::InvalidBroadcast(format!("time {:?}", self.broadcast.time)))?;
        Slot::new(weekday, hour, minute).map_err(|e| ConfigError::InvalidBroadcast(e.to_string()))
    }

    pub fn token(&self) -> Result<&str, ConfigError> {
        self.bot
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingCredential("BOT_TOKEN is not set"))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_secs(self.engine.tick_interval_secs),
            fire_record_retention_days: self.engine.fire_record_retention_days,
        }
    }
}
