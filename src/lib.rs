//! habit-ledger: chat-driven spending ledger with a recurring habit engine
//!
//! Users record one-off spending entries and weekly recurring habits through
//! text commands. A background engine turns each due habit into a ledger
//! entry exactly once per occurrence, and a weekly broadcast sends every user
//! their running total.
//!
//! ## Components
//!
//! - **db**: SQLite ledger, recurrence rules and fire records
//! - **engine**: the per-minute recurrence tick
//! - **aggregation**: per-user totals and the weekly summary
//! - **commands**: chat command parsing and execution
//! - **inbound**: the command loop over a `MessageSource`
//! - **notify**: the `Dispatcher` and `MessageSource` seams and the Telegram transport

pub mod aggregation;
pub mod clock;
pub mod commands;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod inbound;
pub mod models;
pub mod notify;
pub mod replies;
pub mod tasks;

pub use aggregation::{AggregationService, WeeklyBroadcast};
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::CommandHandler;
pub use config::{Args, Config};
pub use db::LedgerDb;
pub use engine::{EngineConfig, RecurrenceEngine, TickReport};
pub use error::{ConfigError, DispatchError, StoreError, ValidationError};
pub use models::{LedgerEntry, RecurrenceRule, RuleFields, Slot, UserId};
pub use inbound::InboundLoop;
pub use notify::{BatchReport, Dispatcher, MessageSource};
pub use tasks::BackgroundTask;
