//! habit-ledger: chat bot daemon and operator CLI
//!
//! `serve` (the default) runs three activities until Ctrl+C:
//! - the inbound command loop (one tracked task per message)
//! - the recurrence engine tick
//! - the weekly summary broadcast
//!
//! Shutdown stops the background loops, lets any run in progress finish
//! (including replies already being sent), and waits for them before exiting.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use habit_ledger::config::Commands;
use habit_ledger::notify::TelegramChannel;
use habit_ledger::{
    AggregationService, Args, BackgroundTask, Clock, CommandHandler, Config, Dispatcher,
    InboundLoop, LedgerDb, RecurrenceEngine, SystemClock, UserId, WeeklyBroadcast,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("habit_ledger={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_args(&args)?;
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let tz = config.tz()?;
    info!("Timezone: {}", tz);
    info!("Data dir: {}", config.storage.data_dir.display());

    let db = Arc::new(LedgerDb::open(&config.storage.data_dir)?);
    let stats = db.stats()?;
    info!(
        entries = stats.entry_count,
        rules = stats.rule_count,
        fire_records = stats.fire_count,
        "Database ready"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(tz));
    let aggregation = AggregationService::new(db.clone());

    let command = args.command.clone().unwrap_or(Commands::Serve);
    if let Commands::Total { user } = command {
        let total = aggregation.total_for_user(UserId(user))?;
        println!("{}", habit_ledger::replies::money(total));
        return Ok(());
    }

    let channel = Arc::new(match &config.bot.api_url {
        Some(url) => TelegramChannel::with_api_url(url, config.token()?),
        None => TelegramChannel::new(config.token()?),
    });
    let dispatcher: Arc<dyn Dispatcher> = channel.clone();

    let engine = Arc::new(RecurrenceEngine::new(
        db.clone(),
        clock.clone(),
        dispatcher.clone(),
        config.engine_config(),
    ));

    match command {
        Commands::Tick => {
            let report = engine.tick().await?;
            println!(
                "slot={} due={} fired={} already_fired={} append_failures={} notify_failures={}",
                report.slot,
                report.due,
                report.fired.len(),
                report.already_fired.len(),
                report.append_failures.len(),
                report.notifications.failed_count()
            );
            Ok(())
        }
        Commands::Broadcast => {
            let report = aggregation.broadcast(dispatcher.as_ref()).await?;
            println!(
                "delivered={} failed={}",
                report.delivered(),
                report.failed_count()
            );
            Ok(())
        }
        Commands::Serve | Commands::Total { .. } => {
            let handler = Arc::new(CommandHandler::new(db.clone(), clock.clone()));
            serve(&config, channel, handler, engine, aggregation, dispatcher, clock).await
        }
    }
}

async fn serve(
    config: &Config,
    channel: Arc<TelegramChannel>,
    handler: Arc<CommandHandler>,
    engine: Arc<RecurrenceEngine>,
    aggregation: AggregationService,
    dispatcher: Arc<dyn Dispatcher>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<()> {
    let mut tasks: Vec<BackgroundTask> = Vec::new();

    tasks.push(engine.spawn());

    if config.broadcast.enabled {
        let broadcast = WeeklyBroadcast::new(aggregation, dispatcher, clock, config.broadcast_slot()?);
        tasks.push(broadcast.spawn());
    } else {
        info!("Weekly broadcast disabled");
    }

    let inbound = InboundLoop::new(channel.clone(), channel, handler);
    tasks.push(inbound.spawn());

    info!("Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await.ok();
    info!("Shutting down...");

    for task in &tasks {
        task.stop();
    }
    for task in tasks {
        task.join().await;
    }

    Ok(())
}
