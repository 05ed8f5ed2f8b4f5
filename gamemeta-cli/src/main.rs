//! gamemeta - resolve missing game metadata from public sources
//!
//! Two entry points:
//! - `gamemeta lookup` resolves one field for one title and prints the
//!   lookup response as JSON.
//! - `gamemeta batch` walks every record of a SQLite library that is missing
//!   a field and writes back what it finds. Ctrl-C stops the run between two
//!   queries.
//!
//! Resolver tuning comes from `GAMEMETA_*` environment variables.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bridge_desktop::{HttpClientConfig, ReqwestHttpClient};
use bridge_traits::time::LogLevel;
use clap::{Parser, Subcommand, ValueEnum};
use core_library::db::{create_pool, ensure_games_table, DatabaseConfig};
use core_library::{MetadataField, SqliteGameRepository};
use core_metadata::{
    lookup, BatchConfig, BatchProgress, BatchResolver, FallbackOrchestrator, Query, RunContext,
};
use core_runtime::config::ResolverConfig;
use core_runtime::events::{
    BatchEvent, CoreEvent, EventBus, EventSeverity, EventStream, ResolutionEvent,
};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "gamemeta", version, about = "Resolve missing game metadata")]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, global = true, default_value_t = LogStyle::Compact)]
    log_format: LogStyle,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve one field for a single title
    Lookup {
        #[arg(long)]
        title: String,
        #[arg(long)]
        platform: String,
        /// cover_image, release_date, genre, description, critic_rating or market_price
        #[arg(long)]
        field: MetadataField,
    },
    /// Fill one field for every library record missing it
    Batch {
        /// Path to the SQLite library
        #[arg(long, env = "GAMEMETA_DATABASE")]
        database: PathBuf,
        #[arg(long)]
        field: MetadataField,
        /// Process at most this many records
        #[arg(long)]
        limit: Option<u32>,
        /// Resolve without writing anything back
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogStyle {
    Pretty,
    Json,
    Compact,
}

impl From<LogStyle> for LogFormat {
    fn from(style: LogStyle) -> Self {
        match style {
            LogStyle::Pretty => LogFormat::Pretty,
            LogStyle::Json => LogFormat::Json,
            LogStyle::Compact => LogFormat::Compact,
        }
    }
}

fn log_level(verbose: u8) -> LogLevel {
    match verbose {
        0 => LogLevel::Info,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(
        LoggingConfig::default()
            .with_format(cli.log_format.into())
            .with_level(log_level(cli.verbose))
            .with_target(cli.verbose > 0),
    )?;

    let config = ResolverConfig::from_env().context("invalid GAMEMETA_* configuration")?;
    let http = ReqwestHttpClient::new(HttpClientConfig {
        timeout: config.request_timeout,
        user_agent: config.user_agent.clone(),
        ..Default::default()
    })?;
    let event_bus = EventBus::new(256);
    let orchestrator = Arc::new(
        FallbackOrchestrator::from_config(Arc::new(http), &config).with_event_bus(event_bus.clone()),
    );
    info!(sources = ?orchestrator.registry().ids(), "Resolver ready");

    match cli.command {
        Command::Lookup {
            title,
            platform,
            field,
        } => {
            let response = lookup(&orchestrator, &Query::new(title, platform, field)).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Batch {
            database,
            field,
            limit,
            dry_run,
        } => {
            let pool = create_pool(DatabaseConfig::new(&database))
                .await
                .with_context(|| format!("cannot open library at {}", database.display()))?;
            ensure_games_table(&pool).await?;
            let repository = Arc::new(SqliteGameRepository::new(pool));

            let mut batch_config =
                BatchConfig::from_resolver_config(field, &config).with_dry_run(dry_run);
            if let Some(limit) = limit {
                batch_config = batch_config.with_limit(limit);
            }

            let token = CancellationToken::new();
            let interrupt = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, stopping after the current query");
                    interrupt.cancel();
                }
            });
            let progress_events = EventStream::new(event_bus.subscribe()).filter(|event| {
                matches!(event, CoreEvent::Batch(BatchEvent::Progress { .. }))
                    || event.severity() >= EventSeverity::Warning
            });
            tokio::spawn(print_progress(progress_events));

            let resolver = BatchResolver::new(batch_config, orchestrator.clone(), repository)
                .with_event_bus(event_bus)
                .with_cancellation(token);
            let ctx = RunContext::new();
            let progress = resolver.run(&ctx).await?;

            print_summary(&progress, &ctx, dry_run);
        }
    }

    Ok(())
}

async fn print_progress(mut events: EventStream) {
    loop {
        match events.recv().await {
            Ok(CoreEvent::Batch(BatchEvent::Progress {
                processed,
                total,
                found,
                not_found,
                failed,
                percent,
                ..
            })) => {
                eprintln!(
                    "[{:>3}%] {}/{} found={} not_found={} failed={}",
                    percent, processed, total, found, not_found, failed
                );
            }
            Ok(CoreEvent::Resolution(ResolutionEvent::SourceDisabled { source, reason, .. })) => {
                eprintln!("source {} disabled for this run: {}", source, reason);
            }
            Ok(CoreEvent::Batch(BatchEvent::RecordFailed {
                record_id, message, ..
            })) => {
                eprintln!("record {} failed: {}", record_id, message);
            }
            Ok(other) => eprintln!("{}", other.description()),
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_summary(progress: &BatchProgress, ctx: &RunContext, dry_run: bool) {
    println!(
        "{} {} of {} records: {} found, {} not found, {} failed",
        if progress.cancelled { "Stopped after" } else { "Processed" },
        progress.processed,
        progress.total,
        progress.found,
        progress.not_found,
        progress.failed
    );
    for (source, count) in &progress.sources {
        println!("  {:<20} {}", source, count);
    }
    for (source, reason) in ctx.disabled_sources() {
        println!("  {} disabled: {}", source, reason);
    }
    if dry_run {
        println!("Dry run, nothing was written");
    }
}
