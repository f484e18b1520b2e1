//! Faultline Daemon - classifies platform log lines and drives recovery
//!
//! Reads lines from a file or stdin, reports each through the engine, waits
//! for pending recoveries to settle, then prints statistics.

use anyhow::{Context, Result};
use clap::Parser;
use faultline_common::{Config, LoggingConfig};
use faultlined::{CommandAction, ErrorEngine, Notification};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How often to check whether recoveries have settled before exiting
const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "faultlined")]
#[command(about = "Fault intake and recovery daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to /etc/faultline/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Platform log to read; stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Print statistics as JSON
    #[arg(long)]
    json: bool,
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn log_notification(notification: &Notification) {
    match notification {
        Notification::UserMessage { kind, text, .. } => info!("[{}] {}", kind, text),
        Notification::ErrorRecovered(event) => info!("Recovered: {}", event.describe()),
        Notification::Unrecoverable { event, attempts } => {
            error!("Gave up on {} after {} attempts", event.kind, attempts)
        }
        Notification::SafeModeEntered { reason, message } => {
            warn!("Safe mode: {} ({})", message, reason)
        }
        Notification::SafeModeExited => info!("Safe mode cleared"),
        Notification::ErrorOccurred(_) => {}
    }
}

async fn feed<R>(engine: &ErrorEngine, reader: R) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut accepted = 0;
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        if let Some(outcome) = engine.ingest_log_line(&line) {
            if outcome.is_accepted() {
                accepted += 1;
            }
        }
    }
    Ok(accepted)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref());
    init_logging(&config.logging);

    info!("Faultline Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let engine = ErrorEngine::new(config.engine.clone()).context("Failed to build error engine")?;

    for (kind, command) in &config.actions {
        engine.register_recovery(*kind, Arc::new(CommandAction::new(command.as_str())));
    }
    info!("{} recovery actions configured", config.actions.len());

    engine.add_observer(Arc::new(log_notification));

    let accepted = match &cli.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            feed(&engine, BufReader::new(file)).await?
        }
        None => feed(&engine, BufReader::new(tokio::io::stdin())).await?,
    };
    info!("Input finished, {} faults accepted", accepted);

    engine.wait_idle(IDLE_POLL).await;
    engine.shutdown();

    let stats = engine.statistics();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Faults recorded:     {}", stats.total_errors);
        println!("Recovery attempted:  {}", stats.total_recovery_attempts);
        println!("Recovered:           {}", stats.successful_recoveries);
        println!("Success rate:        {:.1}%", stats.success_rate * 100.0);
        for (kind, count) in &stats.by_kind {
            println!("  {:<24} {}", kind.as_str(), count);
        }
        if engine.is_safe_mode() {
            println!("Safe mode is ACTIVE");
        }
    }

    Ok(())
}
