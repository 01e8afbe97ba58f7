//! page-send - Background daemon for scheduled page posts
//!
//! Runs the publishing pipeline on a fixed interval: every due post is
//! published to its page and moved to `published` or `failed`.

use clap::Parser;
use libpagecast::config::resolve_db_path;
use libpagecast::target::graph::GraphClient;
use libpagecast::{logging, Config, Database, PipelineRunner, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "page-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled page posts")]
#[command(long_about = "\
page-send - Background daemon for scheduled page posts

DESCRIPTION:
    page-send polls the Pagecast database at a fixed interval and publishes
    every post whose scheduled time has passed. Images are staged first and
    the post is only created once all of them uploaded, so a page never shows
    a post with missing images. Each post ends up published or failed; failed
    posts keep the platform's error message and can be rescheduled with
    page-queue.

USAGE:
    # Run in foreground (logs to stderr)
    page-send

    # Run with custom poll interval
    page-send --poll-interval 30

    # Publish what is due right now, print a JSON summary, and exit
    page-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current cycle)

CONFIGURATION:
    Configuration file: ~/.config/pagecast/config.toml
    Database location: ~/.local/share/pagecast/posts.db

    [publishing]
    max_concurrency = 4         # posts published in parallel
    request_timeout_secs = 30   # per Graph API call

    [daemon]
    poll_interval = 60          # seconds between cycles

    Override with environment variables:
        PAGECAST_CONFIG      - Path to config file
        PAGECAST_DB_PATH     - Path to database file
        PAGECAST_LOG_FORMAT  - text, json or pretty
        PAGECAST_LOG_LEVEL   - error, warn, info, debug, trace

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration or database error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to check for due posts (default: 60)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    #[arg(help = "Publish due posts once, print a JSON summary and exit")]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("page-send failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db_path = resolve_db_path(Some(&config.database.path))?;
    let db = Database::new(&db_path).await?;
    let client = GraphClient::from_config(&config.publishing)?;

    let runner = PipelineRunner::from_config(Arc::new(db), Arc::new(client), &config.publishing);

    if cli.once {
        let summary = runner.run_once(chrono::Utc::now().timestamp()).await?;
        println!("{}", serde_json::json!(summary));
        return Ok(());
    }

    info!("page-send daemon starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone());

    let poll_interval = cli
        .poll_interval
        .unwrap_or(config.daemon.poll_interval)
        .max(1);
    info!(
        poll_interval,
        max_concurrency = runner.max_concurrency(),
        "Polling for due posts"
    );

    run_daemon_loop(&runner, poll_interval, shutdown).await;

    info!("page-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!("Signal handlers unavailable, shutdown will not be graceful: {}", e);
            return;
        }
    };

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, finishing current cycle...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, finishing current cycle...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
}

/// Main daemon loop
async fn run_daemon_loop(runner: &PipelineRunner, poll_interval: u64, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        // A failed scan is retried next cycle
        if let Err(e) = runner.run_once(chrono::Utc::now().timestamp()).await {
            error!("Error processing due posts: {}", e);
        }

        // Sleep until next poll (check shutdown every second)
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}
