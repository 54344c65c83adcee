//! Lawinenwacht CLI
//!
//! Local execution entry point for the bulletin pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use lawinenwacht::{
    dispatch::{DispatchQueue, Dispatcher, FcmChannel},
    error::Result,
    models::Config,
    pipeline::{SyncRunner, run_scheduler},
    provider::BulletinClient,
    storage::{LocalStore, Store},
};

/// Lawinenwacht - Avalanche Bulletin Pipeline
#[derive(Parser, Debug)]
#[command(
    name = "lawinenwacht",
    version,
    about = "Avalanche bulletin ingestion and alerting"
)]
struct Cli {
    /// Path to storage directory containing config files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one full sync cycle
    Sync {
        /// Language variant (default from config)
        #[arg(long)]
        lang: Option<String>,
    },

    /// Back-fill one historical bulletin
    Backfill {
        /// Point in time, RFC 3339 (e.g. 2026-01-10T08:00:00Z)
        #[arg(long)]
        date: String,

        #[arg(long)]
        lang: Option<String>,
    },

    /// Run one reminder-due evaluation and dispatch
    Remind,

    /// Run the scheduler: periodic sync plus minute reminder ticks
    Watch {
        #[arg(long)]
        lang: Option<String>,
    },

    /// Validate configuration files
    Validate,

    /// Show latest bulletin and status summary
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Wire up the pipeline components around one storage root.
fn build_runner(
    config: &Config,
    store: Arc<LocalStore>,
) -> Result<(Arc<SyncRunner>, tokio::task::JoinHandle<()>)> {
    let client = Arc::new(BulletinClient::new(&config.provider)?);
    let channel = Arc::new(FcmChannel::new(&config.push)?);
    let dispatcher = Arc::new(Dispatcher::new(channel, store.clone()));
    let (queue, worker) = DispatchQueue::start(dispatcher.clone(), config.push.retry.policy());

    let runner = Arc::new(SyncRunner::new(
        store,
        client,
        dispatcher,
        queue,
        config.sync.clone(),
    ));
    Ok((runner, worker))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Lawinenwacht starting...");

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    let store = Arc::new(LocalStore::new(&cli.storage_dir));

    match cli.command {
        Command::Sync { lang } => {
            let language = lang.unwrap_or_else(|| config.provider.language.clone());
            let (runner, worker) = build_runner(&config, store)?;

            let report = runner.run_sync(&language).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            // Drop the queue handle so the worker drains and exits.
            drop(runner);
            let _ = worker.await;

            if !report.success {
                log::warn!("Sync failed: {}", report.errors.join("; "));
            }
        }

        Command::Backfill { date, lang } => {
            let at: DateTime<Utc> = DateTime::parse_from_rfc3339(&date)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(lawinenwacht::error::AppError::from)?;
            let language = lang.unwrap_or_else(|| config.provider.language.clone());
            let (runner, worker) = build_runner(&config, store)?;

            let report = runner.run_historical_sync(at, &language).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            drop(runner);
            let _ = worker.await;
        }

        Command::Remind => {
            let (runner, worker) = build_runner(&config, store)?;
            let dispatched = runner.dispatch_due_reminders(Utc::now()).await?;
            log::info!("Dispatched {dispatched} due reminders");

            drop(runner);
            let _ = worker.await;
        }

        Command::Watch { lang } => {
            let language = lang.unwrap_or_else(|| config.provider.language.clone());
            let (runner, _worker) = build_runner(&config, store)?;

            run_scheduler(runner, &config.sync, &language).await;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {e}");
                return Err(e);
            }
            log::info!("✓ Config OK");

            let locations = store.load_locations().await?;
            let rules = store.load_rules().await?;
            log::info!(
                "✓ Seeds OK ({} locations, {} rules)",
                locations.len(),
                rules.len()
            );

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());

            match store.latest_bulletin(&config.provider.language).await? {
                Some(bulletin) => {
                    log::info!(
                        "Latest bulletin: {} ({}), valid {} - {}",
                        bulletin.external_id,
                        bulletin.language,
                        bulletin.valid_from,
                        bulletin.valid_until
                    );
                }
                None => log::info!("No bulletin ingested yet."),
            }

            for location in store.load_locations().await? {
                match store.recent_statuses(&location.id, 1).await?.first() {
                    Some(status) => log::info!(
                        "{}: danger {} (region {})",
                        location.name,
                        status.danger.max,
                        status.region_id.as_deref().unwrap_or("unresolved")
                    ),
                    None => log::info!("{}: no status yet", location.name),
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
