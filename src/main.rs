use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tracing::info;

use ferry::config::Config;
use ferry::delivery::reddit::RedditClient;
use ferry::delivery::{DeliveryClient, DryRunClient};
use ferry::filter::Filter;
use ferry::ledger::memory::MemoryLedgerStore;
use ferry::ledger::traits::LedgerStore;
use ferry::ledger::{self, Ledger};
use ferry::output::terminal;
use ferry::pipeline::shutdown::{self, ShutdownTrigger};
use ferry::pipeline::{preview, Relay};
use ferry::source::client::ForumClient;
use ferry::source::discourse::DiscourseExtractor;
use ferry::source::traits::Extractor;

/// Ferry: relay new research-forum posts to discussion boards.
///
/// Polls the forum's latest-topics listing, skips housekeeping threads and
/// anything already delivered, and submits the rest to each configured
/// subreddit, remembering every confirmed delivery.
#[derive(Parser)]
#[command(name = "ferry", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the delivery ledger database
    Init,

    /// Relay continuously until Ctrl-C
    Run {
        /// Log what would be posted instead of posting (ledger untouched)
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a single poll cycle and print what happened
    Once {
        /// Log what would be posted instead of posting (ledger untouched)
        #[arg(long)]
        dry_run: bool,
    },

    /// Show what the next cycle would deliver, without delivering
    Preview,

    /// Show ledger statistics and recent deliveries
    Status,

    /// Forget every recorded delivery (everything becomes "new" again)
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ferry=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing Ferry ledger...");
            let config = Config::load()?;
            let conn = ledger::initialize(&config.db_path)?;
            let table_count = ledger::schema::table_count(&conn)?;
            println!("Ledger initialized at: {}", config.db_path);
            println!("Tables: {table_count}");
            println!("\nFerry is ready. Next step: set up your .env file");
            println!("  (see .env.example for required variables)");
            println!("\nThen run: cargo run -- preview");
        }

        Commands::Run { dry_run } => {
            let config = Config::load()?;
            let mut relay = build_relay(&config, dry_run).await?;
            let (trigger, shutdown) = shutdown::channel();
            spawn_ctrl_c_handler(trigger);

            let cycles = relay.run(shutdown).await;
            println!("Stopped after {cycles} cycles.");
        }

        Commands::Once { dry_run } => {
            let config = Config::load()?;
            let mut relay = build_relay(&config, dry_run).await?;
            let (trigger, mut shutdown) = shutdown::channel();
            spawn_ctrl_c_handler(trigger);

            let report = relay.run_cycle(&mut shutdown).await;
            terminal::display_cycle_report(&report);
            if dry_run {
                println!("{}", "Dry run: nothing was posted or recorded.".dimmed());
            }
        }

        Commands::Preview => {
            let config = Config::load()?;
            config.require_destinations()?;
            let ledger = Ledger::load(ledger::open_sqlite(&config.db_path)?).await?;
            let filter = Filter::from_config(&config.filter)?;
            let extractor = build_extractor(&config)?;

            let entries = preview::preview(
                extractor.as_ref(),
                &filter,
                &ledger,
                &config.destinations,
                &config.template,
            )
            .await?;
            terminal::display_preview(&entries);
        }

        Commands::Status => {
            let config = Config::load()?;
            if !ferry::status::is_initialized(&config.db_path) {
                println!("Ledger: not initialized");
                println!("\nRun `ferry init` to set up the database.");
                return Ok(());
            }
            let store = ledger::open_sqlite(&config.db_path)?;
            ferry::status::show(store, &config.db_path).await?;
        }

        Commands::Reset { yes } => {
            if !yes {
                anyhow::bail!(
                    "Refusing to reset without --yes. Every post in the listing \
                     would be delivered again on the next cycle."
                );
            }
            let config = Config::load()?;
            let store = ledger::open_sqlite(&config.db_path)?;
            let removed = store.clear().await?;
            println!("{} Removed {removed} deliveries from the ledger", "✓".green());
        }
    }

    Ok(())
}

fn build_extractor(config: &Config) -> Result<Arc<dyn Extractor>> {
    let client = ForumClient::new(&config.source_url, config.fetch_attempts)?;
    Ok(Arc::new(DiscourseExtractor::new(client, config.max_topics)))
}

/// Wire up a relay from configuration.
///
/// The durable ledger must load even for a dry run; a dry run then works on
/// an in-memory copy so nothing it "delivers" is remembered.
async fn build_relay(config: &Config, dry_run: bool) -> Result<Relay> {
    config.require_destinations()?;
    if !dry_run {
        config.require_reddit()?;
    }

    let durable = Ledger::load(ledger::open_sqlite(&config.db_path)?).await?;

    let (ledger, client): (Ledger, Arc<dyn DeliveryClient>) = if dry_run {
        let scratch = MemoryLedgerStore::with_deliveries(durable.deliveries());
        (Ledger::load(Arc::new(scratch)).await?, Arc::new(DryRunClient))
    } else {
        let client = RedditClient::new(config.reddit_credentials())?;
        (durable, Arc::new(client))
    };

    let filter = Filter::from_config(&config.filter)?;
    info!(rules = ?filter.rule_names(), "Filter ready");

    Ok(Relay::new(
        build_extractor(config)?,
        filter,
        ledger,
        client,
        config.relay_settings(),
    ))
}

/// Trigger shutdown on the first Ctrl-C.
fn spawn_ctrl_c_handler(trigger: ShutdownTrigger) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            trigger.trigger();
        }
    });
}
