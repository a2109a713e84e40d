use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use tracing::{info, warn};

use pricewatch::config::{self, RecipientConfig, SenderConfig};
use pricewatch::fetcher::Fetcher;
use pricewatch::monitor::Monitor;
use pricewatch::notifier::EmailNotifier;
use pricewatch::store::HistoryStore;

/// Check a list of product URLs for price changes and email a summary.
#[derive(Debug, Parser)]
#[command(name = "pricewatch", version)]
struct Args {
    /// JSON file with the sender's address and application password
    #[arg(short = 's', long = "sender")]
    sender: PathBuf,

    /// One or more JSON files with recipient and item information
    #[arg(short = 'r', long = "recipients", num_args = 1.., required = true)]
    recipients: Vec<PathBuf>,

    /// SQLite file holding the price history
    #[arg(long = "database", default_value = "tracker.db")]
    database: PathBuf,

    /// Record prices but do not send emails
    #[arg(long = "no-email")]
    no_email: bool,

    /// Include debugging information in logs
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let directive = if args.verbose {
        "pricewatch=debug"
    } else {
        "pricewatch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();

    let sender = SenderConfig::load(&args.sender)?;
    let mut recipients = Vec::new();
    for path in &args.recipients {
        info!(path = %path.display(), "loading recipient file");
        recipients.push(RecipientConfig::load(path)?);
    }
    let items = config::collect_items(&recipients);
    info!(items = items.len(), recipients = recipients.len(), "starting run");

    let store = HistoryStore::open(&args.database).await?;
    let monitor = Monitor::new(Fetcher::new()?, store);

    let today = Local::now().date_naive();
    let reports = monitor.check_items(&items, today).await?;

    if reports.is_empty() {
        warn!("no item produced a price this run, skipping notification");
        return Ok(());
    }

    if args.no_email {
        info!("email disabled, skipping notification");
        return Ok(());
    }

    // Prices are already recorded at this point; a delivery failure exits
    // non-zero but leaves the store as written.
    let password = sender.resolve_password()?;
    let notifier = EmailNotifier::new(&sender, password);
    for recipient in &recipients {
        notifier.send(recipient, &reports, today)?;
    }

    Ok(())
}
