use std::{error::Error, fs::OpenOptions, process::exit, sync::Arc};

use clap::Parser;
use rusqlite::Connection;
use time::{Date, OffsetDateTime, macros::format_description};
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use eetlijst::{finalise_up_to, initialize_db};

/// Settles the costs of every tracked dining list whose date has passed.
///
/// Intended to run as a periodic job; re-running is harmless.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// Settle dining lists up to and including this date (YYYY-MM-DD).
    /// Defaults to today.
    #[arg(long)]
    up_to: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    setup_logging();

    let args = Args::parse();

    let date = match &args.up_to {
        Some(text) => Date::parse(text, format_description!("[year]-[month]-[day]"))?,
        None => OffsetDateTime::now_utc().date(),
    };

    let conn = Connection::open(&args.db_path)?;
    initialize_db(&conn)?;

    tracing::info!("Settling dining lists up to {date}");
    let summary = finalise_up_to(date, &conn)?;
    tracing::info!(
        "Settled {} dining lists with {} new transactions",
        summary.settled,
        summary.transactions
    );

    if !summary.failures.is_empty() {
        tracing::warn!(
            "{} dining lists could not be settled, see the log for details",
            summary.failures.len()
        );
        exit(1);
    }

    Ok(())
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("settle.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}
