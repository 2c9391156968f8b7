//! Materializes event occurrences from the command line.
//!
//! ```text
//! generate_occurrences [--migrate] [--months N]
//! generate_occurrences [--migrate] --event <uuid> [--from YYYY-MM-DD] [--to YYYY-MM-DD] [--replace]
//! ```
//!
//! Without `--event`, every recurring event is generated for the current month and
//! the following ones (`scheduling.horizon_months` unless `--months` is given).

use std::num::NonZeroU8;

use chrono::NaiveDate;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};
use uuid::Uuid;
use vestry_core::config::load_config;
use vestry_db::db::DbProvider;
use vestry_db::db::connection::create_pool;
use vestry_db::db::migrations::run_migrations;
use vestry_service::clock::SystemClock;
use vestry_service::events::generate::{GenerateRequest, generate_for_event, generate_upcoming_with};

#[derive(Debug, Parser)]
#[command(name = "generate_occurrences")]
#[command(about = "Materialize event occurrences", long_about = None)]
struct Cli {
    /// Apply pending migrations before generating
    #[arg(long)]
    migrate: bool,

    /// Number of months to generate, starting with the current one
    #[arg(long, conflicts_with = "event")]
    months: Option<NonZeroU8>,

    /// Generate a single event instead of every recurring one
    #[arg(long)]
    event: Option<Uuid>,

    /// First day of the window (YYYY-MM-DD)
    #[arg(long, requires = "event")]
    from: Option<NaiveDate>,

    /// Last day of the window (YYYY-MM-DD)
    #[arg(long, requires = "event")]
    to: Option<NaiveDate>,

    /// Delete the event's occurrences in the window before generating
    #[arg(long, requires = "event")]
    replace: bool,
}

impl Cli {
    fn request(&self) -> GenerateRequest {
        GenerateRequest {
            range_start: self.from,
            range_end: self.to,
            replace_existing: self.replace,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let config = load_config()?;

    if let Ok(filter) = EnvFilter::try_new(config.logging.level.as_str()) {
        if let Err(e) = filter_handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "Failed to update log filter from config");
        }
    } else {
        tracing::warn!(level = %config.logging.level, "Invalid log level in config, keeping debug");
    }

    if cli.migrate {
        run_migrations(&config.database.url).await?;
    }

    let pool = create_pool(
        &config.database.url,
        u32::from(config.database.max_connections),
    )
    .await?;

    let created = if let Some(event_id) = cli.event {
        let mut conn = pool.get_connection().await?;
        generate_for_event(&mut conn, event_id, cli.request()).await?
    } else {
        let months = cli.months.map_or(config.scheduling.horizon_months, NonZeroU8::get);
        generate_upcoming_with(&pool, &SystemClock, months).await?
    };

    println!("Created {created} occurrences.");
    Ok(())
}
