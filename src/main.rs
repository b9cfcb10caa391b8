use std::{fs::File, path::PathBuf};

use anyhow::Context;
use bracketry::{
    MIGRATIONS,
    config::{Settings, create_app},
    state::{DbPool, make_pool},
    tournaments::{import::import_matches, timeslots::generate_timeslots},
};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use diesel_migrations::MigrationHarness;

#[derive(Parser)]
#[command(name = "bracketry", about = "Elimination bracket engine")]
struct Cli {
    /// TOML settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the JSON API.
    Serve,
    /// Apply pending migrations and exit.
    Migrate,
    /// Create matches from a CSV file.
    Import { csv: PathBuf },
    GenerateTimeslots {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        time: NaiveTime,
        /// Minutes between consecutive start times.
        #[arg(long, default_value_t = 60)]
        interval: i64,
        #[arg(long)]
        count: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        settings.database_url = url;
    }

    tracing_subscriber::fmt()
        .with_max_level(settings.tracing_level()?)
        .init();
    tracing::info!(database = %settings.database_url, "starting");

    let pool = make_pool(
        &settings.database_url,
        settings.pool_size,
        settings.connection_options(),
    )
    .context("could not open the database")?;
    migrate(&pool)?;

    match cli.command {
        Command::Serve => tokio::runtime::Runtime::new()?
            .block_on(serve(pool, settings)),
        Command::Migrate => Ok(()),
        Command::Import { csv } => {
            let file = File::open(&csv)
                .with_context(|| format!("could not open {}", csv.display()))?;
            let mut conn = pool.get()?;
            let created = import_matches(file, settings.fan_out, &mut conn)?;
            println!("imported {} matches", created.len());
            Ok(())
        }
        Command::GenerateTimeslots {
            date,
            time,
            interval,
            count,
        } => {
            let mut conn = pool.get()?;
            let created =
                generate_timeslots(date, time, interval, count, &mut conn)?;
            for timeslot in &created {
                println!("{}  {}", timeslot.start_time, timeslot.id);
            }
            println!("created {} timeslots", created.len());
            Ok(())
        }
    }
}

fn migrate(pool: &DbPool) -> anyhow::Result<()> {
    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!(e))?;
    if !applied.is_empty() {
        tracing::info!(count = applied.len(), "applied migrations");
    }
    Ok(())
}

async fn serve(pool: DbPool, settings: Settings) -> anyhow::Result<()> {
    let app = create_app(pool, settings.fan_out);
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("could not bind {}", settings.bind_addr))?;
    tracing::info!(addr = %settings.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
