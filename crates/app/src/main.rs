use std::{error::Error, sync::Arc};

use chrono::{DateTime, Utc};
use clap::Parser;
use engine::{Engine, EngineError, LedgerCache};
use migration::{Migrator, MigratorTrait};

mod cli;
mod settings;
mod views;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = cli::Cli::parse();
    let settings = settings::Settings::new(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledger={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database.url());
    let db = parse_database(&url).await?;

    let cache = Arc::new(LedgerCache::new());
    let sweeper = cache.spawn_sweeper(settings.engine.sweep_interval());
    let engine = Engine::builder()
        .database(db)
        .cache(Arc::clone(&cache))
        .config(settings.engine.engine_config())
        .build()
        .await?;

    let outcome = cli::run(&engine, cli.command, Utc::now()).await;
    sweeper.abort();

    match outcome {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(cli::CliError::Engine(err)) => {
            report(&err);
            std::process::exit(1);
        }
        Err(cli::CliError::Output(err)) => Err(err.into()),
    }
}

/// Storage failures are logged in full and shown as a generic message;
/// everything else is the caller's fault and shown as is.
fn report(err: &EngineError) {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("storage failure: {db_err}");
            eprintln!("internal error");
        }
        other => eprintln!("{other}"),
    }
}

async fn parse_database(
    url: &str,
) -> Result<sea_orm::DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

pub(crate) fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|err| format!("invalid RFC3339 timestamp '{raw}': {err}"))
}
