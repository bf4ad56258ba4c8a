mod cli;
mod config;
mod datasources;
mod db;
mod error;
mod logic;
mod models;
mod notify;
mod retry;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, IngestArgs};
use config::{Config, StoreBackend};
use datasources::{OpenWeatherMapClient, PostgresStore};
use db::{Database, Store};
use logic::AlertService;
use models::{Coordinate, RawMeasurement, SensorRef};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = match Config::load(cli.config.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("Please copy config/config.yaml.example to config/config.yaml");
            std::process::exit(1);
        }
    };

    let store = open_store(&config, cli.data_dir.as_ref()).await?;

    match cli.command {
        Commands::Ingest(args) => {
            let service = AlertService::from_config(&config, store)?;
            let ack = service.ingest(raw_measurement(args)).await;
            println!("{}", ack);
        }
        Commands::Evaluate { reading_id } => {
            let service = AlertService::from_config(&config, store)?;
            let outcome = service
                .evaluate_and_maybe_alert(reading_id)
                .await
                .with_context(|| format!("evaluating reading {}", reading_id))?;
            println!("Reading {}: {}", reading_id, outcome.summary());
        }
        Commands::Alerts { parcel_id, all } => {
            let alerts = store.list_alerts(parcel_id, !all).await?;
            if alerts.is_empty() {
                println!("No alerts for parcel {}", parcel_id);
            }
            for alert in alerts {
                println!(
                    "#{:<6} {}  {:<9} {}",
                    alert.id,
                    alert.created_at.format("%Y-%m-%d %H:%M"),
                    if alert.is_active { "active" } else { "dismissed" },
                    alert.text
                );
            }
        }
        Commands::Dismiss { alert_id } => {
            store.set_alert_active(alert_id, false).await?;
            println!("Alert {} dismissed", alert_id);
        }
        Commands::SowComplete { parcel_id } => {
            store.mark_sown(parcel_id).await?;
            println!("Parcel {} marked as sown", parcel_id);
        }
        Commands::Check => run_check(&config, store.as_ref()).await,
    }

    Ok(())
}

async fn open_store(config: &Config, data_dir: Option<&PathBuf>) -> anyhow::Result<Arc<dyn Store>> {
    match config.store.backend {
        StoreBackend::Sqlite => {
            let path = Config::db_path(data_dir)?;
            let db = Database::open(&path)
                .with_context(|| format!("opening SQLite store at {}", path.display()))?;
            Ok(Arc::new(db))
        }
        StoreBackend::Postgres => {
            let pg = config
                .store
                .postgres
                .as_ref()
                .context("store.backend is postgres but store.postgres is missing")?;
            Ok(Arc::new(PostgresStore::connect(pg).await?))
        }
    }
}

fn raw_measurement(args: IngestArgs) -> RawMeasurement {
    let sensor = match (args.sensor_id, args.device_code) {
        (Some(id), _) => SensorRef::Id(id),
        (None, Some(code)) => SensorRef::DeviceCode(code),
        // clap requires one of the two
        (None, None) => SensorRef::Id(0),
    };

    RawMeasurement {
        sensor,
        temperature_tenths: args.temperature,
        moisture_tenths: args.moisture,
        battery: args.battery,
        status: args.status,
        date: args.date,
        time: args.time,
    }
}

async fn run_check(config: &Config, store: &dyn Store) {
    println!("Configuration: OK");

    match store.ping().await {
        Ok(()) => println!("Store ({:?}): OK", config.store.backend),
        Err(e) => println!("Store ({:?}): FAILED - {}", config.store.backend, e),
    }

    match OpenWeatherMapClient::new(
        config.openweathermap.clone(),
        config.forecast.timeout(),
        config.forecast.retry.clone(),
    ) {
        Ok(client) => match client.test_connection(Coordinate::new(0.0, 0.0)).await {
            Ok(true) => println!("OpenWeatherMap: OK"),
            Ok(false) => println!("OpenWeatherMap: FAILED - request rejected (check api_key)"),
            Err(e) => println!("OpenWeatherMap: FAILED - {}", e),
        },
        Err(e) => println!("OpenWeatherMap: FAILED - {}", e),
    }

    println!(
        "SMS: {}",
        if config.twilio.is_some() { "configured" } else { "disabled" }
    );
    println!(
        "Email: {}",
        if config.email.is_some() { "configured" } else { "disabled" }
    );
}
