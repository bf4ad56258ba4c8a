use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sowcast", version, about = "Sowing-window advisories from soil sensors")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override SQLite data directory
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store a raw device measurement and evaluate it
    Ingest(IngestArgs),
    /// Evaluate a stored reading and alert if the sowing window is open
    Evaluate {
        reading_id: i64,
    },
    /// List alerts for a parcel
    Alerts {
        parcel_id: i64,
        /// Include dismissed alerts
        #[arg(long)]
        all: bool,
    },
    /// Mark an alert as no longer active
    Dismiss {
        alert_id: i64,
    },
    /// Mark a parcel as sown so it stops receiving advisories. Cannot be undone.
    SowComplete {
        parcel_id: i64,
    },
    /// Validate config and test connections
    Check,
}

#[derive(Args)]
#[command(group(ArgGroup::new("sensor").required(true).args(["sensor_id", "device_code"])))]
pub struct IngestArgs {
    /// Sensor row id
    #[arg(long)]
    pub sensor_id: Option<i64>,

    /// Hardware code the device reports
    #[arg(long)]
    pub device_code: Option<i64>,

    /// Soil temperature in tenths of a degree (215 = 21.5)
    #[arg(long, allow_hyphen_values = true)]
    pub temperature: i64,

    /// Soil moisture in tenths of a percent
    #[arg(long)]
    pub moisture: i64,

    #[arg(long)]
    pub battery: Option<f64>,

    #[arg(long)]
    pub status: Option<i32>,

    /// Observation date, YYYY-MM-DD
    #[arg(long)]
    pub date: String,

    /// Observation time, HH:MM
    #[arg(long)]
    pub time: String,
}
