//! CLI entry point for the EV charging siting pipeline.
//!
//! Each subcommand runs one batch stage against the well-known files under
//! the data directory; `all` runs every stage in order.

use anyhow::Result;
use clap::{Parser, Subcommand};
use ev_siting::config::{DATA_DIR_ENV, DEFAULT_DATA_DIR, PipelineConfig};
use ev_siting::pipeline;
use std::ffi::OsStr;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "ev_siting")]
#[command(about = "County EV charging supply/demand analytics", long_about = None)]
struct Cli {
    /// Root directory holding raw/, external/ and processed/
    #[arg(long, global = true, env = DATA_DIR_ENV, default_value = DEFAULT_DATA_DIR)]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize raw stations; write station, port and summary tables
    CleanStations,
    /// Join county port supply with EV demand and score counties
    CountySupply,
    /// Rank stations by likely utilization
    StationBusy,
    /// Top/bottom counties by ports and DC fast share
    SummaryInsights,
    /// Region and station upgrade candidates
    OpportunityInsights,
    /// Run every stage in order
    All,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/ev_siting.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("ev_siting.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let cfg = PipelineConfig::new(&cli.data_dir);

    let summaries = match cli.command {
        Commands::CleanStations => vec![pipeline::clean_stations(&cfg)?],
        Commands::CountySupply => vec![pipeline::county_supply(&cfg)?],
        Commands::StationBusy => vec![pipeline::station_busy(&cfg)?],
        Commands::SummaryInsights => vec![pipeline::summary_insights(&cfg)?],
        Commands::OpportunityInsights => vec![pipeline::opportunity_insights(&cfg)?],
        Commands::All => pipeline::run_all(&cfg)?,
    };

    let tables: usize = summaries.iter().map(|s| s.outputs.len()).sum();
    info!(stages = summaries.len(), tables, "Finished");
    Ok(())
}
