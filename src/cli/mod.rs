//! Command-line parsing for the sales/economic ETL pipeline.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! stage logic. Every stage subcommand accepts the same [`PipelineArgs`], which
//! is also what the scheduler forwards to child processes.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "etl", version, about = "Weekly sales × FRED macro data pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate the synthetic weekly sales table.
    Generate(PipelineArgs),
    /// Fetch gas price and CPI series from FRED.
    Fetch(PipelineArgs),
    /// Left-join sales with economic data on week start date.
    Merge(PipelineArgs),
    /// Run data-quality checks on the merged table.
    Check(PipelineArgs),
    /// Verify that the FRED API key is accepted.
    CheckKey(PipelineArgs),
    /// Run one full cycle (generate, fetch, merge, check) in this process.
    Run(PipelineArgs),
    /// Run the cycle on a fixed schedule until interrupted.
    Schedule(ScheduleArgs),
}

/// Options shared by every stage.
#[derive(Debug, Args, Clone)]
pub struct PipelineArgs {
    /// FRED API key (falls back to FRED_API_KEY from the environment or .env).
    #[arg(long)]
    pub api_key: Option<String>,

    /// First observation date for the economic series.
    #[arg(long, default_value = "2023-01-01")]
    pub start_date: NaiveDate,

    /// Last observation date for the economic series (inclusive).
    #[arg(long, default_value = "2023-12-31")]
    pub end_date: NaiveDate,

    /// Directory for the CSV artifacts.
    #[arg(long, default_value = "data")]
    pub output_dir: PathBuf,

    /// Directory for alerts.log.
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Week start date of the first generated sales week.
    #[arg(long, default_value = "2023-01-01")]
    pub sales_start: NaiveDate,

    /// Number of consecutive weeks to generate (also the coverage target).
    #[arg(long, default_value_t = 52)]
    pub weeks: u32,

    /// Number of products in the catalog.
    #[arg(long, default_value_t = 50)]
    pub products: u32,

    /// Region label written on every sales row.
    #[arg(long, default_value = "USA")]
    pub region: String,

    /// Seed for reproducible sales data (random when omitted).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Retries (with exponential backoff) after a network failure talking to FRED.
    #[arg(long, default_value_t = 0)]
    pub fetch_retries: u32,
}

/// Options for the `schedule` subcommand.
#[derive(Debug, Args, Clone)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Days between runs.
    #[arg(long, default_value_t = 30)]
    pub every_days: u32,

    /// Local time of day for each run (HH:MM).
    #[arg(long, default_value = "00:00", value_parser = parse_time_of_day)]
    pub at: NaiveTime,

    /// Seconds between checks for a due run.
    #[arg(long, default_value_t = 60)]
    pub poll_secs: u64,

    /// Run one cycle immediately instead of waiting a full interval.
    #[arg(long)]
    pub run_now: bool,

    /// Run stages inside the scheduler process instead of as child processes.
    #[arg(long)]
    pub in_process: bool,

    /// Generate sales and fetch economic data concurrently.
    #[arg(long)]
    pub parallel_sources: bool,
}

fn parse_time_of_day(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| format!("invalid time of day '{raw}' (expected HH:MM): {e}"))
}
