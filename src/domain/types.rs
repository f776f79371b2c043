//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - written to and read back from the CSV artifacts each stage hands over
//! - passed between stages in-memory when a cycle runs in a single process
//! - forwarded to child processes as plain command-line flags

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

pub const ECONOMIC_FILE: &str = "economic_data.csv";
pub const SALES_FILE: &str = "sales_data.csv";
pub const MERGED_FILE: &str = "merged_data.csv";
pub const ALERTS_FILE: &str = "alerts.log";

/// Weekly regular gasoline price, all formulations (dollars per gallon).
pub const SERIES_GAS_PRICE: &str = "GASREGW";
/// Consumer price index for all urban consumers.
pub const SERIES_CPI: &str = "CPIAUCSL";

/// Fractional week-over-week revenue change above which a row is an anomaly.
pub const ANOMALY_THRESHOLD: f64 = 0.5;

pub const DISCOUNT_CHOICES: [u8; 4] = [0, 5, 10, 15];

/// One row of the economic table.
///
/// Either value may be absent: the two series are published on different
/// calendars (weekly vs monthly), so most dates only carry one of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyEconomicRecord {
    pub week_start_date: NaiveDate,
    pub avg_gas_price: Option<f64>,
    pub cpi: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub week_start_date: NaiveDate,
    pub product_id: u32,
    pub product_name: String,
    pub units_sold: u32,
    pub unit_price: f64,
    pub discount_pct: u8,
    pub revenue: f64,
    pub region: String,
}

impl SalesRecord {
    /// `units × price × (1 − discount/100)`.
    pub fn compute_revenue(units_sold: u32, unit_price: f64, discount_pct: u8) -> f64 {
        units_sold as f64 * unit_price * (1.0 - discount_pct as f64 / 100.0)
    }
}

/// A sales row with the matching economic columns attached (if any).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub week_start_date: NaiveDate,
    pub product_id: u32,
    pub product_name: String,
    pub units_sold: u32,
    pub unit_price: f64,
    pub discount_pct: u8,
    pub revenue: f64,
    pub region: String,
    pub avg_gas_price: Option<f64>,
    pub cpi: Option<f64>,
}

impl MergedRecord {
    pub fn from_parts(sales: &SalesRecord, economic: Option<&WeeklyEconomicRecord>) -> Self {
        Self {
            week_start_date: sales.week_start_date,
            product_id: sales.product_id,
            product_name: sales.product_name.clone(),
            units_sold: sales.units_sold,
            unit_price: sales.unit_price,
            discount_pct: sales.discount_pct,
            revenue: sales.revenue,
            region: sales.region.clone(),
            avg_gas_price: economic.and_then(|e| e.avg_gas_price),
            cpi: economic.and_then(|e| e.cpi),
        }
    }

    /// Number of empty cells in this row.
    ///
    /// Only the economic columns can be empty. The sales columns are always
    /// filled by the merge, and an artifact with an empty sales cell is rejected
    /// when read rather than counted here.
    pub fn null_cells(&self) -> usize {
        usize::from(self.avg_gas_price.is_none()) + usize::from(self.cpi.is_none())
    }
}

/// A week-over-week revenue jump or drop for one product.
#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    pub week_start_date: NaiveDate,
    pub product_id: u32,
    /// Fractional change vs the product's previous week (`0.6` = +60%).
    pub revenue_change: f64,
}

/// The four pipeline stages, in the order a cycle runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Generate,
    Fetch,
    Merge,
    Check,
}

impl Stage {
    pub const CYCLE: [Stage; 4] = [Stage::Generate, Stage::Fetch, Stage::Merge, Stage::Check];

    /// Subcommand that runs this stage on its own.
    pub fn command_name(self) -> &'static str {
        match self {
            Stage::Generate => "generate",
            Stage::Fetch => "fetch",
            Stage::Merge => "merge",
            Stage::Check => "check",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Stage::Generate => "generate sales",
            Stage::Fetch => "fetch economic data",
            Stage::Merge => "merge datasets",
            Stage::Check => "integrity checks",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command_name())
    }
}

/// Shape and randomness of the synthetic sales table.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesSpec {
    pub start_date: NaiveDate,
    pub weeks: u32,
    pub products: u32,
    pub region: String,
    /// `None` draws from OS entropy, so every run differs.
    pub seed: Option<u64>,
}

impl Default for SalesSpec {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            weeks: 52,
            products: 50,
            region: "USA".to_string(),
            seed: None,
        }
    }
}

/// Everything one pipeline cycle needs. Built once and handed to each stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// FRED API key. Only the fetch stage requires it.
    pub api_key: Option<String>,
    /// Inclusive observation window for the economic series.
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub sales: SalesSpec,
    /// Extra attempts after a transient network failure.
    pub fetch_retries: u32,
}

impl PipelineConfig {
    pub fn economic_path(&self) -> PathBuf {
        self.output_dir.join(ECONOMIC_FILE)
    }

    pub fn sales_path(&self) -> PathBuf {
        self.output_dir.join(SALES_FILE)
    }

    pub fn merged_path(&self) -> PathBuf {
        self.output_dir.join(MERGED_FILE)
    }

    /// Number of distinct weeks a complete merged table must contain.
    pub fn expected_weeks(&self) -> usize {
        self.sales.weeks as usize
    }

    /// Flags that reproduce this configuration on a child `etl` process.
    ///
    /// The API key is deliberately absent; it travels through the environment.
    pub fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "--start-date".to_string(),
            self.start_date.to_string(),
            "--end-date".to_string(),
            self.end_date.to_string(),
            "--output-dir".to_string(),
            path_arg(&self.output_dir),
            "--log-dir".to_string(),
            path_arg(&self.log_dir),
            "--sales-start".to_string(),
            self.sales.start_date.to_string(),
            "--weeks".to_string(),
            self.sales.weeks.to_string(),
            "--products".to_string(),
            self.sales.products.to_string(),
            "--region".to_string(),
            self.sales.region.clone(),
            "--fetch-retries".to_string(),
            self.fetch_retries.to_string(),
        ];
        if let Some(seed) = self.sales.seed {
            args.push("--seed".to_string());
            args.push(seed.to_string());
        }
        args
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// When the scheduler should fire and how often it looks at the clock.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub every_days: u32,
    pub at: NaiveTime,
    pub poll_interval: Duration,
    /// Run one cycle at start-up instead of waiting a full interval.
    pub run_now: bool,
    /// Run stages inside the scheduler process instead of child processes.
    pub in_process: bool,
    /// Run the two source stages concurrently.
    pub parallel_sources: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            every_days: 30,
            at: NaiveTime::MIN,
            poll_interval: Duration::from_secs(60),
            run_now: false,
            in_process: false,
            parallel_sources: false,
        }
    }
}
