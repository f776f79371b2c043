//! Stage entry points shared by the per-stage subcommands and the scheduler.
//!
//! Each stage reads its inputs fresh from the artifact directory and writes a
//! new artifact; nothing is passed between stages in memory:
//! generate -> sales_data.csv, fetch -> economic_data.csv,
//! merge -> merged_data.csv, check -> alerts.log

use std::fmt;
use std::path::PathBuf;

use crate::checks::{IntegrityReport, check_merged_artifact};
use crate::data::{FredClient, generate_sales};
use crate::domain::{PipelineConfig, Stage};
use crate::error::AppError;
use crate::io::write_table;
use crate::merge::merge_artifacts;

/// What a successful stage produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Wrote { path: PathBuf, rows: usize },
    Checked(IntegrityReport),
}

impl fmt::Display for StageOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutput::Wrote { path, rows } => write!(f, "wrote {rows} rows to '{}'", path.display()),
            StageOutput::Checked(report) => write!(
                f,
                "checked {} rows, {} warning(s)",
                report.rows,
                report.warnings.len()
            ),
        }
    }
}

/// Run one stage against `config`.
pub fn run_stage(stage: Stage, config: &PipelineConfig) -> Result<StageOutput, AppError> {
    match stage {
        Stage::Generate => generate_stage(config),
        Stage::Fetch => fetch_stage(config),
        Stage::Merge => merge_stage(config),
        Stage::Check => check_stage(config),
    }
}

pub fn generate_stage(config: &PipelineConfig) -> Result<StageOutput, AppError> {
    let rows = generate_sales(&config.sales)?;
    let path = config.sales_path();
    write_table(&path, &rows)?;
    Ok(StageOutput::Wrote { path, rows: rows.len() })
}

pub fn fetch_stage(config: &PipelineConfig) -> Result<StageOutput, AppError> {
    let client = FredClient::from_config(config)?;
    fetch_stage_with(&client, config)
}

/// Fetch with a caller-supplied client.
pub fn fetch_stage_with(client: &FredClient, config: &PipelineConfig) -> Result<StageOutput, AppError> {
    let rows = client.fetch_economic(config.start_date, config.end_date)?;
    let path = config.economic_path();
    write_table(&path, &rows)?;
    Ok(StageOutput::Wrote { path, rows: rows.len() })
}

pub fn merge_stage(config: &PipelineConfig) -> Result<StageOutput, AppError> {
    let path = config.merged_path();
    let summary = merge_artifacts(&config.sales_path(), &config.economic_path(), &path)?;
    tracing::info!(
        rows = summary.rows,
        matched = summary.matched,
        "joined sales with economic data"
    );
    Ok(StageOutput::Wrote { path, rows: summary.rows })
}

/// Check the merged artifact and log every finding as a warning.
pub fn check_stage(config: &PipelineConfig) -> Result<StageOutput, AppError> {
    let report = check_merged_artifact(&config.merged_path(), config.expected_weeks())?;
    report.log();
    if report.is_clean() {
        tracing::info!(rows = report.rows, "integrity checks passed");
    }
    Ok(StageOutput::Checked(report))
}
