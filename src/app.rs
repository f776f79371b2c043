//! Top-level application orchestration.
//!
//! `main.rs` only maps the returned error to an exit code. This module:
//! - turns CLI arguments into an explicit `PipelineConfig`
//! - installs logging (console + alerts.log)
//! - runs a single stage, one full cycle, or the scheduler loop

use std::time::Duration;

use clap::Parser;

use crate::cli::{Command, PipelineArgs, ScheduleArgs};
use crate::data::FredClient;
use crate::domain::{PipelineConfig, SalesSpec, ScheduleConfig, Stage};
use crate::error::AppError;
use crate::schedule::runner::API_KEY_ENV;
use crate::schedule::{InProcessRunner, Scheduler, StageRunner, SubprocessRunner};

pub mod pipeline;

/// Entry point for the `etl` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Generate(args) => handle_stage(Stage::Generate, &args),
        Command::Fetch(args) => handle_stage(Stage::Fetch, &args),
        Command::Merge(args) => handle_stage(Stage::Merge, &args),
        Command::Check(args) => handle_stage(Stage::Check, &args),
        Command::CheckKey(args) => handle_check_key(&args),
        Command::Run(args) => handle_run(&args),
        Command::Schedule(args) => handle_schedule(&args),
    }
}

fn handle_stage(stage: Stage, args: &PipelineArgs) -> Result<(), AppError> {
    let config = pipeline_config_from_args(args)?;
    let _guard = crate::logging::init(&config.log_dir)?;

    match pipeline::run_stage(stage, &config) {
        Ok(output) => {
            tracing::info!("{} succeeded: {output}", stage.display_name());
            Ok(())
        }
        Err(err) => {
            tracing::error!("{} failed: {err}", stage.display_name());
            Err(err)
        }
    }
}

fn handle_check_key(args: &PipelineArgs) -> Result<(), AppError> {
    let config = pipeline_config_from_args(args)?;
    let _guard = crate::logging::init(&config.log_dir)?;

    let client = FredClient::from_config(&config)?;
    match client.probe_key() {
        Ok(n) => {
            tracing::info!("FRED API key is working ({n} observations returned)");
            Ok(())
        }
        Err(err) => {
            tracing::error!("FRED API key is invalid or the request failed: {err}");
            Err(err)
        }
    }
}

fn handle_run(args: &PipelineArgs) -> Result<(), AppError> {
    let config = pipeline_config_from_args(args)?;
    let _guard = crate::logging::init(&config.log_dir)?;

    let scheduler = Scheduler::from_config(&ScheduleConfig::default(), InProcessRunner::new(config))?;
    let report = scheduler.run_cycle();

    // The cycle itself never aborts; surface the first failure as the exit code.
    match report.failures().next() {
        Some((_, err)) => Err(err.clone()),
        None => Ok(()),
    }
}

fn handle_schedule(args: &ScheduleArgs) -> Result<(), AppError> {
    let config = pipeline_config_from_args(&args.pipeline)?;
    let schedule = schedule_config_from_args(args);
    let _guard = crate::logging::init(&config.log_dir)?;

    if schedule.in_process {
        run_scheduler(&schedule, InProcessRunner::new(config))
    } else {
        run_scheduler(&schedule, SubprocessRunner::current_exe(config)?)
    }
}

fn run_scheduler<R: StageRunner>(config: &ScheduleConfig, runner: R) -> Result<(), AppError> {
    let mut scheduler = Scheduler::from_config(config, runner)?;
    crate::schedule::signal::stop_on_shutdown_signal(scheduler.stop_handle())?;
    scheduler.run_until_stopped();
    Ok(())
}

/// Build the explicit configuration every stage receives.
///
/// The API key comes from `--api-key`, else `FRED_API_KEY` (a `.env` file in
/// the working directory is loaded first).
pub fn pipeline_config_from_args(args: &PipelineArgs) -> Result<PipelineConfig, AppError> {
    if args.end_date < args.start_date {
        return Err(AppError::Config(format!(
            "--end-date {} is before --start-date {}",
            args.end_date, args.start_date
        )));
    }

    dotenvy::dotenv().ok();
    let api_key = args
        .api_key
        .clone()
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .filter(|k| !k.trim().is_empty());

    Ok(PipelineConfig {
        api_key,
        start_date: args.start_date,
        end_date: args.end_date,
        output_dir: args.output_dir.clone(),
        log_dir: args.log_dir.clone(),
        sales: SalesSpec {
            start_date: args.sales_start,
            weeks: args.weeks,
            products: args.products,
            region: args.region.clone(),
            seed: args.seed,
        },
        fetch_retries: args.fetch_retries,
    })
}

pub fn schedule_config_from_args(args: &ScheduleArgs) -> ScheduleConfig {
    ScheduleConfig {
        every_days: args.every_days,
        at: args.at,
        poll_interval: Duration::from_secs(args.poll_secs.max(1)),
        run_now: args.run_now,
        in_process: args.in_process,
        parallel_sources: args.parallel_sources,
    }
}
