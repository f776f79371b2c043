use std::fs;

use chrono::{Days, NaiveDate};
use tempfile::TempDir;

use sales_etl::app::pipeline::{StageOutput, run_stage};
use sales_etl::checks::DataQualityWarning;
use sales_etl::data::sales::week_starts;
use sales_etl::domain::{PipelineConfig, SalesSpec, ScheduleConfig, Stage, WeeklyEconomicRecord};
use sales_etl::error::AppError;
use sales_etl::io::write_table;
use sales_etl::schedule::{Scheduler, StageRunner};

fn config(dir: &TempDir) -> PipelineConfig {
    PipelineConfig {
        api_key: None,
        start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        output_dir: dir.path().join("data"),
        log_dir: dir.path().join("logs"),
        sales: SalesSpec {
            seed: Some(7),
            ..SalesSpec::default()
        },
        fetch_retries: 0,
    }
}

/// Economic rows on the same Sunday grid as the sales data.
fn weekly_economics(config: &PipelineConfig) -> Vec<WeeklyEconomicRecord> {
    week_starts(config.sales.start_date, config.sales.weeks)
        .enumerate()
        .map(|(i, week)| WeeklyEconomicRecord {
            week_start_date: week,
            avg_gas_price: Some(3.2 + i as f64 * 0.01),
            cpi: Some(300.0 + i as f64 * 0.1),
        })
        .collect()
}

/// Stands in for the network stage by writing a fixed economic table.
struct OfflineRunner {
    config: PipelineConfig,
    economics: Option<Vec<WeeklyEconomicRecord>>,
}

impl StageRunner for OfflineRunner {
    fn run(&self, stage: Stage) -> Result<String, AppError> {
        match (stage, &self.economics) {
            (Stage::Fetch, Some(rows)) => {
                write_table(&self.config.economic_path(), rows)?;
                Ok(format!("wrote {} rows", rows.len()))
            }
            (Stage::Fetch, None) => Err(AppError::Auth {
                status: 400,
                message: "Bad Request. The value for variable api_key is not registered.".into(),
            }),
            _ => run_stage(stage, &self.config).map(|out| out.to_string()),
        }
    }
}

#[test]
fn full_cycle_produces_a_clean_merged_table() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let runner = OfflineRunner {
        economics: Some(weekly_economics(&config)),
        config: config.clone(),
    };

    let scheduler = Scheduler::from_config(&ScheduleConfig::default(), runner).unwrap();
    let report = scheduler.run_cycle();
    assert!(report.all_succeeded(), "{:?}", report.outcomes);

    let merged = fs::read_to_string(config.merged_path()).unwrap();
    assert_eq!(merged.lines().count(), 1 + 2600);
    assert!(merged.starts_with("week_start_date,product_id,product_name,"));
}

#[test]
fn rejected_key_cascades_into_missing_input_failures() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let runner = OfflineRunner {
        economics: None,
        config: config.clone(),
    };

    let report = Scheduler::from_config(&ScheduleConfig::default(), runner).unwrap().run_cycle();

    assert_eq!(report.succeeded(), 1);
    let failures: Vec<(Stage, AppError)> = report.failures().map(|(s, e)| (s, e.clone())).collect();
    assert!(matches!(failures[0], (Stage::Fetch, AppError::Auth { status: 400, .. })));
    assert!(matches!(failures[1], (Stage::Merge, AppError::MissingInput(_))));
    assert!(matches!(failures[2], (Stage::Check, AppError::MissingInput(_))));

    assert!(config.sales_path().exists());
    assert!(!config.economic_path().exists());
    assert!(!config.merged_path().exists());
}

#[test]
fn re_merging_unchanged_inputs_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    run_stage(Stage::Generate, &config).unwrap();
    write_table(&config.economic_path(), &weekly_economics(&config)).unwrap();

    run_stage(Stage::Merge, &config).unwrap();
    let first = fs::read(config.merged_path()).unwrap();
    run_stage(Stage::Merge, &config).unwrap();
    let second = fs::read(config.merged_path()).unwrap();

    assert_eq!(first, second);
}

#[test]
fn sparse_economics_keep_sales_cardinality_and_raise_warnings() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    run_stage(Stage::Generate, &config).unwrap();

    // Only every other week is observed; the extra mid-week date matches nothing.
    let mut economics: Vec<WeeklyEconomicRecord> = weekly_economics(&config).into_iter().step_by(2).collect();
    economics.push(WeeklyEconomicRecord {
        week_start_date: config.sales.start_date.checked_add_days(Days::new(3)).unwrap(),
        avg_gas_price: Some(9.9),
        cpi: None,
    });
    write_table(&config.economic_path(), &economics).unwrap();

    let StageOutput::Wrote { rows, .. } = run_stage(Stage::Merge, &config).unwrap() else {
        panic!("merge should write a table");
    };
    assert_eq!(rows, 2600);

    let StageOutput::Checked(report) = run_stage(Stage::Check, &config).unwrap() else {
        panic!("check should produce a report");
    };
    assert_eq!(report.rows, 2600);
    // 26 unmatched weeks x 50 products x 2 economic columns.
    assert!(
        report
            .warnings
            .iter()
            .any(|w| matches!(w, DataQualityWarning::MissingValues { null_cells: 2600 }))
    );
}
