//! Data-quality checks over the merged table.
//!
//! Three independent checks run on every call: completeness (null cells),
//! per-product revenue anomalies, and week coverage. Findings are advisory
//! [`DataQualityWarning`]s, never errors.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use chrono::NaiveDate;

use crate::domain::{ANOMALY_THRESHOLD, Anomaly, MergedRecord};
use crate::error::AppError;
use crate::io::read_table;

#[derive(Debug, Clone, PartialEq)]
pub enum DataQualityWarning {
    /// At least one cell of the table is empty.
    MissingValues { null_cells: usize },
    /// Week-over-week revenue moved by more than the anomaly threshold.
    RevenueAnomalies(Vec<Anomaly>),
    /// Fewer distinct weeks than a full table should contain.
    MissingWeeks { found: usize, expected: usize },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::MissingValues { null_cells } => {
                write!(f, "Missing values detected in merged data ({null_cells} empty cells).")
            }
            DataQualityWarning::RevenueAnomalies(anomalies) => {
                write!(
                    f,
                    "Unexpected sales spikes/drops detected ({} rows):\n{:>15} {:>10} {:>14}",
                    anomalies.len(),
                    "week_start_date",
                    "product_id",
                    "revenue_change"
                )?;
                for a in anomalies {
                    write!(
                        f,
                        "\n{:>15} {:>10} {:>14.6}",
                        a.week_start_date.to_string(),
                        a.product_id,
                        a.revenue_change
                    )?;
                }
                Ok(())
            }
            DataQualityWarning::MissingWeeks { found, expected } => {
                write!(f, "Week start dates missing in merged dataset ({found} of {expected} weeks present).")
            }
        }
    }
}

/// Everything the checks found in one table.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityReport {
    pub rows: usize,
    pub warnings: Vec<DataQualityWarning>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Emit every warning as a `WARN` event (these land in the alerts log).
    pub fn log(&self) {
        for warning in &self.warnings {
            tracing::warn!("{warning}");
        }
    }
}

/// Run all three checks. None of them short-circuits the others.
pub fn check_integrity(rows: &[MergedRecord], expected_weeks: usize) -> IntegrityReport {
    let mut warnings = Vec::new();

    let null_cells: usize = rows.iter().map(MergedRecord::null_cells).sum();
    if null_cells > 0 {
        warnings.push(DataQualityWarning::MissingValues { null_cells });
    }

    let anomalies = detect_anomalies(rows);
    if !anomalies.is_empty() {
        warnings.push(DataQualityWarning::RevenueAnomalies(anomalies));
    }

    let found = rows.iter().map(|r| r.week_start_date).collect::<HashSet<NaiveDate>>().len();
    if found < expected_weeks {
        warnings.push(DataQualityWarning::MissingWeeks {
            found,
            expected: expected_weeks,
        });
    }

    IntegrityReport {
        rows: rows.len(),
        warnings,
    }
}

/// Read the merged artifact and check it.
pub fn check_merged_artifact(path: &Path, expected_weeks: usize) -> Result<IntegrityReport, AppError> {
    let rows: Vec<MergedRecord> = read_table(path)?;
    Ok(check_integrity(&rows, expected_weeks))
}

/// Fractional revenue change of each row vs the same product's previous week.
///
/// The result is aligned with `rows`. A product's first week has no prior value
/// (`None`). Growth from zero revenue is `±inf` and stays in; zero to zero is
/// undefined and becomes `None`.
pub fn revenue_changes(rows: &[MergedRecord]) -> Vec<Option<f64>> {
    let mut by_product: HashMap<u32, Vec<usize>> = HashMap::new();
    for (idx, row) in rows.iter().enumerate() {
        by_product.entry(row.product_id).or_default().push(idx);
    }

    let mut changes = vec![None; rows.len()];
    for indices in by_product.values_mut() {
        // Stable, so rows sharing a week keep their table order.
        indices.sort_by_key(|&i| rows[i].week_start_date);
        for pair in indices.windows(2) {
            let prev = rows[pair[0]].revenue;
            let curr = rows[pair[1]].revenue;
            let change = (curr - prev) / prev;
            changes[pair[1]] = (!change.is_nan()).then_some(change);
        }
    }
    changes
}

/// Rows whose absolute revenue change exceeds [`ANOMALY_THRESHOLD`], in table order.
pub fn detect_anomalies(rows: &[MergedRecord]) -> Vec<Anomaly> {
    rows.iter()
        .zip(revenue_changes(rows))
        .filter_map(|(row, change)| {
            let change = change?;
            (change.abs() > ANOMALY_THRESHOLD).then(|| Anomaly {
                week_start_date: row.week_start_date,
                product_id: row.product_id,
                revenue_change: change,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;
    use crate::io::write_table;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
    }

    fn row(week: i64, product_id: u32, revenue: f64) -> MergedRecord {
        MergedRecord {
            week_start_date: start() + Duration::weeks(week),
            product_id,
            product_name: format!("Product_{product_id}"),
            units_sold: 100,
            unit_price: revenue / 100.0,
            discount_pct: 0,
            revenue,
            region: "USA".to_string(),
            avg_gas_price: Some(3.4),
            cpi: Some(301.0),
        }
    }

    fn full_year(product_id: u32) -> Vec<MergedRecord> {
        (0..52).map(|w| row(w, product_id, 1000.0)).collect()
    }

    #[test]
    fn revenue_sequence_flags_only_the_sixty_percent_jump() {
        let rows: Vec<MergedRecord> = [100.0, 100.0, 160.0, 150.0]
            .iter()
            .enumerate()
            .map(|(w, &rev)| row(w as i64, 1, rev))
            .collect();

        let changes = revenue_changes(&rows);
        assert_eq!(changes[0], None);
        assert!((changes[1].unwrap() - 0.0).abs() < 1e-12);
        assert!((changes[2].unwrap() - 0.6).abs() < 1e-12);
        assert!((changes[3].unwrap() + 0.0625).abs() < 1e-12);

        let anomalies = detect_anomalies(&rows);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].week_start_date, start() + Duration::weeks(2));
        assert_eq!(anomalies[0].product_id, 1);
    }

    #[test]
    fn changes_are_computed_per_product_in_week_order() {
        // Interleaved products, and product 2 listed out of chronological order.
        let rows = vec![
            row(0, 1, 100.0),
            row(1, 2, 100.0),
            row(1, 1, 100.0),
            row(0, 2, 300.0),
        ];
        let changes = revenue_changes(&rows);
        assert_eq!(changes[0], None);
        assert_eq!(changes[3], None);
        assert!((changes[2].unwrap() - 0.0).abs() < 1e-12);
        // 300 -> 100 is a -66.7% drop.
        assert!((changes[1].unwrap() + 2.0 / 3.0).abs() < 1e-12);

        let anomalies = detect_anomalies(&rows);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].product_id, 2);
    }

    #[test]
    fn exactly_fifty_percent_is_not_an_anomaly() {
        let rows = vec![row(0, 1, 100.0), row(1, 1, 150.0), row(2, 1, 75.0)];
        assert!(detect_anomalies(&rows).is_empty());
    }

    #[test]
    fn growth_from_zero_revenue_is_flagged_as_infinite() {
        let rows = vec![row(0, 1, 0.0), row(1, 1, 100.0)];
        assert_eq!(revenue_changes(&rows), vec![None, Some(f64::INFINITY)]);

        let anomalies = detect_anomalies(&rows);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].week_start_date, start() + Duration::weeks(1));
        assert!(anomalies[0].revenue_change.is_infinite());
    }

    #[test]
    fn zero_to_zero_revenue_has_no_change() {
        let rows = vec![row(0, 1, 0.0), row(1, 1, 0.0), row(2, 1, 0.0)];
        assert_eq!(revenue_changes(&rows), vec![None, None, None]);
        assert!(detect_anomalies(&rows).is_empty());
    }

    #[test]
    fn clean_full_year_has_no_warnings() {
        let rows = full_year(1);
        let report = check_integrity(&rows, 52);
        assert!(report.is_clean(), "{:?}", report.warnings);
        assert_eq!(report.rows, 52);
    }

    #[test]
    fn missing_week_triggers_coverage_warning() {
        let mut rows = full_year(1);
        let june_first_week = NaiveDate::from_ymd_opt(2023, 6, 4).unwrap();
        rows.retain(|r| r.week_start_date != june_first_week);

        let report = check_integrity(&rows, 52);
        assert_eq!(
            report.warnings,
            vec![DataQualityWarning::MissingWeeks { found: 51, expected: 52 }]
        );
    }

    #[test]
    fn null_cells_trigger_completeness_warning() {
        let mut rows = full_year(1);
        rows[3].cpi = None;
        rows[7].avg_gas_price = None;
        rows[7].cpi = None;

        let report = check_integrity(&rows, 52);
        assert_eq!(report.warnings, vec![DataQualityWarning::MissingValues { null_cells: 3 }]);
    }

    #[test]
    fn all_checks_report_independently() {
        let mut rows: Vec<MergedRecord> = (0..10).map(|w| row(w, 1, 1000.0)).collect();
        rows[4].revenue = 5000.0;
        rows[0].cpi = None;

        let report = check_integrity(&rows, 52);
        assert_eq!(report.warnings.len(), 3);
        assert!(matches!(report.warnings[0], DataQualityWarning::MissingValues { null_cells: 1 }));
        let DataQualityWarning::RevenueAnomalies(anomalies) = &report.warnings[1] else {
            panic!("expected anomalies, got {:?}", report.warnings[1]);
        };
        // Spike up at week 4 and the drop back at week 5.
        assert_eq!(anomalies.len(), 2);
        assert!(matches!(
            report.warnings[2],
            DataQualityWarning::MissingWeeks { found: 10, expected: 52 }
        ));
    }

    #[test]
    fn anomaly_warning_lists_every_row() {
        let warning = DataQualityWarning::RevenueAnomalies(vec![
            Anomaly {
                week_start_date: start(),
                product_id: 7,
                revenue_change: 0.6,
            },
            Anomaly {
                week_start_date: start() + Duration::weeks(1),
                product_id: 9,
                revenue_change: -0.55,
            },
        ]);
        let text = warning.to_string();
        assert!(text.contains("2023-01-01"));
        assert!(text.contains("0.600000"));
        assert!(text.contains("-0.550000"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn artifact_with_empty_sales_cell_is_rejected_not_counted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("merged_data.csv");
        write_table(&path, &full_year(1)[..2]).unwrap();

        // Blank the revenue of the second data row.
        let text = fs::read_to_string(&path).unwrap();
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        let mut cells: Vec<&str> = lines[2].split(',').collect();
        cells[6] = "";
        let edited = cells.join(",");
        lines[2] = edited;
        fs::write(&path, lines.join("\n") + "\n").unwrap();

        let Err(AppError::Parse(msg)) = check_merged_artifact(&path, 52) else {
            panic!("expected parse error");
        };
        assert!(msg.contains("line 3"), "{msg}");
    }

    #[test]
    fn artifact_with_empty_economic_cells_is_counted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("merged_data.csv");
        let mut rows = full_year(1);
        rows[0].avg_gas_price = None;
        write_table(&path, &rows).unwrap();

        let report = check_merged_artifact(&path, 52).unwrap();
        assert_eq!(report.warnings, vec![DataQualityWarning::MissingValues { null_cells: 1 }]);
    }
}
