//! Left join of the sales table with the economic table on `week_start_date`.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;

use crate::domain::{MergedRecord, SalesRecord, WeeklyEconomicRecord};
use crate::error::AppError;
use crate::io::{read_table, require_inputs, write_table};

/// Attach economic columns to every sales row.
///
/// Output order and cardinality follow `sales` exactly. When the economic table
/// carries a date more than once, the first occurrence wins so rows never fan out.
pub fn left_join(sales: &[SalesRecord], economic: &[WeeklyEconomicRecord]) -> Vec<MergedRecord> {
    let mut by_week: HashMap<NaiveDate, &WeeklyEconomicRecord> = HashMap::with_capacity(economic.len());
    for row in economic {
        by_week.entry(row.week_start_date).or_insert(row);
    }

    sales
        .iter()
        .map(|s| MergedRecord::from_parts(s, by_week.get(&s.week_start_date).copied()))
        .collect()
}

/// Outcome of a merge, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub rows: usize,
    /// Rows that found a matching economic week.
    pub matched: usize,
}

/// Read both source artifacts, join them and write the merged artifact.
///
/// Both inputs are checked before anything is read or written, so a missing
/// input leaves any previous merged artifact untouched.
pub fn merge_artifacts(sales_path: &Path, economic_path: &Path, merged_path: &Path) -> Result<MergeSummary, AppError> {
    require_inputs(&[sales_path, economic_path])?;

    let sales: Vec<SalesRecord> = read_table(sales_path)?;
    let economic: Vec<WeeklyEconomicRecord> = read_table(economic_path)?;
    let merged = left_join(&sales, &economic);

    write_table(merged_path, &merged)?;

    Ok(MergeSummary {
        rows: merged.len(),
        matched: merged.iter().filter(|r| r.avg_gas_price.is_some() || r.cpi.is_some()).count(),
    })
}
