//! CSV artifacts exchanged between stages.
//!
//! Every table is written with an explicit header row (even when empty) and
//! read back with a strict header check, so a stage never silently consumes a
//! file produced by something else. Writes go to a temporary sibling first and
//! are renamed into place, so readers only ever see complete artifacts.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{MergedRecord, SalesRecord, WeeklyEconomicRecord};
use crate::error::AppError;

/// A row type with a fixed CSV schema.
pub trait Table: Serialize + DeserializeOwned {
    /// Human-readable table name for messages.
    const NAME: &'static str;
    /// Header row, in serialization order.
    const COLUMNS: &'static [&'static str];
}

impl Table for WeeklyEconomicRecord {
    const NAME: &'static str = "economic";
    const COLUMNS: &'static [&'static str] = &["week_start_date", "avg_gas_price", "cpi"];
}

impl Table for SalesRecord {
    const NAME: &'static str = "sales";
    const COLUMNS: &'static [&'static str] = &[
        "week_start_date",
        "product_id",
        "product_name",
        "units_sold",
        "unit_price",
        "discount_pct",
        "revenue",
        "region",
    ];
}

impl Table for MergedRecord {
    const NAME: &'static str = "merged";
    const COLUMNS: &'static [&'static str] = &[
        "week_start_date",
        "product_id",
        "product_name",
        "units_sold",
        "unit_price",
        "discount_pct",
        "revenue",
        "region",
        "avg_gas_price",
        "cpi",
    ];
}

/// Write `rows` to `path`, replacing any previous artifact atomically.
pub fn write_table<T: Table>(path: &Path, rows: &[T]) -> Result<(), AppError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|e| AppError::io(format_args!("failed to create '{}'", dir.display()), e))?;
    }

    let tmp = temp_path(path);
    let result = write_rows(&tmp, rows).and_then(|()| {
        fs::rename(&tmp, path).map_err(|e| AppError::io(format_args!("failed to move {} table into '{}'", T::NAME, path.display()), e))
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_rows<T: Table>(path: &Path, rows: &[T]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format_args!("failed to create {} table '{}'", T::NAME, path.display()), e))?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

    let write_err = |e: csv::Error| AppError::io(format_args!("failed to write {} table '{}'", T::NAME, path.display()), e);
    writer.write_record(T::COLUMNS).map_err(write_err)?;
    for row in rows {
        writer.serialize(row).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format_args!("failed to flush {} table '{}'", T::NAME, path.display()), e))?;
    Ok(())
}

/// Read a whole table, failing with `MissingInput` when the file is absent.
pub fn read_table<T: Table>(path: &Path) -> Result<Vec<T>, AppError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(AppError::MissingInput(path.to_path_buf())),
        Err(e) => return Err(AppError::io(format_args!("failed to open '{}'", path.display()), e)),
    };

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let headers = reader
        .headers()
        .map_err(|e| AppError::Parse(format!("{} table headers in '{}': {e}", T::NAME, path.display())))?;
    ensure_columns::<T>(headers, path)?;

    let mut rows = Vec::new();
    for (idx, result) in reader.deserialize().enumerate() {
        // +2: 1-based lines plus the header row.
        let line = idx + 2;
        let row: T = result
            .map_err(|e| AppError::Parse(format!("{} table '{}' line {line}: {e}", T::NAME, path.display())))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Fail with `MissingInput` unless every path exists.
pub fn require_inputs(paths: &[&Path]) -> Result<(), AppError> {
    match paths.iter().find(|p| !p.is_file()) {
        Some(missing) => Err(AppError::MissingInput(missing.to_path_buf())),
        None => Ok(()),
    }
}

fn ensure_columns<T: Table>(headers: &csv::StringRecord, path: &Path) -> Result<(), AppError> {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    let found: Vec<&str> = headers.iter().map(|h| h.trim_start_matches('\u{feff}')).collect();
    if found != T::COLUMNS {
        return Err(AppError::Parse(format!(
            "{} table '{}': expected columns [{}], found [{}]",
            T::NAME,
            path.display(),
            T::COLUMNS.join(", "),
            found.join(", ")
        )));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
