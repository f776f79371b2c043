//! Synthetic weekly sales generation.
//!
//! The table shape is fixed by `SalesSpec` (weeks × products rows, week-major
//! order); only the per-row quantities, prices and discounts are random.

use chrono::{Duration, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::domain::{DISCOUNT_CHOICES, SalesRecord, SalesSpec};
use crate::error::AppError;

const UNITS_RANGE: std::ops::Range<u32> = 50..500;
const PRICE_RANGE: std::ops::Range<f64> = 5.0..50.0;

/// Generate one sales row per `(week, product)` pair.
///
/// Fails with `Config` when the last week would fall outside the calendar.
pub fn generate_sales(spec: &SalesSpec) -> Result<Vec<SalesRecord>, AppError> {
    if spec.weeks > 0 && last_week_start(spec.start_date, spec.weeks).is_none() {
        return Err(AppError::Config(format!(
            "{} weeks starting {} run past the last representable date",
            spec.weeks, spec.start_date
        )));
    }

    let mut rng = match spec.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut rows = Vec::with_capacity(spec.weeks as usize * spec.products as usize);
    for week_start_date in week_starts(spec.start_date, spec.weeks) {
        for product_id in 1..=spec.products {
            rows.push(draw_row(&mut rng, week_start_date, product_id, &spec.region));
        }
    }
    Ok(rows)
}

/// `weeks` consecutive dates, seven days apart, starting at `start`.
///
/// Stops early rather than overflow past the calendar.
pub fn week_starts(start: NaiveDate, weeks: u32) -> impl Iterator<Item = NaiveDate> {
    (0..weeks).map_while(move |i| start.checked_add_signed(Duration::weeks(i64::from(i))))
}

fn last_week_start(start: NaiveDate, weeks: u32) -> Option<NaiveDate> {
    start.checked_add_signed(Duration::weeks(i64::from(weeks) - 1))
}

pub fn product_name(product_id: u32) -> String {
    format!("Product_{product_id}")
}

fn draw_row(rng: &mut StdRng, week_start_date: NaiveDate, product_id: u32, region: &str) -> SalesRecord {
    let units_sold = rng.gen_range(UNITS_RANGE);
    let unit_price = rng.gen_range(PRICE_RANGE);
    let discount_pct = *DISCOUNT_CHOICES.choose(rng).unwrap_or(&0);

    SalesRecord {
        week_start_date,
        product_id,
        product_name: product_name(product_id),
        units_sold,
        unit_price,
        discount_pct,
        revenue: SalesRecord::compute_revenue(units_sold, unit_price, discount_pct),
        region: region.to_string(),
    }
}
