//! FRED API integration for the weekly gasoline price and CPI series.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::{PipelineConfig, SERIES_CPI, SERIES_GAS_PRICE, WeeklyEconomicRecord};
use crate::error::AppError;

const BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const ERROR_BODY_LIMIT: usize = 200;

/// One `(date, value)` point of a series. `value` is `None` where FRED
/// publishes its "." missing marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

pub struct FredClient {
    client: Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl FredClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            max_retries: 0,
            base_delay: RETRY_BASE_DELAY,
        }
    }

    /// Build a client from the pipeline configuration (key + retry budget).
    pub fn from_config(config: &PipelineConfig) -> Result<Self, AppError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            AppError::Config("missing FRED_API_KEY (set it in the environment, .env, or pass --api-key)".into())
        })?;
        Ok(Self::new(api_key).with_retries(config.fetch_retries))
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Point the client at a different observations endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch gas price and CPI over `[start, end]` and outer-join them by date.
    pub fn fetch_economic(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<WeeklyEconomicRecord>, AppError> {
        if end < start {
            return Err(AppError::Config(format!("end date {end} is before start date {start}")));
        }
        let gas = self.fetch_series(SERIES_GAS_PRICE, start, end)?;
        let cpi = self.fetch_series(SERIES_CPI, start, end)?;
        tracing::info!(
            gas_obs = gas.len(),
            cpi_obs = cpi.len(),
            "fetched FRED series {SERIES_GAS_PRICE} and {SERIES_CPI}"
        );
        Ok(outer_join_series(&gas, &cpi))
    }

    /// Fetch one series over the inclusive window `[start, end]`.
    pub fn fetch_series(&self, series_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Observation>, AppError> {
        let start = start.to_string();
        let end = end.to_string();
        self.with_retry(series_id, || {
            self.request(&[
                ("series_id", series_id),
                ("api_key", self.api_key.as_str()),
                ("file_type", "json"),
                ("observation_start", start.as_str()),
                ("observation_end", end.as_str()),
            ])
        })
    }

    /// Issue a single unbounded request to confirm the key is accepted.
    ///
    /// Returns the number of observations FRED sent back.
    pub fn probe_key(&self) -> Result<usize, AppError> {
        let obs = self.request(&[
            ("series_id", SERIES_GAS_PRICE),
            ("api_key", self.api_key.as_str()),
            ("file_type", "json"),
        ])?;
        Ok(obs.len())
    }

    fn with_retry<T>(&self, series_id: &str, mut op: impl FnMut() -> Result<T, AppError>) -> Result<T, AppError> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    tracing::warn!(
                        series_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "FRED request failed, retrying: {e}"
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn request(&self, query: &[(&str, &str)]) -> Result<Vec<Observation>, AppError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(query)
            .send()
            .map_err(|e| AppError::Network(format!("FRED request failed: {}", e.without_url())))?;

        let status = resp.status();
        if !status.is_success() {
            // FRED explains bad keys in the body (`error_message`); keep a short excerpt.
            let body = resp.text().unwrap_or_default();
            return Err(AppError::Auth {
                status: status.as_u16(),
                message: excerpt(&body),
            });
        }

        let body: ObservationsResponse = resp
            .json()
            .map_err(|e| AppError::Parse(format!("FRED response: {}", e.without_url())))?;

        body.observations.into_iter().map(Observation::try_from).collect()
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

impl TryFrom<RawObservation> for Observation {
    type Error = AppError;

    fn try_from(raw: RawObservation) -> Result<Self, Self::Error> {
        let date = NaiveDate::parse_from_str(&raw.date, "%Y-%m-%d")
            .map_err(|e| AppError::Parse(format!("FRED date '{}': {e}", raw.date)))?;
        Ok(Observation {
            date,
            value: parse_value(&raw.value),
        })
    }
}

fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed == "." || trimmed.is_empty() {
        return None;
    }
    let v = trimmed.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return "empty response body".to_string();
    }
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

/// Full outer join of the two series on date, ascending, one row per date.
///
/// A date observed more than once within a series keeps its first value.
pub fn outer_join_series(gas: &[Observation], cpi: &[Observation]) -> Vec<WeeklyEconomicRecord> {
    let gas = first_value_by_date(gas);
    let cpi = first_value_by_date(cpi);

    let dates: BTreeSet<NaiveDate> = gas.keys().chain(cpi.keys()).copied().collect();
    dates
        .into_iter()
        .map(|date| WeeklyEconomicRecord {
            week_start_date: date,
            avg_gas_price: gas.get(&date).copied().flatten(),
            cpi: cpi.get(&date).copied().flatten(),
        })
        .collect()
}

fn first_value_by_date(series: &[Observation]) -> BTreeMap<NaiveDate, Option<f64>> {
    let mut out = BTreeMap::new();
    for obs in series {
        out.entry(obs.date).or_insert(obs.value);
    }
    out
}
