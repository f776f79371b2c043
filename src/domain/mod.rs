//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the three table row types (`WeeklyEconomicRecord`, `SalesRecord`, `MergedRecord`)
//! - derived findings (`Anomaly`)
//! - run configuration (`PipelineConfig`, `SalesSpec`, `ScheduleConfig`) and `Stage`

pub mod types;

pub use types::*;
