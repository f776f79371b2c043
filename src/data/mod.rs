//! The two independent sources of a cycle: FRED macro series and synthetic sales.

pub mod fred;
pub mod sales;

pub use fred::{FredClient, Observation, outer_join_series};
pub use sales::generate_sales;
