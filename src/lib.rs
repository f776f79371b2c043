//! `sales-etl` library crate.
//!
//! The binary (`etl`) is a thin wrapper around this library so that:
//!
//! - every stage is testable without spawning processes
//! - the scheduler can run stages either in-process or as child `etl` processes
//! - the join and data-quality rules stay pure functions over row slices

pub mod app;
pub mod checks;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod logging;
pub mod merge;
pub mod schedule;
