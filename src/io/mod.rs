//! Input/output helpers.
//!
//! - CSV artifact read/write with schema checks (`table`)

pub mod table;

pub use table::*;
