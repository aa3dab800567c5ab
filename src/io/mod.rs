//! Run exports.
//!
//! - full run as pretty JSON (`write_run_json`)
//! - per-step series as CSV (`write_series_csv`)

pub mod export;

pub use export::*;
