//! Reporting: text summaries and ASCII charts.
//!
//! - `format`: run summary, session view, interest-rate plane tables
//! - `chart`: fixed-grid series plots and histogram bars

pub mod chart;
pub mod format;

pub use chart::*;
pub use format::*;
