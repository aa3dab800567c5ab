//! Domain types used throughout the simulation.
//!
//! This module defines:
//!
//! - value types (`ScoreRange`, `RateRange`, `Policy`, `Outcome`, `Histogram`)
//! - parameter records read from the configuration store (`SimConfig` and friends)

pub mod params;
pub mod types;

pub use params::*;
pub use types::*;
