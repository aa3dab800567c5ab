//! Statistics input and initial-population reconstruction.
//!
//! - `stats`: statistics types, the provider trait and the CSV provider
//! - `synthetic`: seeded stand-in statistics
//! - `reconstruct`: CDF + target size -> ordered integer scores

pub mod reconstruct;
pub mod stats;
pub mod synthetic;

pub use reconstruct::*;
pub use stats::*;
pub use synthetic::*;
