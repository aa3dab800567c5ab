//! Simulation orchestration and run output.

pub mod output;
pub mod simulation;

pub use output::*;
pub use simulation::*;
