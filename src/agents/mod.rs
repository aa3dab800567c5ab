//! Market participants.
//!
//! - `applicant`: one applicant's scores and repay draw
//! - `group`: an ordered applicant population plus its repay curve
//! - `bank`: pricing, utility evaluation and rate adjustment

pub mod applicant;
pub mod bank;
pub mod group;

pub use applicant::*;
pub use bank::*;
pub use group::*;
