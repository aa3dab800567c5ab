//! Error types.
//!
//! Two layers:
//!
//! - [`SimError`]: the simulation core's taxonomy (configuration, empty
//!   populations, numerical failures, and step attribution).
//! - [`AppError`]: what the `cmsim` binary reports, carrying a process exit code.
//!
//! Pricing moves that would leave the legal band are *not* errors; see
//! `agents::bank::RateAdjustment`.

use std::fmt;

use thiserror::Error;

/// Phase of a simulation step in which a fatal error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    /// Selection-rate computation.
    Before,
    /// Loan assignment and outcome resolution.
    During,
    /// Market share and pricing adjustment.
    After,
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepPhase::Before => "before",
            StepPhase::During => "during",
            StepPhase::After => "after",
        };
        f.write_str(name)
    }
}

/// Errors raised by the simulation core.
#[derive(Debug, Clone, Error)]
pub enum SimError {
    /// A parameter is out of range. Raised before any step runs.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A group, cumulative utility curve, or merged curve has no members.
    #[error("empty population: {0}")]
    EmptyPopulation(String),

    /// A least-squares solve did not produce finite coefficients.
    #[error("numerical failure: {0}")]
    Numerical(String),

    /// A fatal error raised while running a step. The step was rolled back.
    #[error("step {step} failed in {phase} phase: {source}")]
    Step {
        step: u64,
        phase: StepPhase,
        #[source]
        source: Box<SimError>,
    },
}

impl SimError {
    pub fn invalid(message: impl Into<String>) -> Self {
        SimError::InvalidConfiguration(message.into())
    }

    pub fn empty(message: impl Into<String>) -> Self {
        SimError::EmptyPopulation(message.into())
    }

    /// Attach step attribution. Already-attributed errors are left untouched.
    pub fn at_step(self, step: u64, phase: StepPhase) -> Self {
        match self {
            SimError::Step { .. } => self,
            other => SimError::Step {
                step,
                phase,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping step attribution.
    pub fn root(&self) -> &SimError {
        match self {
            SimError::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Binary-facing error with an exit code.
///
/// Exit codes:
/// - `2`: configuration or usage
/// - `3`: statistics input
/// - `4`: simulation failure
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(3, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<SimError> for AppError {
    fn from(err: SimError) -> Self {
        let exit_code = match err.root() {
            SimError::InvalidConfiguration(_) => 2,
            SimError::EmptyPopulation(_) | SimError::Numerical(_) | SimError::Step { .. } => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_attribution_wraps_once() {
        let err = SimError::empty("group A").at_step(3, StepPhase::Before);
        let again = err.clone().at_step(9, StepPhase::After);
        match again {
            SimError::Step { step, phase, .. } => {
                assert_eq!(step, 3);
                assert_eq!(phase, StepPhase::Before);
            }
            other => panic!("expected step error, got {other:?}"),
        }
        assert!(matches!(err.root(), SimError::EmptyPopulation(_)));
    }

    #[test]
    fn exit_codes_follow_taxonomy() {
        let cfg: AppError = SimError::invalid("min >= max").into();
        assert_eq!(cfg.exit_code(), 2);
        let step: AppError = SimError::empty("x").at_step(0, StepPhase::Before).into();
        assert_eq!(step.exit_code(), 4);
        assert!(step.to_string().contains("step 0"));
    }
}
