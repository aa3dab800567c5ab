//! `credit-market` library crate.
//!
//! The binary (`cmsim`) is a thin wrapper around this library so that:
//!
//! - the simulation is testable without spawning processes
//! - the core (agents, market, sim) is reusable behind other front-ends
//! - code stays easy to navigate as the project grows

pub mod agents;
pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod market;
pub mod math;
pub mod report;
pub mod sim;
