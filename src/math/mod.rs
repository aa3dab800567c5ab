//! Mathematical utilities: least squares, polynomial resampling, interpolation.

pub mod interp;
pub mod ols;
pub mod poly;

pub use interp::*;
pub use ols::*;
pub use poly::*;
