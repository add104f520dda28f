//! Numerical utilities: least squares, polynomial fits, interpolation and the
//! Levenberg–Marquardt solver.

pub mod interp;
pub mod lm;
pub mod ols;
pub mod poly;

pub use interp::*;
pub use lm::*;
pub use ols::*;
pub use poly::*;
