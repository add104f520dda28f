//! Gradiometer response model.
//!
//! The model is implemented as small, pure functions plus two `CurveModel`
//! adapters (free and fixed center) so that the fitter can stay generic.

pub mod gradiometer;

pub use gradiometer::*;
