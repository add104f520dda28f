//! Scan fitting.
//!
//! Responsibilities:
//!
//! - fit one voltage scan against the gradiometer model (free / fixed center)
//! - convert fitted amplitudes into magnetic moments
//! - subtract a background scan on a common position grid

pub mod background;
pub mod fitter;

pub use background::*;
pub use fitter::*;
