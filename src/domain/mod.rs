//! Domain types used throughout the pipeline.
//!
//! This module defines the closed mode enumerations (`Quantity`, `CenterMode`,
//! `XAxis`, `MappingMode`, `FitTarget`) and the scan direction.

pub mod types;

pub use types::*;
