//! Scan data: parsed files, preprocessed scans and synthetic sweeps.

pub mod file;
pub mod scan;
pub mod synth;

pub use file::*;
pub use scan::*;
pub use synth::*;
