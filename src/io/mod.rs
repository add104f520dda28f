//! Input/output helpers.
//!
//! - raw instrument file parsing (`ingest`)
//! - `.rw.dat` / `.dat` exports (`export`)
//! - curve JSON read/write (`curve`)

pub mod curve;
pub mod export;
pub mod ingest;

pub use curve::*;
pub use export::*;
pub use ingest::*;
