//! `squid-scans` library crate.
//!
//! The binary (`sqs`) is a thin wrapper around this library so that:
//!
//! - scan fitting is testable without spawning processes
//! - modules are reusable (e.g., a GUI front-end or notebooks)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod debug;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod measurement;
pub mod models;
pub mod plot;
pub mod report;
