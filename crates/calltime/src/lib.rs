//! Host-side tooling for calltime.
//!
//! The timing engine lives in `calltime_probe`; this crate adds what a host
//! needs around it: a function catalog read from ELF symbols and DWARF line
//! info, tracking files, a SQLite [`ReportSink`](calltime_probe::ReportSink)
//! and the `calltime` CLI for inspecting recordings.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod process;
pub mod storage;
pub mod symbols;

pub use config::{TrackEntry, TrackingConfig};
pub use error::{Error, Result};
pub use storage::Storage;
pub use symbols::ElfCatalog;
