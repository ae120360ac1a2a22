//! Configuration module for ipcbench
//!
//! CLI arguments, JSON run configuration and the default battery.

mod settings;

pub use settings::*;
