//! Core run engine
//!
//! Ties discovery, selection and the battery together.

mod engine;

pub use engine::{RunEngine, RunResult, STAGE_BATTERY, STAGE_DISCOVERY};
