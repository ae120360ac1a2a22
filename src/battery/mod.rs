//! Boundary to the external benchmark battery
//!
//! The benchmarks themselves are separate executables. This module only
//! decides which invocations make up a run and hands them to a
//! [`BatteryRunner`]; the first failing invocation aborts the run, leaving
//! whatever results were already written on disk.

mod plan;
mod runner;

pub use plan::{BatteryPlan, Invocation, PRODUCER_CPU};
pub use runner::{BatteryRunner, DryRunRunner, ProcessRunner};

use crate::error::Result;
use std::path::Path;

/// Run every invocation of `plan` in order; returns the number run.
pub fn run_plan(plan: &BatteryPlan, runner: &mut dyn BatteryRunner, output_dir: &Path) -> Result<usize> {
    let total = plan.len();

    for (index, invocation) in plan.invocations().iter().enumerate() {
        tracing::info!("[{}/{}] {}", index + 1, total, invocation);
        runner.run(invocation, output_dir)?;
    }

    Ok(total)
}
