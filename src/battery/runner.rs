//! Runners for battery invocations

use crate::battery::Invocation;
use crate::error::{IpcBenchError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Executes (or pretends to execute) one benchmark invocation
pub trait BatteryRunner {
    /// Run `invocation`, writing results below `output_dir`
    fn run(&mut self, invocation: &Invocation, output_dir: &Path) -> Result<()>;
}

/// Spawns the benchmark executables from a bin directory
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    bin_dir: PathBuf,
}

impl ProcessRunner {
    /// Look programs up in `bin_dir`
    pub fn new(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
        }
    }
}

impl BatteryRunner for ProcessRunner {
    fn run(&mut self, invocation: &Invocation, output_dir: &Path) -> Result<()> {
        let program = self.bin_dir.join(&invocation.program);
        let args = invocation.args(output_dir);

        tracing::debug!("Running {} {}", program.display(), args.join(" "));

        let failure = |reason: String| IpcBenchError::DownstreamInvocationFailure {
            program: program.display().to_string(),
            args: args.join(" "),
            reason,
        };

        let status = Command::new(&program)
            .args(&args)
            .status()
            .map_err(|e| failure(format!("could not start: {}", e)))?;

        if !status.success() {
            return Err(failure(format!("exited with {}", status)));
        }

        Ok(())
    }
}

/// Records command lines without running anything
#[derive(Debug, Default, Clone)]
pub struct DryRunRunner {
    commands: Vec<String>,
}

impl DryRunRunner {
    /// Create an empty dry runner
    pub fn new() -> Self {
        Self::default()
    }

    /// Command lines seen so far
    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}

impl BatteryRunner for DryRunRunner {
    fn run(&mut self, invocation: &Invocation, output_dir: &Path) -> Result<()> {
        let line = format!("./{} {}", invocation.program, invocation.args(output_dir).join(" "));
        tracing::info!("[dry run] {}", line);
        self.commands.push(line);
        Ok(())
    }
}
