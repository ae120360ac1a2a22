//! Main run engine
//!
//! Discovery, target selection and the benchmark battery, in that order.
//! Errors are tagged with the stage that produced them so the user can tell
//! a broken hardware description from a failing benchmark.

use crate::battery::{run_plan, BatteryPlan, BatteryRunner, DryRunRunner, ProcessRunner};
use crate::config::RunConfig;
use crate::error::{IoResultExt, Result};
use crate::selection::{expand, select, TargetList, TestPair};
use crate::topology::{bitmap, discover, DiagnosticArchive, Discovery, SysfsTree};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Stage name used for discovery errors
pub const STAGE_DISCOVERY: &str = "discovery";

/// Stage name used for battery errors
pub const STAGE_BATTERY: &str = "battery";

/// Outcome of a complete run
#[derive(Debug)]
pub struct RunResult {
    /// Root output directory
    pub output_dir: PathBuf,
    /// CPUs paired with CPU 0
    pub targets: TargetList,
    /// Expanded (CPU, node) pairs
    pub pairs: Vec<TestPair>,
    /// Benchmark invocations performed (or printed, for dry runs)
    pub invocations: usize,
    /// Non-fatal discovery warnings
    pub warnings: usize,
    /// Total duration
    pub duration: Duration,
}

impl RunResult {
    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Run Summary ===");
        println!("Target CPUs:     {}", self.targets.record());
        println!("Test pairs:      {}", self.pairs.len());
        println!("Invocations:     {}", self.invocations);
        println!("Warnings:        {}", self.warnings);
        println!("Duration:        {:.2?}", self.duration);
        println!("Output:          {}", self.output_dir.display());
    }
}

/// Drives one benchmark run
#[derive(Debug, Clone)]
pub struct RunEngine {
    config: RunConfig,
}

impl RunEngine {
    /// Create an engine for `config`
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// The configuration in use
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Discover the topology, archiving descriptors into the log directory
    /// if archiving is enabled.
    pub fn discover(&self) -> Result<Discovery> {
        let tree = SysfsTree::new(&self.config.sysfs_root);

        let archive = if self.config.archive {
            Some(DiagnosticArchive::new(self.config.log_dir()).with_proc_root(&self.config.proc_root))
        } else {
            None
        };

        discover(&tree, archive.as_ref()).map_err(|e| e.with_context(STAGE_DISCOVERY))
    }

    /// Run with the runner implied by the configuration
    pub fn execute(&self) -> Result<RunResult> {
        if self.config.dry_run {
            self.execute_with(&mut DryRunRunner::new())
        } else {
            self.execute_with(&mut ProcessRunner::new(&self.config.bin_dir))
        }
    }

    /// Run with an explicit runner
    pub fn execute_with(&self, runner: &mut dyn BatteryRunner) -> Result<RunResult> {
        let start = Instant::now();
        let log_dir = self.config.log_dir();
        let result_dir = self.config.result_dir();

        tracing::info!("Writing output to {}", self.config.output_dir.display());
        std::fs::create_dir_all(&log_dir).with_path(&log_dir)?;
        std::fs::create_dir_all(&result_dir).with_path(&result_dir)?;

        let discovery = self.discover()?;
        let targets = select(&discovery.table, &discovery.cache);
        let pairs = expand(&discovery.table, &targets);

        tracing::info!("Testing using target CPUs: {}", targets.record());
        tracing::debug!(
            "Target CPUs as bitmap list: {}",
            bitmap::format(targets.cpus())
        );

        targets
            .write_record(&log_dir)
            .map_err(|e| e.with_context(STAGE_DISCOVERY))?;
        discovery
            .write_json(&log_dir)
            .map_err(|e| e.with_context(STAGE_DISCOVERY))?;

        let plan = BatteryPlan::build(&self.config.programs, &self.config.chunk_repeats, &pairs);
        tracing::info!(
            "Running {} benchmark invocations over {} pairs",
            plan.len(),
            pairs.len()
        );

        let invocations =
            run_plan(&plan, runner, &result_dir).map_err(|e| e.with_context(STAGE_BATTERY))?;

        Ok(RunResult {
            output_dir: self.config.output_dir.clone(),
            targets,
            pairs,
            invocations,
            warnings: discovery.warnings.len(),
            duration: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battery::Invocation;
    use crate::config::{BatteryProgram, ChunkRepeat};
    use crate::error::IpcBenchError;
    use crate::selection::TestPair;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Two sockets of four CPUs, one node per socket. CPUs 0 and 1 are
    /// hyperthread siblings; CPU 0 shares L2 with CPU 1 and L3 with CPUs 0-3.
    fn two_socket_sysfs() -> TempDir {
        let dir = TempDir::new().unwrap();
        let cpu_root = dir.path().join("devices/system/cpu");
        let node_root = dir.path().join("devices/system/node");

        for cpu in 0..8 {
            let topology = cpu_root.join(format!("cpu{}/topology", cpu));
            write(&topology.join("physical_package_id"), &format!("{}\n", cpu / 4));
            let siblings = if cpu < 2 { "0-1".to_string() } else { cpu.to_string() };
            write(&topology.join("thread_siblings_list"), &format!("{}\n", siblings));
        }

        let cache = cpu_root.join("cpu0/cache");
        for (index, level, shared) in [(0, 1, "0"), (1, 1, "0"), (2, 2, "0-1"), (3, 3, "0-3")] {
            let index_dir = cache.join(format!("index{}", index));
            write(&index_dir.join("level"), &format!("{}\n", level));
            write(&index_dir.join("shared_cpu_list"), &format!("{}\n", shared));
        }

        for node in 0..2 {
            let node_dir = node_root.join(format!("node{}", node));
            write(&node_dir.join("cpulist"), &format!("{}-{}\n", node * 4, node * 4 + 3));
            write(
                &node_dir.join("meminfo"),
                &format!(
                    "Node {0} MemTotal:       16384 kB\nNode {0} MemFree:         8192 kB\n",
                    node
                ),
            );
        }

        dir
    }

    fn config(sysfs: &Path, output: &Path) -> RunConfig {
        RunConfig {
            sysfs_root: sysfs.to_path_buf(),
            proc_root: sysfs.join("proc"),
            output_dir: output.to_path_buf(),
            programs: vec![BatteryProgram {
                name: "pipe_thr".to_string(),
                safe: false,
                spins: false,
            }],
            chunk_repeats: vec![ChunkRepeat {
                chunk_size: 4096,
                repeats: 10,
            }],
            archive: false,
            dry_run: true,
            ..Default::default()
        }
    }

    struct FailOn(usize);

    impl BatteryRunner for FailOn {
        fn run(&mut self, invocation: &Invocation, _output_dir: &Path) -> Result<()> {
            if invocation.consumer_cpu == self.0 {
                return Err(IpcBenchError::DownstreamInvocationFailure {
                    program: invocation.program.clone(),
                    args: String::new(),
                    reason: "exited with 1".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_two_socket_run() {
        let sys = two_socket_sysfs();
        let out = TempDir::new().unwrap();
        let engine = RunEngine::new(config(sys.path(), out.path()));

        let mut runner = DryRunRunner::new();
        let result = engine.execute_with(&mut runner).unwrap();

        assert_eq!(result.targets.cpus(), &[1, 2, 4]);
        assert_eq!(
            result.pairs,
            vec![
                TestPair { cpu: 1, node: 0 },
                TestPair { cpu: 2, node: 0 },
                TestPair { cpu: 4, node: 1 },
                TestPair { cpu: 4, node: 0 },
            ]
        );
        assert_eq!(result.invocations, 4);
        assert_eq!(runner.commands().len(), 4);
        assert_eq!(result.warnings, 0);

        let record = fs::read_to_string(out.path().join("logs/target_cpus")).unwrap();
        assert_eq!(record.trim(), "1,2,4");
        assert!(out.path().join("logs/topology.json").exists());
        assert!(out.path().join("results").is_dir());
    }

    #[test]
    fn test_topology_json_contents() {
        let sys = two_socket_sysfs();
        let out = TempDir::new().unwrap();
        RunEngine::new(config(sys.path(), out.path()))
            .execute_with(&mut DryRunRunner::new())
            .unwrap();

        let json = fs::read_to_string(out.path().join("logs/topology.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["table"]["cpus"].as_array().unwrap().len(), 8);
        assert_eq!(value["table"]["nodes"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_sysfs_degrades_to_single_cpu() {
        let sys = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let engine = RunEngine::new(config(sys.path(), out.path()));

        let result = engine.execute_with(&mut DryRunRunner::new()).unwrap();

        assert_eq!(result.targets.cpus(), &[0]);
        assert_eq!(result.pairs, vec![TestPair { cpu: 0, node: 0 }]);
        assert!(result.warnings >= 2);
    }

    #[test]
    fn test_missing_cache_and_nodes_still_runs_the_battery() {
        let sys = TempDir::new().unwrap();
        for cpu in 0..8 {
            let topology = sys.path().join(format!("devices/system/cpu/cpu{}/topology", cpu));
            write(&topology.join("physical_package_id"), "0\n");
            write(&topology.join("thread_siblings_list"), &format!("{}\n", cpu));
        }
        let out = TempDir::new().unwrap();
        let engine = RunEngine::new(config(sys.path(), out.path()));

        let result = engine.execute_with(&mut DryRunRunner::new()).unwrap();

        // CPU 0 keeps its own cache; everyone else only shares memory with it.
        assert_eq!(result.targets.cpus(), &[1]);
        assert_eq!(result.pairs, vec![TestPair { cpu: 1, node: 0 }]);
        assert_eq!(result.invocations, 1);
        assert_eq!(result.warnings, 2);
    }

    #[test]
    fn test_repeated_runs_select_the_same_targets() {
        let sys = two_socket_sysfs();
        let engine = RunEngine::new(config(sys.path(), Path::new("unused")));

        let first = engine.discover().unwrap();
        let second = engine.discover().unwrap();
        assert_eq!(
            select(&first.table, &first.cache),
            select(&second.table, &second.cache)
        );
    }

    #[test]
    fn test_battery_failure_is_reported_as_battery_stage() {
        let sys = two_socket_sysfs();
        let out = TempDir::new().unwrap();
        let engine = RunEngine::new(config(sys.path(), out.path()));

        let err = engine.execute_with(&mut FailOn(2)).unwrap_err();

        assert!(err.is_downstream());
        assert!(err.to_string().starts_with(STAGE_BATTERY));
        // Selection output is written before the battery starts.
        assert!(out.path().join("logs/target_cpus").exists());
    }

    #[test]
    fn test_corrupt_topology_is_reported_as_discovery_stage() {
        let sys = two_socket_sysfs();
        write(
            &sys.path().join("devices/system/cpu/cpu3/topology/thread_siblings_list"),
            "3-4-5\n",
        );
        let out = TempDir::new().unwrap();
        let engine = RunEngine::new(config(sys.path(), out.path()));

        let err = engine.execute_with(&mut DryRunRunner::new()).unwrap_err();

        assert!(!err.is_downstream());
        assert!(err.to_string().starts_with(STAGE_DISCOVERY));
    }

    #[test]
    fn test_archive_mirrors_into_log_dir() {
        let sys = two_socket_sysfs();
        let out = TempDir::new().unwrap();
        let mut config = config(sys.path(), out.path());
        config.archive = true;

        RunEngine::new(config)
            .execute_with(&mut DryRunRunner::new())
            .unwrap();

        let logs = out.path().join("logs");
        assert!(logs.join("sys-cpu/cpu5/topology/physical_package_id").exists());
        assert!(logs.join("sys-cpu/cpu0/cache/index3/shared_cpu_list").exists());
        assert!(logs.join("sys-node/node1/meminfo").exists());
    }
}
