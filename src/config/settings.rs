//! Configuration settings for ipcbench
//!
//! Defines the CLI arguments, the run configuration derived from them (or
//! loaded from a JSON file) and the default benchmark battery.

use crate::error::{IoResultExt, IpcBenchError, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// ipcbench - topology-aware IPC benchmark driver
#[derive(Parser, Debug, Clone)]
#[command(name = "ipcbench")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pick representative CPU pairs and drive an IPC benchmark battery")]
#[command(long_about = r#"
ipcbench discovers the host's CPU topology (sockets, NUMA nodes, hyperthread
siblings, caches shared with CPU 0), picks one representative CPU for every
distinct locality relative to CPU 0 and runs the external benchmark battery
against each of them.

Examples:
  ipcbench topology                       # Show the detected topology
  ipcbench targets                        # Show the chosen CPU/node pairs
  ipcbench run --bin-dir ./build          # Run the full battery
  ipcbench run --dry-run -v               # Print what would be run
  ipcbench --sysfs-root ./captured-sys targets
"#)]
pub struct CliArgs {
    /// Root of the sysfs tree to read the topology from
    #[arg(long, global = true, default_value = "/sys", value_name = "PATH", env = "IPCBENCH_SYSFS_ROOT")]
    pub sysfs_root: PathBuf,

    /// Root of the procfs tree used for diagnostic copies
    #[arg(long, global = true, default_value = "/proc", value_name = "PATH")]
    pub proc_root: PathBuf,

    /// Output directory (default: a fresh directory under the system temp dir)
    #[arg(short = 'o', long, global = true, value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors are logged)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Discover and print the CPU/NUMA/cache topology
    #[command(name = "topology")]
    Topology {
        /// Print as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Discover the topology and print the selected benchmark targets
    #[command(name = "targets")]
    Targets,

    /// Discover, select, archive and run the benchmark battery
    #[command(name = "run")]
    Run {
        /// Directory containing the benchmark executables
        #[arg(long, default_value = ".", value_name = "PATH")]
        bin_dir: PathBuf,

        /// Only print the invocations that would be run
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// JSON run configuration; command-line options override it
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Chunk size and repeat count, e.g. 4K:1000000 (repeatable)
        #[arg(long = "chunk", value_name = "SIZE:REPEATS")]
        chunks: Vec<String>,

        /// Only run these benchmark programs (repeatable)
        #[arg(long = "only", value_name = "PROGRAM")]
        only: Vec<String>,

        /// Skip copying descriptor files into the log directory
        #[arg(long)]
        no_archive: bool,
    },
}

/// One external benchmark program of the battery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryProgram {
    /// Executable name, looked up in the bin directory
    pub name: String,
    /// Reader copies data out of the shared buffer before verifying it
    #[serde(default)]
    pub safe: bool,
    /// Spins on the peer; pointless when both ends share CPU 0
    #[serde(default)]
    pub spins: bool,
}

impl BatteryProgram {
    fn new(name: &str, safe: bool, spins: bool) -> Self {
        Self {
            name: name.to_string(),
            safe,
            spins,
        }
    }
}

/// Chunk size and number of chunks for one battery pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRepeat {
    /// Bytes per message
    pub chunk_size: u64,
    /// Number of messages
    pub repeats: u64,
}

/// The throughput battery: every transport, with the shared-memory ones in
/// both their in-place and safe forms.
pub fn default_programs() -> Vec<BatteryProgram> {
    vec![
        BatteryProgram::new("pipe_thr", false, false),
        BatteryProgram::new("unix_thr", false, false),
        BatteryProgram::new("tcp_thr", false, false),
        BatteryProgram::new("tcp_nodelay_thr", false, false),
        BatteryProgram::new("vmsplice_coop_pipe_thr", false, false),
        BatteryProgram::new("mempipe_thr", false, false),
        BatteryProgram::new("mempipe_thr", true, false),
        BatteryProgram::new("mempipe_spin_thr", false, true),
        BatteryProgram::new("mempipe_spin_thr", true, true),
        BatteryProgram::new("shmem_pipe_thr", false, false),
        BatteryProgram::new("shmem_pipe_thr", true, false),
    ]
}

/// 64 B and 4 KiB chunks a million times, 64 KiB chunks a hundred thousand.
pub fn default_chunk_repeats() -> Vec<ChunkRepeat> {
    vec![
        ChunkRepeat {
            chunk_size: 64,
            repeats: 1_000_000,
        },
        ChunkRepeat {
            chunk_size: 4096,
            repeats: 1_000_000,
        },
        ChunkRepeat {
            chunk_size: 65536,
            repeats: 100_000,
        },
    ]
}

/// Runtime configuration derived from CLI args and an optional config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// sysfs root
    pub sysfs_root: PathBuf,
    /// procfs root
    pub proc_root: PathBuf,
    /// Output directory; `logs/` and `results/` are created below it
    pub output_dir: PathBuf,
    /// Directory holding the benchmark executables
    pub bin_dir: PathBuf,
    /// Benchmark programs to run
    pub programs: Vec<BatteryProgram>,
    /// Chunk size / repeat combinations
    pub chunk_repeats: Vec<ChunkRepeat>,
    /// Mirror descriptor files into the log directory
    pub archive: bool,
    /// Print invocations instead of running them
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys"),
            proc_root: PathBuf::from("/proc"),
            output_dir: default_output_dir(),
            bin_dir: PathBuf::from("."),
            programs: default_programs(),
            chunk_repeats: default_chunk_repeats(),
            archive: true,
            dry_run: false,
        }
    }
}

impl RunConfig {
    /// `<output_dir>/logs`
    pub fn log_dir(&self) -> PathBuf {
        self.output_dir.join("logs")
    }

    /// `<output_dir>/results`
    pub fn result_dir(&self) -> PathBuf {
        self.output_dir.join("results")
    }

    /// Load a JSON config file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        serde_json::from_str(&content)
            .map_err(|e| IpcBenchError::config(format!("{}: {}", path.display(), e)))
    }

    /// Build the configuration for a `run` invocation
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let mut config = Self::default();
        config.apply_globals(args);

        if let Commands::Run {
            bin_dir,
            dry_run,
            config: config_file,
            chunks,
            only,
            no_archive,
        } = &args.command
        {
            if let Some(path) = config_file {
                config = Self::load(path)?;
                config.apply_globals(args);
            }

            if bin_dir != Path::new(".") {
                config.bin_dir = bin_dir.clone();
            }
            config.dry_run |= *dry_run;
            config.archive &= !*no_archive;

            if !chunks.is_empty() {
                config.chunk_repeats = chunks
                    .iter()
                    .map(|c| parse_chunk_repeat(c))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(IpcBenchError::config)?;
            }

            if !only.is_empty() {
                config.programs.retain(|p| only.contains(&p.name));
                if config.programs.is_empty() {
                    return Err(IpcBenchError::config(format!(
                        "no benchmark program matches --only {}",
                        only.join(",")
                    )));
                }
            }
        }

        Ok(config)
    }

    fn apply_globals(&mut self, args: &CliArgs) {
        self.sysfs_root = args.sysfs_root.clone();
        self.proc_root = args.proc_root.clone();
        if let Some(ref dir) = args.output_dir {
            self.output_dir = dir.clone();
        }
    }
}

/// `<tmp>/ipcbench-<host>-<timestamp>`
pub fn default_output_dir() -> PathBuf {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "localhost".to_string());
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    std::env::temp_dir().join(format!("ipcbench-{}-{}", host, stamp))
}

/// Parse human-readable size string to bytes
pub fn parse_size(size: &str) -> std::result::Result<u64, String> {
    let size = size.trim().to_uppercase();

    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let (num_str, multiplier) = if size.ends_with("GB") || size.ends_with('G') {
        (size.trim_end_matches(|c| c == 'G' || c == 'B'), 1024u64 * 1024 * 1024)
    } else if size.ends_with("MB") || size.ends_with('M') {
        (size.trim_end_matches(|c| c == 'M' || c == 'B'), 1024u64 * 1024)
    } else if size.ends_with("KB") || size.ends_with('K') {
        (size.trim_end_matches(|c| c == 'K' || c == 'B'), 1024u64)
    } else if size.ends_with('B') {
        (size.trim_end_matches('B'), 1u64)
    } else {
        (size.as_str(), 1u64)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_str))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| format!("Size too large: {}", size))
}

/// Parse `SIZE:REPEATS`, e.g. `4K:1000000`
pub fn parse_chunk_repeat(input: &str) -> std::result::Result<ChunkRepeat, String> {
    let (size, repeats) = input
        .split_once(':')
        .ok_or_else(|| format!("Expected SIZE:REPEATS, got '{}'", input))?;

    let chunk_size = parse_size(size)?;
    if chunk_size == 0 {
        return Err(format!("Chunk size must not be zero in '{}'", input));
    }

    let repeats = repeats
        .trim()
        .parse()
        .map_err(|_| format!("Invalid repeat count in '{}'", input))?;

    Ok(ChunkRepeat {
        chunk_size,
        repeats,
    })
}
