//! # ipcbench - Topology-aware IPC benchmark driver
//!
//! Benchmarking inter-process communication between CPU 0 and every other
//! CPU of a large machine is quadratic in the size of the battery and mostly
//! redundant: CPUs that sit in the same place relative to CPU 0 behave the
//! same. ipcbench reads the hardware topology from sysfs, groups CPUs by
//! their locality relative to CPU 0 and benchmarks one representative of
//! each group.
//!
//! ## Features
//!
//! - **Topology discovery**: sockets, NUMA nodes and hyperthread siblings
//!   from `/sys/devices/system`, with a single-CPU fallback when the tree is
//!   unavailable
//! - **Cache resolution**: the closest cache level every CPU shares with CPU 0
//! - **Target selection**: the hyperthread sibling of CPU 0 plus one CPU per
//!   distinct (socket, node, shared cache) combination
//! - **Battery driver**: runs the external benchmark executables for every
//!   selected (CPU, NUMA node) pair
//!
//! ## Quick Start
//!
//! ```no_run
//! use ipcbench::selection::{expand, select};
//! use ipcbench::topology::{discover, SysfsTree};
//!
//! let discovery = discover(&SysfsTree::default(), None).unwrap();
//! let targets = select(&discovery.table, &discovery.cache);
//!
//! println!("Target CPUs: {}", targets.record());
//! for pair in expand(&discovery.table, &targets) {
//!     println!("  {}", pair);
//! }
//! ```
//!
//! ## Full Run
//!
//! ```no_run
//! use ipcbench::config::RunConfig;
//! use ipcbench::core::RunEngine;
//! use std::path::PathBuf;
//!
//! let config = RunConfig {
//!     bin_dir: PathBuf::from("./build"),
//!     dry_run: true,
//!     ..Default::default()
//! };
//!
//! let result = RunEngine::new(config).execute().unwrap();
//! result.print_summary();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod battery;
pub mod config;
pub mod core;
pub mod error;
pub mod selection;
pub mod topology;

// Re-export commonly used types
pub use config::RunConfig;
pub use core::{RunEngine, RunResult};
pub use error::{IpcBenchError, Result};
pub use selection::{expand, select, TargetList, TestPair};
pub use topology::{discover, Discovery, TopologyTable};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
