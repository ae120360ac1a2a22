//! Hardware topology discovery
//!
//! Reads the kernel's CPU and NUMA node description, resolves which caches
//! each CPU shares with CPU 0 and optionally mirrors the raw descriptor files
//! for later inspection.
//!
//! Discovery degrades instead of failing when the description is missing
//! altogether (containers, non-Linux hosts); every such degradation is
//! recorded as a [`CollectionWarning`]. Corrupt descriptors are fatal.

pub mod archive;
pub mod bitmap;
mod cache;
mod collector;
pub mod sysfs;
mod table;

pub use archive::DiagnosticArchive;
pub use cache::{CacheLevelResolver, CacheLevels, SharedCacheLevel, ORIGIN_LEVEL};
pub use collector::TopologyCollector;
pub use sysfs::SysfsTree;
pub use table::{CpuInfo, LocalityClass, NodeInfo, NodeMemory, TopologyTable};

use crate::error::Result;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A non-fatal problem met during discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CollectionWarning {
    /// A whole descriptor root is absent; a synthetic fallback was used
    MissingTopologyInfo {
        /// Root that could not be listed
        path: PathBuf,
        /// Error and the fallback taken
        reason: String,
    },
    /// One auxiliary attribute could not be read or copied
    OptionalAttributeUnavailable {
        /// Attribute or destination file
        path: PathBuf,
        /// Why it was skipped
        reason: String,
    },
}

impl fmt::Display for CollectionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTopologyInfo { path, reason } => {
                write!(f, "Can't read {}: {}", path.display(), reason)
            }
            Self::OptionalAttributeUnavailable { path, reason } => {
                write!(f, "Couldn't read optional attribute {}: {}", path.display(), reason)
            }
        }
    }
}

/// Warnings collected during one discovery run
///
/// Every warning is logged as it is pushed.
#[derive(Debug, Default, Clone)]
pub struct WarningLog {
    warnings: Vec<CollectionWarning>,
}

impl WarningLog {
    /// Record and log a warning
    pub fn push(&mut self, warning: CollectionWarning) {
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Number of warnings recorded
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// True if nothing degraded
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// The recorded warnings, in order
    pub fn as_slice(&self) -> &[CollectionWarning] {
        &self.warnings
    }

    /// Count of fallback-triggering warnings
    pub fn missing_roots(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, CollectionWarning::MissingTopologyInfo { .. }))
            .count()
    }
}

/// Everything discovery learned about the host
#[derive(Debug, Clone, Serialize)]
pub struct Discovery {
    /// CPUs and nodes
    pub table: TopologyTable,
    /// Cache sharing with CPU 0
    pub cache: CacheLevels,
    /// Degradations met along the way
    #[serde(skip)]
    pub warnings: WarningLog,
}

/// Discover the topology under `tree`.
///
/// If `archive` is given, raw descriptor files are mirrored first.
/// Archive failures are only ever warnings.
pub fn discover(tree: &SysfsTree, archive: Option<&DiagnosticArchive>) -> Result<Discovery> {
    let mut warnings = WarningLog::default();

    if let Some(archive) = archive {
        let copied = archive.mirror(tree, &mut warnings);
        tracing::info!("Archived {} descriptor files to {}", copied, archive.dest().display());
    }

    let table = TopologyCollector::new(tree).collect(&mut warnings)?;
    let cache = CacheLevelResolver::new(tree).resolve(&table, &mut warnings)?;

    for cpu in table.cpus() {
        tracing::debug!(
            "CPU {}: socket {}, node {}, best CPU0 shared cache level: {}",
            cpu.id,
            cpu.socket,
            cpu.node,
            cache.level(cpu.id)
        );
    }

    Ok(Discovery {
        table,
        cache,
        warnings,
    })
}

impl Discovery {
    /// Write the table and cache levels as JSON to `<dir>/topology.json`
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        use crate::error::IoResultExt;

        let path = dir.join("topology.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).with_path(&path)?;
        Ok(path)
    }
}
