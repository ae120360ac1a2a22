//! Cache sharing relative to CPU 0
//!
//! Each `cpu0/cache/index<N>` directory describes one cache CPU 0 uses: its
//! `level` and the `shared_cpu_list` of every CPU that uses it too. A CPU's
//! shared level is the lowest level over all indices that list it.

use crate::error::{IpcBenchError, Result};
use crate::topology::sysfs::{self, SysfsTree};
use crate::topology::table::TopologyTable;
use crate::topology::{bitmap, CollectionWarning, WarningLog};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Level CPU 0 shares with itself
pub const ORIGIN_LEVEL: u32 = 1;

/// Closest cache a CPU shares with CPU 0
///
/// `Memory` orders after every numeric level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedCacheLevel {
    /// Cache level (1 = L1, 2 = L2, ...)
    Level(u32),
    /// No shared cache; the CPUs only share memory
    Memory,
}

impl fmt::Display for SharedCacheLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level(level) => write!(f, "{}", level),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Shared cache level with CPU 0 for every CPU of a topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheLevels {
    levels: Vec<SharedCacheLevel>,
}

impl CacheLevels {
    /// Every CPU shares only memory with CPU 0
    pub fn all_memory(cpu_count: usize) -> Self {
        Self {
            levels: vec![SharedCacheLevel::Memory; cpu_count],
        }
    }

    /// Build from explicit per-CPU levels, indexed by CPU id
    pub fn from_levels(levels: Vec<SharedCacheLevel>) -> Self {
        Self { levels }
    }

    /// Level for `cpu`; unknown CPUs share only memory
    pub fn level(&self, cpu: usize) -> SharedCacheLevel {
        self.levels
            .get(cpu)
            .copied()
            .unwrap_or(SharedCacheLevel::Memory)
    }

    /// Levels indexed by CPU id
    pub fn as_slice(&self) -> &[SharedCacheLevel] {
        &self.levels
    }

    /// Record that `cpu` shares a cache of `level`, keeping the closest one
    fn record(&mut self, cpu: usize, level: u32) {
        if let Some(slot) = self.levels.get_mut(cpu) {
            let candidate = SharedCacheLevel::Level(level);
            if candidate < *slot {
                *slot = candidate;
            }
        }
    }
}

/// Resolves the cache levels shared with CPU 0
#[derive(Debug)]
pub struct CacheLevelResolver<'a> {
    tree: &'a SysfsTree,
}

impl<'a> CacheLevelResolver<'a> {
    /// Create a resolver reading from `tree`
    pub fn new(tree: &'a SysfsTree) -> Self {
        Self { tree }
    }

    /// Resolve levels for every CPU in `table`.
    ///
    /// CPU 0 always shares level 1 with itself. A missing cache directory
    /// degrades to "memory" for every other CPU. A cache index that exists
    /// but cannot be read or parsed is fatal.
    pub fn resolve(&self, table: &TopologyTable, warnings: &mut WarningLog) -> Result<CacheLevels> {
        let mut levels = CacheLevels::all_memory(table.cpu_count());
        levels.record(0, ORIGIN_LEVEL);

        let cache_dir = self.tree.cpu_dir(0).join("cache");

        let indices = match sysfs::numbered_entries(&cache_dir, "index") {
            Ok(indices) => indices,
            Err(e) => {
                warnings.push(CollectionWarning::MissingTopologyInfo {
                    path: cache_dir,
                    reason: format!("{}; assuming no CPU shares a cache with CPU 0", e),
                });
                return Ok(levels);
            }
        };

        for (index, index_dir) in indices {
            let shared_path = index_dir.join("shared_cpu_list");
            let shared = bitmap::parse(&sysfs::read_required(&shared_path)?)
                .map_err(|e| e.with_context(format!("{}", shared_path.display())))?;

            let level_path = index_dir.join("level");
            let level = sysfs::read_required_usize(&level_path)?;
            let level = u32::try_from(level).map_err(|_| {
                IpcBenchError::invalid_attribute(&level_path, level.to_string(), "cache level out of range")
            })?;

            tracing::debug!(
                "cpu0 cache index{}: level {} shared with {}",
                index,
                level,
                bitmap::format(&shared)
            );

            for cpu in shared {
                levels.record(cpu, level);
            }
        }

        Ok(levels)
    }
}
