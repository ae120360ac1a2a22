//! Benchmark target selection
//!
//! Pairing CPU 0 with every other CPU is quadratic in the size of the
//! battery, so on anything bigger than a few CPUs we pick one representative
//! per locality class instead: same core, then every distinct
//! (socket, node, shared cache) combination.

use crate::error::{IoResultExt, Result};
use crate::topology::{CacheLevels, LocalityClass, TopologyTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Machines with at most this many CPUs are tested exhaustively
pub const EXHAUSTIVE_CPU_LIMIT: usize = 4;

/// File name of the persisted target record
pub const TARGET_RECORD_FILE: &str = "target_cpus";

/// CPUs chosen to be paired with CPU 0, in selection order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetList {
    cpus: Vec<usize>,
}

impl TargetList {
    /// Selected CPU ids
    pub fn cpus(&self) -> &[usize] {
        &self.cpus
    }

    /// Number of targets
    pub fn len(&self) -> usize {
        self.cpus.len()
    }

    /// True if there is nothing to test
    pub fn is_empty(&self) -> bool {
        self.cpus.is_empty()
    }

    /// Comma-separated form, e.g. `1,2,4`
    pub fn record(&self) -> String {
        self.cpus
            .iter()
            .map(|cpu| cpu.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Write [`record`](Self::record) to `<dir>/target_cpus`
    pub fn write_record(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(TARGET_RECORD_FILE);
        std::fs::write(&path, self.record()).with_path(&path)?;
        Ok(path)
    }
}

/// Choose the CPUs to pair with CPU 0.
///
/// Deterministic: CPUs are visited in ascending id order and the first CPU of
/// each locality class wins.
pub fn select(table: &TopologyTable, cache: &CacheLevels) -> TargetList {
    if table.cpu_count() <= EXHAUSTIVE_CPU_LIMIT {
        return TargetList {
            cpus: (0..table.cpu_count()).collect(),
        };
    }

    let origin = table.origin();
    let mut cpus = Vec::new();
    let mut seen: BTreeSet<LocalityClass> = BTreeSet::new();
    seen.insert(table.locality(origin, cache));

    let sibling = origin.first_other_sibling();
    if let Some(sibling) = sibling.and_then(|id| table.cpu(id)) {
        cpus.push(sibling.id);
        seen.insert(table.locality(sibling, cache));
    }

    for cpu in table.cpus().iter().skip(1) {
        if Some(cpu.id) == sibling {
            continue;
        }

        if seen.insert(table.locality(cpu, cache)) {
            cpus.push(cpu.id);
        }
    }

    TargetList { cpus }
}
