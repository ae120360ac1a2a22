//! Rooted view of the kernel's hardware description tree
//!
//! All discovery reads go through [`SysfsTree`] so that the engine can be
//! pointed at a copy of another machine's `/sys` (or a fake tree in tests).
//! The files are tiny and live in memory on the kernel side, so every read is
//! plain synchronous I/O.

use crate::error::{IoResultExt, IpcBenchError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Per-CPU directory, relative to the sysfs root
pub const CPU_DIR: &str = "devices/system/cpu";

/// Per-node directory, relative to the sysfs root
pub const NODE_DIR: &str = "devices/system/node";

/// A sysfs tree rooted at some directory (normally `/sys`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsTree {
    root: PathBuf,
}

impl Default for SysfsTree {
    fn default() -> Self {
        Self::new("/sys")
    }
}

impl SysfsTree {
    /// Create a tree rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/devices/system/cpu`
    pub fn cpu_root(&self) -> PathBuf {
        self.root.join(CPU_DIR)
    }

    /// `<root>/devices/system/node`
    pub fn node_root(&self) -> PathBuf {
        self.root.join(NODE_DIR)
    }

    /// `<root>/devices/system/cpu/cpu<id>`
    pub fn cpu_dir(&self, cpu: usize) -> PathBuf {
        self.cpu_root().join(format!("cpu{}", cpu))
    }

    /// `<root>/devices/system/node/node<id>`
    pub fn node_dir(&self, node: usize) -> PathBuf {
        self.node_root().join(format!("node{}", node))
    }
}

/// List the entries of `dir` named `<prefix><N>`, sorted by `N`.
///
/// Names that merely start with the prefix (`cpufreq`, `cpuidle`, `node_x`)
/// are ignored. Fails only if `dir` itself cannot be listed.
pub fn numbered_entries(dir: &Path, prefix: &str) -> io::Result<Vec<(usize, PathBuf)>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)?.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();

        if let Some(id) = numbered_suffix(&name_str, prefix) {
            entries.push((id, entry.path()));
        }
    }

    entries.sort_by_key(|(id, _)| *id);
    Ok(entries)
}

fn numbered_suffix(name: &str, prefix: &str) -> Option<usize> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Read an attribute that discovery cannot do without.
pub fn read_required(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| IpcBenchError::MissingAttribute {
        path: path.to_path_buf(),
        source,
    })
}

/// Read an attribute and parse it as a single non-negative integer.
pub fn read_required_usize(path: &Path) -> Result<usize> {
    let raw = read_required(path)?;
    raw.trim()
        .parse()
        .map_err(|e| IpcBenchError::invalid_attribute(path, raw.trim(), format!("{}", e)))
}

/// Read an attribute whose absence is tolerable.
pub fn read_optional(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_path(path)
}
