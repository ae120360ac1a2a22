//! Best-effort archival of raw hardware descriptors
//!
//! Copies the sysfs files behind a run's topology (plus `/proc/cpuinfo`,
//! `/proc/meminfo`, `uname` output and the kernel's virtualization messages)
//! into the run's log directory so that results can later be correlated with
//! the exact machine they came from.
//! Nothing in here can fail discovery: every problem becomes a warning.

use crate::topology::sysfs::{self, SysfsTree};
use crate::topology::{CollectionWarning, WarningLog};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Attributes of each `cpu<N>/cache/index<M>` directory
pub const INDEX_FILES: &[&str] = &[
    "coherency_line_size",
    "level",
    "number_of_sets",
    "physical_line_partition",
    "shared_cpu_list",
    "size",
    "type",
    "ways_of_associativity",
];

/// Attributes of each `cpu<N>/topology` directory
pub const TOPOLOGY_FILES: &[&str] = &[
    "core_id",
    "core_siblings_list",
    "physical_package_id",
    "thread_siblings_list",
];

/// Attributes of each `node<N>` directory
pub const NODE_FILES: &[&str] = &["cpulist", "distance", "meminfo"];

/// Mirrors descriptor files into a destination directory
#[derive(Debug, Clone)]
pub struct DiagnosticArchive {
    dest: PathBuf,
    proc_root: PathBuf,
    capture_commands: bool,
}

impl DiagnosticArchive {
    /// Archive into `dest`, reading process information from `/proc`
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self {
            dest: dest.into(),
            proc_root: PathBuf::from("/proc"),
            capture_commands: true,
        }
    }

    /// Read `cpuinfo` and `meminfo` from another proc root
    pub fn with_proc_root(mut self, proc_root: impl Into<PathBuf>) -> Self {
        self.proc_root = proc_root.into();
        self
    }

    /// Enable or disable capturing `uname` and `dmesg` output
    pub fn with_commands(mut self, capture: bool) -> Self {
        self.capture_commands = capture;
        self
    }

    /// Destination directory
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Copy everything that can be copied; returns the number of files written.
    pub fn mirror(&self, tree: &SysfsTree, warnings: &mut WarningLog) -> usize {
        let mut copied = 0;

        if let Err(e) = fs::create_dir_all(&self.dest) {
            warnings.push(CollectionWarning::OptionalAttributeUnavailable {
                path: self.dest.clone(),
                reason: format!("cannot create archive directory: {}", e),
            });
            return 0;
        }

        for name in ["cpuinfo", "meminfo"] {
            copied += self.copy_file(&self.proc_root.join(name), &self.dest.join(name), warnings);
        }

        if self.capture_commands {
            copied += self.capture("uname", "uname", &["-s", "-r", "-m", "-p", "-i", "-o"], |_| true, warnings);
            copied += self.capture("dmesg_virt", "dmesg", &[], mentions_virtual, warnings);
        }

        copied += self.mirror_cpus(tree, warnings);
        copied += self.mirror_nodes(tree, warnings);
        copied
    }

    fn mirror_cpus(&self, tree: &SysfsTree, warnings: &mut WarningLog) -> usize {
        let cpus = match sysfs::numbered_entries(&tree.cpu_root(), "cpu") {
            Ok(cpus) => cpus,
            Err(e) => {
                tracing::debug!("Not archiving CPU descriptors: {}", e);
                return 0;
            }
        };

        let copy_root = self.dest.join("sys-cpu");
        let mut copied = 0;

        for (id, cpu_dir) in cpus {
            let dest_dir = copy_root.join(format!("cpu{}", id));

            if let Ok(indices) = sysfs::numbered_entries(&cpu_dir.join("cache"), "index") {
                for (index, index_dir) in indices {
                    let index_dest = dest_dir.join("cache").join(format!("index{}", index));
                    copied += self.copy_files(&index_dir, &index_dest, INDEX_FILES, warnings);
                }
            }

            copied += self.copy_files(
                &cpu_dir.join("topology"),
                &dest_dir.join("topology"),
                TOPOLOGY_FILES,
                warnings,
            );
        }

        copied
    }

    fn mirror_nodes(&self, tree: &SysfsTree, warnings: &mut WarningLog) -> usize {
        let nodes = match sysfs::numbered_entries(&tree.node_root(), "node") {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::debug!("Not archiving node descriptors: {}", e);
                return 0;
            }
        };

        let copy_root = self.dest.join("sys-node");
        nodes
            .into_iter()
            .map(|(id, node_dir)| {
                self.copy_files(&node_dir, &copy_root.join(format!("node{}", id)), NODE_FILES, warnings)
            })
            .sum()
    }

    fn copy_files(&self, from_dir: &Path, to_dir: &Path, names: &[&str], warnings: &mut WarningLog) -> usize {
        if let Err(e) = fs::create_dir_all(to_dir) {
            warnings.push(CollectionWarning::OptionalAttributeUnavailable {
                path: to_dir.to_path_buf(),
                reason: format!("cannot create directory: {}", e),
            });
            return 0;
        }

        names
            .iter()
            .map(|name| self.copy_file(&from_dir.join(name), &to_dir.join(name), warnings))
            .sum()
    }

    fn copy_file(&self, from: &Path, to: &Path, warnings: &mut WarningLog) -> usize {
        // sysfs files report a size of 4096 whatever they hold, so read and
        // write instead of fs::copy.
        match fs::read(from).and_then(|content| fs::write(to, content)) {
            Ok(()) => 1,
            Err(e) => {
                warnings.push(CollectionWarning::OptionalAttributeUnavailable {
                    path: from.to_path_buf(),
                    reason: format!("couldn't copy: {}", e),
                });
                0
            }
        }
    }

    /// Run `program` and write the stdout lines accepted by `keep` to `name`.
    /// Nothing is written unless the program exits successfully.
    fn capture(
        &self,
        name: &str,
        program: &str,
        args: &[&str],
        keep: fn(&str) -> bool,
        warnings: &mut WarningLog,
    ) -> usize {
        let path = self.dest.join(name);

        let result = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| e.to_string())
            .and_then(|output| {
                if output.status.success() {
                    Ok(output.stdout)
                } else {
                    Err(format!(
                        "{} {}: {}",
                        program,
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    ))
                }
            })
            .and_then(|stdout| {
                let kept: String = String::from_utf8_lossy(&stdout)
                    .lines()
                    .filter(|line| keep(line))
                    .map(|line| format!("{}\n", line))
                    .collect();
                fs::write(&path, kept).map_err(|e| e.to_string())
            });

        match result {
            Ok(()) => 1,
            Err(reason) => {
                warnings.push(CollectionWarning::OptionalAttributeUnavailable {
                    path,
                    reason: format!("couldn't capture {} output: {}", program, reason),
                });
                0
            }
        }
    }
}

fn mentions_virtual(line: &str) -> bool {
    line.to_lowercase().contains("virtual")
}
