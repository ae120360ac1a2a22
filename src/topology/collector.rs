//! Topology collection from sysfs
//!
//! Per CPU: `cpu<N>/topology/physical_package_id` and
//! `cpu<N>/topology/thread_siblings_list`. Per node: `node<N>/cpulist` and,
//! for display only, `node<N>/meminfo`.

use crate::error::{IpcBenchError, Result};
use crate::topology::sysfs::{self, SysfsTree};
use crate::topology::table::{CpuInfo, NodeInfo, NodeMemory, TopologyTable};
use crate::topology::{bitmap, CollectionWarning, WarningLog};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Socket and siblings of one CPU, before node assignment
#[derive(Debug)]
struct RawCpu {
    id: usize,
    socket: usize,
    siblings: BTreeSet<usize>,
}

/// Builds a [`TopologyTable`] from a sysfs tree
#[derive(Debug)]
pub struct TopologyCollector<'a> {
    tree: &'a SysfsTree,
}

impl<'a> TopologyCollector<'a> {
    /// Create a collector reading from `tree`
    pub fn new(tree: &'a SysfsTree) -> Self {
        Self { tree }
    }

    /// Collect the topology.
    ///
    /// Falls back to one synthetic CPU and/or one synthetic node when the
    /// corresponding root cannot be listed.
    pub fn collect(&self, warnings: &mut WarningLog) -> Result<TopologyTable> {
        let raw_cpus = self.collect_cpus(warnings)?;
        let raw_nodes = self.collect_nodes(&raw_cpus, warnings)?;

        let mut node_of: BTreeMap<usize, usize> = BTreeMap::new();
        for node in &raw_nodes {
            for &cpu in &node.cpus {
                if let Some(previous) = node_of.insert(cpu, node.id) {
                    return Err(IpcBenchError::InconsistentTopology(format!(
                        "cpu{} is listed by both node{} and node{}",
                        cpu, previous, node.id
                    )));
                }
            }
        }

        let mut nodes = raw_nodes;
        let mut cpus = Vec::with_capacity(raw_cpus.len());

        for raw in raw_cpus {
            let node = match node_of.get(&raw.id) {
                Some(&node) => node,
                None => {
                    // Nodes are sorted and never empty at this point.
                    let home = &mut nodes[0];
                    tracing::warn!(
                        "cpu{} is not listed by any NUMA node, assigning it to node{}",
                        raw.id,
                        home.id
                    );
                    home.cpus.insert(raw.id);
                    home.id
                }
            };

            cpus.push(CpuInfo {
                id: raw.id,
                socket: raw.socket,
                node,
                siblings: raw.siblings,
            });
        }

        let table = TopologyTable::new(cpus, nodes)?;
        tracing::info!(
            "Discovered {} CPUs across {} NUMA nodes",
            table.cpu_count(),
            table.node_count()
        );
        Ok(table)
    }

    fn collect_cpus(&self, warnings: &mut WarningLog) -> Result<Vec<RawCpu>> {
        let cpu_root = self.tree.cpu_root();

        let entries = match sysfs::numbered_entries(&cpu_root, "cpu") {
            Ok(entries) if !entries.is_empty() => entries,
            Ok(_) => {
                return Ok(fallback_cpu(&cpu_root, "no cpu<N> entries".to_string(), warnings));
            }
            Err(e) => return Ok(fallback_cpu(&cpu_root, e.to_string(), warnings)),
        };

        entries
            .into_iter()
            .map(|(id, dir)| read_cpu(id, &dir))
            .collect()
    }

    fn collect_nodes(&self, cpus: &[RawCpu], warnings: &mut WarningLog) -> Result<Vec<NodeInfo>> {
        let node_root = self.tree.node_root();
        let known: BTreeSet<usize> = cpus.iter().map(|c| c.id).collect();

        let entries = match sysfs::numbered_entries(&node_root, "node") {
            Ok(entries) if !entries.is_empty() => entries,
            Ok(_) => {
                return Ok(fallback_node(&node_root, "no node<N> entries".to_string(), known, warnings));
            }
            Err(e) => return Ok(fallback_node(&node_root, e.to_string(), known, warnings)),
        };

        let mut nodes = Vec::with_capacity(entries.len());
        for (id, dir) in entries {
            let cpulist_path = dir.join("cpulist");
            let listed = bitmap::parse(&sysfs::read_required(&cpulist_path)?)
                .map_err(|e| e.with_context(format!("{}", cpulist_path.display())))?;

            let (cpus, unknown): (BTreeSet<usize>, BTreeSet<usize>) =
                listed.into_iter().partition(|cpu| known.contains(cpu));
            if !unknown.is_empty() {
                tracing::debug!(
                    "node{} lists CPUs {} which were not discovered, ignoring them",
                    id,
                    bitmap::format(&unknown)
                );
            }

            let memory = read_node_memory(&dir.join("meminfo"), warnings);
            nodes.push(NodeInfo { id, cpus, memory });
        }

        Ok(nodes)
    }
}

fn fallback_cpu(cpu_root: &Path, reason: String, warnings: &mut WarningLog) -> Vec<RawCpu> {
    warnings.push(CollectionWarning::MissingTopologyInfo {
        path: cpu_root.to_path_buf(),
        reason: format!("{}; don't know how many CPUs we have, assuming 1", reason),
    });

    vec![RawCpu {
        id: 0,
        socket: 0,
        siblings: BTreeSet::from([0]),
    }]
}

fn fallback_node(
    node_root: &Path,
    reason: String,
    cpus: BTreeSet<usize>,
    warnings: &mut WarningLog,
) -> Vec<NodeInfo> {
    warnings.push(CollectionWarning::MissingTopologyInfo {
        path: node_root.to_path_buf(),
        reason: format!("{}; don't know how many NUMA nodes we have, assuming 1 (UMA)", reason),
    });

    vec![NodeInfo {
        id: 0,
        cpus,
        memory: None,
    }]
}

fn read_cpu(id: usize, cpu_dir: &Path) -> Result<RawCpu> {
    let topology_dir = cpu_dir.join("topology");

    let socket = sysfs::read_required_usize(&topology_dir.join("physical_package_id"))?;

    let siblings_path = topology_dir.join("thread_siblings_list");
    let siblings = bitmap::parse(&sysfs::read_required(&siblings_path)?)
        .map_err(|e| e.with_context(format!("{}", siblings_path.display())))?;

    Ok(RawCpu {
        id,
        socket,
        siblings,
    })
}

fn read_node_memory(meminfo_path: &Path, warnings: &mut WarningLog) -> Option<NodeMemory> {
    let content = match sysfs::read_optional(meminfo_path) {
        Ok(content) => content,
        Err(e) => {
            warnings.push(CollectionWarning::OptionalAttributeUnavailable {
                path: meminfo_path.to_path_buf(),
                reason: e.to_string(),
            });
            return None;
        }
    };

    let mut total = None;
    let mut free = None;

    for line in content.lines() {
        if line.contains("MemTotal:") {
            total = parse_meminfo_value(line);
        } else if line.contains("MemFree:") {
            free = parse_meminfo_value(line);
        }
    }

    Some(NodeMemory {
        total_bytes: total?,
        free_bytes: free?,
    })
}

/// Format: "Node 0 MemTotal:       16314772 kB"
fn parse_meminfo_value(line: &str) -> Option<u64> {
    line.split_whitespace()
        .nth(3)
        .and_then(|s| s.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}
