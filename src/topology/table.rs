//! Topology records
//!
//! A [`TopologyTable`] is built once per run and never mutated afterwards.
//! CPU ids are dense (`0..cpu_count`) and CPU 0 is always present; it is the
//! origin of every benchmark pair.

use crate::error::{IpcBenchError, Result};
use crate::topology::bitmap;
use crate::topology::cache::{CacheLevels, SharedCacheLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One logical CPU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuInfo {
    /// Logical CPU id
    pub id: usize,
    /// Physical package (socket) id
    pub socket: usize,
    /// NUMA node the CPU belongs to
    pub node: usize,
    /// CPUs sharing the same physical core, including this one
    pub siblings: BTreeSet<usize>,
}

impl CpuInfo {
    /// Lowest hardware-thread sibling other than the CPU itself
    pub fn first_other_sibling(&self) -> Option<usize> {
        self.siblings.iter().copied().find(|&s| s != self.id)
    }
}

/// Memory attached to a NUMA node, as reported by its `meminfo`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMemory {
    /// Total memory in bytes
    pub total_bytes: u64,
    /// Free memory in bytes
    pub free_bytes: u64,
}

/// One NUMA node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node id
    pub id: usize,
    /// Member CPUs
    pub cpus: BTreeSet<usize>,
    /// Memory information (informational only)
    pub memory: Option<NodeMemory>,
}

/// The hardware layout of one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyTable {
    cpus: Vec<CpuInfo>,
    nodes: Vec<NodeInfo>,
}

/// Equivalence key used to pick benchmark targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalityClass {
    /// Socket id
    pub socket: usize,
    /// NUMA node id
    pub node: usize,
    /// Closest cache shared with CPU 0
    pub cache: SharedCacheLevel,
}

impl TopologyTable {
    /// Build a table from CPU and node records.
    ///
    /// CPUs must be dense and sorted by id starting at 0, and every CPU must
    /// be a member of exactly the node it names.
    pub fn new(cpus: Vec<CpuInfo>, mut nodes: Vec<NodeInfo>) -> Result<Self> {
        if cpus.is_empty() {
            return Err(IpcBenchError::InconsistentTopology(
                "no CPUs in topology".to_string(),
            ));
        }

        for (index, cpu) in cpus.iter().enumerate() {
            if cpu.id != index {
                return Err(IpcBenchError::InconsistentTopology(format!(
                    "CPU ids are not dense: expected cpu{} but found cpu{}",
                    index, cpu.id
                )));
            }
        }

        nodes.sort_by_key(|n| n.id);
        if nodes.windows(2).any(|w| w[0].id == w[1].id) {
            return Err(IpcBenchError::InconsistentTopology(
                "duplicate NUMA node id".to_string(),
            ));
        }

        for cpu in &cpus {
            let owners: Vec<usize> = nodes
                .iter()
                .filter(|n| n.cpus.contains(&cpu.id))
                .map(|n| n.id)
                .collect();

            if owners != [cpu.node] {
                return Err(IpcBenchError::InconsistentTopology(format!(
                    "cpu{} claims node {} but is listed by nodes [{}]",
                    cpu.id,
                    cpu.node,
                    bitmap::format(&owners)
                )));
            }
        }

        Ok(Self { cpus, nodes })
    }

    /// The fallback used when nothing could be discovered: one CPU, one node.
    pub fn degenerate() -> Self {
        Self {
            cpus: vec![CpuInfo {
                id: 0,
                socket: 0,
                node: 0,
                siblings: BTreeSet::from([0]),
            }],
            nodes: vec![NodeInfo {
                id: 0,
                cpus: BTreeSet::from([0]),
                memory: None,
            }],
        }
    }

    /// All CPUs, in id order
    pub fn cpus(&self) -> &[CpuInfo] {
        &self.cpus
    }

    /// All nodes, in id order
    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }

    /// Number of logical CPUs
    pub fn cpu_count(&self) -> usize {
        self.cpus.len()
    }

    /// Number of NUMA nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Look up a CPU by id
    pub fn cpu(&self, id: usize) -> Option<&CpuInfo> {
        self.cpus.get(id)
    }

    /// CPU 0
    pub fn origin(&self) -> &CpuInfo {
        &self.cpus[0]
    }

    /// Locality class of `cpu` relative to CPU 0
    pub fn locality(&self, cpu: &CpuInfo, cache: &CacheLevels) -> LocalityClass {
        LocalityClass {
            socket: cpu.socket,
            node: cpu.node,
            cache: cache.level(cpu.id),
        }
    }

    /// Print a human-readable summary of the topology
    pub fn print_summary(&self, cache: &CacheLevels) {
        println!("Detected system topology:");
        println!("  CPUs:  {}", self.cpu_count());
        println!("  Nodes: {}", self.node_count());

        for node in &self.nodes {
            print!("  Node {}: cpus {}", node.id, bitmap::format(&node.cpus));
            if let Some(memory) = node.memory {
                print!(
                    ", {} / {} free",
                    humansize::format_size(memory.free_bytes, humansize::BINARY),
                    humansize::format_size(memory.total_bytes, humansize::BINARY)
                );
            }
            println!();
        }

        for cpu in &self.cpus {
            println!(
                "  CPU {}: socket {}, node {}, siblings {}, best CPU0 shared cache level: {}",
                cpu.id,
                cpu.socket,
                cpu.node,
                bitmap::format(&cpu.siblings),
                cache.level(cpu.id)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu(id: usize, node: usize) -> CpuInfo {
        CpuInfo {
            id,
            socket: node,
            node,
            siblings: BTreeSet::from([id]),
        }
    }

    fn node(id: usize, cpus: &[usize]) -> NodeInfo {
        NodeInfo {
            id,
            cpus: cpus.iter().copied().collect(),
            memory: None,
        }
    }

    #[test]
    fn test_degenerate() {
        let table = TopologyTable::degenerate();
        assert_eq!(table.cpu_count(), 1);
        assert_eq!(table.node_count(), 1);
        assert_eq!(table.origin().socket, 0);
        assert_eq!(table.origin().node, 0);
        assert_eq!(table.origin().siblings, BTreeSet::from([0]));
    }

    #[test]
    fn test_new_valid() {
        let table = TopologyTable::new(
            vec![cpu(0, 0), cpu(1, 0), cpu(2, 1)],
            vec![node(1, &[2]), node(0, &[0, 1])],
        )
        .unwrap();

        assert_eq!(table.cpu_count(), 3);
        assert_eq!(table.nodes()[0].id, 0);
        assert_eq!(table.cpu(2).unwrap().node, 1);
        assert!(table.cpu(3).is_none());
    }

    #[test]
    fn test_new_rejects_holes() {
        let err = TopologyTable::new(vec![cpu(0, 0), cpu(2, 0)], vec![node(0, &[0, 2])]);
        assert!(matches!(err, Err(IpcBenchError::InconsistentTopology(_))));
    }

    #[test]
    fn test_new_rejects_node_mismatch() {
        let err = TopologyTable::new(vec![cpu(0, 0), cpu(1, 1)], vec![node(0, &[0, 1]), node(1, &[1])]);
        assert!(matches!(err, Err(IpcBenchError::InconsistentTopology(_))));

        let err = TopologyTable::new(vec![cpu(0, 0)], vec![]);
        assert!(matches!(err, Err(IpcBenchError::InconsistentTopology(_))));
    }

    #[test]
    fn test_first_other_sibling() {
        let mut c = cpu(4, 0);
        assert_eq!(c.first_other_sibling(), None);
        c.siblings = BTreeSet::from([4, 12, 20]);
        assert_eq!(c.first_other_sibling(), Some(12));
        c.siblings = BTreeSet::from([0, 4]);
        assert_eq!(c.first_other_sibling(), Some(0));
    }
}
