//! Expansion of targets into (CPU, NUMA node) test pairs
//!
//! Each target is benchmarked with its buffers allocated on its own node.
//! Targets on a node other than CPU 0's are additionally benchmarked with
//! buffers on CPU 0's node, which exercises the remote-allocation path.

use crate::selection::TargetList;
use crate::topology::TopologyTable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One benchmark placement: consumer CPU and memory node
///
/// The producer side is always CPU 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestPair {
    /// CPU the consumer runs on
    pub cpu: usize,
    /// NUMA node to allocate shared buffers on
    pub node: usize,
}

impl fmt::Display for TestPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0-{} [node {}]", self.cpu, self.node)
    }
}

/// Expand `targets` into test pairs, in target order.
///
/// Targets missing from `table` are skipped.
pub fn expand(table: &TopologyTable, targets: &TargetList) -> Vec<TestPair> {
    let origin_node = table.origin().node;
    let mut pairs = Vec::with_capacity(targets.len() * 2);

    for cpu in targets.cpus().iter().filter_map(|&id| table.cpu(id)) {
        pairs.push(TestPair {
            cpu: cpu.id,
            node: cpu.node,
        });

        if cpu.node != origin_node {
            pairs.push(TestPair {
                cpu: cpu.id,
                node: origin_node,
            });
        }
    }

    pairs
}
