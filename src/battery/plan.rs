//! The benchmark battery as a flat list of invocations

use crate::config::{BatteryProgram, ChunkRepeat};
use crate::selection::TestPair;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// CPU every producer is pinned to
pub const PRODUCER_CPU: usize = 0;

/// One run of one external benchmark program
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    /// Executable name
    pub program: String,
    /// Safe (copy-before-verify) form
    pub safe: bool,
    /// Bytes per message
    pub chunk_size: u64,
    /// Number of messages
    pub repeats: u64,
    /// CPU the producer is bound to
    pub producer_cpu: usize,
    /// CPU the consumer is bound to
    pub consumer_cpu: usize,
    /// NUMA node shared buffers are allocated on
    pub numa_node: usize,
}

impl Invocation {
    /// Command-line arguments for the benchmark program.
    ///
    /// Always: throughput mode, write in place, verify, produce with
    /// `rep stosq` (`-m 2`). In-place (non-safe) runs also read in place.
    pub fn args(&self, output_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "-t".to_string(),
            "-s".to_string(),
            self.chunk_size.to_string(),
            "-c".to_string(),
            self.repeats.to_string(),
            "-a".to_string(),
            self.producer_cpu.to_string(),
            "-b".to_string(),
            self.consumer_cpu.to_string(),
            "-n".to_string(),
            self.numa_node.to_string(),
            "-o".to_string(),
            output_dir.display().to_string(),
            "-w".to_string(),
            "-v".to_string(),
            "-m".to_string(),
            "2".to_string(),
        ];

        if !self.safe {
            args.push("-r".to_string());
        }

        args
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} {}B x{} cpus {}-{} node {}",
            self.program,
            if self.safe { " (safe)" } else { "" },
            self.chunk_size,
            self.repeats,
            self.producer_cpu,
            self.consumer_cpu,
            self.numa_node
        )
    }
}

/// Every invocation of one run, in execution order
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatteryPlan {
    invocations: Vec<Invocation>,
}

impl BatteryPlan {
    /// Cross programs, chunk sizes and pairs.
    ///
    /// Spinning programs are skipped for pairs whose consumer is the
    /// producer CPU itself.
    pub fn build(programs: &[BatteryProgram], chunk_repeats: &[ChunkRepeat], pairs: &[TestPair]) -> Self {
        let mut invocations = Vec::new();

        for program in programs {
            for chunk in chunk_repeats {
                for pair in pairs {
                    if program.spins && pair.cpu == PRODUCER_CPU {
                        continue;
                    }

                    invocations.push(Invocation {
                        program: program.name.clone(),
                        safe: program.safe,
                        chunk_size: chunk.chunk_size,
                        repeats: chunk.repeats,
                        producer_cpu: PRODUCER_CPU,
                        consumer_cpu: pair.cpu,
                        numa_node: pair.node,
                    });
                }
            }
        }

        Self { invocations }
    }

    /// Planned invocations
    pub fn invocations(&self) -> &[Invocation] {
        &self.invocations
    }

    /// Number of invocations
    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    /// True if nothing would run
    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_chunk_repeats, default_programs};

    fn pairs() -> Vec<TestPair> {
        vec![
            TestPair { cpu: 0, node: 0 },
            TestPair { cpu: 1, node: 0 },
            TestPair { cpu: 4, node: 1 },
            TestPair { cpu: 4, node: 0 },
        ]
    }

    #[test]
    fn test_plan_size() {
        let plan = BatteryPlan::build(&default_programs(), &default_chunk_repeats(), &pairs());

        // 11 programs x 3 chunk sizes x 4 pairs, minus 2 spin programs x 3 chunks on cpu 0
        assert_eq!(plan.len(), 11 * 3 * 4 - 2 * 3);
        assert!(!plan
            .invocations()
            .iter()
            .any(|i| i.program == "mempipe_spin_thr" && i.consumer_cpu == 0));
    }

    #[test]
    fn test_plan_order() {
        let programs = vec![BatteryProgram {
            name: "pipe_thr".to_string(),
            safe: false,
            spins: false,
        }];
        let plan = BatteryPlan::build(&programs, &default_chunk_repeats(), &pairs()[1..3]);

        let order: Vec<(u64, usize)> = plan
            .invocations()
            .iter()
            .map(|i| (i.chunk_size, i.consumer_cpu))
            .collect();
        assert_eq!(
            order,
            vec![(64, 1), (64, 4), (4096, 1), (4096, 4), (65536, 1), (65536, 4)]
        );
    }

    #[test]
    fn test_args() {
        let invocation = Invocation {
            program: "shmem_pipe_thr".to_string(),
            safe: false,
            chunk_size: 4096,
            repeats: 1000,
            producer_cpu: 0,
            consumer_cpu: 4,
            numa_node: 1,
        };

        let args = invocation.args(Path::new("/tmp/results"));
        assert_eq!(
            args.join(" "),
            "-t -s 4096 -c 1000 -a 0 -b 4 -n 1 -o /tmp/results -w -v -m 2 -r"
        );

        let safe = Invocation { safe: true, ..invocation };
        assert_eq!(safe.args(Path::new("/tmp/results")).last().unwrap(), "2");
        assert_eq!(safe.to_string(), "shmem_pipe_thr (safe) 4096B x1000 cpus 0-4 node 1");
    }
}
