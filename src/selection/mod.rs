//! Benchmark target selection
//!
//! Decides which CPUs (and NUMA nodes) CPU 0 is benchmarked against.

mod pairs;
mod selector;

pub use pairs::{expand, TestPair};
pub use selector::{select, TargetList, EXHAUSTIVE_CPU_LIMIT, TARGET_RECORD_FILE};
