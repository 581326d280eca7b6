//! Load-point scoring.
//!
//! Folds CPU cores and memory into a single comparable scalar:
//!
//! ```text
//! points = cpu_cores * cpu_weight + memory_bytes / GiB * mem_weight
//! ```
//!
//! Node capacity is always scored from node maxima. Workloads are scored
//! from live usage or allocated maxima depending on [`ScoringMethod`].

use vmbalance_core::{BYTES_PER_GIB, ScoringMethod, ScoringWeights};
use vmbalance_state::{NodeRecord, WorkloadRecord};

/// Cluster-wide scoring parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    pub method: ScoringMethod,
    pub weights: ScoringWeights,
}

impl Scorer {
    pub fn new(method: ScoringMethod, weights: ScoringWeights) -> Self {
        Self { method, weights }
    }

    /// Score raw CPU and memory figures.
    pub fn score(&self, cpu_cores: f64, memory_bytes: u64) -> f64 {
        cpu_cores * self.weights.cpu_weight
            + (memory_bytes as f64 / BYTES_PER_GIB) * self.weights.mem_weight
    }

    /// Total capacity of a node.
    pub fn node_capacity(&self, node: &NodeRecord) -> f64 {
        self.score(node.maxcpu, node.maxmem)
    }

    /// Load points of a workload under the configured method.
    pub fn workload_points(&self, workload: &WorkloadRecord) -> f64 {
        match self.method {
            ScoringMethod::Current => self.score(workload.cpu, workload.mem),
            ScoringMethod::Max => self.score(workload.maxcpu, workload.maxmem),
        }
    }
}
