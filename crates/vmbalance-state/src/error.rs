//! Error types for the cluster snapshot.

use thiserror::Error;

/// Result type alias for snapshot operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors raised while assembling or mutating a [`crate::ClusterState`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    #[error("duplicate workload {workload} (on {first} and {second})")]
    DuplicateWorkload {
        workload: String,
        first: String,
        second: String,
    },

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("workload not found: {0}")]
    WorkloadNotFound(String),

    #[error("anti-affinity group {group} references unknown workload {workload}")]
    UnknownGroupMember { group: usize, workload: String },
}
