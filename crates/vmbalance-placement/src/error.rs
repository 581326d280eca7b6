//! Placement error types.

use thiserror::Error;

use vmbalance_state::StateError;

/// Errors that abort analysis or planning for a cycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("cluster has no nodes")]
    EmptyCluster,

    #[error("anti-affinity group {group} references unknown workload {workload}")]
    ConstraintViolation { group: usize, workload: String },

    #[error("invalid inventory: {0}")]
    InvalidInventory(String),
}

impl From<StateError> for PlacementError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::UnknownGroupMember { group, workload } => {
                PlacementError::ConstraintViolation { group, workload }
            }
            other => PlacementError::InvalidInventory(other.to_string()),
        }
    }
}

pub type PlacementResult<T> = Result<T, PlacementError>;
