//! Scheduler error types.

use thiserror::Error;

/// Errors that abort a balancing cycle.
///
/// Individual migration failures are not cycle errors; they are reported
/// per operation in [`crate::ExecutionReport`].
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("inventory error: {0}")]
    Inventory(#[from] vmbalance_inventory::InventoryError),

    #[error("placement error: {0}")]
    Placement(#[from] vmbalance_placement::PlacementError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
