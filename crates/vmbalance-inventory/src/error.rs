//! Inventory error types.

use thiserror::Error;

/// Errors raised by an [`crate::Inventory`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("workload {vmid} not found on {node}")]
    WorkloadNotFound { node: String, vmid: u32 },
}

impl InventoryError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            InventoryError::Transport(_) | InventoryError::Timeout(_) => true,
            InventoryError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether a failed migrate request can be sent again.
    ///
    /// Narrower than [`is_transient`](Self::is_transient): a timeout may
    /// mean the migration task already started, and Proxmox answers most
    /// refusals ("VM is locked") with a plain 500. Only gateway and
    /// availability statuses and transport failures qualify.
    pub fn is_retryable_migration(&self) -> bool {
        match self {
            InventoryError::Transport(_) => true,
            InventoryError::Status { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for InventoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InventoryError::Timeout(err.to_string())
        } else if err.is_decode() {
            InventoryError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            InventoryError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            InventoryError::Transport(err.to_string())
        }
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;
