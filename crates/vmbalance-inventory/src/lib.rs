//! vmbalance-inventory — the hypervisor collaborator boundary.
//!
//! The balancing engine only ever sees the [`Inventory`] trait:
//!
//! - [`ProxmoxClient`] talks to a live Proxmox VE cluster over its REST API
//! - [`InMemoryInventory`] is a deterministic double for tests and demos

pub mod error;
pub mod memory;
pub mod proxmox;

use async_trait::async_trait;

use vmbalance_state::{NodeRecord, WorkloadRecord};

pub use error::{InventoryError, InventoryResult};
pub use memory::{InMemoryInventory, MigrationCall};
pub use proxmox::ProxmoxClient;

/// Source of live cluster state and executor of relocations.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Every node in the cluster.
    async fn list_nodes(&self) -> InventoryResult<Vec<NodeRecord>>;

    /// Every virtual machine on `node`, in any state.
    async fn list_workloads(&self, node: &str) -> InventoryResult<Vec<WorkloadRecord>>;

    /// Relocate `vmid` from `node` to `target`.
    async fn migrate_workload(
        &self,
        node: &str,
        vmid: u32,
        target: &str,
        online: bool,
    ) -> InventoryResult<()>;
}
