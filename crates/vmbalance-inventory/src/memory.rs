//! In-memory inventory double.
//!
//! Holds nodes and workloads in ordered maps, records every relocation
//! call, and can be scripted to fail listings or specific migrations.
//! Successful migrations move the workload record to the target node so
//! a follow-up cycle observes the new placement.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use vmbalance_state::{NodeRecord, WorkloadRecord};

use crate::Inventory;
use crate::error::{InventoryError, InventoryResult};

/// A relocation call as received by the double.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationCall {
    pub node: String,
    pub vmid: u32,
    pub target: String,
    pub online: bool,
}

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<String, NodeRecord>,
    workloads: BTreeMap<String, Vec<WorkloadRecord>>,
    calls: Vec<MigrationCall>,
    list_failure: Option<InventoryError>,
    /// vmid → errors returned by successive migrate attempts.
    migrate_failures: HashMap<u32, VecDeque<InventoryError>>,
}

#[derive(Default)]
pub struct InMemoryInventory {
    inner: Mutex<Inner>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an online node.
    pub fn with_node(self, name: &str, maxcpu: f64, maxmem: u64) -> Self {
        {
            let mut inner = self.lock();
            inner.nodes.insert(
                name.to_string(),
                NodeRecord {
                    node: name.to_string(),
                    maxcpu,
                    maxmem,
                    status: Some("online".to_string()),
                },
            );
            inner.workloads.entry(name.to_string()).or_default();
        }
        self
    }

    /// Add a node that reports a status other than `online`.
    ///
    /// Like the Proxmox client, listings leave it out, so its workloads
    /// are invisible to a cycle.
    pub fn with_offline_node(self, name: &str, maxcpu: f64, maxmem: u64) -> Self {
        {
            let mut inner = self.lock();
            inner.nodes.insert(
                name.to_string(),
                NodeRecord {
                    node: name.to_string(),
                    maxcpu,
                    maxmem,
                    status: Some("offline".to_string()),
                },
            );
            inner.workloads.entry(name.to_string()).or_default();
        }
        self
    }

    /// Add a workload to an existing node.
    pub fn with_workload(self, node: &str, workload: WorkloadRecord) -> Self {
        self.lock()
            .workloads
            .entry(node.to_string())
            .or_default()
            .push(workload);
        self
    }

    /// Make every listing call fail with `err`.
    pub fn fail_listing(&self, err: InventoryError) {
        self.lock().list_failure = Some(err);
    }

    /// Queue errors for successive migrate attempts of `vmid`.
    pub fn fail_migration(&self, vmid: u32, errors: impl IntoIterator<Item = InventoryError>) {
        self.lock()
            .migrate_failures
            .entry(vmid)
            .or_default()
            .extend(errors);
    }

    /// Every migrate call received so far, including failed ones.
    pub fn migrations(&self) -> Vec<MigrationCall> {
        self.lock().calls.clone()
    }

    /// Node currently hosting `vmid`.
    pub fn location_of(&self, vmid: u32) -> Option<String> {
        self.lock()
            .workloads
            .iter()
            .find(|(_, vms)| vms.iter().any(|w| w.vmid == vmid))
            .map(|(node, _)| node.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Inventory for InMemoryInventory {
    async fn list_nodes(&self) -> InventoryResult<Vec<NodeRecord>> {
        let inner = self.lock();
        if let Some(err) = &inner.list_failure {
            return Err(err.clone());
        }
        Ok(inner
            .nodes
            .values()
            .filter(|n| n.is_online())
            .cloned()
            .collect())
    }

    async fn list_workloads(&self, node: &str) -> InventoryResult<Vec<WorkloadRecord>> {
        let inner = self.lock();
        if let Some(err) = &inner.list_failure {
            return Err(err.clone());
        }
        if !inner.nodes.contains_key(node) {
            return Err(InventoryError::NodeNotFound(node.to_string()));
        }
        Ok(inner.workloads.get(node).cloned().unwrap_or_default())
    }

    async fn migrate_workload(
        &self,
        node: &str,
        vmid: u32,
        target: &str,
        online: bool,
    ) -> InventoryResult<()> {
        let mut inner = self.lock();
        inner.calls.push(MigrationCall {
            node: node.to_string(),
            vmid,
            target: target.to_string(),
            online,
        });

        if let Some(err) = inner
            .migrate_failures
            .get_mut(&vmid)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        if !inner.nodes.contains_key(target) {
            return Err(InventoryError::NodeNotFound(target.to_string()));
        }

        let source = inner
            .workloads
            .get_mut(node)
            .ok_or_else(|| InventoryError::NodeNotFound(node.to_string()))?;
        let index = source
            .iter()
            .position(|w| w.vmid == vmid)
            .ok_or_else(|| InventoryError::WorkloadNotFound {
                node: node.to_string(),
                vmid,
            })?;
        let record = source.remove(index);
        inner.workloads.entry(target.to_string()).or_default().push(record);

        debug!(vmid, from = node, to = target, "in-memory migration applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm(name: &str, vmid: u32) -> WorkloadRecord {
        WorkloadRecord {
            name: Some(name.to_string()),
            vmid,
            status: "running".to_string(),
            cpu: 1.0,
            mem: 1 << 30,
            maxcpu: 2.0,
            maxmem: 2 << 30,
        }
    }

    fn inventory() -> InMemoryInventory {
        InMemoryInventory::new()
            .with_node("pve2", 8.0, 32 << 30)
            .with_node("pve1", 8.0, 32 << 30)
            .with_workload("pve1", vm("web1", 101))
    }

    #[tokio::test]
    async fn lists_nodes_in_name_order() {
        let inv = inventory();
        let nodes = inv.list_nodes().await.unwrap();
        let names: Vec<_> = nodes.iter().map(|n| n.node.as_str()).collect();
        assert_eq!(names, vec!["pve1", "pve2"]);
    }

    #[tokio::test]
    async fn offline_nodes_are_not_listed() {
        let inv = inventory()
            .with_offline_node("pve3", 8.0, 32 << 30)
            .with_workload("pve3", vm("db1", 301));
        let nodes = inv.list_nodes().await.unwrap();
        assert!(nodes.iter().all(|n| n.node != "pve3"));
        assert_eq!(inv.location_of(301).as_deref(), Some("pve3"));
    }

    #[tokio::test]
    async fn lists_workloads_per_node() {
        let inv = inventory();
        assert_eq!(inv.list_workloads("pve1").await.unwrap().len(), 1);
        assert!(inv.list_workloads("pve2").await.unwrap().is_empty());
        assert_eq!(
            inv.list_workloads("pve9").await.unwrap_err(),
            InventoryError::NodeNotFound("pve9".into())
        );
    }

    #[tokio::test]
    async fn migrate_moves_record_and_records_call() {
        let inv = inventory();
        inv.migrate_workload("pve1", 101, "pve2", true).await.unwrap();

        assert_eq!(inv.location_of(101).as_deref(), Some("pve2"));
        assert_eq!(
            inv.migrations(),
            vec![MigrationCall {
                node: "pve1".into(),
                vmid: 101,
                target: "pve2".into(),
                online: true,
            }]
        );
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let inv = inventory();
        inv.fail_migration(101, [InventoryError::Timeout("1".into())]);

        let first = inv.migrate_workload("pve1", 101, "pve2", true).await;
        assert_eq!(first.unwrap_err(), InventoryError::Timeout("1".into()));
        assert_eq!(inv.location_of(101).as_deref(), Some("pve1"));

        inv.migrate_workload("pve1", 101, "pve2", true).await.unwrap();
        assert_eq!(inv.migrations().len(), 2);
    }

    #[tokio::test]
    async fn listing_failure_applies_to_all_listings() {
        let inv = inventory();
        inv.fail_listing(InventoryError::Transport("down".into()));
        assert!(inv.list_nodes().await.is_err());
        assert!(inv.list_workloads("pve1").await.is_err());
    }

    #[tokio::test]
    async fn unknown_vmid_is_not_found() {
        let inv = inventory();
        let err = inv.migrate_workload("pve1", 999, "pve2", true).await.unwrap_err();
        assert_eq!(err, InventoryError::WorkloadNotFound { node: "pve1".into(), vmid: 999 });
    }
}
