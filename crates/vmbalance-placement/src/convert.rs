//! Cluster state builder.
//!
//! Bridges raw inventory records (`vmbalance_state::{NodeRecord,
//! WorkloadRecord}`) to a scored [`ClusterState`]. Callers must hand in
//! the complete inventory; a failed fetch never reaches this point, so
//! no partial state is ever planned on.
//!
//! Workload names are not unique in Proxmox. A name shared only by
//! stopped VMs, or by stopped VMs and a single running one, is fine as
//! long as no anti-affinity rule names it: the stopped copies are keyed
//! by `vm-{vmid}` instead. Any other repeat is rejected.

use std::collections::HashMap;

use tracing::debug;

use vmbalance_state::{
    AntiAffinityGroup, ClusterState, NodeRecord, Workload, WorkloadRecord, WorkloadStatus,
};

use crate::error::PlacementResult;
use crate::scorer::Scorer;

/// A node together with the workloads it reported.
#[derive(Debug, Clone)]
pub struct NodeInventory {
    pub node: NodeRecord,
    pub workloads: Vec<WorkloadRecord>,
}

/// Build and validate a [`ClusterState`].
///
/// Every node's capacity comes from its maxima. Running workloads are
/// scored with `scorer` and accumulated into their node's used points;
/// other workloads are recorded with zero points. Group members that
/// match no workload are a constraint violation.
pub fn build_cluster_state(
    inventory: &[NodeInventory],
    groups: &[Vec<String>],
    scorer: &Scorer,
) -> PlacementResult<ClusterState> {
    let groups = groups
        .iter()
        .map(|members| AntiAffinityGroup::new(members.iter().cloned()))
        .collect();
    let mut state = ClusterState::new(groups);

    for entry in inventory {
        state.add_node(entry.node.node.clone(), scorer.node_capacity(&entry.node))?;
    }

    let names = name_counts(inventory);

    for entry in inventory {
        for record in &entry.workloads {
            let status = WorkloadStatus::parse(&record.status);
            let points = if status.is_running() {
                scorer.workload_points(record)
            } else {
                0.0
            };
            let mut id = record.workload_id();
            if !status.is_running() && rekey_stopped_duplicate(&state, &names, &id) {
                let unique = format!("vm-{}", record.vmid);
                debug!(
                    node = %entry.node.node,
                    name = %id,
                    id = %unique,
                    "stopped workload shares its name, keyed by vmid"
                );
                id = unique;
            }
            let workload = Workload::new(
                id,
                record.vmid,
                entry.node.node.clone(),
                status,
                points,
            );
            debug!(
                node = %entry.node.node,
                workload = %workload.id,
                status = %workload.status,
                points = workload.points,
                "recorded workload"
            );
            state.add_workload(workload)?;
        }
    }

    state.validate_groups()?;
    Ok(state)
}

/// Per name: how many workloads carry it, and how many of those run.
#[derive(Debug, Default, Clone, Copy)]
struct NameCount {
    total: usize,
    running: usize,
}

fn name_counts(inventory: &[NodeInventory]) -> HashMap<String, NameCount> {
    let mut names: HashMap<String, NameCount> = HashMap::new();
    for record in inventory.iter().flat_map(|entry| &entry.workloads) {
        let count = names.entry(record.workload_id()).or_default();
        count.total += 1;
        if WorkloadStatus::parse(&record.status).is_running() {
            count.running += 1;
        }
    }
    names
}

fn rekey_stopped_duplicate(
    state: &ClusterState,
    names: &HashMap<String, NameCount>,
    id: &str,
) -> bool {
    let Some(count) = names.get(id) else {
        return false;
    };
    count.total > 1
        && count.running <= 1
        && !state.groups().iter().any(|g| g.contains(id))
}
