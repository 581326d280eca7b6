//! Greedy largest-first migration planner.
//!
//! A single sequential pass, not a global optimizer:
//!
//! 1. Running workloads are visited once each, heaviest first (ties by id).
//! 2. For each workload, every other node that hosts no anti-affinity peer
//!    is a candidate; its projected load is `used + workload.points`.
//! 3. A candidate is eligible only if its projected load is strictly below
//!    the source node's current load.
//! 4. The eligible candidate with the smallest projected load wins (ties by
//!    node id). The move is applied to the working copy immediately, so
//!    later decisions see it.
//!
//! There is no second pass. Residual skew is left for the next cycle.

use std::cmp::Ordering;

use tracing::{debug, info};

use vmbalance_state::{ClusterState, MigrationOperation, NodeId, WorkloadId};

use crate::error::PlacementResult;

/// Result of a planning pass.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Relocations in the order they must be applied.
    pub operations: Vec<MigrationOperation>,
    /// The working copy after every planned move.
    pub state: ClusterState,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Plan relocations for `state`.
///
/// `state` itself is not modified; the projected post-move state is
/// returned in [`Plan::state`]. Fails if an anti-affinity group names a
/// workload the cluster does not know.
pub fn plan_migrations(state: &ClusterState) -> PlacementResult<Plan> {
    state.validate_groups()?;

    let mut working = state.clone();
    let mut operations = Vec::new();

    for (workload, points) in visit_order(&working) {
        let Some(source) = working.workload(&workload).map(|w| w.node.clone()) else {
            continue;
        };
        let Some(target) = best_target(&working, &workload, &source, points) else {
            debug!(workload = %workload, node = %source, points, "no eligible target, left in place");
            continue;
        };

        let vmid = working.workload(&workload).map(|w| w.vmid).unwrap_or_default();
        working.move_workload(&workload, &target)?;

        info!(
            workload = %workload,
            from = %source,
            to = %target,
            points,
            "planned migration"
        );
        operations.push(MigrationOperation {
            workload,
            vmid,
            source,
            target,
            points,
        });
    }

    Ok(Plan {
        operations,
        state: working,
    })
}

/// Running workloads, heaviest first, ties by id ascending.
fn visit_order(state: &ClusterState) -> Vec<(WorkloadId, f64)> {
    let mut order: Vec<(WorkloadId, f64)> = state
        .running_workloads()
        .map(|w| (w.id.clone(), w.points))
        .collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    order
}

/// Pick the node that would end up least loaded, if any improves on `source`.
fn best_target(state: &ClusterState, workload: &str, source: &str, points: f64) -> Option<NodeId> {
    let source_used = state.node(source)?.used_points;

    state
        .nodes()
        .filter(|n| n.id != source)
        .filter(|n| !state.conflicts_on(workload, &n.id))
        .map(|n| (n.id.as_str(), n.used_points + points))
        .filter(|(_, projected)| *projected < source_used)
        .min_by(|a, b| match a.1.total_cmp(&b.1) {
            Ordering::Equal => a.0.cmp(b.0),
            other => other,
        })
        .map(|(id, _)| id.to_string())
}
