//! Domain types for the cluster snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};

/// Unique identifier for a node in the cluster.
pub type NodeId = String;

/// Unique identifier for a workload (its name).
pub type WorkloadId = String;

// ── Workload ──────────────────────────────────────────────────────

/// Reported power state of a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadStatus {
    Running,
    Stopped,
    Other(String),
}

impl WorkloadStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "running" => WorkloadStatus::Running,
            "stopped" => WorkloadStatus::Stopped,
            other => WorkloadStatus::Other(other.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, WorkloadStatus::Running)
    }
}

impl fmt::Display for WorkloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadStatus::Running => write!(f, "running"),
            WorkloadStatus::Stopped => write!(f, "stopped"),
            WorkloadStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

/// A virtual machine hosted on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub id: WorkloadId,
    /// Hypervisor-assigned numeric id, used by the relocation call.
    pub vmid: u32,
    /// Owning node.
    pub node: NodeId,
    pub status: WorkloadStatus,
    /// Load points. Always zero for non-running workloads.
    pub points: f64,
    /// Indices into [`ClusterState::groups`] this workload belongs to.
    pub groups: Vec<usize>,
}

impl Workload {
    pub fn new(id: impl Into<WorkloadId>, vmid: u32, node: impl Into<NodeId>, status: WorkloadStatus, points: f64) -> Self {
        let points = if status.is_running() { points } else { 0.0 };
        Self {
            id: id.into(),
            vmid,
            node: node.into(),
            status,
            points,
            groups: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }
}

// ── Node ──────────────────────────────────────────────────────────

/// A hypervisor host and the points it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub capacity_points: f64,
    /// Sum of the points of hosted running workloads.
    pub used_points: f64,
    /// Every hosted workload, whatever its state.
    pub workloads: BTreeSet<WorkloadId>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, capacity_points: f64) -> Self {
        Self {
            id: id.into(),
            capacity_points,
            used_points: 0.0,
            workloads: BTreeSet::new(),
        }
    }

    pub fn hosts(&self, workload: &str) -> bool {
        self.workloads.contains(workload)
    }
}

// ── Anti-affinity ─────────────────────────────────────────────────

/// Workloads that must never reside on the same node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AntiAffinityGroup {
    pub members: BTreeSet<WorkloadId>,
}

impl AntiAffinityGroup {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<WorkloadId>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, workload: &str) -> bool {
        self.members.contains(workload)
    }
}

// ── Migration ─────────────────────────────────────────────────────

/// A single planned relocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationOperation {
    pub workload: WorkloadId,
    pub vmid: u32,
    pub source: NodeId,
    pub target: NodeId,
    /// Points moved by this operation.
    pub points: f64,
}

impl fmt::Display for MigrationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) {} -> {} [{:.2} points]",
            self.workload, self.vmid, self.source, self.target, self.points
        )
    }
}

// ── Cluster ───────────────────────────────────────────────────────

/// Snapshot of every node, workload, and anti-affinity group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    nodes: BTreeMap<NodeId, Node>,
    workloads: BTreeMap<WorkloadId, Workload>,
    groups: Vec<AntiAffinityGroup>,
}

impl ClusterState {
    pub fn new(groups: Vec<AntiAffinityGroup>) -> Self {
        Self {
            nodes: BTreeMap::new(),
            workloads: BTreeMap::new(),
            groups,
        }
    }

    pub fn add_node(&mut self, id: impl Into<NodeId>, capacity_points: f64) -> StateResult<()> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(StateError::DuplicateNode(id));
        }
        self.nodes.insert(id.clone(), Node::new(id, capacity_points));
        Ok(())
    }

    /// Register a workload on its owning node.
    ///
    /// Running workloads add their points to the node's used points.
    /// Group membership is resolved from the configured groups.
    pub fn add_workload(&mut self, mut workload: Workload) -> StateResult<()> {
        if let Some(existing) = self.workloads.get(&workload.id) {
            return Err(StateError::DuplicateWorkload {
                workload: workload.id.clone(),
                first: existing.node.clone(),
                second: workload.node.clone(),
            });
        }
        let node = self
            .nodes
            .get_mut(&workload.node)
            .ok_or_else(|| StateError::NodeNotFound(workload.node.clone()))?;

        workload.groups = self
            .groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.contains(&workload.id))
            .map(|(i, _)| i)
            .collect();

        if workload.is_running() {
            node.used_points += workload.points;
        }
        node.workloads.insert(workload.id.clone());
        self.workloads.insert(workload.id.clone(), workload);
        Ok(())
    }

    /// Check that every group member is a known workload.
    pub fn validate_groups(&self) -> StateResult<()> {
        for (index, group) in self.groups.iter().enumerate() {
            if let Some(missing) = group.members.iter().find(|m| !self.workloads.contains_key(*m)) {
                return Err(StateError::UnknownGroupMember {
                    group: index,
                    workload: missing.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn workloads(&self) -> impl Iterator<Item = &Workload> {
        self.workloads.values()
    }

    pub fn workload(&self, id: &str) -> Option<&Workload> {
        self.workloads.get(id)
    }

    pub fn running_workloads(&self) -> impl Iterator<Item = &Workload> {
        self.workloads.values().filter(|w| w.is_running())
    }

    pub fn groups(&self) -> &[AntiAffinityGroup] {
        &self.groups
    }

    pub fn total_used_points(&self) -> f64 {
        self.nodes.values().map(|n| n.used_points).sum()
    }

    pub fn total_capacity_points(&self) -> f64 {
        self.nodes.values().map(|n| n.capacity_points).sum()
    }

    /// Whether `node` hosts another member of any group `workload` belongs to.
    pub fn conflicts_on(&self, workload: &str, node: &str) -> bool {
        let (Some(w), Some(n)) = (self.workloads.get(workload), self.nodes.get(node)) else {
            return false;
        };
        w.groups.iter().any(|&g| {
            self.groups[g]
                .members
                .iter()
                .any(|other| other != workload && n.hosts(other))
        })
    }

    /// Move a workload to `target`, carrying its points along.
    pub fn move_workload(&mut self, workload: &str, target: &str) -> StateResult<()> {
        if !self.nodes.contains_key(target) {
            return Err(StateError::NodeNotFound(target.to_string()));
        }
        let w = self
            .workloads
            .get_mut(workload)
            .ok_or_else(|| StateError::WorkloadNotFound(workload.to_string()))?;
        if w.node == target {
            return Ok(());
        }
        let source = std::mem::replace(&mut w.node, target.to_string());
        let points = if w.is_running() { w.points } else { 0.0 };

        if let Some(src) = self.nodes.get_mut(&source) {
            src.used_points -= points;
            src.workloads.remove(workload);
        }
        if let Some(dst) = self.nodes.get_mut(target) {
            dst.used_points += points;
            dst.workloads.insert(workload.to_string());
        }
        Ok(())
    }
}
