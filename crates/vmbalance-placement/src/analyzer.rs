//! Imbalance analysis.
//!
//! ```text
//! avg             = Σ used_points / node_count
//! total_disparity = Σ |avg - used_points|
//! balance         = total_disparity > node_count * allowed_disparity
//! ```
//!
//! Nodes deviating from the average by more than [`FLAG_DEVIATION_PCT`]
//! percent are flagged for diagnostics only.

use serde::Serialize;
use tracing::{debug, warn};

use vmbalance_state::{ClusterState, NodeId};

use crate::error::{PlacementError, PlacementResult};

/// Percent deviation from the average above which a node is flagged.
pub const FLAG_DEVIATION_PCT: f64 = 30.0;

/// Per-node deviation from the cluster average.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDeviation {
    pub node: NodeId,
    pub used_points: f64,
    /// `|avg - used_points|`.
    pub disparity: f64,
    /// `|100 - used/avg * 100|`; `None` when the average is zero.
    pub deviation_pct: Option<f64>,
    pub flagged: bool,
}

/// Outcome of analyzing a cluster snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImbalanceReport {
    pub node_count: usize,
    pub total_used_points: f64,
    pub avg_used_points: f64,
    pub total_disparity: f64,
    /// `node_count * allowed_disparity`.
    pub threshold: f64,
    pub nodes: Vec<NodeDeviation>,
}

impl ImbalanceReport {
    /// Whether a balancing pass should run.
    pub fn should_balance(&self) -> bool {
        self.total_disparity > self.threshold
    }

    pub fn flagged(&self) -> impl Iterator<Item = &NodeDeviation> {
        self.nodes.iter().filter(|n| n.flagged)
    }
}

/// Measure cluster skew.
///
/// Fails with [`PlacementError::EmptyCluster`] when there are no nodes.
pub fn analyze(state: &ClusterState, allowed_disparity: u32) -> PlacementResult<ImbalanceReport> {
    let node_count = state.node_count();
    if node_count == 0 {
        return Err(PlacementError::EmptyCluster);
    }

    let total_used_points = state.total_used_points();
    let avg_used_points = total_used_points / node_count as f64;

    let nodes: Vec<NodeDeviation> = state
        .nodes()
        .map(|node| {
            let disparity = (avg_used_points - node.used_points).abs();
            let deviation_pct = (avg_used_points > 0.0)
                .then(|| (100.0 - (node.used_points / avg_used_points) * 100.0).abs());
            let flagged = deviation_pct.is_some_and(|pct| pct > FLAG_DEVIATION_PCT);
            if flagged {
                warn!(
                    node = %node.id,
                    used_points = node.used_points,
                    deviation_pct = deviation_pct.unwrap_or_default() as i64,
                    "found imbalance in node"
                );
            }
            NodeDeviation {
                node: node.id.clone(),
                used_points: node.used_points,
                disparity,
                deviation_pct,
                flagged,
            }
        })
        .collect();

    let total_disparity: f64 = nodes.iter().map(|n| n.disparity).sum();
    let threshold = node_count as f64 * f64::from(allowed_disparity);

    debug!(
        node_count,
        avg_used_points,
        total_disparity,
        threshold,
        "cluster imbalance measured"
    );

    Ok(ImbalanceReport {
        node_count,
        total_used_points,
        avg_used_points,
        total_disparity,
        threshold,
        nodes,
    })
}
