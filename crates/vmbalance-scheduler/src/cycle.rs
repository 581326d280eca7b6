//! Balancing cycle — build, analyze, plan, execute.
//!
//! The `Balancer` is the control loop that:
//! - Fetches the full inventory (nodes, then workloads per node)
//! - Builds a scored `ClusterState` and measures its imbalance
//! - Plans migrations only when the imbalance exceeds the tolerance
//! - Applies the plan through the executor
//!
//! A failed fetch aborts the cycle before anything is planned. The next
//! cycle starts again from a fresh snapshot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};

use vmbalance_core::{BalanceConfig, ScoringMethod, ScoringWeights};
use vmbalance_inventory::Inventory;
use vmbalance_placement::{
    ImbalanceReport, NodeInventory, Plan, Scorer, analyze, build_cluster_state, plan_migrations,
};
use vmbalance_state::ClusterState;

use crate::error::SchedulerResult;
use crate::executor::{ExecutionReport, ExecutorOptions, OperationStatus, execute};

/// Everything a cycle needs besides the inventory.
#[derive(Debug, Clone)]
pub struct BalanceOptions {
    pub method: ScoringMethod,
    pub weights: ScoringWeights,
    pub allowed_disparity: u32,
    /// Anti-affinity groups, as lists of workload names.
    pub groups: Vec<Vec<String>>,
    pub executor: ExecutorOptions,
}

impl BalanceOptions {
    pub fn from_config(config: &BalanceConfig, dry_run: bool) -> Self {
        Self {
            method: config.balance.method,
            weights: config.scoring,
            allowed_disparity: config.balance.allowed_disparity,
            groups: config.rules.anti_affinity_groups(),
            executor: ExecutorOptions::from_config(&config.executor, dry_run),
        }
    }
}

impl Default for BalanceOptions {
    fn default() -> Self {
        Self {
            method: ScoringMethod::default(),
            weights: ScoringWeights::default(),
            allowed_disparity: 20,
            groups: Vec::new(),
            executor: ExecutorOptions::default(),
        }
    }
}

/// What one cycle observed and did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Snapshot as fetched, before any planned move.
    pub before: ClusterState,
    pub imbalance: ImbalanceReport,
    /// `None` when the imbalance was within tolerance.
    pub plan: Option<Plan>,
    pub execution: Option<ExecutionReport>,
}

impl CycleReport {
    /// Whether the balancing pass ran.
    pub fn balanced(&self) -> bool {
        self.plan.is_some()
    }
}

pub struct Balancer {
    inventory: Arc<dyn Inventory>,
    options: BalanceOptions,
}

impl Balancer {
    pub fn new(inventory: Arc<dyn Inventory>, options: BalanceOptions) -> Self {
        Self { inventory, options }
    }

    pub fn options(&self) -> &BalanceOptions {
        &self.options
    }

    /// Fetch every node and its workloads. Any failure aborts the fetch.
    pub async fn fetch_inventory(&self) -> SchedulerResult<Vec<NodeInventory>> {
        let nodes = self.inventory.list_nodes().await?;
        let mut inventory = Vec::with_capacity(nodes.len());
        for node in nodes {
            let workloads = self.inventory.list_workloads(&node.node).await?;
            inventory.push(NodeInventory { node, workloads });
        }
        Ok(inventory)
    }

    /// Run one full balancing cycle.
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> SchedulerResult<CycleReport> {
        let inventory = self.fetch_inventory().await?;
        let scorer = Scorer::new(self.options.method, self.options.weights);
        let before = build_cluster_state(&inventory, &self.options.groups, &scorer)?;
        let imbalance = analyze(&before, self.options.allowed_disparity)?;

        if !imbalance.should_balance() {
            info!(
                total_disparity = imbalance.total_disparity,
                threshold = imbalance.threshold,
                "acceptable overall imbalance, not running balance"
            );
            return Ok(CycleReport {
                before,
                imbalance,
                plan: None,
                execution: None,
            });
        }

        info!(
            dry_run = self.options.executor.dry_run,
            total_disparity = imbalance.total_disparity,
            threshold = imbalance.threshold,
            "running balance"
        );
        log_points(&before, "before");

        let plan = plan_migrations(&before)?;
        let execution = execute(
            &plan.operations,
            self.inventory.as_ref(),
            &self.options.executor,
            shutdown,
        )
        .await;

        if self.options.executor.dry_run {
            log_points(&plan.state, "planned");
        } else {
            log_points(&applied_state(&before, &execution), "after");
        }
        info!(
            planned = plan.operations.len(),
            applied = execution.applied(),
            failed = execution.failed(),
            cancelled = execution.cancelled(),
            "balance pass complete"
        );

        Ok(CycleReport {
            before,
            imbalance,
            plan: Some(plan),
            execution: Some(execution),
        })
    }

    /// Run cycles every `interval` until shutdown is signalled.
    ///
    /// Cycle errors are logged and the loop continues.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "balancer started");

        loop {
            if let Err(e) = self.run_cycle(&shutdown).await {
                error!(error = %e, "balancing cycle failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    info!("balancer shutting down");
                    break;
                }
            }
        }
    }
}

/// `before` with only the operations that actually went through.
fn applied_state(before: &ClusterState, execution: &ExecutionReport) -> ClusterState {
    let mut state = before.clone();
    for outcome in &execution.outcomes {
        if !matches!(outcome.status, OperationStatus::Applied { .. }) {
            continue;
        }
        let op = &outcome.operation;
        if let Err(e) = state.move_workload(&op.workload, &op.target) {
            debug!(workload = %op.workload, error = %e, "could not replay applied move");
        }
    }
    state
}

fn log_points(state: &ClusterState, phase: &str) {
    for node in state.nodes() {
        info!(
            phase,
            node = %node.id,
            points = node.capacity_points as i64,
            used = node.used_points as i64,
            "node points"
        );
    }
}
