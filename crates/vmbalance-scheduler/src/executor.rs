//! Migration executor — applies planned operations through the inventory.
//!
//! Operations are applied one at a time in planner order. A failed
//! operation never stops the ones after it. Failures that cannot have
//! started a migration task are retried with exponential backoff; anything
//! else, timeouts included, fails immediately. In dry-run
//! mode no call reaches the inventory and every operation is only logged.
//!
//! Shutdown is honored between operations, never during one.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use vmbalance_core::ExecutorConfig;
use vmbalance_inventory::{Inventory, InventoryError};
use vmbalance_state::MigrationOperation;

/// How operations are applied.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub dry_run: bool,
    /// Retries after the first attempt, for retryable migrate failures only.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each one after.
    pub retry_backoff: Duration,
}

impl ExecutorOptions {
    pub fn from_config(config: &ExecutorConfig, dry_run: bool) -> Self {
        Self {
            dry_run,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default(), false)
    }
}

/// Final status of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Applied { attempts: u32 },
    DryRun,
    Failed { error: InventoryError, attempts: u32 },
    /// Not attempted because shutdown was requested first.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub operation: MigrationOperation,
    pub status: OperationStatus,
}

/// Per-operation results, in the order operations were planned.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub outcomes: Vec<OperationOutcome>,
}

impl ExecutionReport {
    pub fn applied(&self) -> usize {
        self.count(|s| matches!(s, OperationStatus::Applied { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OperationStatus::Failed { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|s| matches!(s, OperationStatus::Cancelled))
    }

    pub fn dry_run(&self) -> usize {
        self.count(|s| matches!(s, OperationStatus::DryRun))
    }

    fn count(&self, pred: impl Fn(&OperationStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Apply `operations` in order.
pub async fn execute(
    operations: &[MigrationOperation],
    inventory: &dyn Inventory,
    options: &ExecutorOptions,
    shutdown: &watch::Receiver<bool>,
) -> ExecutionReport {
    let mut outcomes = Vec::with_capacity(operations.len());

    for op in operations {
        if *shutdown.borrow() {
            outcomes.push(OperationOutcome {
                operation: op.clone(),
                status: OperationStatus::Cancelled,
            });
            continue;
        }

        let status = if options.dry_run {
            info!(
                workload = %op.workload,
                from = %op.source,
                to = %op.target,
                "moving workload (dry run)"
            );
            OperationStatus::DryRun
        } else {
            info!(
                workload = %op.workload,
                from = %op.source,
                to = %op.target,
                "moving workload"
            );
            apply(op, inventory, options).await
        };

        outcomes.push(OperationOutcome {
            operation: op.clone(),
            status,
        });
    }

    let report = ExecutionReport { outcomes };
    if report.cancelled() > 0 {
        warn!(cancelled = report.cancelled(), "shutdown requested, remaining migrations skipped");
    }
    report
}

async fn apply(
    op: &MigrationOperation,
    inventory: &dyn Inventory,
    options: &ExecutorOptions,
) -> OperationStatus {
    let mut attempts = 0;
    let mut backoff = options.retry_backoff;

    loop {
        attempts += 1;
        match inventory
            .migrate_workload(&op.source, op.vmid, &op.target, true)
            .await
        {
            Ok(()) => return OperationStatus::Applied { attempts },
            Err(e) if e.is_retryable_migration() && attempts <= options.max_retries => {
                warn!(
                    workload = %op.workload,
                    attempt = attempts,
                    error = %e,
                    backoff_ms = backoff.as_millis() as u64,
                    "migration failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => {
                warn!(
                    workload = %op.workload,
                    from = %op.source,
                    to = %op.target,
                    attempts,
                    error = %e,
                    "migration failed"
                );
                return OperationStatus::Failed { error: e, attempts };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vmbalance_inventory::{InMemoryInventory, InventoryResult};
    use vmbalance_state::{NodeRecord, WorkloadRecord};

    /// Requests shutdown as soon as the first migration completes.
    struct ShutdownAfterFirst {
        inner: InMemoryInventory,
        shutdown: watch::Sender<bool>,
    }

    #[async_trait]
    impl Inventory for ShutdownAfterFirst {
        async fn list_nodes(&self) -> InventoryResult<Vec<NodeRecord>> {
            self.inner.list_nodes().await
        }

        async fn list_workloads(&self, node: &str) -> InventoryResult<Vec<WorkloadRecord>> {
            self.inner.list_workloads(node).await
        }

        async fn migrate_workload(
            &self,
            node: &str,
            vmid: u32,
            target: &str,
            online: bool,
        ) -> InventoryResult<()> {
            let result = self.inner.migrate_workload(node, vmid, target, online).await;
            self.shutdown.send_replace(true);
            result
        }
    }

    fn vm(name: &str, vmid: u32) -> WorkloadRecord {
        WorkloadRecord {
            name: Some(name.to_string()),
            vmid,
            status: "running".to_string(),
            cpu: 1.0,
            mem: 1 << 30,
            maxcpu: 1.0,
            maxmem: 1 << 30,
        }
    }

    fn op(workload: &str, vmid: u32, source: &str, target: &str) -> MigrationOperation {
        MigrationOperation {
            workload: workload.to_string(),
            vmid,
            source: source.to_string(),
            target: target.to_string(),
            points: 6.0,
        }
    }

    fn inventory() -> InMemoryInventory {
        InMemoryInventory::new()
            .with_node("a", 8.0, 16 << 30)
            .with_node("b", 8.0, 16 << 30)
            .with_workload("a", vm("x", 101))
            .with_workload("a", vm("y", 102))
    }

    fn fast_options() -> ExecutorOptions {
        ExecutorOptions {
            dry_run: false,
            max_retries: 2,
            retry_backoff: Duration::from_millis(1),
        }
    }

    fn no_shutdown() -> watch::Receiver<bool> {
        let (_tx, rx) = watch::channel(false);
        rx
    }

    #[tokio::test]
    async fn applies_in_order() {
        let inv = inventory();
        let ops = vec![op("y", 102, "a", "b"), op("x", 101, "a", "b")];

        let report = execute(&ops, &inv, &fast_options(), &no_shutdown()).await;

        assert_eq!(report.applied(), 2);
        let vmids: Vec<u32> = inv.migrations().iter().map(|c| c.vmid).collect();
        assert_eq!(vmids, vec![102, 101]);
        assert!(inv.migrations().iter().all(|c| c.online));
    }

    #[tokio::test]
    async fn dry_run_issues_no_calls() {
        let inv = inventory();
        let ops = vec![op("x", 101, "a", "b"), op("y", 102, "a", "b")];
        let options = ExecutorOptions {
            dry_run: true,
            ..fast_options()
        };

        let report = execute(&ops, &inv, &options, &no_shutdown()).await;

        assert!(inv.migrations().is_empty());
        assert_eq!(report.dry_run(), 2);
        assert_eq!(report.outcomes[0].operation, ops[0]);
    }

    #[tokio::test]
    async fn unavailable_failure_is_retried() {
        let inv = inventory();
        inv.fail_migration(101, [InventoryError::Status { status: 503, body: "busy".into() }]);

        let report = execute(&[op("x", 101, "a", "b")], &inv, &fast_options(), &no_shutdown()).await;

        assert_eq!(report.outcomes[0].status, OperationStatus::Applied { attempts: 2 });
        assert_eq!(inv.location_of(101).as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn timeout_is_not_retried() {
        let inv = inventory();
        inv.fail_migration(101, [InventoryError::Timeout("30s".into())]);

        let report = execute(&[op("x", 101, "a", "b")], &inv, &fast_options(), &no_shutdown()).await;

        assert!(matches!(
            report.outcomes[0].status,
            OperationStatus::Failed { error: InventoryError::Timeout(_), attempts: 1 }
        ));
        assert_eq!(inv.migrations().len(), 1);
    }

    #[tokio::test]
    async fn locked_vm_error_is_not_retried() {
        let inv = inventory();
        inv.fail_migration(
            101,
            [InventoryError::Status { status: 500, body: "VM is locked (migrate)".into() }],
        );

        let report = execute(&[op("x", 101, "a", "b")], &inv, &fast_options(), &no_shutdown()).await;

        assert!(matches!(report.outcomes[0].status, OperationStatus::Failed { attempts: 1, .. }));
        assert_eq!(inv.migrations().len(), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let inv = inventory();
        inv.fail_migration(101, (0..5).map(|_| InventoryError::Transport("reset".into())));

        let report = execute(&[op("x", 101, "a", "b")], &inv, &fast_options(), &no_shutdown()).await;

        assert_eq!(
            report.outcomes[0].status,
            OperationStatus::Failed {
                error: InventoryError::Transport("reset".into()),
                attempts: 3,
            }
        );
        assert_eq!(inv.migrations().len(), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried_and_does_not_stop_others() {
        let inv = inventory();
        inv.fail_migration(101, [InventoryError::Status { status: 400, body: "bad".into() }]);
        let ops = vec![op("x", 101, "a", "b"), op("y", 102, "a", "b")];

        let report = execute(&ops, &inv, &fast_options(), &no_shutdown()).await;

        assert!(matches!(
            report.outcomes[0].status,
            OperationStatus::Failed { attempts: 1, .. }
        ));
        assert_eq!(report.outcomes[1].status, OperationStatus::Applied { attempts: 1 });
        assert_eq!(report.failed(), 1);
        assert_eq!(report.applied(), 1);
    }

    #[tokio::test]
    async fn shutdown_cancels_remaining_operations() {
        let inv = inventory();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let ops = vec![op("x", 101, "a", "b"), op("y", 102, "a", "b")];

        let report = execute(&ops, &inv, &fast_options(), &rx).await;

        assert_eq!(report.cancelled(), 2);
        assert!(inv.migrations().is_empty());
    }

    #[tokio::test]
    async fn shutdown_mid_plan_keeps_applied_and_cancels_rest() {
        let (tx, rx) = watch::channel(false);
        let inv = ShutdownAfterFirst {
            inner: inventory().with_workload("a", vm("z", 103)),
            shutdown: tx,
        };
        let ops = vec![
            op("x", 101, "a", "b"),
            op("y", 102, "a", "b"),
            op("z", 103, "a", "b"),
        ];

        let report = execute(&ops, &inv, &fast_options(), &rx).await;

        let statuses: Vec<_> = report.outcomes.iter().map(|o| o.status.clone()).collect();
        assert_eq!(
            statuses,
            vec![
                OperationStatus::Applied { attempts: 1 },
                OperationStatus::Cancelled,
                OperationStatus::Cancelled,
            ]
        );
        assert_eq!(inv.inner.migrations().len(), 1);
        assert_eq!(inv.inner.location_of(101).as_deref(), Some("b"));
        assert_eq!(inv.inner.location_of(102).as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn empty_plan_is_noop() {
        let inv = inventory();
        let report = execute(&[], &inv, &fast_options(), &no_shutdown()).await;
        assert!(report.outcomes.is_empty());
        assert!(inv.migrations().is_empty());
    }
}
