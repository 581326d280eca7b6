//! vmbalance-scheduler — runs balancing cycles against an inventory.
//!
//! ```text
//! Balancer
//!   ├── Inventory (list nodes/workloads, migrate)
//!   └── per cycle
//!       ├── build ClusterState      (vmbalance-placement::convert)
//!       ├── analyze imbalance       (vmbalance-placement::analyzer)
//!       ├── plan migrations         (vmbalance-placement::planner)
//!       └── execute operations      (executor)
//! ```
//!
//! One cycle runs at a time. Each stage consumes the complete output of
//! the previous one.

pub mod cycle;
pub mod error;
pub mod executor;

pub use cycle::{BalanceOptions, Balancer, CycleReport};
pub use error::{SchedulerError, SchedulerResult};
pub use executor::{ExecutionReport, ExecutorOptions, OperationOutcome, OperationStatus, execute};
