//! vmbalance balancing engine — scoring, imbalance analysis, migration planning.
//!
//! This crate decides *what* should move. It never talks to the
//! hypervisor; the scheduler crate fetches inventory and executes the
//! resulting plan.
//!
//! # Components
//!
//! - **`scorer`** — CPU/memory → load points
//! - **`convert`** — Builds a [`ClusterState`](vmbalance_state::ClusterState) from inventory records
//! - **`analyzer`** — Disparity measurement and the balance gate
//! - **`planner`** — Greedy largest-first migration planner

pub mod analyzer;
pub mod convert;
pub mod error;
pub mod planner;
pub mod scorer;

pub use analyzer::{FLAG_DEVIATION_PCT, ImbalanceReport, NodeDeviation, analyze};
pub use convert::{NodeInventory, build_cluster_state};
pub use error::{PlacementError, PlacementResult};
pub use planner::{Plan, plan_migrations};
pub use scorer::Scorer;
