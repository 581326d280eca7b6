//! vmbalance-state — in-memory cluster snapshot for one balancing cycle.
//!
//! Holds the raw records reported by the inventory collaborator and the
//! scored [`ClusterState`] built from them. Every collection is ordered
//! (`BTreeMap`/`BTreeSet`) so traversal is reproducible across runs.
//!
//! A `ClusterState` lives for exactly one cycle. The planner clones it
//! into a working copy; the original stays untouched for reporting.

pub mod error;
pub mod records;
pub mod types;

pub use error::{StateError, StateResult};
pub use records::{NodeRecord, WorkloadRecord};
pub use types::*;
