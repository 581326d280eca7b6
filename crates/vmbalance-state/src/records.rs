//! Raw inventory records, as reported by the hypervisor API.
//!
//! Field names follow the Proxmox VE JSON schema so the live client can
//! deserialize responses directly.

use serde::{Deserialize, Serialize};

/// One cluster node (`GET /nodes`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node: String,
    /// Physical CPU cores.
    #[serde(default)]
    pub maxcpu: f64,
    /// Physical memory in bytes.
    #[serde(default)]
    pub maxmem: u64,
    /// `online`, `offline`, or `unknown`.
    #[serde(default)]
    pub status: Option<String>,
}

impl NodeRecord {
    pub fn is_online(&self) -> bool {
        self.status.as_deref().is_none_or(|s| s == "online")
    }
}

/// One virtual machine on a node (`GET /nodes/{node}/qemu`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRecord {
    #[serde(default)]
    pub name: Option<String>,
    pub vmid: u32,
    pub status: String,
    /// Live CPU usage, in cores.
    #[serde(default)]
    pub cpu: f64,
    /// Live memory usage in bytes.
    #[serde(default)]
    pub mem: u64,
    /// Allocated CPU cores.
    #[serde(default, alias = "cpus")]
    pub maxcpu: f64,
    /// Allocated memory in bytes.
    #[serde(default)]
    pub maxmem: u64,
}

impl WorkloadRecord {
    /// Identifier used for rules and reporting: the VM name, or
    /// `vm-{vmid}` for unnamed guests.
    pub fn workload_id(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("vm-{}", self.vmid),
        }
    }
}
