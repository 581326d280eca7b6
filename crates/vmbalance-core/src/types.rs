//! Shared types used across vmbalance crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bytes in one GiB, the memory unit load points are expressed in.
pub const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Which figures a workload is scored from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMethod {
    /// Live utilization (`cpu`, `mem`).
    #[default]
    Current,
    /// Allocated maxima (`maxcpu`, `maxmem`).
    Max,
}

impl fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringMethod::Current => write!(f, "current"),
            ScoringMethod::Max => write!(f, "max"),
        }
    }
}

/// Weights applied when folding CPU and memory into load points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Points per CPU core.
    pub cpu_weight: f64,
    /// Points per GiB of memory.
    pub mem_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            cpu_weight: 5.0,
            mem_weight: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        method: ScoringMethod,
    }

    #[test]
    fn method_parses_lowercase() {
        let w: Wrapper = toml::from_str(r#"method = "max""#).unwrap();
        assert_eq!(w.method, ScoringMethod::Max);

        let w: Wrapper = toml::from_str(r#"method = "current""#).unwrap();
        assert_eq!(w.method, ScoringMethod::Current);
    }

    #[test]
    fn unknown_method_is_rejected() {
        let r: Result<Wrapper, _> = toml::from_str(r#"method = "average""#);
        assert!(r.is_err());
    }

    #[test]
    fn default_weights() {
        let w = ScoringWeights::default();
        assert_eq!(w.cpu_weight, 5.0);
        assert_eq!(w.mem_weight, 1.0);
        assert_eq!(ScoringMethod::default(), ScoringMethod::Current);
    }
}
