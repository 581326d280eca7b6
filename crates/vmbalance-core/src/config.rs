//! vmbalance.toml configuration parser.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ScoringMethod, ScoringWeights};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceConfig {
    pub proxmox: ProxmoxConfig,
    #[serde(default)]
    pub balance: BalanceSettings,
    #[serde(default)]
    pub scoring: ScoringWeights,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

/// Connection settings for the Proxmox VE API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxmoxConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub verify_ssl: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceSettings {
    pub method: ScoringMethod,
    /// Tolerated disparity per node, in load points.
    pub allowed_disparity: u32,
}

impl Default for BalanceSettings {
    fn default() -> Self {
        Self {
            method: ScoringMethod::Current,
            allowed_disparity: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Retries after the first attempt, for retryable migrate failures only.
    pub max_retries: u32,
    /// Initial backoff between attempts; doubles each retry.
    pub retry_backoff_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Comma-separated workload names that must never share a node.
    pub separate: Vec<String>,
}

impl RulesConfig {
    /// Split each `separate` rule into its member names.
    ///
    /// Whitespace around names is trimmed and empty entries are dropped.
    pub fn anti_affinity_groups(&self) -> Vec<Vec<String>> {
        self.separate
            .iter()
            .map(|rule| {
                rule.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .collect()
    }
}

fn default_port() -> u16 {
    8006
}

fn default_timeout_secs() -> u64 {
    30
}

impl BalanceConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let config: BalanceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.proxmox.host.trim().is_empty() {
            return Err(ConfigError::Invalid("proxmox.host must not be empty".into()));
        }
        if self.proxmox.user.trim().is_empty() {
            return Err(ConfigError::Invalid("proxmox.user must not be empty".into()));
        }
        if self.proxmox.timeout_secs == 0 {
            return Err(ConfigError::Invalid("proxmox.timeout_secs must be positive".into()));
        }
        for (name, weight) in [
            ("scoring.cpu_weight", self.scoring.cpu_weight),
            ("scoring.mem_weight", self.scoring.mem_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {weight}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[proxmox]
host = "pve.example.com"
user = "root@pam"
password = "secret"
"#;

    #[test]
    fn test_parse_minimal_applies_defaults() {
        let config = BalanceConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.proxmox.port, 8006);
        assert!(!config.proxmox.verify_ssl);
        assert_eq!(config.proxmox.timeout_secs, 30);
        assert_eq!(config.balance.method, ScoringMethod::Current);
        assert_eq!(config.balance.allowed_disparity, 20);
        assert_eq!(config.scoring, ScoringWeights::default());
        assert_eq!(config.executor.max_retries, 2);
        assert!(config.rules.separate.is_empty());
    }

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
[proxmox]
host = "10.0.0.5"
port = 443
user = "balancer@pve"
password = "pw"
verify_ssl = true

[balance]
method = "max"
allowed_disparity = 35

[scoring]
cpu_weight = 2.5

[rules]
separate = ["web1, web2", "db1,db2,db3"]
"#;
        let config = BalanceConfig::parse(toml_str).unwrap();
        assert_eq!(config.proxmox.port, 443);
        assert!(config.proxmox.verify_ssl);
        assert_eq!(config.balance.method, ScoringMethod::Max);
        assert_eq!(config.balance.allowed_disparity, 35);
        assert_eq!(config.scoring.cpu_weight, 2.5);
        assert_eq!(config.scoring.mem_weight, 1.0);

        let groups = config.rules.anti_affinity_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec!["web1", "web2"]);
        assert_eq!(groups[1], vec!["db1", "db2", "db3"]);
    }

    #[test]
    fn test_missing_credentials_is_parse_error() {
        let toml_str = r#"
[proxmox]
host = "pve"
"#;
        assert!(matches!(
            BalanceConfig::parse(toml_str),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_proxmox_section_is_error() {
        assert!(BalanceConfig::parse("[balance]\nallowed_disparity = 5\n").is_err());
    }

    #[test]
    fn test_empty_host_is_invalid() {
        let toml_str = r#"
[proxmox]
host = "  "
user = "root@pam"
password = "x"
"#;
        assert!(matches!(
            BalanceConfig::parse(toml_str),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_negative_weight_is_invalid() {
        let toml_str = format!("{MINIMAL}\n[scoring]\nmem_weight = -1.0\n");
        assert!(matches!(
            BalanceConfig::parse(&toml_str),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_negative_disparity_is_rejected() {
        let toml_str = format!("{MINIMAL}\n[balance]\nallowed_disparity = -4\n");
        assert!(BalanceConfig::parse(&toml_str).is_err());
    }

    #[test]
    fn test_groups_drop_empty_names() {
        let rules = RulesConfig {
            separate: vec!["a,,b,".to_string(), "".to_string()],
        };
        let groups = rules.anti_affinity_groups();
        assert_eq!(groups[0], vec!["a", "b"]);
        assert!(groups[1].is_empty());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = BalanceConfig::from_file(file.path()).unwrap();
        assert_eq!(config.proxmox.host, "pve.example.com");
    }

    #[test]
    fn test_from_missing_file() {
        let err = BalanceConfig::from_file(Path::new("/nonexistent/vmbalance.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
