pub mod config;
pub mod types;

pub use config::{
    BalanceConfig, BalanceSettings, ConfigError, ConfigResult, ExecutorConfig, ProxmoxConfig,
    RulesConfig,
};
pub use types::*;
