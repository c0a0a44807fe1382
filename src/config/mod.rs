//! Configuration management module
//!
//! Handles loading configuration from multiple sources with proper precedence:
//! CLI arguments > environment variables > TOML files > defaults

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::vrf::{TableRange, TBID_MAX, TBID_MIN};
use crate::routing::{DEFAULT_ROUTE_METRIC, VRF_RULE_PRIORITY};
use std::path::PathBuf;
use std::time::Duration;

pub mod cli;
pub mod env;
pub mod toml;

use self::cli::CliArgs;

/// Configuration file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/vrfctl/vrfctl.toml";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub table_min: u32,
    pub table_max: u32,
    pub rule_priority: u32,
    pub default_route_metric: u32,
    pub ip_binary: String,
    pub systemctl_binary: String,
    pub cgroup_root: PathBuf,
    pub cgroup_remove_attempts: u32,
    pub cgroup_remove_delay_ms: u64,
    pub lock_dir: PathBuf,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            table_min: TBID_MIN,
            table_max: TBID_MAX,
            rule_priority: VRF_RULE_PRIORITY,
            default_route_metric: DEFAULT_ROUTE_METRIC,
            ip_binary: "ip".to_string(),
            systemctl_binary: "systemctl".to_string(),
            cgroup_root: PathBuf::from("/sys/fs/cgroup/l3mdev"),
            cgroup_remove_attempts: 5,
            cgroup_remove_delay_ms: 1000,
            lock_dir: PathBuf::from("/run/vrfctl"),
            log_level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_min > self.table_max {
            return Err(ConfigError::ValidationError(format!(
                "table range is empty: min {} is greater than max {}",
                self.table_min, self.table_max
            )));
        }
        if self.cgroup_remove_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "cgroup remove_attempts must be at least 1".to_string(),
            ));
        }
        if self.rule_priority == 0 {
            return Err(ConfigError::ValidationError(
                "rule priority must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn table_range(&self) -> TableRange {
        TableRange::new(self.table_min, self.table_max)
    }

    pub fn cgroup_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.cgroup_remove_attempts,
            Duration::from_millis(self.cgroup_remove_delay_ms),
        )
    }
}

/// Resolve the effective configuration for this invocation
pub fn load_configuration(cli: &CliArgs) -> Result<AppConfig, ConfigError> {
    load_layers(cli, |key| std::env::var(key).ok())
}

fn load_layers<F>(cli: &CliArgs, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (path, explicit) = match &cli.config {
        Some(path) => (PathBuf::from(path), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    let mut config = AppConfig::default();
    if explicit || path.exists() {
        toml::load_toml_config(&path)?.apply_to(&mut config);
    }

    env::apply_env_from(&mut config, lookup)?;
    cli.apply_to_config(&mut config);

    config.validate()?;
    Ok(config)
}
