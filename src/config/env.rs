//! Environment variable configuration handling

use crate::config::AppConfig;
use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable prefix
const ENV_PREFIX: &str = "VRFCTL_";

/// Apply variables resolved through `lookup` over `config`
pub fn apply_env_from<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

    if let Some(value) = get("TABLE_MIN") {
        config.table_min = parse_number("TABLE_MIN", &value)?;
    }
    if let Some(value) = get("TABLE_MAX") {
        config.table_max = parse_number("TABLE_MAX", &value)?;
    }
    if let Some(value) = get("RULE_PRIORITY") {
        config.rule_priority = parse_number("RULE_PRIORITY", &value)?;
    }
    if let Some(value) = get("ROUTE_METRIC") {
        config.default_route_metric = parse_number("ROUTE_METRIC", &value)?;
    }
    if let Some(value) = get("IP_BINARY") {
        config.ip_binary = value;
    }
    if let Some(value) = get("SYSTEMCTL_BINARY") {
        config.systemctl_binary = value;
    }
    if let Some(value) = get("CGROUP_ROOT") {
        config.cgroup_root = PathBuf::from(value);
    }
    if let Some(value) = get("CGROUP_REMOVE_ATTEMPTS") {
        config.cgroup_remove_attempts = parse_number("CGROUP_REMOVE_ATTEMPTS", &value)?;
    }
    if let Some(value) = get("CGROUP_REMOVE_DELAY_MS") {
        config.cgroup_remove_delay_ms = parse_number("CGROUP_REMOVE_DELAY_MS", &value)?;
    }
    if let Some(value) = get("LOCK_DIR") {
        config.lock_dir = PathBuf::from(value);
    }
    if let Some(value) = get("LOG_LEVEL") {
        config.log_level = value;
    }

    Ok(())
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::InvalidFormat(format!(
            "{}{} must be a number, got '{}'",
            ENV_PREFIX, name, value
        ))
    })
}
