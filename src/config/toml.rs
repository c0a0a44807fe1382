//! TOML configuration file parsing

use crate::config::AppConfig;
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// TOML configuration structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub tables: Option<TablesConfig>,
    pub rules: Option<RulesConfig>,
    pub routes: Option<RoutesConfig>,
    pub commands: Option<CommandsConfig>,
    pub cgroup: Option<CgroupConfig>,
    pub locking: Option<LockingConfig>,
    pub logging: Option<LoggingConfig>,
}

/// VRF table id range
#[derive(Debug, Deserialize)]
pub struct TablesConfig {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RulesConfig {
    pub priority: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RoutesConfig {
    pub metric: Option<u32>,
}

/// External binaries
#[derive(Debug, Deserialize)]
pub struct CommandsConfig {
    pub ip: Option<String>,
    pub systemctl: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CgroupConfig {
    pub root: Option<PathBuf>,
    pub remove_attempts: Option<u32>,
    pub remove_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LockingConfig {
    pub dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl TomlConfig {
    /// Overlay every value present in the file
    pub fn apply_to(self, config: &mut AppConfig) {
        if let Some(tables) = self.tables {
            config.table_min = tables.min.unwrap_or(config.table_min);
            config.table_max = tables.max.unwrap_or(config.table_max);
        }
        if let Some(priority) = self.rules.and_then(|r| r.priority) {
            config.rule_priority = priority;
        }
        if let Some(metric) = self.routes.and_then(|r| r.metric) {
            config.default_route_metric = metric;
        }
        if let Some(commands) = self.commands {
            if let Some(ip) = commands.ip {
                config.ip_binary = ip;
            }
            if let Some(systemctl) = commands.systemctl {
                config.systemctl_binary = systemctl;
            }
        }
        if let Some(cgroup) = self.cgroup {
            if let Some(root) = cgroup.root {
                config.cgroup_root = root;
            }
            config.cgroup_remove_attempts =
                cgroup.remove_attempts.unwrap_or(config.cgroup_remove_attempts);
            config.cgroup_remove_delay_ms =
                cgroup.remove_delay_ms.unwrap_or(config.cgroup_remove_delay_ms);
        }
        if let Some(dir) = self.locking.and_then(|l| l.dir) {
            config.lock_dir = dir;
        }
        if let Some(level) = self.logging.and_then(|l| l.level) {
            config.log_level = level;
        }
    }
}

/// Load configuration from TOML file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.display().to_string(),
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_full_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[tables]
min = 2001
max = 2100

[rules]
priority = 150

[routes]
metric = 4096

[commands]
ip = "/sbin/ip"
systemctl = "/bin/systemctl"

[cgroup]
root = "/tmp/l3mdev"
remove_attempts = 3
remove_delay_ms = 250

[locking]
dir = "/tmp/vrfctl"

[logging]
level = "debug"
"#
        )
        .unwrap();

        let mut config = AppConfig::default();
        load_toml_config(file.path()).unwrap().apply_to(&mut config);

        assert_eq!((config.table_min, config.table_max), (2001, 2100));
        assert_eq!(config.rule_priority, 150);
        assert_eq!(config.default_route_metric, 4096);
        assert_eq!(config.ip_binary, "/sbin/ip");
        assert_eq!(config.systemctl_binary, "/bin/systemctl");
        assert_eq!(config.cgroup_root, PathBuf::from("/tmp/l3mdev"));
        assert_eq!(config.cgroup_remove_attempts, 3);
        assert_eq!(config.cgroup_remove_delay_ms, 250);
        assert_eq!(config.lock_dir, PathBuf::from("/tmp/vrfctl"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[tables]\nmax = 1100\n").unwrap();

        let mut config = AppConfig::default();
        load_toml_config(file.path()).unwrap().apply_to(&mut config);

        assert_eq!(config.table_min, 1001);
        assert_eq!(config.table_max, 1100);
        assert_eq!(config.ip_binary, "ip");
    }

    #[test]
    fn test_invalid_format() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[tables]\nmin = \"low\"\n").unwrap();

        assert!(matches!(
            load_toml_config(file.path()),
            Err(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[docker]\nsocket = \"/var/run/docker.sock\"\n").unwrap();

        assert!(load_toml_config(file.path()).is_err());
    }
}
