//! Command-line argument parsing

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments structure
#[derive(Parser, Debug)]
#[command(name = "vrf")]
#[command(about = "Manage Linux VRF devices, their routing state and member tasks")]
#[command(version)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, global = true, help = "Path to TOML configuration file")]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, help = "Set the logging level")]
    pub log_level: Option<String>,

    #[arg(long, global = true, help = "Path to the ip binary")]
    pub ip_binary: Option<String>,

    #[arg(long, global = true, help = "Root of the l3mdev cgroup hierarchy")]
    pub cgroup_root: Option<PathBuf>,

    #[arg(long, global = true, help = "Print verification reports as JSON")]
    pub json: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    pub print_default_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List VRFs and their table ids
    List,

    /// Exit 0 when the VRF exists
    Exists { vrf: String },

    /// Install default routes and start services of an existing VRF
    Configure {
        vrf: String,
        table: String,
        #[arg(value_parser = ["boot"])]
        mode: Option<String>,
    },

    /// Stop services and remove default routes and the cgroup node
    Teardown { vrf: String, table: String },

    /// Check kernel state of one VRF or all of them
    Verify {
        vrf: Option<String>,
        table: Option<String>,
    },

    /// Create a VRF device bound to a table
    Add {
        vrf: String,
        #[arg(value_parser = ["table"])]
        keyword: String,
        table: String,
    },

    /// Tear down and delete a VRF device
    Del { vrf: String, table: Option<String> },

    /// Table id of a VRF or of a device enslaved to one
    Table { name: String },

    /// Task membership
    #[command(subcommand)]
    Task(TaskCommand),

    /// Devices enslaved to VRFs
    #[command(subcommand)]
    Link(LinkCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    List { vrf: Option<String> },
    Identify { pid: u32 },
    Set { vrf: String, pid: u32 },
    /// Run a command inside a VRF
    Exec {
        vrf: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    List { vrf: Option<String> },
}

impl CliArgs {
    /// Apply CLI arguments over base configuration
    pub fn apply_to_config(&self, config: &mut AppConfig) {
        if let Some(ref level) = self.log_level {
            config.log_level = level.clone();
        }

        if let Some(ref ip) = self.ip_binary {
            config.ip_binary = ip.clone();
        }

        if let Some(ref root) = self.cgroup_root {
            config.cgroup_root = root.clone();
        }
    }
}

/// Default configuration rendered as a commented TOML file
pub fn default_config_toml() -> String {
    let config = AppConfig::default();

    format!(
        r#"# vrfctl configuration
# This is the default configuration with all available options

[tables]
# Table ids available to new VRFs
min = {table_min}
max = {table_max}

[rules]
# Priority of per-VRF iif/oif rules on kernels without the l3mdev rule
priority = {priority}

[routes]
# Metric of the unreachable default routes
metric = {metric}

[commands]
ip = "{ip}"
systemctl = "{systemctl}"

[cgroup]
root = "{cgroup_root}"
remove_attempts = {attempts}
remove_delay_ms = {delay}

[locking]
dir = "{lock_dir}"

[logging]
# Log level: trace, debug, info, warn, error
level = "{level}"
"#,
        table_min = config.table_min,
        table_max = config.table_max,
        priority = config.rule_priority,
        metric = config.default_route_metric,
        ip = config.ip_binary,
        systemctl = config.systemctl_binary,
        cgroup_root = config.cgroup_root.display(),
        attempts = config.cgroup_remove_attempts,
        delay = config.cgroup_remove_delay_ms,
        lock_dir = config.lock_dir.display(),
        level = config.log_level,
    )
}

/// Print default configuration in TOML format
pub fn print_default_config() {
    print!("{}", default_config_toml());
}
