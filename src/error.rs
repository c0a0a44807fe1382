//! Centralized error types and handling

use thiserror::Error;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    #[error("Kernel gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Default route error: {0}")]
    Route(#[from] RouteError),

    #[error("FIB rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Cgroup error: {0}")]
    Cgroup(#[from] CgroupError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Lock(#[from] LockError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Input rejected before any mutation is attempted
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid VRF name '{0}': only letters, digits, '_', '-' and '.' are allowed")]
    InvalidName(String),

    #[error("'{0}' is reserved for the default table and cannot be managed as a VRF")]
    ReservedName(String),

    #[error("Invalid table id '{0}': must be a non-negative integer")]
    InvalidTableId(String),

    #[error("Table id {id} is outside the allowed range {min}-{max}")]
    TableOutOfRange { id: u32, min: u32, max: u32 },

    #[error("Device {0} exists and is not a VRF")]
    NotAVrf(String),

    #[error("VRF {vrf} already exists with table {table}")]
    VrfExists { vrf: String, table: u32 },

    #[error("Table id {id} is already used by VRF {vrf}")]
    TableInUse { id: u32, vrf: String },
}

/// Something expected in the kernel is absent
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("VRF {0} does not exist")]
    Vrf(String),

    #[error("No table id found for {0}")]
    TableId(String),
}

/// Failures talking to the kernel routing subsystem
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Failed to parse output of '{command}': {reason}")]
    Parse { command: String, reason: String },

    #[error("Netlink error: {0}")]
    Netlink(String),
}

/// Default route management errors
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Failed to install {family} unreachable default route in table {table}: {source}")]
    InstallFailed {
        table: u32,
        family: &'static str,
        #[source]
        source: GatewayError,
    },
}

/// FIB rule management errors
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Failed to install {direction} {family} rule for VRF {vrf}: {source}")]
    InstallFailed {
        vrf: String,
        direction: &'static str,
        family: &'static str,
        #[source]
        source: GatewayError,
    },
}

/// Control-group classifier errors
#[derive(Debug, Error)]
pub enum CgroupError {
    #[error("Cgroup for VRF {vrf} is busy (gave up after {attempts} attempts)")]
    Busy { vrf: String, attempts: u32 },

    #[error("Cgroup node for VRF {vrf} is in use")]
    NodeBusy { vrf: String },

    #[error("Cgroup filesystem error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Advisory lock errors
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Another vrf invocation is operating on VRF {vrf}")]
    Busy { vrf: String },

    #[error("Failed to open lock file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
