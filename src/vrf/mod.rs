//! VRF identity, table ids and kernel capability
//!
//! Name and table-id syntax checks live here; everything that needs the
//! kernel goes through [`crate::gateway::KernelGateway`].

use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

pub mod capability;
pub mod table;

pub use capability::Capability;
pub use table::{TableContext, TableRange, TableResolver};

/// Reserved name denoting the global table (no VRF)
pub const DEFAULT_VRF: &str = "default";

/// Lowest table id that may be handed to a new VRF
pub const TBID_MIN: u32 = 1001;

/// Highest table id that may be handed to a new VRF
pub const TBID_MAX: u32 = 1255;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid VRF name pattern"));

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid table id pattern"));

/// Check VRF name syntax. The reserved name passes; see [`validate_new_name`].
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(name.to_string()))
    }
}

/// Check a name that is about to be created or deleted
pub fn validate_new_name(name: &str) -> Result<(), ValidationError> {
    validate_name(name)?;
    if is_reserved(name) {
        return Err(ValidationError::ReservedName(name.to_string()));
    }
    Ok(())
}

pub fn is_reserved(name: &str) -> bool {
    name == DEFAULT_VRF
}

/// Parse a digits-only table id
pub fn parse_table_id(input: &str) -> Result<u32, ValidationError> {
    if !TABLE_RE.is_match(input) {
        return Err(ValidationError::InvalidTableId(input.to_string()));
    }
    input
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidTableId(input.to_string()))
}
