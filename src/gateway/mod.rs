//! Kernel routing gateway
//!
//! Narrow interface over the kernel networking stack: VRF devices, FIB
//! rules and routes. Rule and route dumps come back as typed records so
//! the verifier never has to match on command output text.

use crate::error::GatewayError;
use serde::Serialize;
use std::fmt;
use std::future::Future;

pub mod iproute;

#[cfg(test)]
pub mod fake;

pub use iproute::IpRouteGateway;

/// Address family of a rule or route
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub const ALL: [Family; 2] = [Family::V4, Family::V6];

    /// Flag selecting this family on the `ip` command line
    pub fn flag(self) -> &'static str {
        match self {
            Family::V4 => "-4",
            Family::V6 => "-6",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Family::V4 => "IPv4",
            Family::V6 => "IPv6",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Interface selector direction of a FIB rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// Selector keyword as used by `ip rule`
    pub fn keyword(self) -> &'static str {
        match self {
            Direction::Input => "iif",
            Direction::Output => "oif",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Target of a FIB rule lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RuleLookup {
    Table(u32),
    /// Table referenced by name (`local`, `main`, or a name the kernel
    /// resolved back from a VRF)
    Named(String),
    /// Dynamic per-packet lookup in the l3mdev table
    L3mdev,
}

impl RuleLookup {
    /// Parse the textual table reference printed by the kernel tools
    pub fn parse(table: &str) -> Self {
        match table.parse::<u32>() {
            Ok(id) => RuleLookup::Table(id),
            Err(_) => RuleLookup::Named(table.to_string()),
        }
    }
}

/// Kernel id of the `local` routing table
pub const LOCAL_TABLE_ID: u32 = 255;

/// A single policy-routing rule as dumped from the kernel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleRecord {
    pub family: Family,
    pub priority: u32,
    /// Source prefix; `None` means "from all"
    pub source: Option<String>,
    pub iif: Option<String>,
    pub oif: Option<String>,
    pub iif_detached: bool,
    pub oif_detached: bool,
    pub lookup: Option<RuleLookup>,
}

impl RuleRecord {
    pub fn new(family: Family, priority: u32) -> Self {
        Self {
            family,
            priority,
            source: None,
            iif: None,
            oif: None,
            iif_detached: false,
            oif_detached: false,
            lookup: None,
        }
    }

    /// Interface named by the selector in the given direction
    pub fn selector(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Input => self.iif.as_deref(),
            Direction::Output => self.oif.as_deref(),
        }
    }

    pub fn selector_detached(&self, direction: Direction) -> bool {
        match direction {
            Direction::Input => self.iif_detached,
            Direction::Output => self.oif_detached,
        }
    }

    /// True when the rule's iif or oif device no longer exists
    pub fn is_detached(&self) -> bool {
        self.iif_detached || self.oif_detached
    }

    /// The implicit `from all lookup local` rule
    pub fn is_local_table(&self) -> bool {
        let local = match &self.lookup {
            Some(RuleLookup::Table(id)) => *id == LOCAL_TABLE_ID,
            Some(RuleLookup::Named(name)) => name == "local",
            _ => false,
        };
        self.source.is_none() && self.iif.is_none() && self.oif.is_none() && local
    }

    pub fn is_l3mdev(&self) -> bool {
        matches!(self.lookup, Some(RuleLookup::L3mdev))
    }
}

/// Route type as reported by the kernel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RouteKind {
    Unicast,
    Unreachable,
    Other(String),
}

impl RouteKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "unicast" => RouteKind::Unicast,
            "unreachable" => RouteKind::Unreachable,
            other => RouteKind::Other(other.to_string()),
        }
    }
}

/// A route entry from a single table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteRecord {
    pub family: Family,
    pub kind: RouteKind,
    pub destination: String,
    pub metric: Option<u32>,
}

impl RouteRecord {
    pub fn unreachable_default(family: Family, metric: u32) -> Self {
        Self {
            family,
            kind: RouteKind::Unreachable,
            destination: "default".to_string(),
            metric: Some(metric),
        }
    }

    pub fn is_unreachable_default(&self) -> bool {
        self.kind == RouteKind::Unreachable && self.destination == "default"
    }
}

/// Operations the VRF core needs from the kernel routing subsystem
pub trait KernelGateway {
    fn create_vrf_device(
        &self,
        name: &str,
        table: u32,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn delete_device(&self, name: &str) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Any link with this name, VRF or not
    fn device_exists(&self, name: &str)
        -> impl Future<Output = Result<bool, GatewayError>> + Send;

    /// A link with this name that is a VRF device
    fn vrf_exists(&self, name: &str) -> impl Future<Output = Result<bool, GatewayError>> + Send;

    fn list_vrf_devices(&self) -> impl Future<Output = Result<Vec<String>, GatewayError>> + Send;

    /// Table bound to a VRF device (VRF-type attribute)
    fn table_id_for_vrf(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<u32>, GatewayError>> + Send;

    /// Table of the VRF a device is enslaved to (port attribute)
    fn table_id_for_slave(
        &self,
        device: &str,
    ) -> impl Future<Output = Result<Option<u32>, GatewayError>> + Send;

    /// Devices enslaved to the given VRF
    fn list_enslaved(
        &self,
        vrf: &str,
    ) -> impl Future<Output = Result<Vec<String>, GatewayError>> + Send;

    fn add_rule(
        &self,
        direction: Direction,
        family: Family,
        selector: &str,
        table: u32,
        priority: u32,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn delete_rule(
        &self,
        direction: Direction,
        family: Family,
        selector: &str,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Install an unreachable default route
    fn add_route(
        &self,
        table: u32,
        family: Family,
        metric: u32,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Remove an unreachable default route
    fn delete_route(
        &self,
        table: u32,
        family: Family,
        metric: u32,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn dump_rules(
        &self,
        family: Family,
    ) -> impl Future<Output = Result<Vec<RuleRecord>, GatewayError>> + Send;

    fn dump_routes(
        &self,
        table: u32,
        family: Family,
    ) -> impl Future<Output = Result<Vec<RouteRecord>, GatewayError>> + Send;
}
