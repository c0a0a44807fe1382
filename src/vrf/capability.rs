//! Kernel FIB-rule capability detection

use crate::error::GatewayError;
use crate::gateway::{Family, KernelGateway, RuleRecord};
use serde::Serialize;
use tracing::debug;

/// How traffic is steered into VRF tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// One l3mdev rule per family does a per-packet table lookup
    Consolidated,
    /// Every VRF needs explicit oif/iif rules per family
    Legacy,
}

impl Capability {
    /// Derive the capability from the IPv4 rule table
    pub fn from_rules(rules: &[RuleRecord]) -> Self {
        if rules.iter().any(RuleRecord::is_l3mdev) {
            Capability::Consolidated
        } else {
            Capability::Legacy
        }
    }

    /// Query the kernel. Called once per run; the value is then passed to
    /// whatever needs it.
    pub async fn detect<G: KernelGateway>(gateway: &G) -> Result<Self, GatewayError> {
        let rules = gateway.dump_rules(Family::V4).await?;
        let capability = Self::from_rules(&rules);
        debug!(?capability, "Detected FIB rule capability");
        Ok(capability)
    }

    pub fn is_consolidated(self) -> bool {
        self == Capability::Consolidated
    }
}
