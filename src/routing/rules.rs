//! Per-VRF FIB rules for kernels without the l3mdev rule

use crate::error::RuleError;
use crate::gateway::KernelGateway;
use crate::routing::RULE_SHAPES;
use crate::vrf::Capability;
use tracing::{debug, info};

/// Installs and removes the oif/iif rule pairs of a VRF
pub struct FibRuleManager<'a, G> {
    gateway: &'a G,
    capability: Capability,
    priority: u32,
}

impl<'a, G: KernelGateway> FibRuleManager<'a, G> {
    pub fn new(gateway: &'a G, capability: Capability, priority: u32) -> Self {
        Self {
            gateway,
            capability,
            priority,
        }
    }

    /// Install all four rules. No-op under the consolidated rule.
    ///
    /// Stops at the first failure without rolling back; the caller runs
    /// [`FibRuleManager::remove`] to clean up.
    pub async fn install(&self, vrf: &str, table: u32) -> Result<(), RuleError> {
        if self.capability.is_consolidated() {
            debug!(vrf, "l3mdev rule present, no per-VRF rules needed");
            return Ok(());
        }

        for (direction, family) in RULE_SHAPES {
            self.gateway
                .add_rule(direction, family, vrf, table, self.priority)
                .await
                .map_err(|source| RuleError::InstallFailed {
                    vrf: vrf.to_string(),
                    direction: direction.keyword(),
                    family: family.label(),
                    source,
                })?;
        }

        info!(vrf, table, priority = self.priority, "Installed FIB rules");
        Ok(())
    }

    /// Delete all four rule shapes, each attempt independent
    pub async fn remove(&self, vrf: &str) {
        if self.capability.is_consolidated() {
            return;
        }

        for (direction, family) in RULE_SHAPES {
            if let Err(e) = self.gateway.delete_rule(direction, family, vrf).await {
                debug!(vrf, %direction, %family, "Ignoring rule removal failure: {}", e);
            }
        }
    }
}
