//! Verification engine
//!
//! Compares live kernel routing state with what every VRF needs and
//! collects the discrepancies. A failed check is recorded and the pass
//! carries on; only a VRF without a usable table id stops early, and only
//! for that VRF.

use crate::gateway::{Family, KernelGateway};
use crate::routing::{DefaultRouteManager, RULE_SHAPES};
use crate::vrf::Capability;
use tracing::{debug, warn};

pub mod report;
pub mod snapshot;

pub use report::{Finding, Report, Severity, VrfReport};
pub use snapshot::RuleSnapshot;

pub struct Verifier<'a, G> {
    gateway: &'a G,
    /// `None` derives it from the rule dump taken by each pass
    capability: Option<Capability>,
    metric: u32,
}

impl<'a, G: KernelGateway> Verifier<'a, G> {
    pub fn new(gateway: &'a G, capability: Capability, metric: u32) -> Self {
        Self {
            gateway,
            capability: Some(capability),
            metric,
        }
    }

    /// Verifier that reads the capability off its own rule dump. When the
    /// dump fails the rule checks are skipped and the failure is recorded.
    pub fn detecting(gateway: &'a G, metric: u32) -> Self {
        Self {
            gateway,
            capability: None,
            metric,
        }
    }

    /// Verify one VRF, or every VRF plus the global invariants when `vrf`
    /// is `None`. `table` is only meaningful together with `vrf`.
    pub async fn verify(&self, vrf: Option<&str>, table: Option<u32>) -> Report {
        let mut report = Report::new(self.capability);

        let mut snapshot = match RuleSnapshot::capture(self.gateway).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                report
                    .global
                    .push(Finding::error(format!("Unable to read FIB rules: {}", e)));
                None
            }
        };

        let capability = self.capability.or_else(|| {
            snapshot
                .as_ref()
                .map(|snapshot| Capability::from_rules(snapshot.rules(Family::V4)))
        });
        report.capability = capability;

        let Some(name) = vrf else {
            // Ordering is judged on the untouched snapshot
            let ordering = snapshot
                .as_ref()
                .map(|snapshot| ordering_checks(snapshot, capability))
                .unwrap_or_default();

            match self.gateway.list_vrf_devices().await {
                Ok(names) => {
                    for name in names {
                        let sub = self
                            .verify_vrf(&name, None, capability, snapshot.as_mut())
                            .await;
                        report.vrfs.push(sub);
                    }
                }
                Err(e) => report
                    .global
                    .push(Finding::error(format!("Unable to list VRF devices: {}", e))),
            }

            if let Some(snapshot) = snapshot.as_mut() {
                report.global.extend(detached_checks(snapshot));
            }
            report.global.extend(ordering);
            return report;
        };

        let sub = self
            .verify_vrf(name, table, capability, snapshot.as_mut())
            .await;
        report.vrfs.push(sub);
        report
    }

    async fn verify_vrf(
        &self,
        name: &str,
        expected: Option<u32>,
        capability: Option<Capability>,
        snapshot: Option<&mut RuleSnapshot>,
    ) -> VrfReport {
        let mut sub = VrfReport::new(name);

        let actual = match self.gateway.table_id_for_vrf(name).await {
            Ok(id) => id,
            Err(e) => {
                warn!(vrf = name, "Table id query failed: {}", e);
                None
            }
        };

        if let (Some(expected), Some(actual)) = (expected, actual) {
            if expected != actual {
                sub.error(format!(
                    "Table id mismatch: expected {}, kernel has {}",
                    expected, actual
                ));
            }
        }

        let Some(table) = actual else {
            match self.gateway.vrf_exists(name).await {
                Ok(true) => sub.error("VRF exists but table id lookup failed"),
                Ok(false) => sub.error(format!("VRF {} does not exist", name)),
                Err(e) => sub.error(format!("Unable to query device {}: {}", name, e)),
            }
            return sub;
        };
        sub.table_id = Some(table);

        self.check_default_routes(table, &mut sub).await;

        match (capability, snapshot) {
            (Some(Capability::Consolidated), _) => {}
            (Some(Capability::Legacy), Some(snapshot)) => {
                check_rules(name, table, snapshot, &mut sub)
            }
            _ => debug!(vrf = name, "No rule snapshot, skipping FIB rule checks"),
        }

        sub
    }

    async fn check_default_routes(&self, table: u32, sub: &mut VrfReport) {
        let routes = DefaultRouteManager::new(self.gateway, self.metric);
        match routes.verify(table).await {
            Ok(status) => {
                for family in Family::ALL {
                    if !status.present(family) {
                        sub.error(format!(
                            "{} unreachable default route missing in table {}",
                            family, table
                        ));
                    }
                }
            }
            Err(e) => sub.error(format!("Unable to read routes of table {}: {}", table, e)),
        }
    }

}

/// Local-table placement and, under the consolidated rule, the IPv6
/// l3mdev rule. Judged on the untouched snapshot.
fn ordering_checks(snapshot: &RuleSnapshot, capability: Option<Capability>) -> Vec<Finding> {
    let mut findings = Vec::new();

    for family in Family::ALL {
        if snapshot
            .first_rule(family)
            .is_some_and(|rule| rule.is_local_table())
        {
            findings.push(Finding::error(format!(
                "{}: local table rule has the lowest priority, VRF rules are never reached",
                family
            )));
        }
    }

    if capability.is_some_and(Capability::is_consolidated) && !snapshot.has_l3mdev(Family::V6) {
        findings.push(Finding::error("IPv6 l3mdev-table rule missing"));
    }

    findings
}

/// Legacy kernels: exactly one rule per (direction, family) for the VRF
fn check_rules(vrf: &str, table: u32, snapshot: &mut RuleSnapshot, sub: &mut VrfReport) {
    for (direction, family) in RULE_SHAPES {
        match snapshot.take_vrf_rules(direction, family, vrf, table) {
            0 => sub.error(format!("{} {} rule missing", family, direction)),
            1 => {}
            count => sub.warning(format!(
                "{} duplicate {} {} rules, expected exactly one",
                count, family, direction
            )),
        }
    }
}

/// Rules left pointing at deleted devices; reported once per family and
/// dropped from the snapshot
fn detached_checks(snapshot: &mut RuleSnapshot) -> Vec<Finding> {
    Family::ALL
        .into_iter()
        .filter_map(|family| {
            let detached = snapshot.take_detached(family);
            if detached.is_empty() {
                return None;
            }
            debug!(%family, ?detached, "Detached FIB rules");
            Some(Finding::error(format!(
                "{}: {} detached FIB rule(s) reference devices that no longer exist",
                family,
                detached.len()
            )))
        })
        .collect()
}
