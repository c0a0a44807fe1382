//! In-memory copy of the kernel FIB rule tables
//!
//! Matched rules are removed from the snapshot (never from the kernel) so
//! that successive per-VRF scans over one snapshot cannot count a rule
//! twice, and so that whatever is left at the end is unaccounted for.

use crate::error::GatewayError;
use crate::gateway::{Direction, Family, KernelGateway, RuleLookup, RuleRecord};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    rules: BTreeMap<Family, Vec<RuleRecord>>,
}

/// A rule belongs to a VRF when it selects on the VRF device and looks up
/// either the VRF name or its table id. Both forms show up depending on
/// whether the kernel tools resolve the table back to a name.
fn is_vrf_rule(rule: &RuleRecord, direction: Direction, vrf: &str, table: u32) -> bool {
    if rule.selector(direction) != Some(vrf) || rule.selector_detached(direction) {
        return false;
    }
    match &rule.lookup {
        Some(RuleLookup::Named(name)) => name == vrf,
        Some(RuleLookup::Table(id)) => *id == table,
        _ => false,
    }
}

impl RuleSnapshot {
    /// Dump both families from the kernel
    pub async fn capture<G: KernelGateway>(gateway: &G) -> Result<Self, GatewayError> {
        let mut rules = Vec::new();
        for family in Family::ALL {
            rules.extend(gateway.dump_rules(family).await?);
        }
        Ok(Self::from_rules(rules))
    }

    pub fn from_rules(rules: impl IntoIterator<Item = RuleRecord>) -> Self {
        let mut snapshot = Self::default();
        for rule in rules {
            snapshot.rules.entry(rule.family).or_default().push(rule);
        }
        snapshot
    }

    pub fn rules(&self, family: Family) -> &[RuleRecord] {
        self.rules.get(&family).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove every rule of this (direction, family, VRF) and return how
    /// many there were
    pub fn take_vrf_rules(
        &mut self,
        direction: Direction,
        family: Family,
        vrf: &str,
        table: u32,
    ) -> usize {
        let Some(rules) = self.rules.get_mut(&family) else {
            return 0;
        };
        let before = rules.len();
        rules.retain(|rule| !is_vrf_rule(rule, direction, vrf, table));
        before - rules.len()
    }

    /// Remove rules whose iif/oif device no longer exists
    pub fn take_detached(&mut self, family: Family) -> Vec<RuleRecord> {
        let Some(rules) = self.rules.get_mut(&family) else {
            return Vec::new();
        };
        let (detached, kept): (Vec<_>, Vec<_>) = rules.drain(..).partition(RuleRecord::is_detached);
        *rules = kept;
        detached
    }

    /// Rule with the lowest priority, i.e. the one evaluated first
    pub fn first_rule(&self, family: Family) -> Option<&RuleRecord> {
        self.rules(family).iter().min_by_key(|rule| rule.priority)
    }

    pub fn has_l3mdev(&self, family: Family) -> bool {
        self.rules(family).iter().any(RuleRecord::is_l3mdev)
    }
}
