//! In-memory kernel gateway for tests
//!
//! Behaves like the kernel for the subset the VRF core uses: adding a
//! duplicate route fails, deleting an absent rule or route fails, and
//! every mutation is counted.

use crate::error::GatewayError;
use crate::gateway::{Direction, Family, KernelGateway, RouteRecord, RuleLookup, RuleRecord};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct FakeState {
    /// VRF name -> table id
    pub vrfs: BTreeMap<String, u32>,
    /// VRFs whose table id query comes back empty
    pub tableless: BTreeSet<String>,
    /// enslaved device -> VRF name
    pub slaves: BTreeMap<String, String>,
    pub rules: Vec<RuleRecord>,
    /// table id -> routes
    pub routes: BTreeMap<u32, Vec<RouteRecord>>,
    pub rule_adds: usize,
    pub rule_deletes: usize,
    pub route_adds: usize,
    pub route_deletes: usize,
    pub fail_route_family: Option<Family>,
    pub fail_rule_adds: bool,
    pub fail_rule_dump: bool,
}

#[derive(Debug, Default)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
}

fn failure(command: &str, stderr: &str) -> GatewayError {
    GatewayError::CommandFailed {
        command: command.to_string(),
        status: 2,
        stderr: stderr.to_string(),
    }
}

fn base_rule(family: Family, priority: u32, lookup: RuleLookup) -> RuleRecord {
    let mut rule = RuleRecord::new(family, priority);
    rule.lookup = Some(lookup);
    rule
}

impl FakeGateway {
    /// Kernel without the l3mdev rule; local table moved behind the VRF rules
    pub fn legacy() -> Self {
        let gateway = Self::default();
        {
            let mut state = gateway.state();
            for family in Family::ALL {
                state.rules.push(base_rule(family, 1000, RuleLookup::Named("local".into())));
                state.rules.push(base_rule(family, 32766, RuleLookup::Named("main".into())));
            }
        }
        gateway
    }

    /// Kernel with the consolidated l3mdev rule in both families
    pub fn consolidated() -> Self {
        let gateway = Self::default();
        {
            let mut state = gateway.state();
            for family in Family::ALL {
                state.rules.push(base_rule(family, 1000, RuleLookup::L3mdev));
                state.rules.push(base_rule(family, 32765, RuleLookup::Named("local".into())));
                state.rules.push(base_rule(family, 32766, RuleLookup::Named("main".into())));
            }
        }
        gateway
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn with_vrf(self, name: &str, table: u32) -> Self {
        self.state().vrfs.insert(name.to_string(), table);
        self
    }

    /// Enslave a non-VRF device to `vrf`
    pub fn with_slave(self, device: &str, vrf: &str) -> Self {
        self.state()
            .slaves
            .insert(device.to_string(), vrf.to_string());
        self
    }

    pub fn push_rule(&self, rule: RuleRecord) {
        self.state().rules.push(rule);
    }

    pub fn rule_mutations(&self) -> usize {
        let state = self.state();
        state.rule_adds + state.rule_deletes
    }

    pub fn routes_in(&self, table: u32) -> Vec<RouteRecord> {
        self.state().routes.get(&table).cloned().unwrap_or_default()
    }
}

impl KernelGateway for FakeGateway {
    async fn create_vrf_device(&self, name: &str, table: u32) -> Result<(), GatewayError> {
        let mut state = self.state();
        if state.vrfs.contains_key(name) {
            return Err(failure("ip link add", "RTNETLINK answers: File exists"));
        }
        state.vrfs.insert(name.to_string(), table);
        Ok(())
    }

    async fn delete_device(&self, name: &str) -> Result<(), GatewayError> {
        let mut state = self.state();
        if state.vrfs.remove(name).is_none() && state.slaves.remove(name).is_none() {
            return Err(failure("ip link del", "Cannot find device"));
        }
        state.tableless.remove(name);
        state.slaves.retain(|_, vrf| vrf != name);
        Ok(())
    }

    async fn device_exists(&self, name: &str) -> Result<bool, GatewayError> {
        let state = self.state();
        Ok(state.vrfs.contains_key(name) || state.slaves.contains_key(name))
    }

    async fn vrf_exists(&self, name: &str) -> Result<bool, GatewayError> {
        Ok(self.state().vrfs.contains_key(name))
    }

    async fn list_vrf_devices(&self) -> Result<Vec<String>, GatewayError> {
        Ok(self.state().vrfs.keys().cloned().collect())
    }

    async fn table_id_for_vrf(&self, name: &str) -> Result<Option<u32>, GatewayError> {
        let state = self.state();
        if state.tableless.contains(name) {
            return Ok(None);
        }
        Ok(state.vrfs.get(name).copied())
    }

    async fn table_id_for_slave(&self, device: &str) -> Result<Option<u32>, GatewayError> {
        let state = self.state();
        Ok(state
            .slaves
            .get(device)
            .and_then(|vrf| state.vrfs.get(vrf))
            .copied())
    }

    async fn list_enslaved(&self, vrf: &str) -> Result<Vec<String>, GatewayError> {
        Ok(self
            .state()
            .slaves
            .iter()
            .filter(|(_, master)| master.as_str() == vrf)
            .map(|(device, _)| device.clone())
            .collect())
    }

    async fn add_rule(
        &self,
        direction: Direction,
        family: Family,
        selector: &str,
        table: u32,
        priority: u32,
    ) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.rule_adds += 1;
        if state.fail_rule_adds {
            return Err(failure("ip rule add", "RTNETLINK answers: Operation not permitted"));
        }
        let mut rule = base_rule(family, priority, RuleLookup::Table(table));
        match direction {
            Direction::Input => rule.iif = Some(selector.to_string()),
            Direction::Output => rule.oif = Some(selector.to_string()),
        }
        state.rules.push(rule);
        Ok(())
    }

    async fn delete_rule(
        &self,
        direction: Direction,
        family: Family,
        selector: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.rule_deletes += 1;
        let position = state
            .rules
            .iter()
            .position(|rule| rule.family == family && rule.selector(direction) == Some(selector));
        match position {
            Some(index) => {
                state.rules.remove(index);
                Ok(())
            }
            None => Err(failure("ip rule del", "RTNETLINK answers: No such file or directory")),
        }
    }

    async fn add_route(&self, table: u32, family: Family, metric: u32) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.route_adds += 1;
        if state.fail_route_family == Some(family) {
            return Err(failure("ip route add", "RTNETLINK answers: Network is down"));
        }
        let routes = state.routes.entry(table).or_default();
        let route = RouteRecord::unreachable_default(family, metric);
        if routes.contains(&route) {
            return Err(failure("ip route add", "RTNETLINK answers: File exists"));
        }
        routes.push(route);
        Ok(())
    }

    async fn delete_route(
        &self,
        table: u32,
        family: Family,
        metric: u32,
    ) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.route_deletes += 1;
        let route = RouteRecord::unreachable_default(family, metric);
        let routes = state.routes.entry(table).or_default();
        match routes.iter().position(|r| *r == route) {
            Some(index) => {
                routes.remove(index);
                Ok(())
            }
            None => Err(failure("ip route del", "RTNETLINK answers: No such process")),
        }
    }

    async fn dump_rules(&self, family: Family) -> Result<Vec<RuleRecord>, GatewayError> {
        let state = self.state();
        if state.fail_rule_dump {
            return Err(failure("ip rule show", "Cannot send dump request"));
        }
        Ok(state
            .rules
            .iter()
            .filter(|rule| rule.family == family)
            .cloned()
            .collect())
    }

    async fn dump_routes(
        &self,
        table: u32,
        family: Family,
    ) -> Result<Vec<RouteRecord>, GatewayError> {
        Ok(self
            .routes_in(table)
            .into_iter()
            .filter(|route| route.family == family)
            .collect())
    }
}
