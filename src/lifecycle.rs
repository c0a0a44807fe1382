//! VRF lifecycle orchestration
//!
//! `configure` moves a VRF to the configured state and `teardown` takes it
//! back down. Configuring is skipped entirely when the VRF already
//! verifies clean.

use crate::cgroup::ClassifierStore;
use crate::error::{AppError, CgroupError, NotFoundError, ValidationError};
use crate::gateway::KernelGateway;
use crate::retry::{retry, RetryPolicy};
use crate::routing::{DefaultRouteManager, FibRuleManager, DEFAULT_ROUTE_METRIC, VRF_RULE_PRIORITY};
use crate::services::ServiceManager;
use crate::verify::Verifier;
use crate::vrf::{validate_new_name, Capability, TableContext, TableRange, TableResolver};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureMode {
    Normal,
    /// Early boot: no stale-state cleanup and no service start
    Boot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    AlreadyConfigured,
    Configured,
}

/// Tunables for the lifecycle steps
#[derive(Debug, Clone, Copy)]
pub struct LifecycleSettings {
    pub tables: TableRange,
    pub metric: u32,
    pub rule_priority: u32,
    pub cgroup_retry: RetryPolicy,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            tables: TableRange::default(),
            metric: DEFAULT_ROUTE_METRIC,
            rule_priority: VRF_RULE_PRIORITY,
            cgroup_retry: RetryPolicy::new(5, Duration::from_secs(1)),
        }
    }
}

pub struct Lifecycle<'a, G, S, C> {
    gateway: &'a G,
    services: &'a S,
    cgroups: &'a C,
    capability: Capability,
    settings: LifecycleSettings,
}

impl<'a, G, S, C> Lifecycle<'a, G, S, C>
where
    G: KernelGateway,
    S: ServiceManager,
    C: ClassifierStore,
{
    pub fn new(
        gateway: &'a G,
        services: &'a S,
        cgroups: &'a C,
        capability: Capability,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            gateway,
            services,
            cgroups,
            capability,
            settings,
        }
    }

    fn routes(&self) -> DefaultRouteManager<'a, G> {
        DefaultRouteManager::new(self.gateway, self.settings.metric)
    }

    fn rules(&self) -> FibRuleManager<'a, G> {
        FibRuleManager::new(self.gateway, self.capability, self.settings.rule_priority)
    }

    pub fn verifier(&self) -> Verifier<'a, G> {
        Verifier::new(self.gateway, self.capability, self.settings.metric)
    }

    /// Bring a VRF's routing state in line. A VRF that already verifies
    /// clean is left untouched.
    pub async fn configure(
        &self,
        vrf: &str,
        table: u32,
        mode: ConfigureMode,
    ) -> Result<ConfigureOutcome, AppError> {
        validate_new_name(vrf)?;
        let table = self.settings.tables.validate(table, TableContext::Existing)?;

        if self.verifier().verify(Some(vrf), Some(table)).await.passed() {
            debug!(vrf, table, "Already configured");
            return Ok(ConfigureOutcome::AlreadyConfigured);
        }

        debug!(vrf, table, ?mode, "Configuring");

        if mode == ConfigureMode::Normal {
            if let Err(e) = self.teardown(vrf, Some(table)).await {
                debug!(vrf, "Ignoring stale state cleanup failure: {}", e);
            }
        }

        self.routes().install(table).await?;

        if mode == ConfigureMode::Normal {
            self.services.start_units_matching(vrf).await;
        }

        info!(vrf, table, ?mode, "Configured VRF");
        Ok(ConfigureOutcome::Configured)
    }

    /// Stop services, drop default routes and remove the classifier node
    pub async fn teardown(&self, vrf: &str, table: Option<u32>) -> Result<(), AppError> {
        validate_new_name(vrf)?;
        debug!(vrf, ?table, "Tearing down");

        self.services.stop_units_matching(vrf).await;

        if let Some(table) = table {
            self.routes().remove(table).await;
        }

        retry(
            self.settings.cgroup_retry,
            |e: &CgroupError| matches!(e, CgroupError::NodeBusy { .. }),
            || async move { self.cgroups.remove_node(vrf) },
        )
        .await
        .map_err(|(e, attempts)| match e {
            CgroupError::NodeBusy { vrf } => CgroupError::Busy { vrf, attempts },
            other => other,
        })?;

        info!(vrf, ?table, "Tore down VRF");
        Ok(())
    }

    /// Create a VRF device bound to `table` and configure it
    pub async fn add(&self, vrf: &str, table: u32) -> Result<(), AppError> {
        validate_new_name(vrf)?;
        let table = self.settings.tables.validate(table, TableContext::Add)?;

        if self.gateway.vrf_exists(vrf).await? {
            return match self.gateway.table_id_for_vrf(vrf).await? {
                Some(existing) if existing == table => {
                    debug!(vrf, table, "VRF device already present");
                    self.configure(vrf, table, ConfigureMode::Normal).await?;
                    Ok(())
                }
                Some(existing) => Err(ValidationError::VrfExists {
                    vrf: vrf.to_string(),
                    table: existing,
                }
                .into()),
                None => Err(NotFoundError::TableId(vrf.to_string()).into()),
            };
        }

        if self.gateway.device_exists(vrf).await? {
            return Err(ValidationError::NotAVrf(vrf.to_string()).into());
        }

        TableResolver::new(self.gateway)
            .ensure_unused(table, vrf)
            .await?;

        self.gateway.create_vrf_device(vrf, table).await?;
        info!(vrf, table, "Created VRF device");

        if let Err(e) = self.rules().install(vrf, table).await {
            self.rules().remove(vrf).await;
            if let Err(cleanup) = self.gateway.delete_device(vrf).await {
                debug!(vrf, "Ignoring device cleanup failure: {}", cleanup);
            }
            return Err(e.into());
        }

        self.configure(vrf, table, ConfigureMode::Normal).await?;
        Ok(())
    }

    /// Tear down and delete a VRF device
    pub async fn delete(&self, vrf: &str, table: Option<u32>) -> Result<(), AppError> {
        validate_new_name(vrf)?;

        if !self.gateway.vrf_exists(vrf).await? {
            return Err(NotFoundError::Vrf(vrf.to_string()).into());
        }

        let table = match table {
            Some(table) => Some(table),
            None => match TableResolver::new(self.gateway).lookup(vrf).await {
                Ok(table) => Some(table),
                Err(AppError::NotFound(_)) => None,
                Err(e) => return Err(e),
            },
        };

        let teardown = self.teardown(vrf, table).await;
        self.rules().remove(vrf).await;
        self.gateway.delete_device(vrf).await?;
        info!(vrf, "Deleted VRF");

        teardown
    }
}
