//! Unreachable default routes per VRF table

use crate::error::{GatewayError, RouteError};
use crate::gateway::{Family, KernelGateway};
use serde::Serialize;
use tracing::{debug, info};

/// Presence of the unreachable default in each family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DefaultRouteStatus {
    pub v4_present: bool,
    pub v6_present: bool,
}

impl DefaultRouteStatus {
    pub fn present(&self, family: Family) -> bool {
        match family {
            Family::V4 => self.v4_present,
            Family::V6 => self.v6_present,
        }
    }
}

/// Installs and removes the IPv4/IPv6 unreachable default pair
pub struct DefaultRouteManager<'a, G> {
    gateway: &'a G,
    metric: u32,
}

impl<'a, G: KernelGateway> DefaultRouteManager<'a, G> {
    pub fn new(gateway: &'a G, metric: u32) -> Self {
        Self { gateway, metric }
    }

    /// IPv4 then IPv6. Stops at the first failure, leaving any route
    /// already installed in place.
    pub async fn install(&self, table: u32) -> Result<(), RouteError> {
        for family in Family::ALL {
            self.gateway
                .add_route(table, family, self.metric)
                .await
                .map_err(|source| RouteError::InstallFailed {
                    table,
                    family: family.label(),
                    source,
                })?;
        }
        info!(table, metric = self.metric, "Installed unreachable default routes");
        Ok(())
    }

    /// Remove both routes, ignoring errors
    pub async fn remove(&self, table: u32) {
        for family in Family::ALL {
            if let Err(e) = self.gateway.delete_route(table, family, self.metric).await {
                debug!(table, %family, "Ignoring default route removal failure: {}", e);
            }
        }
    }

    /// Presence check only; the metric is not compared
    pub async fn verify(&self, table: u32) -> Result<DefaultRouteStatus, GatewayError> {
        let mut status = DefaultRouteStatus::default();
        for family in Family::ALL {
            let present = self
                .gateway
                .dump_routes(table, family)
                .await?
                .iter()
                .any(|route| route.is_unreachable_default());
            match family {
                Family::V4 => status.v4_present = present,
                Family::V6 => status.v6_present = present,
            }
        }
        Ok(status)
    }
}
