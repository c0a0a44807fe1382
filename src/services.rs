//! Per-VRF service units
//!
//! Units instantiated for a VRF follow the `<service>@<vrf>.service`
//! naming. Starting and stopping is fire-and-forget per unit.

use crate::command;
use std::future::Future;
use tracing::{debug, info, warn};

pub trait ServiceManager {
    fn start_units_matching(&self, vrf: &str) -> impl Future<Output = ()> + Send;

    fn stop_units_matching(&self, vrf: &str) -> impl Future<Output = ()> + Send;
}

/// systemd-backed service manager
pub struct SystemdServices {
    systemctl: String,
}

/// Unit names from `systemctl list-units --plain --no-legend` output
pub fn parse_unit_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|unit| unit.ends_with(".service"))
        .map(str::to_string)
        .collect()
}

impl SystemdServices {
    pub fn new(systemctl: impl Into<String>) -> Self {
        Self {
            systemctl: systemctl.into(),
        }
    }

    async fn units(&self, vrf: &str) -> Vec<String> {
        let pattern = format!("*@{}.service", vrf);
        match command::run_checked(
            &self.systemctl,
            &[
                "list-units",
                "--all",
                "--plain",
                "--no-legend",
                "--type=service",
                &pattern,
            ],
        )
        .await
        {
            Ok(output) => parse_unit_names(&output),
            Err(e) => {
                warn!(vrf, "Unable to list services: {}", e);
                Vec::new()
            }
        }
    }

    async fn each(&self, action: &str, vrf: &str) {
        let units = self.units(vrf).await;
        if units.is_empty() {
            debug!(vrf, action, "No services");
            return;
        }
        for unit in units {
            match command::run_checked(&self.systemctl, &[action, &unit]).await {
                Ok(_) => info!(vrf, unit = %unit, "Service {}", action),
                Err(e) => warn!(vrf, unit = %unit, "Failed to {} service: {}", action, e),
            }
        }
    }
}

impl ServiceManager for SystemdServices {
    async fn start_units_matching(&self, vrf: &str) {
        self.each("start", vrf).await;
    }

    async fn stop_units_matching(&self, vrf: &str) {
        self.each("stop", vrf).await;
    }
}
