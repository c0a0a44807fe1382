//! Gateway implementation backed by rtnetlink and iproute2
//!
//! Link queries go straight to netlink. Rule and route mutations are
//! issued through the `ip` binary and dumps are read back as `ip -j` JSON.

use crate::command;
use crate::error::GatewayError;
use crate::gateway::{
    Direction, Family, KernelGateway, RouteKind, RouteRecord, RuleLookup, RuleRecord,
};
use futures_util::TryStreamExt;
use rtnetlink::packet_route::link::{
    InfoData, InfoKind, InfoPortData, InfoVrf, InfoVrfPort, LinkAttribute, LinkInfo, LinkMessage,
};
use rtnetlink::{new_connection, Handle};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Kernel gateway using a netlink socket plus the `ip` command
pub struct IpRouteGateway {
    handle: Handle,
    ip_binary: String,
}

impl IpRouteGateway {
    /// Open a netlink connection and spawn its driver task
    pub async fn new(ip_binary: impl Into<String>) -> Result<Self, GatewayError> {
        let (connection, handle, _) =
            new_connection().map_err(|e| GatewayError::Netlink(e.to_string()))?;

        tokio::spawn(connection);

        Ok(Self {
            handle,
            ip_binary: ip_binary.into(),
        })
    }

    async fn ip(&self, args: &[&str]) -> Result<String, GatewayError> {
        command::run_checked(&self.ip_binary, args).await
    }

    async fn links(&self) -> Result<Vec<LinkMessage>, GatewayError> {
        let mut stream = self.handle.link().get().execute();
        let mut links = Vec::new();
        while let Some(link) = stream
            .try_next()
            .await
            .map_err(|e| GatewayError::Netlink(e.to_string()))?
        {
            links.push(link);
        }
        Ok(links)
    }

    async fn link_by_name(&self, name: &str) -> Result<Option<LinkMessage>, GatewayError> {
        Ok(self
            .links()
            .await?
            .into_iter()
            .find(|link| link_name(link) == Some(name)))
    }
}

fn link_name(link: &LinkMessage) -> Option<&str> {
    link.attributes.iter().find_map(|attr| match attr {
        LinkAttribute::IfName(name) => Some(name.as_str()),
        _ => None,
    })
}

fn link_infos(link: &LinkMessage) -> impl Iterator<Item = &LinkInfo> {
    link.attributes
        .iter()
        .filter_map(|attr| match attr {
            LinkAttribute::LinkInfo(infos) => Some(infos.iter()),
            _ => None,
        })
        .flatten()
}

fn is_vrf(link: &LinkMessage) -> bool {
    link_infos(link).any(|info| matches!(info, LinkInfo::Kind(InfoKind::Vrf)))
}

fn vrf_table(link: &LinkMessage) -> Option<u32> {
    link_infos(link).find_map(|info| match info {
        LinkInfo::Data(InfoData::Vrf(attrs)) => attrs.iter().find_map(|attr| match attr {
            InfoVrf::TableId(id) => Some(*id),
            _ => None,
        }),
        _ => None,
    })
}

fn port_table(link: &LinkMessage) -> Option<u32> {
    link_infos(link).find_map(|info| match info {
        LinkInfo::PortData(InfoPortData::VrfPort(attrs)) => {
            attrs.iter().find_map(|attr| match attr {
                InfoVrfPort::TableId(id) => Some(*id),
                _ => None,
            })
        }
        _ => None,
    })
}

fn json_array<T: for<'de> Deserialize<'de>>(
    command: &str,
    json: &str,
) -> Result<Vec<T>, GatewayError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json).map_err(|e| GatewayError::Parse {
        command: command.to_string(),
        reason: e.to_string(),
    })
}

/// Parse `ip -j rule show` output
pub fn parse_rules(json: &str, family: Family) -> Result<Vec<RuleRecord>, GatewayError> {
    let entries: Vec<Map<String, Value>> = json_array("ip rule show", json)?;

    Ok(entries
        .iter()
        .map(|entry| {
            let text = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);

            let priority = entry
                .get("priority")
                .and_then(Value::as_u64)
                .and_then(|p| u32::try_from(p).ok())
                .unwrap_or(0);

            // Presence of the key is the signal; ip prints these as null
            let lookup = if entry.contains_key("l3mdev") {
                Some(RuleLookup::L3mdev)
            } else {
                match entry.get("table") {
                    Some(Value::String(table)) => Some(RuleLookup::parse(table)),
                    Some(Value::Number(n)) => n
                        .as_u64()
                        .and_then(|id| u32::try_from(id).ok())
                        .map(RuleLookup::Table),
                    _ => None,
                }
            };

            RuleRecord {
                family,
                priority,
                source: text("src").filter(|src| src != "all"),
                iif: text("iif"),
                oif: text("oif"),
                iif_detached: entry.contains_key("iif_detached"),
                oif_detached: entry.contains_key("oif_detached"),
                lookup,
            }
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct RouteJson {
    #[serde(rename = "type")]
    kind: Option<String>,
    dst: String,
    metric: Option<u32>,
}

/// Parse `ip -j route show table N` output
pub fn parse_routes(json: &str, family: Family) -> Result<Vec<RouteRecord>, GatewayError> {
    let entries: Vec<RouteJson> = json_array("ip route show", json)?;

    Ok(entries
        .into_iter()
        .map(|entry| RouteRecord {
            family,
            kind: entry
                .kind
                .as_deref()
                .map(RouteKind::parse)
                .unwrap_or(RouteKind::Unicast),
            destination: entry.dst,
            metric: entry.metric,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct LinkJson {
    ifname: String,
}

/// Parse `ip -j link show` output into interface names
pub fn parse_link_names(json: &str) -> Result<Vec<String>, GatewayError> {
    let entries: Vec<LinkJson> = json_array("ip link show", json)?;
    Ok(entries.into_iter().map(|link| link.ifname).collect())
}

impl KernelGateway for IpRouteGateway {
    async fn create_vrf_device(&self, name: &str, table: u32) -> Result<(), GatewayError> {
        let table = table.to_string();
        self.ip(&["link", "add", name, "type", "vrf", "table", &table])
            .await?;
        self.ip(&["link", "set", "dev", name, "up"]).await?;
        Ok(())
    }

    async fn delete_device(&self, name: &str) -> Result<(), GatewayError> {
        self.ip(&["link", "del", "dev", name]).await?;
        Ok(())
    }

    async fn device_exists(&self, name: &str) -> Result<bool, GatewayError> {
        Ok(self.link_by_name(name).await?.is_some())
    }

    async fn vrf_exists(&self, name: &str) -> Result<bool, GatewayError> {
        Ok(self.link_by_name(name).await?.as_ref().is_some_and(is_vrf))
    }

    async fn list_vrf_devices(&self) -> Result<Vec<String>, GatewayError> {
        let mut names: Vec<String> = self
            .links()
            .await?
            .iter()
            .filter(|link| is_vrf(link))
            .filter_map(link_name)
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn table_id_for_vrf(&self, name: &str) -> Result<Option<u32>, GatewayError> {
        Ok(self
            .link_by_name(name)
            .await?
            .filter(is_vrf)
            .as_ref()
            .and_then(vrf_table))
    }

    async fn table_id_for_slave(&self, device: &str) -> Result<Option<u32>, GatewayError> {
        Ok(self.link_by_name(device).await?.as_ref().and_then(port_table))
    }

    async fn list_enslaved(&self, vrf: &str) -> Result<Vec<String>, GatewayError> {
        let json = self.ip(&["-j", "link", "show", "master", vrf]).await?;
        parse_link_names(&json)
    }

    async fn add_rule(
        &self,
        direction: Direction,
        family: Family,
        selector: &str,
        table: u32,
        priority: u32,
    ) -> Result<(), GatewayError> {
        let table = table.to_string();
        let priority = priority.to_string();
        self.ip(&[
            family.flag(),
            "rule",
            "add",
            "pref",
            &priority,
            direction.keyword(),
            selector,
            "table",
            &table,
        ])
        .await?;
        Ok(())
    }

    async fn delete_rule(
        &self,
        direction: Direction,
        family: Family,
        selector: &str,
    ) -> Result<(), GatewayError> {
        self.ip(&[family.flag(), "rule", "del", direction.keyword(), selector])
            .await?;
        Ok(())
    }

    async fn add_route(&self, table: u32, family: Family, metric: u32) -> Result<(), GatewayError> {
        let table = table.to_string();
        let metric = metric.to_string();
        self.ip(&[
            family.flag(),
            "route",
            "add",
            "table",
            &table,
            "unreachable",
            "default",
            "metric",
            &metric,
        ])
        .await?;
        Ok(())
    }

    async fn delete_route(
        &self,
        table: u32,
        family: Family,
        metric: u32,
    ) -> Result<(), GatewayError> {
        let table = table.to_string();
        let metric = metric.to_string();
        self.ip(&[
            family.flag(),
            "route",
            "del",
            "table",
            &table,
            "unreachable",
            "default",
            "metric",
            &metric,
        ])
        .await?;
        Ok(())
    }

    async fn dump_rules(&self, family: Family) -> Result<Vec<RuleRecord>, GatewayError> {
        let json = self.ip(&["-j", family.flag(), "rule", "show"]).await?;
        parse_rules(&json, family)
    }

    async fn dump_routes(
        &self,
        table: u32,
        family: Family,
    ) -> Result<Vec<RouteRecord>, GatewayError> {
        let table_arg = table.to_string();
        match self
            .ip(&["-j", family.flag(), "route", "show", "table", &table_arg])
            .await
        {
            Ok(json) => parse_routes(&json, family),
            // IPv6 reports a missing table as an error rather than an empty dump
            Err(GatewayError::CommandFailed { stderr, .. })
                if stderr.contains("does not exist") =>
            {
                debug!(table, %family, "Routing table does not exist");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}
