//! Table id validation and lookup
//!
//! Ids are always chosen by the caller. This module only checks them
//! against the allowed range and against what the kernel already uses.

use crate::error::{AppError, NotFoundError, ValidationError};
use crate::gateway::KernelGateway;
use crate::vrf::{TBID_MAX, TBID_MIN};
use tracing::debug;

/// Where a table id is being used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableContext {
    /// Creating a new VRF: the id must be in range
    Add,
    /// configure/teardown of an already allocated id
    Existing,
}

/// Closed range of table ids available to VRFs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRange {
    pub min: u32,
    pub max: u32,
}

impl Default for TableRange {
    fn default() -> Self {
        Self {
            min: TBID_MIN,
            max: TBID_MAX,
        }
    }
}

impl TableRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, id: u32) -> bool {
        (self.min..=self.max).contains(&id)
    }

    pub fn validate(&self, id: u32, context: TableContext) -> Result<u32, ValidationError> {
        match context {
            TableContext::Existing => Ok(id),
            TableContext::Add if self.contains(id) => Ok(id),
            TableContext::Add => Err(ValidationError::TableOutOfRange {
                id,
                min: self.min,
                max: self.max,
            }),
        }
    }
}

/// Resolves table ids from live kernel state
pub struct TableResolver<'a, G> {
    gateway: &'a G,
}

impl<'a, G: KernelGateway> TableResolver<'a, G> {
    pub fn new(gateway: &'a G) -> Self {
        Self { gateway }
    }

    /// Table bound to a VRF device
    pub async fn lookup(&self, vrf: &str) -> Result<u32, AppError> {
        self.gateway
            .table_id_for_vrf(vrf)
            .await?
            .ok_or_else(|| NotFoundError::TableId(vrf.to_string()).into())
    }

    /// Table of the VRF a device is enslaved to
    pub async fn lookup_by_device(&self, device: &str) -> Result<u32, AppError> {
        self.gateway
            .table_id_for_slave(device)
            .await?
            .ok_or_else(|| NotFoundError::TableId(device.to_string()).into())
    }

    /// Table for either a VRF or an enslaved device; the VRF query wins
    pub async fn lookup_any(&self, name: &str) -> Result<u32, AppError> {
        match self.gateway.table_id_for_vrf(name).await? {
            Some(id) => Ok(id),
            None => {
                debug!(name, "No VRF table, trying enslaved device");
                self.lookup_by_device(name).await
            }
        }
    }

    /// Reject an id already bound to a VRF other than `vrf`
    pub async fn ensure_unused(&self, id: u32, vrf: &str) -> Result<(), AppError> {
        for other in self.gateway.list_vrf_devices().await? {
            if other == vrf {
                continue;
            }
            if self.gateway.table_id_for_vrf(&other).await? == Some(id) {
                return Err(ValidationError::TableInUse { id, vrf: other }.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::FakeGateway;

    #[test]
    fn test_range_validation_in_add_context() {
        let range = TableRange::default();
        assert_eq!(range.validate(1001, TableContext::Add), Ok(1001));
        assert_eq!(range.validate(1255, TableContext::Add), Ok(1255));
        assert_eq!(
            range.validate(1000, TableContext::Add),
            Err(ValidationError::TableOutOfRange {
                id: 1000,
                min: 1001,
                max: 1255
            })
        );
        assert!(range.validate(1256, TableContext::Add).is_err());
    }

    #[test]
    fn test_range_not_enforced_for_existing() {
        let range = TableRange::default();
        assert_eq!(range.validate(5000, TableContext::Existing), Ok(5000));
        assert_eq!(range.validate(10, TableContext::Existing), Ok(10));
    }

    #[tokio::test]
    async fn test_lookup_vrf_and_device() {
        let gateway = FakeGateway::legacy().with_vrf("red", 1001);
        gateway
            .state()
            .slaves
            .insert("swp1".to_string(), "red".to_string());

        let resolver = TableResolver::new(&gateway);
        assert_eq!(resolver.lookup("red").await.unwrap(), 1001);
        assert_eq!(resolver.lookup_by_device("swp1").await.unwrap(), 1001);
        assert_eq!(resolver.lookup_any("red").await.unwrap(), 1001);
        assert_eq!(resolver.lookup_any("swp1").await.unwrap(), 1001);

        assert!(matches!(
            resolver.lookup("swp1").await,
            Err(AppError::NotFound(NotFoundError::TableId(_)))
        ));
        assert!(matches!(
            resolver.lookup_any("nope").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_unused() {
        let gateway = FakeGateway::legacy()
            .with_vrf("red", 1001)
            .with_vrf("blue", 1002);
        let resolver = TableResolver::new(&gateway);

        assert!(resolver.ensure_unused(1003, "green").await.is_ok());
        assert!(resolver.ensure_unused(1001, "red").await.is_ok());
        assert!(matches!(
            resolver.ensure_unused(1002, "green").await,
            Err(AppError::Validation(ValidationError::TableInUse { id: 1002, .. }))
        ));
    }
}
