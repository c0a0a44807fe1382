//! Task-to-VRF classification

use crate::cgroup::ClassifierStore;
use crate::error::{AppError, CgroupError};
use crate::vrf::{validate_name, DEFAULT_VRF};

/// Maps process ids to VRF membership
pub struct TaskClassifier<'a, C> {
    store: &'a C,
}

impl<'a, C: ClassifierStore> TaskClassifier<'a, C> {
    pub fn new(store: &'a C) -> Self {
        Self { store }
    }

    /// VRF the task belongs to, or `default` when no node holds it
    pub fn identify(&self, pid: u32) -> Result<String, CgroupError> {
        for node in self.store.nodes()? {
            if self.store.tasks(&node)?.contains(&pid) {
                return Ok(node);
            }
        }
        Ok(DEFAULT_VRF.to_string())
    }

    /// Tasks per VRF, for one VRF or all of them
    pub fn list(&self, vrf: Option<&str>) -> Result<Vec<(String, Vec<u32>)>, CgroupError> {
        let nodes = match vrf {
            Some(vrf) => vec![vrf.to_string()],
            None => self.store.nodes()?,
        };
        nodes
            .into_iter()
            .map(|node| {
                let tasks = self.store.tasks(&node)?;
                Ok((node, tasks))
            })
            .collect()
    }

    /// Move a task into a VRF (or back to `default`)
    pub fn set(&self, vrf: &str, pid: u32) -> Result<(), AppError> {
        validate_name(vrf)?;
        self.store.assign_task(vrf, pid)?;
        Ok(())
    }
}
