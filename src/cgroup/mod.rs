//! Control-group classification of tasks into VRFs
//!
//! A VRF's classifier node is a directory under the cgroup root; a task is
//! in the VRF when its pid is listed in that node's `cgroup.procs`.

use crate::error::CgroupError;
use crate::vrf::is_reserved;
use nix::errno::Errno;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod classifier;

pub use classifier::TaskClassifier;

const PROCS_FILE: &str = "cgroup.procs";

/// Per-VRF classifier nodes
pub trait ClassifierStore {
    fn ensure_node(&self, vrf: &str) -> Result<(), CgroupError>;

    /// Remove a node. A missing node is success; a node still holding
    /// tasks reports [`CgroupError::NodeBusy`].
    fn remove_node(&self, vrf: &str) -> Result<(), CgroupError>;

    /// Move a task into a VRF; the reserved name moves it back to the root
    fn assign_task(&self, vrf: &str, pid: u32) -> Result<(), CgroupError>;

    fn tasks(&self, vrf: &str) -> Result<Vec<u32>, CgroupError>;

    /// Names of all existing nodes
    fn nodes(&self) -> Result<Vec<String>, CgroupError>;
}

/// Classifier nodes on a mounted cgroup filesystem
pub struct CgroupFs {
    root: PathBuf,
}

fn io_error(path: &Path, source: io::Error) -> CgroupError {
    CgroupError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl CgroupFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn node_path(&self, vrf: &str) -> PathBuf {
        if is_reserved(vrf) {
            self.root.clone()
        } else {
            self.root.join(vrf)
        }
    }
}

impl ClassifierStore for CgroupFs {
    fn ensure_node(&self, vrf: &str) -> Result<(), CgroupError> {
        let path = self.node_path(vrf);
        fs::create_dir_all(&path).map_err(|e| io_error(&path, e))
    }

    fn remove_node(&self, vrf: &str) -> Result<(), CgroupError> {
        if is_reserved(vrf) {
            return Ok(());
        }
        let path = self.node_path(vrf);
        match fs::remove_dir(&path) {
            Ok(()) => {
                debug!(vrf, "Removed cgroup node");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) if e.raw_os_error() == Some(Errno::EBUSY as i32) => {
                Err(CgroupError::NodeBusy {
                    vrf: vrf.to_string(),
                })
            }
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn assign_task(&self, vrf: &str, pid: u32) -> Result<(), CgroupError> {
        self.ensure_node(vrf)?;
        let path = self.node_path(vrf).join(PROCS_FILE);
        fs::write(&path, format!("{}\n", pid)).map_err(|e| io_error(&path, e))
    }

    fn tasks(&self, vrf: &str) -> Result<Vec<u32>, CgroupError> {
        let path = self.node_path(vrf).join(PROCS_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content
                .lines()
                .filter_map(|line| line.trim().parse().ok())
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn nodes(&self) -> Result<Vec<String>, CgroupError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.root, e)),
        };

        let mut nodes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.root, e))?;
            if entry.path().is_dir() {
                nodes.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        nodes.sort();
        Ok(nodes)
    }
}
