//! Per-VRF advisory lock
//!
//! Serialises mutating invocations against the same VRF. The lock is an
//! exclusive `flock` on `<dir>/<vrf>.lock`, released when the guard drops.

use crate::error::LockError;
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct VrfLock {
    _lock: Flock<File>,
    path: PathBuf,
}

impl VrfLock {
    /// Take the lock without blocking
    pub fn acquire(dir: &Path, vrf: &str) -> Result<Self, LockError> {
        let path = dir.join(format!("{}.lock", vrf));
        let open_error = |source| LockError::Open {
            path: path.display().to_string(),
            source,
        };

        fs::create_dir_all(dir).map_err(open_error)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(open_error)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => {
                debug!(vrf, path = %path.display(), "Acquired lock");
                Ok(Self { _lock: lock, path })
            }
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Err(LockError::Busy {
                vrf: vrf.to_string(),
            }),
            Err((_, errno)) => Err(open_error(errno.into())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
