use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashSet;
use nix::unistd::{Gid, Uid, chown, geteuid};

use crate::core::errors::SystemError;

/// uid and gid a child is dropped to. Both carry the same number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SandboxIdentity {
    pub uid: u32,
    pub gid: u32,
}

impl SandboxIdentity {
    /// The identity a workdir was assigned to, when the judge runs as root
    /// and can drop to it. Directories owned by root mean "run as the judge".
    pub fn of_workdir(workdir: &Path) -> Option<Self> {
        if !geteuid().is_root() {
            return None;
        }
        let meta = std::fs::metadata(workdir).ok()?;
        (meta.uid() != 0).then(|| Self {
            uid: meta.uid(),
            gid: meta.gid(),
        })
    }
}

/// Hands out uids from `base..base + size` so concurrent submissions never
/// share a uid, and RLIMIT_NPROC counts one submission only.
#[derive(Debug)]
pub struct IdentityPool {
    base: u32,
    size: u32,
    leased: DashSet<u32>,
    next: AtomicU32,
}

impl IdentityPool {
    pub fn new(base: u32, size: u32) -> Self {
        Self {
            base,
            size,
            leased: DashSet::new(),
            next: AtomicU32::new(0),
        }
    }

    pub fn lease(self: &Arc<Self>) -> Result<IdentityLease, SystemError> {
        for _ in 0..self.size {
            let uid = self.base + self.next.fetch_add(1, Ordering::Relaxed) % self.size;
            if self.leased.insert(uid) {
                return Ok(IdentityLease {
                    pool: self.clone(),
                    identity: SandboxIdentity { uid, gid: uid },
                });
            }
        }
        Err(SystemError::IdentitiesExhausted(self.size))
    }

    pub fn in_use(&self) -> usize {
        self.leased.len()
    }
}

/// Returns its uid to the pool on drop.
#[derive(Debug)]
pub struct IdentityLease {
    pool: Arc<IdentityPool>,
    identity: SandboxIdentity,
}

impl IdentityLease {
    pub fn identity(&self) -> SandboxIdentity {
        self.identity
    }

    /// Hands `dir` to the leased identity; the limiter picks it up from there.
    pub fn assign(&self, dir: &Path) -> Result<(), SystemError> {
        chown(
            dir,
            Some(Uid::from_raw(self.identity.uid)),
            Some(Gid::from_raw(self.identity.gid)),
        )
        .map_err(|errno| SystemError::Workdir(errno.into()))
    }
}

impl Drop for IdentityLease {
    fn drop(&mut self) {
        self.pool.leased.remove(&self.identity.uid);
    }
}
