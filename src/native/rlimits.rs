use std::io;

use nix::sys::resource::{Resource, getrlimit, setrlimit};

use crate::{constants::ADDRESS_SPACE_HEADROOM_MB, core::domain::ExecutionLimits};

const MB: u64 = 1024 * 1024;

/// Ceilings installed in the child between fork and exec.
#[derive(Clone, Debug, PartialEq)]
pub struct RlimitPlan {
    entries: Vec<(Resource, u64, u64)>,
}

impl RlimitPlan {
    /// RLIMIT_NPROC is left out: it counts every process of the real uid and
    /// is ignored for root. See [`RlimitPlan::with_process_limit`].
    pub fn for_limits(limits: &ExecutionLimits, limit_address_space: bool) -> Self {
        let cpu_secs = limits.cpu_time_ms.div_ceil(1000);
        let mut plan = Self { entries: Vec::new() }
            .with(Resource::RLIMIT_CPU, cpu_secs, cpu_secs + 1)
            .with(Resource::RLIMIT_STACK, limits.stack_mb * MB, limits.stack_mb * MB)
            .with(Resource::RLIMIT_FSIZE, limits.file_size_mb * MB, limits.file_size_mb * MB)
            .with(Resource::RLIMIT_NOFILE, limits.max_open_files, limits.max_open_files)
            .with(Resource::RLIMIT_CORE, 0, 0);
        if limit_address_space {
            // Backstop only: resident memory sampling decides MLE.
            let bytes = (limits.memory_mb * 2 + ADDRESS_SPACE_HEADROOM_MB) * MB;
            plan = plan.with(Resource::RLIMIT_AS, bytes, bytes);
        }
        plan
    }

    /// Only meaningful once the child runs under a uid of its own.
    pub fn with_process_limit(self, max_processes: u64) -> Self {
        self.with(Resource::RLIMIT_NPROC, max_processes, max_processes)
    }

    fn with(mut self, resource: Resource, soft: u64, hard: u64) -> Self {
        // An unprivileged process cannot raise a hard limit.
        let entry = match getrlimit(resource) {
            Ok((_, current_hard)) => {
                let hard = hard.min(current_hard);
                (resource, soft.min(hard), hard)
            }
            Err(_) => (resource, soft, hard),
        };
        self.entries.push(entry);
        self
    }

    /// Must stay async-signal-safe: it runs in the forked child.
    pub fn apply(&self) -> io::Result<()> {
        for (resource, soft, hard) in &self.entries {
            setrlimit(*resource, *soft, *hard)?;
        }
        Ok(())
    }

    pub fn get(&self, resource: Resource) -> Option<(u64, u64)> {
        self.entries
            .iter()
            .find(|(r, _, _)| *r == resource)
            .map(|(_, soft, hard)| (*soft, *hard))
    }
}
