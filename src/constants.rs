pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5;
pub const DEFAULT_SANDBOX_UID_BASE: u32 = 61000;
pub const DEFAULT_SANDBOX_UID_COUNT: u32 = 1000;

/// Upper bound on how late the supervising timer may notice a wall-clock breach.
pub const WALL_GRACE_MS: u64 = 50;

/// Address space allowed on top of twice the memory limit. Large enough that
/// an oversized allocation is caught by resident sampling as MLE.
pub const ADDRESS_SPACE_HEADROOM_MB: u64 = 2048;

/// ru_maxrss below the judge's own VmHWM plus this margin may be the fork
/// copy of the judge and is ignored.
pub const FORK_RSS_MARGIN_KB: u64 = 8 * 1024;

pub const SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

pub const PROBLEM_FILE: &str = "problem.json";
pub const TESTS_DIR: &str = "tests";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const GENERATION_FILE: &str = "generation.json";
pub const MANIFEST_VERSION: u32 = 1;

pub const DIAGNOSTICS_LIMIT_BYTES: usize = 64 * 1024;
pub const STDERR_LOG_LIMIT_BYTES: usize = 16 * 1024;

pub const REPORT_CHANNEL_SIZE: usize = 64;
