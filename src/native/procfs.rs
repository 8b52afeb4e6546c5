use std::fs;

/// The tree walk stops here so a fork bomb cannot stall the watchdog.
const MAX_TRACKED_PROCESSES: usize = 4096;

/// Memory figures of one process, in KiB, from `/proc/<pid>/status`.
///
/// The high-water marks restart at exec, so unlike `ru_maxrss` they never
/// include the judge's own pages copied by fork.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryStatus {
    /// `VmRSS`
    pub resident_kb: u64,
    /// `VmHWM`
    pub peak_resident_kb: u64,
    /// `VmPeak`
    pub peak_virtual_kb: u64,
}

/// `None` for processes that are gone or already zombies.
pub fn memory_status(pid: i32) -> Option<MemoryStatus> {
    let status = fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    parse_memory_status(&status)
}

/// User plus system CPU time of `pid` in milliseconds.
pub fn cpu_time_ms(pid: i32, ticks_per_sec: u64) -> Option<u64> {
    let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    let ticks = parse_stat_cpu_ticks(&stat)?;
    Some(ticks * 1000 / ticks_per_sec.max(1))
}

pub fn clock_ticks() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 { ticks as u64 } else { 100 }
}

/// `root` followed by its live descendants, breadth first. A process whose
/// parent already exited has been reparented and is no longer reachable.
pub fn process_tree(root: i32) -> Vec<i32> {
    let mut tree = vec![root];
    let mut next = 0;
    while next < tree.len() && tree.len() < MAX_TRACKED_PROCESSES {
        let parent = tree[next];
        next += 1;
        tree.extend(children(parent));
    }
    tree.truncate(MAX_TRACKED_PROCESSES);
    tree
}

/// Children of every thread of `pid`; any thread may fork.
fn children(pid: i32) -> Vec<i32> {
    let Ok(tasks) = fs::read_dir(format!("/proc/{pid}/task")) else {
        return Vec::new();
    };
    tasks
        .filter_map(Result::ok)
        .filter_map(|task| fs::read_to_string(task.path().join("children")).ok())
        .flat_map(|list| parse_pid_list(&list))
        .collect()
}

fn parse_pid_list(list: &str) -> Vec<i32> {
    list.split_whitespace().filter_map(|pid| pid.parse().ok()).collect()
}

fn parse_memory_status(status: &str) -> Option<MemoryStatus> {
    Some(MemoryStatus {
        resident_kb: parse_status_field(status, "VmRSS:")?,
        peak_resident_kb: parse_status_field(status, "VmHWM:")?,
        peak_virtual_kb: parse_status_field(status, "VmPeak:").unwrap_or(0),
    })
}

fn parse_status_field(status: &str, field: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix(field))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
}

/// The command name may contain spaces and parentheses, so fields are
/// counted from the last `)`.
fn parse_stat_cpu_ticks(stat: &str) -> Option<u64> {
    let (_, rest) = stat.rsplit_once(')')?;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}
