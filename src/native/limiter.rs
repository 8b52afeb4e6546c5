use std::io::{self, Read, Write};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;

use crate::{
    constants::{DEFAULT_POLL_INTERVAL_MS, FORK_RSS_MARGIN_KB, SANDBOX_PATH, WALL_GRACE_MS},
    core::{
        domain::{ExecutionLimits, RunResult},
        errors::LimiterError,
        traits::limiter::{AbortSignal, CommandSpec, Limiter},
    },
    native::{identity::SandboxIdentity, procfs, rlimits::RlimitPlan},
};

/// Runs children in their own process group under setrlimit ceilings, with a
/// watchdog thread enforcing wall time and the sampled CPU time, memory and
/// process count of the whole tree. A workdir handed to a sandbox identity
/// makes a root judge drop the child to that uid.
#[derive(Clone, Debug)]
pub struct NativeLimiter {
    poll_interval: Duration,
}

impl NativeLimiter {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval
                .clamp(Duration::from_millis(1), Duration::from_millis(WALL_GRACE_MS)),
        }
    }
}

impl Default for NativeLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }
}

#[async_trait::async_trait]
impl Limiter for NativeLimiter {
    #[tracing::instrument(skip(self, stdin, abort), fields(program = %command.program))]
    async fn execute(
        &self,
        command: &CommandSpec,
        stdin: &str,
        limits: &ExecutionLimits,
        abort: &AbortSignal,
    ) -> Result<RunResult, LimiterError> {
        limits.validate()?;
        if *abort.borrow() {
            return Err(LimiterError::Aborted);
        }

        let supervisor = Supervisor {
            program: resolve_program(command)?,
            command: command.clone(),
            stdin: stdin.as_bytes().to_vec(),
            limits: limits.clone(),
            abort: abort.clone(),
            poll_interval: self.poll_interval,
        };

        let result = tokio::task::spawn_blocking(move || supervisor.run())
            .await
            .map_err(|e| LimiterError::Supervisor(e.to_string()))??;

        tracing::debug!(
            "Process finished: exit={:?} signal={:?} wall={}ms cpu={}ms peak={:.1}MB",
            result.exit_code,
            result.signal,
            result.wall_time_ms,
            result.cpu_time_ms,
            result.peak_memory_mb
        );
        Ok(result)
    }
}

fn resolve_program(command: &CommandSpec) -> Result<PathBuf, LimiterError> {
    if command.program.contains('/') {
        return Ok(PathBuf::from(&command.program));
    }
    let search_path = command
        .env
        .iter()
        .find(|(key, _)| key == "PATH")
        .map(|(_, value)| value.as_str())
        .unwrap_or(SANDBOX_PATH);
    which::which_in(&command.program, Some(search_path), &command.workdir)
        .map_err(|_| LimiterError::ProgramNotFound(command.program.clone()))
}

struct Supervisor {
    program: PathBuf,
    command: CommandSpec,
    stdin: Vec<u8>,
    limits: ExecutionLimits,
    abort: AbortSignal,
    poll_interval: Duration,
}

impl Supervisor {
    fn run(self) -> Result<RunResult, LimiterError> {
        let identity = SandboxIdentity::of_workdir(&self.command.workdir);
        let mut plan = RlimitPlan::for_limits(&self.limits, self.command.limit_address_space);
        if identity.is_some() {
            plan = plan.with_process_limit(self.limits.max_processes);
        }

        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.command.args)
            .current_dir(&self.command.workdir)
            .env_clear()
            .envs(self.command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        if let Some(identity) = identity {
            // Applied before the pre_exec hook, so RLIMIT_NPROC binds the new uid.
            cmd.uid(identity.uid).gid(identity.gid);
        }
        // SAFETY: the hook only issues setrlimit(2) and allocates nothing.
        unsafe {
            cmd.pre_exec(move || plan.apply());
        }

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| LimiterError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;
        let pid = child.id() as i32;

        // Detached: a child that never reads stdin must not block us. The
        // write fails with EPIPE once the group is gone.
        if let Some(mut pipe) = child.stdin.take() {
            let input = self.stdin;
            thread::spawn(move || {
                let _ = pipe.write_all(&input);
            });
        }

        let cap = self.limits.max_output_bytes as usize;
        let overflow = Arc::new(AtomicBool::new(false));
        let stdout = child
            .stdout
            .take()
            .map(|pipe| capture(pipe, cap, pid, overflow.clone()));
        let stderr = child
            .stderr
            .take()
            .map(|pipe| capture(pipe, cap, pid, overflow.clone()));

        let (done_tx, done_rx) = mpsc::channel();
        let watchdog = Watchdog {
            pid,
            started,
            wall: Duration::from_millis(self.limits.wall_time_ms),
            cpu_limit_ms: self.limits.cpu_time_ms,
            memory_limit_kb: self.limits.memory_mb * 1024,
            max_processes: self.limits.max_processes,
            ticks_per_sec: procfs::clock_ticks(),
            poll_interval: self.poll_interval,
            abort: self.abort,
        };
        let watchdog = thread::spawn(move || watchdog.watch(done_rx));

        let waited = wait_for_exit(pid);
        let wall_time_ms = started.elapsed().as_millis() as u64;
        let _ = done_tx.send(());
        let verdict = watchdog
            .join()
            .map_err(|_| LimiterError::Supervisor("watchdog thread panicked".to_string()))?;

        // Descendants that outlived the leader still hold the pipes.
        kill_group(pid);
        let (status, usage) = waited?;

        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if verdict.aborted {
            return Err(LimiterError::Aborted);
        }

        let (exit_code, signal) = decode_status(status);
        let cpu_time_ms = timeval_ms(usage.ru_utime) + timeval_ms(usage.ru_stime);
        let peak_kb = verdict.peak_kb.max(trusted_maxrss(&usage));

        let cpu_exhausted = cpu_time_ms > self.limits.cpu_time_ms
            && matches!(signal, Some(s) if s == libc::SIGXCPU || s == libc::SIGKILL);
        let timed_out = verdict.timed_out || cpu_exhausted || signal == Some(libc::SIGXCPU);
        let memory_limit_kb = self.limits.memory_mb * 1024;
        // A failed allocation under RLIMIT_AS surfaces as a crash; the
        // reserved address space shows what the program was after.
        let address_space_exhausted = self.command.limit_address_space
            && (signal.is_some() || exit_code != Some(0))
            && verdict.peak_virtual_kb > memory_limit_kb;
        let memory_exceeded = !timed_out
            && (verdict.memory_exceeded || peak_kb > memory_limit_kb || address_space_exhausted);

        Ok(RunResult {
            exit_code,
            signal,
            wall_time_ms,
            cpu_time_ms: cpu_time_ms.max(verdict.cpu_ms),
            peak_memory_mb: peak_kb as f64 / 1024.0,
            timed_out,
            memory_exceeded,
            output_exceeded: overflow.load(Ordering::SeqCst),
            processes_exceeded: !timed_out && !memory_exceeded && verdict.processes_exceeded,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

/// `ru_maxrss` also covers the moments between fork and exec, when the child
/// is still a copy of the judge. It only counts once it exceeds that copy.
fn trusted_maxrss(usage: &libc::rusage) -> u64 {
    let reported = usage.ru_maxrss.max(0) as u64;
    let judge_kb = procfs::memory_status(std::process::id() as i32)
        .map(|m| m.peak_resident_kb)
        .unwrap_or(u64::MAX);
    if reported > judge_kb.saturating_add(FORK_RSS_MARGIN_KB) {
        reported
    } else {
        0
    }
}

#[derive(Debug, Default)]
struct Verdict {
    timed_out: bool,
    memory_exceeded: bool,
    processes_exceeded: bool,
    aborted: bool,
    peak_kb: u64,
    peak_virtual_kb: u64,
    cpu_ms: u64,
}

impl Verdict {
    fn must_kill(&self) -> bool {
        self.timed_out || self.memory_exceeded || self.processes_exceeded || self.aborted
    }
}

struct Watchdog {
    pid: i32,
    started: Instant,
    wall: Duration,
    cpu_limit_ms: u64,
    memory_limit_kb: u64,
    max_processes: u64,
    ticks_per_sec: u64,
    poll_interval: Duration,
    abort: AbortSignal,
}

impl Watchdog {
    fn watch(self, done: mpsc::Receiver<()>) -> Verdict {
        let mut verdict = Verdict::default();
        loop {
            // First sample right after exec catches short-lived peaks.
            self.sample(&mut verdict);
            if self.started.elapsed() >= self.wall {
                verdict.timed_out = true;
            }
            verdict.aborted = *self.abort.borrow();

            if verdict.must_kill() {
                tracing::debug!("Killing process group {}: {:?}", self.pid, verdict);
                kill_group(self.pid);
                return verdict;
            }

            let remaining = self.wall.saturating_sub(self.started.elapsed());
            match done.recv_timeout(self.poll_interval.min(remaining)) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return verdict,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }

    /// Memory is the larger of the summed resident sets and any single
    /// process's high-water mark. CPU is summed over live members.
    fn sample(&self, verdict: &mut Verdict) {
        let tree = procfs::process_tree(self.pid);
        let mut resident_kb = 0;
        let mut cpu_ms = 0;
        for &pid in &tree {
            if let Some(memory) = procfs::memory_status(pid) {
                resident_kb += memory.resident_kb;
                verdict.peak_kb = verdict.peak_kb.max(memory.peak_resident_kb);
                verdict.peak_virtual_kb = verdict.peak_virtual_kb.max(memory.peak_virtual_kb);
            }
            cpu_ms += procfs::cpu_time_ms(pid, self.ticks_per_sec).unwrap_or(0);
        }

        verdict.peak_kb = verdict.peak_kb.max(resident_kb);
        verdict.memory_exceeded = verdict.peak_kb > self.memory_limit_kb;
        verdict.cpu_ms = verdict.cpu_ms.max(cpu_ms);
        verdict.timed_out = verdict.cpu_ms > self.cpu_limit_ms;
        verdict.processes_exceeded = tree.len() as u64 > self.max_processes;
    }
}

fn capture<R>(mut pipe: R, cap: usize, pid: i32, overflow: Arc<AtomicBool>) -> JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut kept = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let room = cap.saturating_sub(kept.len());
                    kept.extend_from_slice(&buf[..n.min(room)]);
                    if n > room && !overflow.swap(true, Ordering::SeqCst) {
                        kill_group(pid);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        kept
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default()
}

fn kill_group(pgid: i32) {
    // ESRCH just means the group is already gone.
    let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
}

fn wait_for_exit(pid: i32) -> Result<(libc::c_int, libc::rusage), LimiterError> {
    let mut status: libc::c_int = 0;
    // SAFETY: rusage is plain old data.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    loop {
        // SAFETY: pid is an unreaped child of this process and both
        // out-pointers are valid for the duration of the call.
        let rc = unsafe { libc::wait4(pid, &mut status, 0, &mut usage) };
        if rc == pid {
            return Ok((status, usage));
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(LimiterError::Wait { pid, source: err });
        }
    }
}

fn decode_status(status: libc::c_int) -> (Option<i32>, Option<i32>) {
    if libc::WIFEXITED(status) {
        (Some(libc::WEXITSTATUS(status)), None)
    } else if libc::WIFSIGNALED(status) {
        (None, Some(libc::WTERMSIG(status)))
    } else {
        (None, None)
    }
}

fn timeval_ms(tv: libc::timeval) -> u64 {
    (tv.tv_sec.max(0) as u64) * 1000 + (tv.tv_usec.max(0) as u64) / 1000
}
