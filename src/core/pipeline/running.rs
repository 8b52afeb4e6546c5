use std::path::Path;

use crate::{
    constants::STDERR_LOG_LIMIT_BYTES,
    core::{
        domain::{ExecutionLimits, RunResult, TestCase, TestOutcome, TestSelection},
        errors::SystemError,
        report::CaseReport,
        traits::{adapter::LanguageAdapter, comparator::Comparator, limiter::AbortSignal},
    },
    problem::{Manifest, ManifestEntry, Problem},
};

/// Runtime messages for an allocation the address-space ceiling refused.
const OUT_OF_MEMORY_MARKERS: &[&str] = &[
    "std::bad_alloc",
    "MemoryError",
    "java.lang.OutOfMemoryError",
    "JavaScript heap out of memory",
];

#[derive(Clone, Debug, PartialEq)]
pub struct Verdict {
    pub outcome: TestOutcome,
    pub diff: Option<String>,
    /// Describes a forced or abnormal termination. Never contains output.
    pub message: Option<String>,
}

impl Verdict {
    fn terminated(outcome: TestOutcome, message: String) -> Self {
        Self {
            outcome,
            diff: None,
            message: Some(message),
        }
    }
}

/// Resource violations first, then crashes, then the comparator. Output of a
/// killed or crashed process is never compared.
pub fn classify(
    result: &RunResult,
    limits: &ExecutionLimits,
    comparator: &dyn Comparator,
    expected: &str,
) -> Verdict {
    if result.timed_out {
        return Verdict::terminated(
            TestOutcome::Tle,
            format!("time limit of {} ms exceeded", limits.wall_time_ms),
        );
    }
    if result.memory_exceeded {
        return Verdict::terminated(
            TestOutcome::Mle,
            format!("memory limit of {} MB exceeded", limits.memory_mb),
        );
    }
    if result.output_exceeded {
        return Verdict::terminated(
            TestOutcome::Re,
            format!("output limit of {} bytes exceeded", limits.max_output_bytes),
        );
    }
    if result.processes_exceeded {
        return Verdict::terminated(
            TestOutcome::Re,
            format!("process limit of {} exceeded", limits.max_processes),
        );
    }
    let abnormal = result.signal.is_some() || result.exit_code != Some(0);
    if abnormal && OUT_OF_MEMORY_MARKERS.iter().any(|m| result.stderr.contains(m)) {
        return Verdict::terminated(
            TestOutcome::Mle,
            format!("memory limit of {} MB exceeded (allocation failed)", limits.memory_mb),
        );
    }
    if let Some(signal) = result.signal {
        return Verdict::terminated(TestOutcome::Re, format!("killed by signal {signal}"));
    }
    match result.exit_code {
        Some(0) => {}
        Some(code) => {
            return Verdict::terminated(TestOutcome::Re, format!("exited with code {code}"));
        }
        None => return Verdict::terminated(TestOutcome::Re, "terminated abnormally".to_string()),
    }

    let comparison = comparator.compare(expected, &result.stdout);
    Verdict {
        outcome: if comparison.matched {
            TestOutcome::Ok
        } else {
            TestOutcome::Wa
        },
        diff: comparison.diff,
        message: None,
    }
}

/// Hidden cases report only id, status and metrics.
pub fn case_report(case: &TestCase, result: RunResult, verdict: Verdict) -> CaseReport {
    let mut report = CaseReport {
        time_ms: result.wall_time_ms,
        memory_mb: result.peak_memory_mb,
        message: verdict.message,
        ..CaseReport::new(&case.id, verdict.outcome)
    };
    if case.set.is_disclosed() {
        report.input = Some(case.input.clone());
        report.expected = Some(case.expected.clone());
        report.actual = Some(result.stdout);
        report.diff = verdict.diff;
    }
    report
}

/// Case results plus the stderr log collected from disclosed cases.
#[derive(Debug, Default)]
pub struct CaseRun {
    pub cases: Vec<CaseReport>,
    pub stderr: Option<String>,
}

/// Runs every selected case in manifest order against one compiled artifact.
/// A fixture fault or abort stops the loop; user failures never do.
#[tracing::instrument(skip_all, fields(problem = problem.slug()))]
pub async fn run_cases(
    adapter: &dyn LanguageAdapter,
    workdir: &Path,
    problem: &Problem,
    entries: &[ManifestEntry],
    limits: &ExecutionLimits,
    abort: &AbortSignal,
) -> Result<CaseRun, SystemError> {
    let store = problem.fixtures();
    let effective = adapter.effective_limits(limits);
    let mut run = CaseRun::default();
    let mut stderr_log = StderrLog::default();

    for entry in entries {
        if *abort.borrow() {
            return Err(SystemError::Aborted);
        }
        let case = store.load_case(entry).await?;
        let comparator = problem.spec.comparator_for(&case).build();

        let result = adapter.run(workdir, &case.input, limits, abort).await?;
        let verdict = classify(&result, &effective, comparator.as_ref(), &case.expected);
        tracing::debug!(
            "Case {} -> {} ({} ms, {:.1} MB)",
            case.id,
            verdict.outcome,
            result.wall_time_ms,
            result.peak_memory_mb
        );

        if case.set.is_disclosed() {
            stderr_log.push(&case.id, &result.stderr);
        }
        run.cases.push(case_report(&case, result, verdict));
    }

    run.stderr = stderr_log.finish();
    Ok(run)
}

pub fn selected_entries(manifest: &Manifest, selection: TestSelection) -> Vec<ManifestEntry> {
    manifest.selected(selection).cloned().collect()
}

#[derive(Default)]
struct StderrLog {
    text: String,
    truncated: bool,
}

impl StderrLog {
    fn push(&mut self, id: &str, stderr: &str) {
        if stderr.trim().is_empty() || self.truncated {
            return;
        }
        let section = format!("[{id}]\n{}\n", stderr.trim_end());
        let room = STDERR_LOG_LIMIT_BYTES.saturating_sub(self.text.len());
        if section.len() <= room {
            self.text.push_str(&section);
        } else {
            let mut cut = room;
            while !section.is_char_boundary(cut) {
                cut -= 1;
            }
            self.text.push_str(&section[..cut]);
            self.text.push_str("\n[stderr truncated]\n");
            self.truncated = true;
        }
    }

    fn finish(self) -> Option<String> {
        (!self.text.is_empty()).then_some(self.text)
    }
}
