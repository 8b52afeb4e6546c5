use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    adapters::AdapterRegistry,
    core::{
        domain::Submission,
        errors::SystemError,
        pipeline::{
            compiling::compile_submission,
            running::{run_cases, selected_entries},
        },
        report::{AggregateMode, Logs, ResultPayload},
        traits::limiter::AbortSignal,
    },
    native::identity::IdentityPool,
    problem::Problem,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Compiling,
    CompileError,
    Running,
    Aggregated,
    Faulted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Compiling => "COMPILING",
            SessionState::CompileError => "CE",
            SessionState::Running => "RUNNING",
            SessionState::Aggregated => "AGGREGATED",
            SessionState::Faulted => "FAULTED",
        };
        f.write_str(label)
    }
}

/// Per-submission bookkeeping. Only advances forward.
#[derive(Debug)]
struct Session {
    id: Uuid,
    state: SessionState,
    compile_log: Option<String>,
}

impl Session {
    fn new(id: Uuid) -> Self {
        tracing::debug!("Submission {} -> {}", id, SessionState::Compiling);
        Self {
            id,
            state: SessionState::Compiling,
            compile_log: None,
        }
    }

    fn change_state(&mut self, state: SessionState) {
        tracing::debug!("Submission {}: {} -> {}", self.id, self.state, state);
        self.state = state;
    }
}

/// Judges one submission at a time against a problem directory.
#[derive(Debug, Clone)]
pub struct TestRunner {
    registry: Arc<AdapterRegistry>,
    work_root: PathBuf,
    aggregate: AggregateMode,
    identities: Option<Arc<IdentityPool>>,
}

impl TestRunner {
    pub fn new(registry: Arc<AdapterRegistry>, work_root: impl AsRef<Path>) -> Self {
        Self {
            registry,
            work_root: work_root.as_ref().to_path_buf(),
            aggregate: AggregateMode::default(),
            identities: None,
        }
    }

    /// Each submission's workdir is handed to its own uid from `pool`.
    pub fn with_identities(mut self, pool: Arc<IdentityPool>) -> Self {
        self.identities = Some(pool);
        self
    }

    pub fn with_aggregate(mut self, aggregate: AggregateMode) -> Self {
        self.aggregate = aggregate;
        self
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Never fails: judge faults become an `ERROR` payload.
    #[tracing::instrument(
        skip_all,
        fields(submission = %submission.id, language = %submission.language, problem = problem.slug())
    )]
    pub async fn judge(
        &self,
        problem: &Problem,
        submission: &Submission,
        abort: &AbortSignal,
    ) -> ResultPayload {
        let mut session = Session::new(submission.id);

        match self.evaluate(&mut session, problem, submission, abort).await {
            Ok(payload) => {
                tracing::info!("Submission {} finished with {}", submission.id, payload.status);
                payload
            }
            Err(e) => {
                tracing::error!("Submission {} failed: {}", submission.id, e);
                session.change_state(SessionState::Faulted);
                ResultPayload::system_error(e, session.compile_log.take())
            }
        }
    }

    async fn evaluate(
        &self,
        session: &mut Session,
        problem: &Problem,
        submission: &Submission,
        abort: &AbortSignal,
    ) -> Result<ResultPayload, SystemError> {
        let adapter = self.registry.get(submission.language)?;
        let limits = problem.spec.limits_for(submission.language);
        adapter.effective_limits(&limits).validate()?;
        let manifest = problem.fixtures().manifest().await?;
        let entries = selected_entries(&manifest, submission.selection);

        // Declared before the workdir so the uid is only released once the
        // directory is gone.
        let lease = self.identities.as_ref().map(|pool| pool.lease()).transpose()?;

        // Dropping the guard removes the directory on every return path.
        tokio::fs::create_dir_all(&self.work_root)
            .await
            .map_err(SystemError::Workdir)?;
        let workdir = tempfile::Builder::new()
            .prefix(&format!("{}-", submission.id))
            .tempdir_in(&self.work_root)
            .map_err(SystemError::Workdir)?;
        if let Some(lease) = &lease {
            lease.assign(workdir.path())?;
            tracing::debug!("Submission {} runs as uid {}", submission.id, lease.identity().uid);
        }

        let compiled = compile_submission(
            adapter.as_ref(),
            workdir.path(),
            &submission.source,
            &problem.spec.compile_limits,
            abort,
        )
        .await?;
        if !compiled.success {
            session.change_state(SessionState::CompileError);
            return Ok(ResultPayload::compile_error(compiled.diagnostics));
        }
        session.compile_log = Some(compiled.diagnostics).filter(|d| !d.trim().is_empty());

        session.change_state(SessionState::Running);
        let run = run_cases(
            adapter.as_ref(),
            workdir.path(),
            problem,
            &entries,
            &limits,
            abort,
        )
        .await?;

        session.change_state(SessionState::Aggregated);
        let logs = Logs {
            compile: session.compile_log.take(),
            stderr: run.stderr,
            error: None,
        };
        Ok(ResultPayload::aggregate(run.cases, self.aggregate, logs))
    }
}
