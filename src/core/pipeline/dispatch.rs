use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::StreamExt;
use serde::Serialize;
use tokio::{
    sync::mpsc::{Receiver, Sender},
    task::JoinHandle,
};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::{
    core::{
        domain::{Language, Submission},
        pipeline::session::TestRunner,
        report::ResultPayload,
        traits::limiter::{AbortHandle, abort_pair},
    },
    problem::Problem,
};

#[derive(Clone, Debug)]
pub struct JudgeJob {
    pub problem: Arc<Problem>,
    pub submission: Submission,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JudgeReport {
    pub submission_id: Uuid,
    pub problem: String,
    pub language: Language,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub result: ResultPayload,
}

/// Fixed-size pool of concurrent sessions. Sessions share nothing but the
/// read-only adapter registry.
#[derive(Debug)]
pub struct Dispatcher {
    runner: Arc<TestRunner>,
    workers: usize,
    active: DashMap<Uuid, AbortHandle>,
}

impl Dispatcher {
    pub fn new(runner: Arc<TestRunner>, workers: usize) -> Self {
        Self {
            runner,
            workers: workers.max(1),
            active: DashMap::new(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of sessions currently being judged.
    pub fn active(&self) -> usize {
        self.active.len()
    }

    /// Kills the running case of a submission and fails it with `ERROR`.
    /// Returns false when the submission is not running.
    pub fn abort(&self, id: &Uuid) -> bool {
        match self.active.get(id) {
            Some(handle) => {
                tracing::info!("Aborting submission {}", id);
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub async fn judge(&self, job: JudgeJob) -> JudgeReport {
        let id = job.submission.id;
        let (handle, signal) = abort_pair();
        self.active.insert(id, handle);

        let started_at = Utc::now();
        let result = self.runner.judge(&job.problem, &job.submission, &signal).await;
        self.active.remove(&id);

        JudgeReport {
            submission_id: id,
            problem: job.problem.slug().to_string(),
            language: job.submission.language,
            started_at,
            finished_at: Utc::now(),
            result,
        }
    }

    /// Judges jobs from `job_rx` with at most `workers` in flight, sending
    /// each report as soon as its session ends.
    #[tracing::instrument(skip_all, fields(workers = self.workers))]
    pub fn spawn(
        self: &Arc<Self>,
        job_rx: Receiver<JudgeJob>,
        res_tx: Sender<JudgeReport>,
    ) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            ReceiverStream::new(job_rx)
                .for_each_concurrent(dispatcher.workers, |job| {
                    let dispatcher = dispatcher.clone();
                    let res_tx = res_tx.clone();
                    async move {
                        let report = dispatcher.judge(job).await;
                        tracing::debug!(
                            "Submission {} reported as {}",
                            report.submission_id,
                            report.result.status
                        );
                        if res_tx.send(report).await.is_err() {
                            tracing::warn!("Report receiver dropped");
                        }
                    }
                })
                .await;
        })
    }
}
