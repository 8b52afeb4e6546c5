use std::collections::HashMap;
use std::panic;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use judge_core::{
    adapters::AdapterRegistry,
    api::{mappers::JudgeRequest, models::SubmissionRequest},
    config::JudgeConfig,
    constants::REPORT_CHANNEL_SIZE,
    core::{
        domain::{Language, Submission, TestSelection},
        pipeline::{
            dispatch::{Dispatcher, JudgeJob, JudgeReport},
            session::TestRunner,
        },
        traits::limiter::never_abort,
    },
    generator::generate_for_problem,
    native::{identity::IdentityPool, limiter::NativeLimiter},
    problem::Problem,
};

#[derive(Debug, Parser)]
#[command(name = "judge", about = "Compile, run and judge submissions under resource limits")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "JUDGE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "JUDGE_WORK_ROOT")]
    work_root: Option<PathBuf>,

    #[arg(long, env = "JUDGE_WORKERS")]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Judge one submission and print the result payload.
    Run {
        #[arg(long)]
        problem: PathBuf,
        #[arg(long)]
        language: Language,
        #[arg(long)]
        source: PathBuf,
        #[arg(long, default_value = "sample")]
        tests: TestSelection,
    },
    /// Judge a JSON array of submission requests through the worker pool.
    Batch {
        #[arg(long)]
        requests: PathBuf,
    },
    /// Generate fixtures from the problem's test spec and reference solution.
    GenTests {
        #[arg(long)]
        problem: PathBuf,
        /// Replace fixtures that already exist.
        #[arg(long)]
        force: bool,
    },
    /// List supported languages and their toolchains.
    Languages,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = JudgeConfig::load_or_default(cli.config.as_deref())?;
    if let Some(work_root) = cli.work_root {
        config.work_root = work_root;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
    set_panic_hook();

    let limiter = Arc::new(NativeLimiter::new(Duration::from_millis(
        config.poll_interval_ms,
    )));
    let registry = Arc::new(AdapterRegistry::native(limiter));
    let mut runner =
        TestRunner::new(registry.clone(), &config.work_root).with_aggregate(config.aggregate);
    if nix::unistd::geteuid().is_root() && config.sandbox_uid_count > 0 {
        tracing::info!(
            "Submissions run as uids {}..{}",
            config.sandbox_uid_base,
            config.sandbox_uid_base + config.sandbox_uid_count
        );
        runner = runner.with_identities(Arc::new(IdentityPool::new(
            config.sandbox_uid_base,
            config.sandbox_uid_count,
        )));
    }

    match cli.command {
        Command::Run {
            problem,
            language,
            source,
            tests,
        } => {
            let problem = Problem::load(&problem).await?;
            let source = tokio::fs::read_to_string(&source).await?;
            let submission = Submission::new(language, source, tests);
            let payload = runner.judge(&problem, &submission, &never_abort()).await;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Command::Batch { requests } => {
            let raw = tokio::fs::read_to_string(&requests).await?;
            let requests: Vec<SubmissionRequest> = serde_json::from_str(&raw)?;
            let reports = run_batch(runner, config.workers, requests).await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Command::GenTests { problem, force } => {
            let problem = Problem::load(&problem).await?;
            let manifest = generate_for_problem(&problem, &registry, &config.work_root, force).await?;
            tracing::info!(
                "Wrote {} cases for {} to {}",
                manifest.cases.len(),
                problem.slug(),
                problem.fixtures().root().display()
            );
        }
        Command::Languages => {
            for adapter in registry.adapters() {
                println!(
                    "{:<12}{:<14}{}",
                    adapter.language(),
                    adapter.source_file(),
                    adapter.toolchain()
                );
            }
        }
    }

    Ok(())
}

/// Reports come back in completion order and are printed in request order.
async fn run_batch(
    runner: TestRunner,
    workers: usize,
    requests: Vec<SubmissionRequest>,
) -> Result<Vec<JudgeReport>, Box<dyn std::error::Error>> {
    let mut problems: HashMap<PathBuf, Arc<Problem>> = HashMap::new();
    let mut jobs = Vec::with_capacity(requests.len());
    for request in requests {
        let request = JudgeRequest::try_from(request)?;
        let problem = match problems.get(&request.problem) {
            Some(problem) => problem.clone(),
            None => {
                let problem = Arc::new(Problem::load(&request.problem).await?);
                problems.insert(request.problem.clone(), problem.clone());
                problem
            }
        };
        jobs.push(JudgeJob {
            problem,
            submission: request.submission,
        });
    }

    let order: Vec<_> = jobs.iter().map(|job| job.submission.id).collect();
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(runner), workers));
    let (job_tx, job_rx) = mpsc::channel(REPORT_CHANNEL_SIZE);
    let (res_tx, mut res_rx) = mpsc::channel(REPORT_CHANNEL_SIZE);
    dispatcher.spawn(job_rx, res_tx);

    tokio::spawn(async move {
        for job in jobs {
            if job_tx.send(job).await.is_err() {
                tracing::warn!("Dispatcher stopped accepting jobs");
                break;
            }
        }
    });

    let mut reports = HashMap::with_capacity(order.len());
    while let Some(report) = res_rx.recv().await {
        reports.insert(report.submission_id, report);
    }
    Ok(order
        .iter()
        .filter_map(|id| reports.remove(id))
        .collect())
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}
