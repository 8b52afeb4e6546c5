use std::path::{Path, PathBuf};

use tokio::sync::watch;

use crate::core::{
    domain::{ExecutionLimits, RunResult},
    errors::LimiterError,
};

/// A fully resolved child invocation. The environment is exhaustive: nothing
/// is inherited from the judge process.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub workdir: PathBuf,
    pub limit_address_space: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, workdir: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            workdir: workdir.to_path_buf(),
            limit_address_space: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn limit_address_space(mut self, enabled: bool) -> Self {
        self.limit_address_space = enabled;
        self
    }
}

pub type AbortSignal = watch::Receiver<bool>;

#[derive(Debug)]
pub struct AbortHandle(watch::Sender<bool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.send_replace(true);
    }
}

pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle(tx), rx)
}

/// A signal that never fires.
pub fn never_abort() -> AbortSignal {
    watch::channel(false).1
}

#[mockall::automock]
#[async_trait::async_trait]
pub trait Limiter: std::fmt::Debug + Send + Sync {
    /// Runs `command` to completion under `limits`. Ceiling breaches are
    /// reported through the `RunResult` flags; `Err` means the judge failed.
    async fn execute(
        &self,
        command: &CommandSpec,
        stdin: &str,
        limits: &ExecutionLimits,
        abort: &AbortSignal,
    ) -> Result<RunResult, LimiterError>;
}
