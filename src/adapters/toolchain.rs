use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    constants::SANDBOX_PATH,
    core::{
        domain::{CompilationLimits, CompileResult, ExecutionLimits, Language, RunResult},
        errors::LimiterError,
        traits::{
            adapter::LanguageAdapter,
            limiter::{AbortSignal, CommandSpec, Limiter},
        },
    },
};

/// Per-language description of how to check/compile and how to launch.
pub trait Toolchain: std::fmt::Debug + Send + Sync {
    fn language(&self) -> Language;

    fn source_file(&self) -> &'static str;

    fn describe(&self) -> String;

    fn compile_command(&self, workdir: &Path) -> CommandSpec;

    fn artifact(&self, workdir: &Path) -> PathBuf;

    fn run_command(&self, workdir: &Path, limits: &ExecutionLimits) -> CommandSpec;

    /// Variables pinned on top of the shared sandbox environment.
    fn pinned_env(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    fn adjust_limits(&self, limits: ExecutionLimits) -> ExecutionLimits {
        limits
    }

    /// Runtimes that reserve large virtual ranges (JVM, V8) opt out.
    fn limit_address_space(&self) -> bool {
        true
    }

    fn environment(&self, workdir: &Path) -> Vec<(String, String)> {
        let home = workdir.to_string_lossy().into_owned();
        let mut env = vec![
            ("PATH".to_string(), SANDBOX_PATH.to_string()),
            ("HOME".to_string(), home.clone()),
            ("TMPDIR".to_string(), home),
            ("LANG".to_string(), "C.UTF-8".to_string()),
            ("LC_ALL".to_string(), "C.UTF-8".to_string()),
            ("TZ".to_string(), "UTC".to_string()),
        ];
        env.extend(
            self.pinned_env()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        env
    }
}

#[derive(Debug)]
pub struct NativeAdapter<T> {
    toolchain: T,
    limiter: Arc<dyn Limiter>,
}

impl<T: Toolchain> NativeAdapter<T> {
    pub fn new(toolchain: T, limiter: Arc<dyn Limiter>) -> Self {
        Self { toolchain, limiter }
    }
}

#[async_trait::async_trait]
impl<T: Toolchain + 'static> LanguageAdapter for NativeAdapter<T> {
    fn language(&self) -> Language {
        self.toolchain.language()
    }

    fn source_file(&self) -> &'static str {
        self.toolchain.source_file()
    }

    fn toolchain(&self) -> String {
        self.toolchain.describe()
    }

    fn effective_limits(&self, limits: &ExecutionLimits) -> ExecutionLimits {
        self.toolchain.adjust_limits(limits.clone())
    }

    #[tracing::instrument(skip(self, abort), fields(language = %self.toolchain.language()))]
    async fn compile(
        &self,
        workdir: &Path,
        limits: &CompilationLimits,
        abort: &AbortSignal,
    ) -> Result<CompileResult, LimiterError> {
        let source = workdir.join(self.toolchain.source_file());
        if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
            return Ok(CompileResult {
                success: false,
                diagnostics: format!("source file {} not found", self.toolchain.source_file()),
                artifact: None,
            });
        }

        let command = self
            .toolchain
            .compile_command(workdir)
            .envs(self.toolchain.environment(workdir))
            .limit_address_space(false);
        let result = self
            .limiter
            .execute(&command, "", &limits.as_execution_limits(), abort)
            .await?;

        let success = result.exited_cleanly() && !result.timed_out && !result.memory_exceeded;
        let diagnostics = compile_diagnostics(&result, limits);
        tracing::debug!("Compilation finished: success={}", success);

        Ok(CompileResult {
            success,
            diagnostics,
            artifact: success.then(|| self.toolchain.artifact(workdir)),
        })
    }

    #[tracing::instrument(skip(self, stdin, abort), fields(language = %self.toolchain.language()))]
    async fn run(
        &self,
        workdir: &Path,
        stdin: &str,
        limits: &ExecutionLimits,
        abort: &AbortSignal,
    ) -> Result<RunResult, LimiterError> {
        let limits = self.effective_limits(limits);
        let command = self
            .toolchain
            .run_command(workdir, &limits)
            .envs(self.toolchain.environment(workdir))
            .limit_address_space(self.toolchain.limit_address_space());
        self.limiter.execute(&command, stdin, &limits, abort).await
    }
}

fn compile_diagnostics(result: &RunResult, limits: &CompilationLimits) -> String {
    let mut parts: Vec<String> = [&result.stderr, &result.stdout]
        .into_iter()
        .map(|part| part.trim_end())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();
    if result.timed_out {
        parts.push(format!("compilation exceeded {} ms", limits.wall_time_ms));
    } else if result.memory_exceeded {
        parts.push(format!("compilation exceeded {} MB", limits.memory_mb));
    } else if let Some(signal) = result.signal {
        parts.push(format!("compiler killed by signal {signal}"));
    }
    parts.join("\n")
}
