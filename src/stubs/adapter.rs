use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{
    domain::{CompilationLimits, CompileResult, ExecutionLimits, Language, RunResult},
    errors::LimiterError,
    traits::{adapter::LanguageAdapter, limiter::AbortSignal},
};

type RunScript = Arc<dyn Fn(&Path, &str) -> RunResult + Send + Sync>;

/// Adapter whose compile result and per-input run results are scripted.
#[derive(Clone)]
pub struct AdapterStub {
    language: Language,
    compile: CompileResult,
    run: RunScript,
    delay: Duration,
}

impl AdapterStub {
    /// Compiles successfully and echoes stdin.
    pub fn new(language: Language) -> Self {
        Self {
            language,
            compile: CompileResult {
                success: true,
                diagnostics: String::new(),
                artifact: None,
            },
            run: Arc::new(|_, stdin| RunResult {
                exit_code: Some(0),
                stdout: stdin.to_string(),
                ..Default::default()
            }),
            delay: Duration::ZERO,
        }
    }

    pub fn with_compile(mut self, compile: CompileResult) -> Self {
        self.compile = compile;
        self
    }

    pub fn with_run<F>(mut self, run: F) -> Self
    where
        F: Fn(&Path, &str) -> RunResult + Send + Sync + 'static,
    {
        self.run = Arc::new(run);
        self
    }

    /// Every run sleeps this long unless aborted first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl fmt::Debug for AdapterStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterStub")
            .field("language", &self.language)
            .field("compile", &self.compile)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl LanguageAdapter for AdapterStub {
    fn language(&self) -> Language {
        self.language
    }

    fn source_file(&self) -> &'static str {
        "solution.stub"
    }

    fn toolchain(&self) -> String {
        "stub".to_string()
    }

    fn effective_limits(&self, limits: &ExecutionLimits) -> ExecutionLimits {
        limits.clone()
    }

    #[tracing::instrument(skip(self, _abort))]
    async fn compile(
        &self,
        workdir: &Path,
        limits: &CompilationLimits,
        _abort: &AbortSignal,
    ) -> Result<CompileResult, LimiterError> {
        tracing::debug!("Compilation result: {:?}", self.compile);
        Ok(self.compile.clone())
    }

    #[tracing::instrument(skip(self, abort))]
    async fn run(
        &self,
        workdir: &Path,
        stdin: &str,
        limits: &ExecutionLimits,
        abort: &AbortSignal,
    ) -> Result<RunResult, LimiterError> {
        let mut abort = abort.clone();
        if *abort.borrow_and_update() {
            return Err(LimiterError::Aborted);
        }
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {}
            Ok(()) = abort.changed() => return Err(LimiterError::Aborted),
        }

        let result = (self.run)(workdir, stdin);
        tracing::debug!("Execution result: {:?}", result);
        Ok(result)
    }
}
