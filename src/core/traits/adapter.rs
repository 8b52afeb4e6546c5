use std::path::Path;

use crate::core::{
    domain::{CompilationLimits, CompileResult, ExecutionLimits, Language, RunResult},
    errors::LimiterError,
    traits::limiter::AbortSignal,
};

#[mockall::automock]
#[async_trait::async_trait]
pub trait LanguageAdapter: std::fmt::Debug + Send + Sync {
    fn language(&self) -> Language;

    /// File name the source must be written to inside the workdir.
    fn source_file(&self) -> &'static str;

    /// Human readable toolchain and pinned flags.
    fn toolchain(&self) -> String;

    fn effective_limits(&self, limits: &ExecutionLimits) -> ExecutionLimits;

    async fn compile(
        &self,
        workdir: &Path,
        limits: &CompilationLimits,
        abort: &AbortSignal,
    ) -> Result<CompileResult, LimiterError>;

    async fn run(
        &self,
        workdir: &Path,
        stdin: &str,
        limits: &ExecutionLimits,
        abort: &AbortSignal,
    ) -> Result<RunResult, LimiterError>;
}
