use std::path::Path;

use crate::core::{
    domain::{CompilationLimits, CompileResult},
    errors::SystemError,
    traits::{adapter::LanguageAdapter, limiter::AbortSignal},
};

/// Writes the submitted source into `workdir` and compiles it once.
#[tracing::instrument(skip(adapter, source, abort), fields(language = %adapter.language()))]
pub async fn compile_submission(
    adapter: &dyn LanguageAdapter,
    workdir: &Path,
    source: &str,
    limits: &CompilationLimits,
    abort: &AbortSignal,
) -> Result<CompileResult, SystemError> {
    tokio::fs::write(workdir.join(adapter.source_file()), source)
        .await
        .map_err(SystemError::Workdir)?;

    tracing::debug!("Start compiling");
    let result = adapter.compile(workdir, limits, abort).await?;
    tracing::debug!(
        "Compilation finished: success={}, diagnostics={} bytes",
        result.success,
        result.diagnostics.len()
    );
    Ok(result)
}
