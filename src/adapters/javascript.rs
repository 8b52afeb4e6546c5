use std::path::{Path, PathBuf};

use crate::adapters::toolchain::Toolchain;
use crate::core::{
    domain::{ExecutionLimits, Language},
    traits::limiter::CommandSpec,
};

/// V8 seeds for `Math.random` and hash tables.
pub const PINNED_FLAGS: [&str; 2] = ["--random-seed=1", "--hash-seed=1"];

pub const PINNED_ENV: [(&str, &str); 1] = [("NODE_DISABLE_COLORS", "1")];

#[derive(Clone, Copy, Debug, Default)]
pub struct JavaScript;

impl Toolchain for JavaScript {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn source_file(&self) -> &'static str {
        "solution.js"
    }

    fn describe(&self) -> String {
        format!("node {}", PINNED_FLAGS.join(" "))
    }

    fn compile_command(&self, workdir: &Path) -> CommandSpec {
        CommandSpec::new("node", workdir).args(["--check", "solution.js"])
    }

    fn artifact(&self, workdir: &Path) -> PathBuf {
        workdir.join(self.source_file())
    }

    fn run_command(&self, workdir: &Path, limits: &ExecutionLimits) -> CommandSpec {
        CommandSpec::new("node", workdir)
            .arg(format!("--max-old-space-size={}", limits.memory_mb))
            .args(PINNED_FLAGS)
            .arg("solution.js")
    }

    fn pinned_env(&self) -> &'static [(&'static str, &'static str)] {
        &PINNED_ENV
    }

    fn adjust_limits(&self, limits: ExecutionLimits) -> ExecutionLimits {
        ExecutionLimits {
            max_processes: limits.max_processes.max(32),
            max_open_files: limits.max_open_files.max(128),
            ..limits
        }
    }

    fn limit_address_space(&self) -> bool {
        false
    }
}
