use std::path::{Path, PathBuf};

use crate::adapters::toolchain::Toolchain;
use crate::core::{
    domain::{ExecutionLimits, Language},
    traits::limiter::CommandSpec,
};

/// Parses without executing and without writing bytecode.
const SYNTAX_CHECK: &str =
    "import sys; compile(open(sys.argv[1], encoding='utf-8').read(), sys.argv[1], 'exec')";

/// Hash randomization off, no bytecode caches, UTF-8 stdio.
pub const PINNED_ENV: [(&str, &str); 4] = [
    ("PYTHONHASHSEED", "0"),
    ("PYTHONDONTWRITEBYTECODE", "1"),
    ("PYTHONIOENCODING", "utf-8"),
    ("PYTHONUTF8", "1"),
];

#[derive(Clone, Copy, Debug, Default)]
pub struct Python;

impl Toolchain for Python {
    fn language(&self) -> Language {
        Language::Python
    }

    fn source_file(&self) -> &'static str {
        "solution.py"
    }

    fn describe(&self) -> String {
        "python3 -B (PYTHONHASHSEED=0)".to_string()
    }

    fn compile_command(&self, workdir: &Path) -> CommandSpec {
        CommandSpec::new("python3", workdir).args(["-c", SYNTAX_CHECK, "solution.py"])
    }

    fn artifact(&self, workdir: &Path) -> PathBuf {
        workdir.join(self.source_file())
    }

    fn run_command(&self, workdir: &Path, _limits: &ExecutionLimits) -> CommandSpec {
        CommandSpec::new("python3", workdir).args(["-B", "solution.py"])
    }

    fn pinned_env(&self) -> &'static [(&'static str, &'static str)] {
        &PINNED_ENV
    }
}
