use std::path::{Path, PathBuf};

use crate::adapters::toolchain::Toolchain;
use crate::core::{
    domain::{ExecutionLimits, Language},
    traits::limiter::CommandSpec,
};

pub const FLAGS: [&str; 4] = ["-std=c11", "-O2", "-pipe", "-Wall"];

#[derive(Clone, Copy, Debug, Default)]
pub struct C;

impl Toolchain for C {
    fn language(&self) -> Language {
        Language::C
    }

    fn source_file(&self) -> &'static str {
        "solution.c"
    }

    fn describe(&self) -> String {
        format!("gcc {} -lm", FLAGS.join(" "))
    }

    fn compile_command(&self, workdir: &Path) -> CommandSpec {
        CommandSpec::new("gcc", workdir)
            .args(FLAGS)
            .args(["-o", "solution", "solution.c", "-lm"])
    }

    fn artifact(&self, workdir: &Path) -> PathBuf {
        workdir.join("solution")
    }

    fn run_command(&self, workdir: &Path, _limits: &ExecutionLimits) -> CommandSpec {
        CommandSpec::new(self.artifact(workdir).to_string_lossy(), workdir)
    }
}
