use std::path::{Path, PathBuf};

use crate::adapters::toolchain::Toolchain;
use crate::core::{
    domain::{ExecutionLimits, Language},
    traits::limiter::CommandSpec,
};

pub const FLAGS: [&str; 4] = ["-std=c++17", "-O2", "-pipe", "-Wall"];

#[derive(Clone, Copy, Debug, Default)]
pub struct Cpp;

impl Toolchain for Cpp {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn source_file(&self) -> &'static str {
        "solution.cpp"
    }

    fn describe(&self) -> String {
        format!("g++ {}", FLAGS.join(" "))
    }

    fn compile_command(&self, workdir: &Path) -> CommandSpec {
        CommandSpec::new("g++", workdir)
            .args(FLAGS)
            .args(["-o", "solution", "solution.cpp"])
    }

    fn artifact(&self, workdir: &Path) -> PathBuf {
        workdir.join("solution")
    }

    fn run_command(&self, workdir: &Path, _limits: &ExecutionLimits) -> CommandSpec {
        CommandSpec::new(self.artifact(workdir).to_string_lossy(), workdir)
    }
}
