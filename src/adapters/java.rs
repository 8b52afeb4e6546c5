use std::path::{Path, PathBuf};

use crate::adapters::toolchain::Toolchain;
use crate::core::{
    domain::{ExecutionLimits, Language},
    traits::limiter::CommandSpec,
};

pub const PINNED_PROPERTIES: [&str; 3] = [
    "-Dfile.encoding=UTF-8",
    "-Duser.language=en",
    "-Duser.country=US",
];

#[derive(Clone, Copy, Debug, Default)]
pub struct Java;

impl Toolchain for Java {
    fn language(&self) -> Language {
        Language::Java
    }

    fn source_file(&self) -> &'static str {
        "Main.java"
    }

    fn describe(&self) -> String {
        format!(
            "javac -encoding UTF-8; java -XX:+UseSerialGC {} Main",
            PINNED_PROPERTIES.join(" ")
        )
    }

    fn compile_command(&self, workdir: &Path) -> CommandSpec {
        CommandSpec::new("javac", workdir).args(["-encoding", "UTF-8", "-d", ".", "Main.java"])
    }

    fn artifact(&self, workdir: &Path) -> PathBuf {
        workdir.join("Main.class")
    }

    fn run_command(&self, workdir: &Path, limits: &ExecutionLimits) -> CommandSpec {
        // The heap gets three quarters; metaspace and code cache live outside it.
        let heap_mb = (limits.memory_mb * 3 / 4).max(16);
        CommandSpec::new("java", workdir)
            .arg(format!("-Xmx{heap_mb}m"))
            .arg(format!("-Xss{}m", limits.stack_mb))
            .arg("-XX:+UseSerialGC")
            .args(PINNED_PROPERTIES)
            .args(["-cp", ".", "Main"])
    }

    fn adjust_limits(&self, limits: ExecutionLimits) -> ExecutionLimits {
        ExecutionLimits {
            max_processes: limits.max_processes.max(64),
            max_open_files: limits.max_open_files.max(128),
            ..limits
        }
    }

    fn limit_address_space(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jvm_flags_follow_limits() {
        let limits = ExecutionLimits {
            memory_mb: 256,
            stack_mb: 32,
            ..Default::default()
        };
        let command = Java.run_command(Path::new("/w"), &limits);

        assert_eq!(command.program, "java");
        assert!(command.args.contains(&"-Xmx192m".to_string()));
        assert!(command.args.contains(&"-Xss32m".to_string()));
        assert_eq!(command.args.last().map(String::as_str), Some("Main"));
    }
}
