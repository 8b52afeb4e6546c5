use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compare::ComparatorSpec;
use crate::core::errors::LimiterError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
    Python,
    JavaScript,
    Java,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::C,
        Language::Cpp,
        Language::Python,
        Language::JavaScript,
        Language::Java,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Java => "java",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "c11" | "c17" => Ok(Language::C),
            "cpp" | "c++" | "cxx" | "cpp17" => Ok(Language::Cpp),
            "python" | "py" | "python3" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "java" => Ok(Language::Java),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionLimits {
    pub wall_time_ms: u64,
    pub cpu_time_ms: u64,
    pub memory_mb: u64,
    pub stack_mb: u64,
    pub file_size_mb: u64,
    pub max_open_files: u64,
    pub max_processes: u64,
    pub max_output_bytes: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            wall_time_ms: 2000,
            cpu_time_ms: 2000,
            memory_mb: 256,
            stack_mb: 64,
            file_size_mb: 10,
            max_open_files: 64,
            max_processes: 1,
            max_output_bytes: 8 * 1024 * 1024,
        }
    }
}

impl ExecutionLimits {
    /// Limits for reference solutions during fixture generation.
    pub fn reference() -> Self {
        Self {
            wall_time_ms: 10_000,
            cpu_time_ms: 10_000,
            memory_mb: 1024,
            stack_mb: 256,
            file_size_mb: 64,
            max_open_files: 128,
            max_processes: 64,
            max_output_bytes: 64 * 1024 * 1024,
        }
    }

    pub fn validate(&self) -> Result<(), LimiterError> {
        let fields = [
            ("wall_time_ms", self.wall_time_ms),
            ("cpu_time_ms", self.cpu_time_ms),
            ("memory_mb", self.memory_mb),
            ("stack_mb", self.stack_mb),
            ("file_size_mb", self.file_size_mb),
            ("max_open_files", self.max_open_files),
            ("max_processes", self.max_processes),
            ("max_output_bytes", self.max_output_bytes),
        ];
        match fields.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(LimiterError::InvalidLimits(format!("{name} must be positive"))),
            None => Ok(()),
        }
    }

    pub fn with_override(&self, over: &LimitsOverride) -> Self {
        Self {
            wall_time_ms: over.wall_time_ms.unwrap_or(self.wall_time_ms),
            cpu_time_ms: over.cpu_time_ms.unwrap_or(self.cpu_time_ms),
            memory_mb: over.memory_mb.unwrap_or(self.memory_mb),
            stack_mb: over.stack_mb.unwrap_or(self.stack_mb),
            file_size_mb: over.file_size_mb.unwrap_or(self.file_size_mb),
            max_open_files: over.max_open_files.unwrap_or(self.max_open_files),
            max_processes: over.max_processes.unwrap_or(self.max_processes),
            max_output_bytes: over.max_output_bytes.unwrap_or(self.max_output_bytes),
        }
    }
}

/// Partial limits as they appear in problem specifications.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsOverride {
    pub wall_time_ms: Option<u64>,
    pub cpu_time_ms: Option<u64>,
    pub memory_mb: Option<u64>,
    pub stack_mb: Option<u64>,
    pub file_size_mb: Option<u64>,
    pub max_open_files: Option<u64>,
    pub max_processes: Option<u64>,
    pub max_output_bytes: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilationLimits {
    pub wall_time_ms: u64,
    pub memory_mb: u64,
}

impl Default for CompilationLimits {
    fn default() -> Self {
        Self {
            wall_time_ms: 30_000,
            memory_mb: 1024,
        }
    }
}

impl CompilationLimits {
    /// Compilers fork their own toolchain (cc1plus, as, ld) and write large
    /// artifacts, so everything except time and memory is generous here.
    pub fn as_execution_limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            wall_time_ms: self.wall_time_ms,
            cpu_time_ms: self.wall_time_ms,
            memory_mb: self.memory_mb,
            stack_mb: 64,
            file_size_mb: 512,
            max_open_files: 256,
            max_processes: 256,
            max_output_bytes: crate::constants::DIAGNOSTICS_LIMIT_BYTES as u64,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileResult {
    pub success: bool,
    pub diagnostics: String,
    pub artifact: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunResult {
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub wall_time_ms: u64,
    pub cpu_time_ms: u64,
    pub peak_memory_mb: f64,
    pub timed_out: bool,
    pub memory_exceeded: bool,
    pub output_exceeded: bool,
    /// The process tree grew past `max_processes`.
    pub processes_exceeded: bool,
    pub stdout: String,
    pub stderr: String,
}

impl RunResult {
    pub fn exited_cleanly(&self) -> bool {
        self.exit_code == Some(0) && self.signal.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestSet {
    Sample,
    Unit,
    Hidden,
}

impl TestSet {
    pub fn dir_name(&self) -> &'static str {
        match self {
            TestSet::Sample => "sample",
            TestSet::Unit => "unit",
            TestSet::Hidden => "hidden",
        }
    }

    pub fn is_disclosed(&self) -> bool {
        !matches!(self, TestSet::Hidden)
    }
}

impl fmt::Display for TestSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestSelection {
    #[default]
    Sample,
    Unit,
    All,
}

impl TestSelection {
    pub fn includes(&self, set: TestSet) -> bool {
        match self {
            TestSelection::Sample => set == TestSet::Sample,
            TestSelection::Unit => set == TestSet::Unit,
            TestSelection::All => true,
        }
    }
}

impl FromStr for TestSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sample" => Ok(TestSelection::Sample),
            "unit" => Ok(TestSelection::Unit),
            "all" => Ok(TestSelection::All),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TestCase {
    pub id: String,
    pub set: TestSet,
    pub input: String,
    pub expected: String,
    pub comparator: Option<ComparatorSpec>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestOutcome {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "WA")]
    Wa,
    #[serde(rename = "RE")]
    Re,
    #[serde(rename = "TLE")]
    Tle,
    #[serde(rename = "MLE")]
    Mle,
    #[serde(rename = "CE")]
    Ce,
    #[serde(rename = "ERROR")]
    Error,
}

impl TestOutcome {
    /// Rank used to pick the overall status; RE, TLE and MLE share a tier.
    pub fn severity(&self) -> u8 {
        match self {
            TestOutcome::Ok => 0,
            TestOutcome::Wa => 1,
            TestOutcome::Re | TestOutcome::Tle | TestOutcome::Mle => 2,
            TestOutcome::Error => 3,
            TestOutcome::Ce => 4,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, TestOutcome::Ok)
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TestOutcome::Ok => "OK",
            TestOutcome::Wa => "WA",
            TestOutcome::Re => "RE",
            TestOutcome::Tle => "TLE",
            TestOutcome::Mle => "MLE",
            TestOutcome::Ce => "CE",
            TestOutcome::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug)]
pub struct Submission {
    pub id: Uuid,
    pub language: Language,
    pub source: String,
    pub selection: TestSelection,
}

impl Submission {
    pub fn new(language: Language, source: impl Into<String>, selection: TestSelection) -> Self {
        Self {
            id: Uuid::new_v4(),
            language,
            source: source.into(),
            selection,
        }
    }
}
