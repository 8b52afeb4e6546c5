use serde::{Deserialize, Serialize};

use crate::core::domain::TestOutcome;

/// How per-case time and memory roll up into the summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateMode {
    #[default]
    Max,
    Sum,
}

impl std::str::FromStr for AggregateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" => Ok(AggregateMode::Max),
            "sum" => Ok(AggregateMode::Sum),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseReport {
    pub id: String,
    pub status: TestOutcome,
    pub time_ms: u64,
    pub memory_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CaseReport {
    pub fn new(id: impl Into<String>, status: TestOutcome) -> Self {
        Self {
            id: id.into(),
            status,
            time_ms: 0,
            memory_mb: 0.0,
            input: None,
            expected: None,
            actual: None,
            diff: None,
            message: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub time_ms: u64,
    pub memory_mb: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Logs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What a caller receives for one submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub status: TestOutcome,
    pub summary: Summary,
    pub cases: Vec<CaseReport>,
    #[serde(default)]
    pub logs: Logs,
}

impl ResultPayload {
    pub fn compile_error(diagnostics: String) -> Self {
        Self {
            status: TestOutcome::Ce,
            summary: Summary::default(),
            cases: Vec::new(),
            logs: Logs {
                compile: Some(diagnostics).filter(|d| !d.is_empty()),
                ..Default::default()
            },
        }
    }

    /// A judge-side fault. Partial case results are discarded.
    pub fn system_error(error: impl ToString, compile: Option<String>) -> Self {
        Self {
            status: TestOutcome::Error,
            summary: Summary::default(),
            cases: Vec::new(),
            logs: Logs {
                compile: compile.filter(|d| !d.is_empty()),
                error: Some(error.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn aggregate(cases: Vec<CaseReport>, mode: AggregateMode, logs: Logs) -> Self {
        let passed = cases.iter().filter(|c| c.status.is_pass()).count();
        let (time_ms, memory_mb) = match mode {
            AggregateMode::Max => (
                cases.iter().map(|c| c.time_ms).max().unwrap_or(0),
                cases.iter().map(|c| c.memory_mb).fold(0.0, f64::max),
            ),
            AggregateMode::Sum => (
                cases.iter().map(|c| c.time_ms).sum(),
                cases.iter().map(|c| c.memory_mb).sum(),
            ),
        };

        Self {
            status: worst_status(&cases),
            summary: Summary {
                passed,
                failed: cases.len() - passed,
                total: cases.len(),
                time_ms,
                memory_mb,
            },
            cases,
            logs,
        }
    }
}

/// Highest severity wins; among equal tiers the earliest case decides.
pub fn worst_status(cases: &[CaseReport]) -> TestOutcome {
    cases.iter().fold(TestOutcome::Ok, |worst, case| {
        if case.status.severity() > worst.severity() {
            case.status
        } else {
            worst
        }
    })
}
