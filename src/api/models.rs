use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Wire form of a submission as sent by the API layer or a batch file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmissionRequest {
    /// Problem directory holding `problem.json` and `tests/`.
    pub problem: PathBuf,
    pub language: String,
    #[serde(default)]
    pub source: Option<String>,
    /// Read when `source` is absent. Relative paths resolve against the
    /// working directory of the caller.
    #[serde(default)]
    pub source_file: Option<PathBuf>,
    /// `sample`, `unit` or `all`; defaults to `sample`.
    #[serde(default)]
    pub tests: Option<String>,
}
