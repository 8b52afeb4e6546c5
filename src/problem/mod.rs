use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    compare::ComparatorSpec,
    constants::{PROBLEM_FILE, TESTS_DIR},
    core::{
        domain::{CompilationLimits, ExecutionLimits, Language, LimitsOverride, TestCase, TestSet},
        errors::SystemError,
    },
    generator::spec::GeneratorSpec,
};

pub mod fixtures;

pub use fixtures::{FixtureStore, Manifest, ManifestEntry};

/// Contents of `problem.json`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProblemSpec {
    pub slug: String,
    #[serde(default)]
    pub limits: LimitsOverride,
    #[serde(default)]
    pub language_overrides: BTreeMap<Language, LimitsOverride>,
    #[serde(default)]
    pub compile_limits: CompilationLimits,
    #[serde(default)]
    pub comparator: ComparatorSpec,
    #[serde(default)]
    pub comparators: BTreeMap<TestSet, ComparatorSpec>,
    #[serde(default)]
    pub test_spec: Option<GeneratorSpec>,
    #[serde(default)]
    pub reference: Option<ReferenceSolution>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceSolution {
    pub language: Language,
    /// Relative to the problem directory.
    pub path: PathBuf,
}

impl ProblemSpec {
    /// Defaults, then problem limits, then the language override. Adapter
    /// minimums are applied later by the adapter itself.
    pub fn limits_for(&self, language: Language) -> ExecutionLimits {
        let limits = ExecutionLimits::default().with_override(&self.limits);
        match self.language_overrides.get(&language) {
            Some(over) => limits.with_override(over),
            None => limits,
        }
    }

    pub fn comparator_for(&self, case: &TestCase) -> ComparatorSpec {
        case.comparator
            .clone()
            .or_else(|| self.comparators.get(&case.set).cloned())
            .unwrap_or_else(|| self.comparator.clone())
    }
}

#[derive(Clone, Debug)]
pub struct Problem {
    pub root: PathBuf,
    pub spec: ProblemSpec,
}

impl Problem {
    pub fn new(root: impl AsRef<Path>, spec: ProblemSpec) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            spec,
        }
    }

    pub async fn load(root: impl AsRef<Path>) -> Result<Self, SystemError> {
        let root = root.as_ref();
        let path = root.join(PROBLEM_FILE);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SystemError::Problem {
                path: path.clone(),
                msg: e.to_string(),
            })?;
        let spec = serde_json::from_str(&raw).map_err(|e| SystemError::Problem {
            path,
            msg: e.to_string(),
        })?;
        Ok(Self::new(root, spec))
    }

    pub fn slug(&self) -> &str {
        &self.spec.slug
    }

    pub fn fixtures(&self) -> FixtureStore {
        FixtureStore::new(self.root.join(TESTS_DIR))
    }

    pub fn reference_path(&self) -> Option<PathBuf> {
        self.spec
            .reference
            .as_ref()
            .map(|reference| self.root.join(&reference.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBLEM_JSON: &str = r#"{
        "slug": "two-sum",
        "limits": { "wall_time_ms": 1000, "memory_mb": 128 },
        "language_overrides": { "java": { "wall_time_ms": 3000 } },
        "comparator": { "kind": "json" },
        "comparators": { "hidden": { "kind": "numeric", "epsilon": 0.001 } },
        "reference": { "language": "python", "path": "solutions/reference.py" }
    }"#;

    fn case(set: TestSet, comparator: Option<ComparatorSpec>) -> TestCase {
        TestCase {
            id: "x".to_string(),
            set,
            input: String::new(),
            expected: String::new(),
            comparator,
        }
    }

    #[test]
    fn test_limit_layers() {
        let spec: ProblemSpec = serde_json::from_str(PROBLEM_JSON).unwrap();

        let python = spec.limits_for(Language::Python);
        assert_eq!(python.wall_time_ms, 1000);
        assert_eq!(python.memory_mb, 128);
        assert_eq!(python.stack_mb, ExecutionLimits::default().stack_mb);

        let java = spec.limits_for(Language::Java);
        assert_eq!(java.wall_time_ms, 3000);
        assert_eq!(java.memory_mb, 128);
    }

    #[test]
    fn test_comparator_precedence() {
        let spec: ProblemSpec = serde_json::from_str(PROBLEM_JSON).unwrap();

        assert_eq!(spec.comparator_for(&case(TestSet::Sample, None)), ComparatorSpec::json());
        assert_eq!(
            spec.comparator_for(&case(TestSet::Hidden, None)),
            ComparatorSpec::Numeric {
                epsilon: 0.001,
                relative: None
            }
        );
        assert_eq!(
            spec.comparator_for(&case(TestSet::Hidden, Some(ComparatorSpec::text()))),
            ComparatorSpec::text()
        );
    }

    #[tokio::test]
    async fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROBLEM_FILE), PROBLEM_JSON).unwrap();

        let problem = Problem::load(dir.path()).await.unwrap();

        assert_eq!(problem.slug(), "two-sum");
        assert_eq!(problem.fixtures().root(), dir.path().join("tests"));
        assert_eq!(
            problem.reference_path(),
            Some(dir.path().join("solutions/reference.py"))
        );
    }

    #[tokio::test]
    async fn test_unknown_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROBLEM_FILE), r#"{"slug": "x", "colour": 1}"#).unwrap();

        assert!(matches!(
            Problem::load(dir.path()).await,
            Err(SystemError::Problem { .. })
        ));
    }
}
