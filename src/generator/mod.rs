use std::collections::BTreeMap;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::{
    adapters::AdapterRegistry,
    constants::GENERATION_FILE,
    core::{
        domain::{CompilationLimits, ExecutionLimits, RunResult, TestSet},
        errors::{LimiterError, SystemError},
        traits::{adapter::LanguageAdapter, limiter::never_abort},
    },
    generator::{
        rng::{case_rng, case_seed},
        spec::{GeneratorSpec, Pattern},
    },
    problem::{FixtureStore, Manifest, ManifestEntry, Problem},
};

pub mod rng;
pub mod spec;
pub mod synth;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("invalid generator spec: {0}")]
    InvalidSpec(String),

    #[error("problem defines no {0}")]
    Missing(&'static str),

    #[error("reference solution failed to compile:\n{0}")]
    ReferenceCompile(String),

    #[error("reference solution failed on {} case(s): {}", .failures.len(), summarize(.failures))]
    ReferenceFailed { failures: Vec<CaseFailure> },

    #[error("fixtures already exist at {0}; use force to regenerate")]
    AlreadyExists(PathBuf),

    #[error("failed to prepare reference workdir: {0}")]
    Workdir(#[source] io::Error),

    #[error(transparent)]
    Limiter(#[from] LimiterError),

    #[error(transparent)]
    System(#[from] SystemError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CaseFailure {
    pub id: String,
    pub reason: String,
}

fn summarize(failures: &[CaseFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.id, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A case whose input is fixed but whose expected output is not known yet.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedCase {
    pub entry: ManifestEntry,
    pub case_index: usize,
    pub base_seed: u64,
    pub pattern: Pattern,
    pub input: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedCase {
    pub planned: PlannedCase,
    pub expected: String,
}

/// Deterministically derives every input. Case `i` of the declared quota
/// sequence draws from `seeds[i % seeds.len()]`.
pub fn plan(spec: &GeneratorSpec) -> Result<Vec<PlannedCase>, GenerationError> {
    spec.validate().map_err(GenerationError::InvalidSpec)?;

    let mut numbering: BTreeMap<TestSet, usize> = BTreeMap::new();
    let mut planned = Vec::with_capacity(spec.total_cases());

    for quota in &spec.quotas {
        let constraints = quota.constraints.as_ref().unwrap_or(&spec.constraints);
        let patterns = quota.patterns.as_ref().unwrap_or(&spec.patterns);

        for _ in 0..quota.count {
            let case_index = planned.len();
            let base_seed = spec.seeds[case_index % spec.seeds.len()];
            let mut rng = case_rng(base_seed, case_index);
            let pattern = patterns[synth::index(&mut rng, patterns.len())];
            let input = synth::synthesize(&mut rng, pattern, constraints);

            let number = numbering.entry(quota.set).or_insert(0);
            *number += 1;

            planned.push(PlannedCase {
                entry: ManifestEntry::numbered(quota.set, *number),
                case_index,
                base_seed,
                pattern,
                input,
            });
        }
    }
    Ok(planned)
}

/// Runs a reference solution over planned inputs to obtain expected outputs.
#[derive(Debug)]
pub struct FixtureGenerator {
    reference: Arc<dyn LanguageAdapter>,
    work_root: PathBuf,
    limits: ExecutionLimits,
    compile_limits: CompilationLimits,
}

impl FixtureGenerator {
    pub fn new(reference: Arc<dyn LanguageAdapter>, work_root: impl AsRef<Path>) -> Self {
        Self {
            reference,
            work_root: work_root.as_ref().to_path_buf(),
            limits: ExecutionLimits::reference(),
            compile_limits: CompilationLimits::default(),
        }
    }

    #[tracing::instrument(skip(self, spec, source), fields(language = %self.reference.language()))]
    pub async fn generate(
        &self,
        spec: &GeneratorSpec,
        source: &str,
    ) -> Result<Vec<GeneratedCase>, GenerationError> {
        let planned = plan(spec)?;

        tokio::fs::create_dir_all(&self.work_root)
            .await
            .map_err(GenerationError::Workdir)?;
        let workdir = tempfile::Builder::new()
            .prefix("reference-")
            .tempdir_in(&self.work_root)
            .map_err(GenerationError::Workdir)?;
        tokio::fs::write(workdir.path().join(self.reference.source_file()), source)
            .await
            .map_err(GenerationError::Workdir)?;

        let abort = never_abort();
        let compiled = self
            .reference
            .compile(workdir.path(), &self.compile_limits, &abort)
            .await?;
        if !compiled.success {
            return Err(GenerationError::ReferenceCompile(compiled.diagnostics));
        }

        let mut generated = Vec::with_capacity(planned.len());
        let mut failures = Vec::new();
        for case in planned {
            let result = self
                .reference
                .run(workdir.path(), &case.input, &self.limits, &abort)
                .await?;
            match failure_reason(&result, &self.limits) {
                Some(reason) => {
                    tracing::warn!("Reference failed on {}: {}", case.entry.id, reason);
                    failures.push(CaseFailure {
                        id: case.entry.id.clone(),
                        reason,
                    });
                }
                None => generated.push(GeneratedCase {
                    planned: case,
                    expected: result.stdout,
                }),
            }
        }

        if !failures.is_empty() {
            return Err(GenerationError::ReferenceFailed { failures });
        }
        tracing::info!("Generated {} cases", generated.len());
        Ok(generated)
    }
}

fn failure_reason(result: &RunResult, limits: &ExecutionLimits) -> Option<String> {
    if result.timed_out {
        Some(format!("timed out after {} ms", limits.wall_time_ms))
    } else if result.memory_exceeded {
        Some(format!("exceeded {} MB", limits.memory_mb))
    } else if result.output_exceeded {
        Some(format!("exceeded {} output bytes", limits.max_output_bytes))
    } else if result.processes_exceeded {
        Some(format!("exceeded {} processes", limits.max_processes))
    } else if let Some(signal) = result.signal {
        Some(format!("killed by signal {signal}"))
    } else if result.exit_code != Some(0) {
        Some(format!("exited with code {:?}", result.exit_code))
    } else {
        None
    }
}

#[derive(Serialize)]
struct GenerationRecord<'a> {
    problem: &'a str,
    seeds: &'a [u64],
    cases: Vec<CaseRecord<'a>>,
}

#[derive(Serialize)]
struct CaseRecord<'a> {
    id: &'a str,
    case_index: usize,
    base_seed: u64,
    stream_seed: String,
    pattern: Pattern,
}

/// Replaces the fixture tree. Output contains no timestamps or host data, so
/// the same cases always produce the same bytes.
///
/// The new tree is staged beside the old one and swapped in by rename; a
/// failed write leaves the previous fixtures untouched.
pub async fn write_fixtures(
    store: &FixtureStore,
    problem: &str,
    spec: &GeneratorSpec,
    cases: &[GeneratedCase],
    force: bool,
) -> Result<Manifest, GenerationError> {
    let manifest_path = store.manifest_path();
    let exists = tokio::fs::try_exists(store.root()).await.unwrap_or(false);
    if exists && tokio::fs::try_exists(&manifest_path).await.unwrap_or(false) && !force {
        return Err(GenerationError::AlreadyExists(manifest_path));
    }

    let root = store.root();
    let parent = match root.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let stage_err = |source| SystemError::Fixture {
        path: parent.to_path_buf(),
        source,
    };
    tokio::fs::create_dir_all(parent).await.map_err(stage_err)?;
    let staging = tempfile::Builder::new()
        .prefix(".fixtures-")
        .tempdir_in(parent)
        .map_err(stage_err)?;
    let tree = staging.path().join("tree");
    let staged = FixtureStore::new(&tree);

    let mut manifest = Manifest::new(problem);
    for case in cases {
        staged
            .write_case(&case.planned.entry, &case.planned.input, &case.expected)
            .await?;
        manifest.cases.push(case.planned.entry.clone());
    }
    staged.write_manifest(&manifest).await?;

    let record = GenerationRecord {
        problem,
        seeds: &spec.seeds,
        cases: cases
            .iter()
            .map(|case| CaseRecord {
                id: &case.planned.entry.id,
                case_index: case.planned.case_index,
                base_seed: case.planned.base_seed,
                stream_seed: hex::encode(case_seed(case.planned.base_seed, case.planned.case_index)),
                pattern: case.planned.pattern,
            })
            .collect(),
    };
    let body = serde_json::to_string_pretty(&record).map_err(|e| SystemError::Manifest {
        path: root.join(GENERATION_FILE),
        msg: e.to_string(),
    })?;
    staged.write(GENERATION_FILE, &format!("{body}\n")).await?;

    // Submissions may run under other uids; fixtures stay private to the judge.
    tokio::fs::set_permissions(&tree, std::fs::Permissions::from_mode(0o700))
        .await
        .map_err(|source| SystemError::Fixture {
            path: tree.clone(),
            source,
        })?;
    swap_in(&tree, root, &staging.path().join("previous")).await?;

    Ok(manifest)
}

/// Moves `staged` to `root`, parking any existing tree at `previous` and
/// restoring it if the second rename fails.
async fn swap_in(staged: &Path, root: &Path, previous: &Path) -> Result<(), SystemError> {
    let had_previous = tokio::fs::try_exists(root).await.unwrap_or(false);
    if had_previous {
        tokio::fs::rename(root, previous)
            .await
            .map_err(|source| SystemError::Fixture {
                path: root.to_path_buf(),
                source,
            })?;
    }
    if let Err(source) = tokio::fs::rename(staged, root).await {
        if had_previous {
            if let Err(e) = tokio::fs::rename(previous, root).await {
                tracing::error!("Failed to restore fixtures at {}: {}", root.display(), e);
            }
        }
        return Err(SystemError::Fixture {
            path: root.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// Generates and writes fixtures for a problem directory from its
/// `test_spec` and `reference` entries.
pub async fn generate_for_problem(
    problem: &Problem,
    registry: &AdapterRegistry,
    work_root: &Path,
    force: bool,
) -> Result<Manifest, GenerationError> {
    let spec = problem
        .spec
        .test_spec
        .as_ref()
        .ok_or(GenerationError::Missing("test_spec"))?;
    let reference = problem
        .spec
        .reference
        .as_ref()
        .ok_or(GenerationError::Missing("reference solution"))?;
    let path = problem.root.join(&reference.path);
    let source = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| SystemError::Fixture { path, source })?;

    let adapter = registry.get(reference.language)?;
    let cases = FixtureGenerator::new(adapter, work_root)
        .generate(spec, &source)
        .await?;
    write_fixtures(&problem.fixtures(), problem.slug(), spec, &cases, force).await
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::{domain::CompileResult, traits::adapter::MockLanguageAdapter};
    use crate::generator::spec::{Charset, Constraints, SetQuota};

    fn spec(seed: u64) -> GeneratorSpec {
        GeneratorSpec {
            seeds: vec![seed],
            quotas: vec![
                SetQuota {
                    set: TestSet::Sample,
                    count: 2,
                    constraints: None,
                    patterns: None,
                },
                SetQuota {
                    set: TestSet::Hidden,
                    count: 3,
                    constraints: None,
                    patterns: Some(vec![Pattern::Palindrome, Pattern::FullCoverage]),
                },
            ],
            constraints: Constraints::default(),
            patterns: vec![Pattern::Random, Pattern::Words],
        }
    }

    /// Reference that reverses its input.
    fn reversing_adapter() -> MockLanguageAdapter {
        let mut adapter = MockLanguageAdapter::new();
        adapter.expect_source_file().return_const("solution.py");
        adapter
            .expect_language()
            .return_const(crate::core::domain::Language::Python);
        adapter.expect_compile().returning(|workdir, _, _| {
            Ok(CompileResult {
                success: true,
                diagnostics: String::new(),
                artifact: Some(workdir.join("solution.py")),
            })
        });
        adapter.expect_run().returning(|_, stdin, _, _| {
            Ok(RunResult {
                exit_code: Some(0),
                stdout: stdin.trim_end().chars().rev().collect::<String>() + "\n",
                ..Default::default()
            })
        });
        adapter
    }

    fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
        let mut files = BTreeMap::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    let key = path.strip_prefix(root).unwrap().to_string_lossy().into_owned();
                    files.insert(key, std::fs::read(&path).unwrap());
                }
            }
        }
        files
    }

    #[test]
    fn test_plan_numbering_and_seeds() {
        let mut spec = spec(42);
        spec.seeds = vec![42, 7];
        let planned = plan(&spec).unwrap();

        let ids: Vec<&str> = planned.iter().map(|c| c.entry.id.as_str()).collect();
        assert_eq!(ids, vec!["sample-01", "sample-02", "hidden-01", "hidden-02", "hidden-03"]);
        let seeds: Vec<u64> = planned.iter().map(|c| c.base_seed).collect();
        assert_eq!(seeds, vec![42, 7, 42, 7, 42]);
        assert!(planned[2..]
            .iter()
            .all(|c| matches!(c.pattern, Pattern::Palindrome | Pattern::FullCoverage)));
    }

    #[test]
    fn test_plan_is_deterministic() {
        assert_eq!(plan(&spec(42)).unwrap(), plan(&spec(42)).unwrap());
        assert_ne!(plan(&spec(42)).unwrap(), plan(&spec(43)).unwrap());
    }

    /// Exact bytes for seed 42. Any change to seeding, stream layout or the
    /// way values are drawn shows up here.
    #[test]
    fn test_plan_golden_inputs() {
        let quota = |set, count, patterns| SetQuota {
            set,
            count,
            constraints: None,
            patterns,
        };
        let spec = GeneratorSpec {
            seeds: vec![42],
            quotas: vec![
                quota(TestSet::Sample, 3, None),
                quota(TestSet::Unit, 1, Some(vec![Pattern::Random])),
                quota(TestSet::Hidden, 3, None),
            ],
            constraints: Constraints {
                min_length: 3,
                max_length: 8,
                charset: Charset::named("lowercase"),
                min_value: -50,
                max_value: 50,
            },
            patterns: vec![
                Pattern::Random,
                Pattern::Palindrome,
                Pattern::MixedCase,
                Pattern::Integers,
            ],
        };

        let planned = plan(&spec).unwrap();
        let got: Vec<(&str, Pattern, &str)> = planned
            .iter()
            .map(|c| (c.entry.id.as_str(), c.pattern, c.input.as_str()))
            .collect();

        assert_eq!(
            got,
            vec![
                ("sample-01", Pattern::MixedCase, "YCqpFpJ\n"),
                ("sample-02", Pattern::Integers, "3\n-37 -23 19\n"),
                ("sample-03", Pattern::Palindrome, "cittic\n"),
                ("unit-01", Pattern::Random, "qqeoyv\n"),
                ("hidden-01", Pattern::MixedCase, "YkdriazG\n"),
                ("hidden-02", Pattern::MixedCase, "fpQ\n"),
                ("hidden-03", Pattern::MixedCase, "EsRkUg\n"),
            ]
        );
    }

    #[test]
    fn test_plan_rejects_invalid_spec() {
        let mut spec = spec(1);
        spec.seeds.clear();
        assert!(matches!(plan(&spec), Err(GenerationError::InvalidSpec(_))));
    }

    #[tokio::test]
    async fn test_regeneration_is_byte_identical() {
        let work = tempfile::tempdir().unwrap();
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let generator = FixtureGenerator::new(Arc::new(reversing_adapter()), work.path());

        for out in [first.path(), second.path()] {
            let cases = generator.generate(&spec(42), "print(input()[::-1])").await.unwrap();
            write_fixtures(&FixtureStore::new(out), "demo", &spec(42), &cases, false)
                .await
                .unwrap();
        }

        let first = read_tree(first.path());
        assert_eq!(first.len(), 2 * 5 + 2);
        assert!(first.contains_key("manifest.json"));
        assert!(first.contains_key("hidden/03.out"));
        assert_eq!(first, read_tree(second.path()));
    }

    #[tokio::test]
    async fn test_reference_failure_is_reported_and_nothing_written() {
        let work = tempfile::tempdir().unwrap();
        let mut adapter = MockLanguageAdapter::new();
        adapter.expect_source_file().return_const("solution.py");
        adapter
            .expect_language()
            .return_const(crate::core::domain::Language::Python);
        adapter.expect_compile().returning(|_, _, _| {
            Ok(CompileResult {
                success: true,
                diagnostics: String::new(),
                artifact: None,
            })
        });
        let mut calls = 0;
        adapter.expect_run().returning(move |_, _, _, _| {
            calls += 1;
            Ok(RunResult {
                exit_code: if calls == 2 { None } else { Some(0) },
                signal: if calls == 2 { Some(11) } else { None },
                timed_out: calls == 4,
                ..Default::default()
            })
        });
        let generator = FixtureGenerator::new(Arc::new(adapter), work.path());

        let result = generator.generate(&spec(42), "").await;

        match result {
            Err(GenerationError::ReferenceFailed { failures }) => {
                assert_eq!(
                    failures,
                    vec![
                        CaseFailure {
                            id: "sample-02".to_string(),
                            reason: "killed by signal 11".to_string()
                        },
                        CaseFailure {
                            id: "hidden-02".to_string(),
                            reason: "timed out after 10000 ms".to_string()
                        },
                    ]
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reference_compile_error() {
        let work = tempfile::tempdir().unwrap();
        let mut adapter = MockLanguageAdapter::new();
        adapter.expect_source_file().return_const("solution.cpp");
        adapter
            .expect_language()
            .return_const(crate::core::domain::Language::Cpp);
        adapter.expect_compile().returning(|_, _, _| {
            Ok(CompileResult {
                success: false,
                diagnostics: "error: expected ';'".to_string(),
                artifact: None,
            })
        });
        adapter.expect_run().never();
        let generator = FixtureGenerator::new(Arc::new(adapter), work.path());

        let result = generator.generate(&spec(1), "int main(").await;
        assert!(matches!(result, Err(GenerationError::ReferenceCompile(msg)) if msg.contains("expected")));
    }

    #[tokio::test]
    async fn test_existing_fixtures_need_force() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let store = FixtureStore::new(out.path());
        let generator = FixtureGenerator::new(Arc::new(reversing_adapter()), work.path());
        let cases = generator.generate(&spec(5), "").await.unwrap();

        write_fixtures(&store, "demo", &spec(5), &cases, false).await.unwrap();
        std::fs::write(out.path().join("sample/99.in"), "stale").unwrap();

        assert!(matches!(
            write_fixtures(&store, "demo", &spec(5), &cases, false).await,
            Err(GenerationError::AlreadyExists(_))
        ));
        write_fixtures(&store, "demo", &spec(5), &cases, true).await.unwrap();
        assert!(!out.path().join("sample/99.in").exists());
    }

    #[tokio::test]
    async fn test_failed_rewrite_keeps_previous_fixtures() {
        let work = tempfile::tempdir().unwrap();
        let problem_dir = tempfile::tempdir().unwrap();
        let root = problem_dir.path().join("tests");
        let store = FixtureStore::new(&root);
        let generator = FixtureGenerator::new(Arc::new(reversing_adapter()), work.path());
        let cases = generator.generate(&spec(5), "").await.unwrap();
        write_fixtures(&store, "demo", &spec(5), &cases, false).await.unwrap();
        let before = read_tree(&root);

        let mut broken = generator.generate(&spec(6), "").await.unwrap();
        broken.last_mut().unwrap().planned.entry.input = "../escaped.in".to_string();
        let result = write_fixtures(&store, "demo", &spec(6), &broken, true).await;

        assert!(matches!(result, Err(GenerationError::System(_))));
        assert_eq!(read_tree(&root), before);
        let leftovers: Vec<_> = std::fs::read_dir(problem_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("tests")]);
        assert!(!problem_dir.path().join("escaped.in").exists());
    }

    #[tokio::test]
    async fn test_fixture_tree_is_private() {
        let work = tempfile::tempdir().unwrap();
        let problem_dir = tempfile::tempdir().unwrap();
        let root = problem_dir.path().join("tests");
        let generator = FixtureGenerator::new(Arc::new(reversing_adapter()), work.path());
        let cases = generator.generate(&spec(5), "").await.unwrap();

        write_fixtures(&FixtureStore::new(&root), "demo", &spec(5), &cases, false)
            .await
            .unwrap();

        let mode = std::fs::metadata(&root).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[tokio::test]
    async fn test_python_reference_end_to_end() {
        if which::which("python3").is_err() {
            return;
        }
        use crate::{adapters::AdapterRegistry, native::limiter::NativeLimiter};

        let registry = AdapterRegistry::native(Arc::new(NativeLimiter::default()));
        let work = tempfile::tempdir().unwrap();
        let generator = FixtureGenerator::new(
            registry.get(crate::core::domain::Language::Python).unwrap(),
            work.path(),
        );

        let a = generator.generate(&spec(42), "print(input()[::-1])\n").await.unwrap();
        let b = generator.generate(&spec(42), "print(input()[::-1])\n").await.unwrap();

        assert_eq!(a, b);
        for case in &a {
            let reversed: String = case.planned.input.trim_end().chars().rev().collect();
            assert_eq!(case.expected, format!("{reversed}\n"));
        }
    }
}
