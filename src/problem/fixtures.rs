use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::{
    compare::ComparatorSpec,
    constants::{MANIFEST_FILE, MANIFEST_VERSION},
    core::{
        domain::{TestCase, TestSelection, TestSet},
        errors::SystemError,
    },
};

/// Declared case order. The runner never lists directories.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub version: u32,
    pub problem: String,
    pub cases: Vec<ManifestEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    pub id: String,
    pub set: TestSet,
    pub input: String,
    pub expected: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator: Option<ComparatorSpec>,
}

impl ManifestEntry {
    /// Entry for the conventional `<set>/NN.in` layout.
    pub fn numbered(set: TestSet, number: usize) -> Self {
        Self {
            id: format!("{}-{number:02}", set.dir_name()),
            set,
            input: format!("{}/{number:02}.in", set.dir_name()),
            expected: format!("{}/{number:02}.out", set.dir_name()),
            comparator: None,
        }
    }
}

impl Manifest {
    pub fn new(problem: impl Into<String>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            problem: problem.into(),
            cases: Vec::new(),
        }
    }

    pub fn selected(&self, selection: TestSelection) -> impl Iterator<Item = &ManifestEntry> {
        self.cases
            .iter()
            .filter(move |entry| selection.includes(entry.set))
    }
}

#[derive(Clone, Debug)]
pub struct FixtureStore {
    root: PathBuf,
}

impl FixtureStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub async fn manifest(&self) -> Result<Manifest, SystemError> {
        let path = self.manifest_path();
        let raw = fs::read_to_string(&path)
            .await
            .map_err(|source| SystemError::Fixture {
                path: path.clone(),
                source,
            })?;
        let manifest: Manifest =
            serde_json::from_str(&raw).map_err(|e| SystemError::Manifest {
                path: path.clone(),
                msg: e.to_string(),
            })?;
        if manifest.version != MANIFEST_VERSION {
            return Err(SystemError::Manifest {
                path,
                msg: format!("unsupported manifest version {}", manifest.version),
            });
        }
        Ok(manifest)
    }

    pub async fn load_case(&self, entry: &ManifestEntry) -> Result<TestCase, SystemError> {
        Ok(TestCase {
            id: entry.id.clone(),
            set: entry.set,
            input: self.read(&entry.input).await?,
            expected: self.read(&entry.expected).await?,
            comparator: entry.comparator.clone(),
        })
    }

    pub async fn write_case(
        &self,
        entry: &ManifestEntry,
        input: &str,
        expected: &str,
    ) -> Result<(), SystemError> {
        self.write(&entry.input, input).await?;
        self.write(&entry.expected, expected).await
    }

    pub async fn write_manifest(&self, manifest: &Manifest) -> Result<(), SystemError> {
        let body = serde_json::to_string_pretty(manifest).map_err(|e| SystemError::Manifest {
            path: self.manifest_path(),
            msg: e.to_string(),
        })?;
        self.write(MANIFEST_FILE, &format!("{body}\n")).await
    }

    async fn read(&self, relative: &str) -> Result<String, SystemError> {
        let path = self.resolve(relative)?;
        fs::read_to_string(&path)
            .await
            .map_err(|source| SystemError::Fixture { path, source })
    }

    pub(crate) async fn write(&self, relative: &str, content: &str) -> Result<(), SystemError> {
        let path = self.resolve(relative)?;
        let fixture_err = |source| SystemError::Fixture {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(fixture_err)?;
        }
        fs::write(&path, content).await.map_err(fixture_err)
    }

    /// Manifest paths must stay inside the fixture root.
    fn resolve(&self, relative: &str) -> Result<PathBuf, SystemError> {
        let candidate = Path::new(relative);
        let escapes = candidate
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.is_empty() {
            return Err(SystemError::Manifest {
                path: self.manifest_path(),
                msg: format!("fixture path `{relative}` leaves the fixture directory"),
            });
        }
        Ok(self.root.join(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> Manifest {
        let mut manifest = Manifest::new("two-sum");
        manifest.cases = vec![
            ManifestEntry::numbered(TestSet::Sample, 1),
            ManifestEntry::numbered(TestSet::Hidden, 1),
            ManifestEntry::numbered(TestSet::Unit, 1),
            ManifestEntry::numbered(TestSet::Sample, 2),
        ];
        manifest
    }

    #[test]
    fn test_numbered_layout() {
        let entry = ManifestEntry::numbered(TestSet::Unit, 7);
        assert_eq!(entry.id, "unit-07");
        assert_eq!(entry.input, "unit/07.in");
        assert_eq!(entry.expected, "unit/07.out");
    }

    #[test]
    fn test_selection_keeps_declared_order() {
        let manifest = manifest();

        let samples: Vec<&str> = manifest
            .selected(TestSelection::Sample)
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(samples, vec!["sample-01", "sample-02"]);

        let all: Vec<&str> = manifest
            .selected(TestSelection::All)
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(all, vec!["sample-01", "hidden-01", "unit-01", "sample-02"]);
    }

    #[tokio::test]
    async fn test_write_then_load_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = FixtureStore::new(dir.path());
        let entry = ManifestEntry::numbered(TestSet::Sample, 1);

        store.write_case(&entry, "4\n", "[0,1]\n").await.unwrap();
        store.write_manifest(&manifest()).await.unwrap();

        let case = store.load_case(&entry).await.unwrap();
        assert_eq!(case.input, "4\n");
        assert_eq!(case.expected, "[0,1]\n");
        assert_eq!(store.manifest().await.unwrap(), manifest());
    }

    #[tokio::test]
    async fn test_missing_fixture_is_a_system_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FixtureStore::new(dir.path());

        let result = store.load_case(&ManifestEntry::numbered(TestSet::Sample, 1)).await;
        assert!(matches!(result, Err(SystemError::Fixture { .. })));

        assert!(matches!(store.manifest().await, Err(SystemError::Fixture { .. })));
    }

    #[tokio::test]
    async fn test_paths_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FixtureStore::new(dir.path());
        let entry = ManifestEntry {
            input: "../../etc/passwd".to_string(),
            ..ManifestEntry::numbered(TestSet::Sample, 1)
        };

        assert!(matches!(
            store.load_case(&entry).await,
            Err(SystemError::Manifest { .. })
        ));
    }
}
