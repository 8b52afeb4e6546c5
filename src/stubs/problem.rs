use std::collections::BTreeMap;
use std::path::Path;

use crate::{
    constants::PROBLEM_FILE,
    core::domain::TestSet,
    problem::{Manifest, ManifestEntry, Problem, ProblemSpec},
};

/// Lays out `problem.json` plus numbered fixtures in declared order.
pub async fn write_problem(
    root: &Path,
    spec: ProblemSpec,
    cases: &[(TestSet, &str, &str)],
) -> Problem {
    std::fs::write(
        root.join(PROBLEM_FILE),
        serde_json::to_string_pretty(&spec).unwrap(),
    )
    .unwrap();

    let problem = Problem::new(root, spec);
    let store = problem.fixtures();
    let mut manifest = Manifest::new(problem.slug());
    let mut numbering: BTreeMap<TestSet, usize> = BTreeMap::new();
    for (set, input, expected) in cases {
        let number = numbering.entry(*set).or_insert(0);
        *number += 1;
        let entry = ManifestEntry::numbered(*set, *number);
        store.write_case(&entry, input, expected).await.unwrap();
        manifest.cases.push(entry);
    }
    store.write_manifest(&manifest).await.unwrap();
    problem
}
