#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    pub matched: bool,
    pub diff: Option<String>,
}

impl Comparison {
    pub fn matched() -> Self {
        Self {
            matched: true,
            diff: None,
        }
    }

    pub fn mismatch(diff: impl Into<String>) -> Self {
        Self {
            matched: false,
            diff: Some(diff.into()),
        }
    }
}

/// Equivalence policy between expected and produced output. Never fails:
/// malformed output is a mismatch.
pub trait Comparator: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn compare(&self, expected: &str, actual: &str) -> Comparison;
}
