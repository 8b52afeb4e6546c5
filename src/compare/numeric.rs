use itertools::{EitherOrBoth, Itertools};

use crate::compare::{DEFAULT_EPSILON, excerpt};
use crate::core::traits::comparator::{Comparator, Comparison};

/// Whitespace-separated tokens; numeric pairs within tolerance, everything
/// else compared exactly.
#[derive(Clone, Copy, Debug)]
pub struct NumericComparator {
    epsilon: f64,
    relative: Option<f64>,
}

impl Default for NumericComparator {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON, None)
    }
}

impl NumericComparator {
    pub fn new(epsilon: f64, relative: Option<f64>) -> Self {
        Self {
            epsilon: epsilon.abs(),
            relative: relative.map(f64::abs),
        }
    }

    fn close(&self, expected: f64, actual: f64) -> bool {
        if expected.is_nan() || actual.is_nan() {
            return expected.is_nan() && actual.is_nan();
        }
        if expected.is_infinite() || actual.is_infinite() {
            return expected == actual;
        }
        let delta = (expected - actual).abs();
        if delta <= self.epsilon {
            return true;
        }
        self.relative
            .is_some_and(|rel| delta <= rel * expected.abs().max(actual.abs()))
    }
}

fn parse_number(token: &str) -> Option<f64> {
    // Rust also accepts "infinity" and "nan"; both are valid judge output.
    token.parse::<f64>().ok()
}

impl Comparator for NumericComparator {
    fn name(&self) -> &'static str {
        "numeric"
    }

    fn compare(&self, expected: &str, actual: &str) -> Comparison {
        let expected_tokens: Vec<&str> = expected.split_whitespace().collect();
        let actual_tokens: Vec<&str> = actual.split_whitespace().collect();

        for (index, pair) in expected_tokens
            .iter()
            .zip_longest(actual_tokens.iter())
            .enumerate()
        {
            let position = index + 1;
            match pair {
                EitherOrBoth::Both(e, a) => {
                    let equal = match (parse_number(e), parse_number(a)) {
                        (Some(x), Some(y)) => self.close(x, y),
                        _ => e == a,
                    };
                    if !equal {
                        return Comparison::mismatch(format!(
                            "token {position}: expected {}, got {}",
                            excerpt(e),
                            excerpt(a)
                        ));
                    }
                }
                EitherOrBoth::Left(_) | EitherOrBoth::Right(_) => {
                    return Comparison::mismatch(format!(
                        "expected {} tokens, got {}",
                        expected_tokens.len(),
                        actual_tokens.len()
                    ));
                }
            }
        }
        Comparison::matched()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_epsilon() {
        let comparator = NumericComparator::new(1e-6, None);
        assert!(comparator.compare("1.0000001", "1.0000002").matched);
    }

    #[test]
    fn test_outside_epsilon() {
        let comparator = NumericComparator::new(1e-6, None);
        let result = comparator.compare("1.0", "1.1");
        assert!(!result.matched);
        assert_eq!(result.diff.as_deref(), Some("token 1: expected 1.0, got 1.1"));
    }

    #[test]
    fn test_token_count_must_match() {
        let result = NumericComparator::default().compare("1 2 3", "1 2");
        assert_eq!(result.diff.as_deref(), Some("expected 3 tokens, got 2"));
    }

    #[test]
    fn test_non_numeric_tokens_are_exact() {
        let comparator = NumericComparator::default();
        assert!(comparator.compare("YES 0.5", "YES 0.5000000001").matched);
        assert!(!comparator.compare("YES 0.5", "yes 0.5").matched);
    }

    #[test]
    fn test_layout_is_irrelevant() {
        assert!(NumericComparator::default().compare("1 2\n3", "1\n2 3\n").matched);
    }

    #[test]
    fn test_relative_tolerance() {
        let comparator = NumericComparator::new(1e-9, Some(1e-6));
        assert!(comparator.compare("1000000", "1000000.5").matched);
        assert!(!comparator.compare("1", "1.5").matched);
    }

    #[test]
    fn test_special_values() {
        let comparator = NumericComparator::default();
        assert!(comparator.compare("nan inf", "NaN inf").matched);
        assert!(!comparator.compare("inf", "-inf").matched);
    }

    #[test]
    fn test_integer_and_float_forms() {
        assert!(NumericComparator::default().compare("3", "3.000").matched);
    }
}
