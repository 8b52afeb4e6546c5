use itertools::{EitherOrBoth, Itertools};

use crate::compare::excerpt;
use crate::core::traits::comparator::{Comparator, Comparison};

/// Flat sequences tolerant of presentation: one pair of surrounding brackets
/// or parentheses is dropped, elements split on commas and whitespace, and
/// quotes around an element are ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArrayComparator {
    pub ignore_order: bool,
}

pub fn elements(text: &str) -> Vec<&str> {
    let text = text.trim();
    let text = text
        .strip_prefix(['[', '('])
        .unwrap_or(text);
    let text = text
        .strip_suffix([']', ')'])
        .unwrap_or(text);
    text.split(|c: char| c == ',' || c.is_whitespace())
        .map(|item| item.trim_matches(|c| c == '"' || c == '\''))
        .filter(|item| !item.is_empty())
        .collect()
}

impl Comparator for ArrayComparator {
    fn name(&self) -> &'static str {
        "array"
    }

    fn compare(&self, expected: &str, actual: &str) -> Comparison {
        let mut expected = elements(expected);
        let mut actual = elements(actual);
        if self.ignore_order {
            expected.sort_unstable();
            actual.sort_unstable();
        }

        for (index, pair) in expected.iter().zip_longest(actual.iter()).enumerate() {
            match pair {
                EitherOrBoth::Both(e, a) if e == a => continue,
                EitherOrBoth::Both(e, a) => {
                    let position = if self.ignore_order { " (sorted)" } else { "" };
                    return Comparison::mismatch(format!(
                        "element {index}{position}: expected \"{}\", got \"{}\"",
                        excerpt(e),
                        excerpt(a)
                    ));
                }
                EitherOrBoth::Left(_) | EitherOrBoth::Right(_) => {
                    return Comparison::mismatch(format!(
                        "expected {} elements, got {}",
                        expected.len(),
                        actual.len()
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
    fn test_elements_ignore_presentation() {
        assert_eq!(elements("[1, 2, 3]\n"), vec!["1", "2", "3"]);
        assert_eq!(elements("(a b\tc)"), vec!["a", "b", "c"]);
        assert_eq!(elements(r#"["x",'y' , z]"#), vec!["x", "y", "z"]);
        assert!(elements("[]").is_empty());
        assert!(elements("").is_empty());
    }

    #[test]
    fn test_formats_are_interchangeable() {
        let comparator = ArrayComparator::default();
        assert!(comparator.compare("[0, 1]", "0 1").matched);
        assert!(comparator.compare("1,2,3", "(1 2 3)\n").matched);
    }

    #[test]
    fn test_order_matters_by_default() {
        let result = ArrayComparator::default().compare("[0, 1]", "[1, 0]");
        assert!(!result.matched);
        assert_eq!(result.diff.as_deref(), Some("element 0: expected \"0\", got \"1\""));
    }

    #[test]
    fn test_ignore_order() {
        let comparator = ArrayComparator { ignore_order: true };
        assert!(comparator.compare("[3, 1, 2]", "[1, 2, 3]").matched);
        assert!(!comparator.compare("[1, 1, 2]", "[1, 2, 2]").matched);
    }

    #[test]
    fn test_length_mismatch() {
        let result = ArrayComparator::default().compare("[1, 2, 3]", "[1, 2]");
        assert_eq!(result.diff.as_deref(), Some("expected 3 elements, got 2"));
    }
}
