use itertools::{EitherOrBoth, Itertools};

use crate::compare::excerpt;
use crate::core::traits::comparator::{Comparator, Comparison};

/// Byte equality after normalizing line endings and trailing whitespace.
#[derive(Clone, Copy, Debug)]
pub struct TextComparator {
    pub case_sensitive: bool,
}

impl Default for TextComparator {
    fn default() -> Self {
        Self {
            case_sensitive: true,
        }
    }
}

pub fn normalize(text: &str) -> Vec<String> {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<String> = unified
        .split('\n')
        .map(|line| line.trim_end().to_string())
        .collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

impl Comparator for TextComparator {
    fn name(&self) -> &'static str {
        "text"
    }

    fn compare(&self, expected: &str, actual: &str) -> Comparison {
        let (expected, actual) = if self.case_sensitive {
            (normalize(expected), normalize(actual))
        } else {
            (normalize(&expected.to_lowercase()), normalize(&actual.to_lowercase()))
        };

        for (index, pair) in expected.iter().zip_longest(actual.iter()).enumerate() {
            let line = index + 1;
            match pair {
                EitherOrBoth::Both(e, a) if e == a => continue,
                EitherOrBoth::Both(e, a) => {
                    let column = e
                        .chars()
                        .zip(a.chars())
                        .take_while(|(x, y)| x == y)
                        .count()
                        + 1;
                    return Comparison::mismatch(format!(
                        "line {line}, column {column}: expected \"{}\", got \"{}\"",
                        excerpt(e),
                        excerpt(a)
                    ));
                }
                EitherOrBoth::Left(e) => {
                    return Comparison::mismatch(format!(
                        "line {line}: expected \"{}\", got end of output ({} of {} lines)",
                        excerpt(e),
                        actual.len(),
                        expected.len()
                    ));
                }
                EitherOrBoth::Right(a) => {
                    return Comparison::mismatch(format!(
                        "line {line}: unexpected extra output \"{}\" ({} lines, expected {})",
                        excerpt(a),
                        actual.len(),
                        expected.len()
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
    fn test_trailing_newline_is_ignored() {
        assert!(TextComparator::default().compare("abc\n", "abc").matched);
    }

    #[test]
    fn test_single_character_difference() {
        let result = TextComparator::default().compare("abc", "abd");
        assert!(!result.matched);
        assert_eq!(
            result.diff.as_deref(),
            Some("line 1, column 3: expected \"abc\", got \"abd\"")
        );
    }

    #[test]
    fn test_crlf_and_trailing_spaces() {
        assert!(TextComparator::default().compare("1 2\n3\n", "1 2  \r\n3\r\n\r\n").matched);
    }

    #[test]
    fn test_bare_carriage_returns() {
        assert!(TextComparator::default().compare("a\nb\n", "a\rb\r").matched);
    }

    #[test]
    fn test_leading_whitespace_is_significant() {
        assert!(!TextComparator::default().compare("a", " a").matched);
    }

    #[test]
    fn test_missing_line() {
        let result = TextComparator::default().compare("1\n2\n", "1\n");
        assert_eq!(
            result.diff.as_deref(),
            Some("line 2: expected \"2\", got end of output (1 of 2 lines)")
        );
    }

    #[test]
    fn test_extra_line() {
        let result = TextComparator::default().compare("1", "1\n2");
        assert!(!result.matched);
        assert!(result.diff.unwrap().starts_with("line 2: unexpected extra output \"2\""));
    }

    #[test]
    fn test_case_insensitive() {
        let comparator = TextComparator {
            case_sensitive: false,
        };
        assert!(comparator.compare("Hello World\nYES\n", "hello world\nyes").matched);
        assert!(!comparator.compare("Hello", "Hallo").matched);
        assert!(!TextComparator::default().compare("YES", "yes").matched);
    }

    #[test]
    fn test_empty_outputs_match() {
        assert!(TextComparator::default().compare("", "\n\n").matched);
    }
}
