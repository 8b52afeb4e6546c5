use serde::{Deserialize, Serialize};

use crate::core::traits::comparator::Comparator;

pub mod array;
pub mod numeric;
pub mod structured;
pub mod text;

pub use array::ArrayComparator;
pub use numeric::NumericComparator;
pub use structured::JsonComparator;
pub use text::TextComparator;

pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Named equivalence policy as written in problem metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ComparatorSpec {
    Text {
        #[serde(default = "enabled")]
        case_sensitive: bool,
    },
    Numeric {
        #[serde(default = "default_epsilon")]
        epsilon: f64,
        #[serde(default)]
        relative: Option<f64>,
    },
    Json {
        #[serde(default)]
        ignore_order: bool,
        #[serde(default)]
        ignore_extra_fields: bool,
    },
    /// Flat sequences written as `[1, 2, 3]`, `(a b c)` or `1,2,3`.
    Array {
        #[serde(default)]
        ignore_order: bool,
    },
}

impl Default for ComparatorSpec {
    fn default() -> Self {
        Self::text()
    }
}

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

fn enabled() -> bool {
    true
}

impl ComparatorSpec {
    pub fn text() -> Self {
        ComparatorSpec::Text {
            case_sensitive: true,
        }
    }

    /// Strict JSON: array order and extra keys both count.
    pub fn json() -> Self {
        ComparatorSpec::Json {
            ignore_order: false,
            ignore_extra_fields: false,
        }
    }

    pub fn build(&self) -> Box<dyn Comparator> {
        match self {
            ComparatorSpec::Text { case_sensitive } => Box::new(TextComparator {
                case_sensitive: *case_sensitive,
            }),
            ComparatorSpec::Numeric { epsilon, relative } => {
                Box::new(NumericComparator::new(*epsilon, *relative))
            }
            ComparatorSpec::Json {
                ignore_order,
                ignore_extra_fields,
            } => Box::new(JsonComparator {
                ignore_order: *ignore_order,
                ignore_extra_fields: *ignore_extra_fields,
            }),
            ComparatorSpec::Array { ignore_order } => Box::new(ArrayComparator {
                ignore_order: *ignore_order,
            }),
        }
    }
}

/// Shortens user content embedded in diff messages.
pub(crate) fn excerpt(text: &str) -> String {
    const MAX_CHARS: usize = 64;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CHARS).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_from_json() {
        let spec: ComparatorSpec = serde_json::from_str(r#"{"kind": "numeric"}"#).unwrap();
        assert_eq!(
            spec,
            ComparatorSpec::Numeric {
                epsilon: DEFAULT_EPSILON,
                relative: None
            }
        );

        let spec: ComparatorSpec = serde_json::from_str(r#"{"kind": "json"}"#).unwrap();
        assert_eq!(spec, ComparatorSpec::json());
        assert_eq!(spec.build().name(), "json");
    }

    #[test]
    fn test_options_from_json() {
        let spec: ComparatorSpec =
            serde_json::from_str(r#"{"kind": "text", "case_sensitive": false}"#).unwrap();
        assert!(spec.build().compare("YES", "yes").matched);

        let spec: ComparatorSpec =
            serde_json::from_str(r#"{"kind": "json", "ignore_order": true}"#).unwrap();
        assert!(spec.build().compare("[1,2]", "[2,1]").matched);

        let spec: ComparatorSpec =
            serde_json::from_str(r#"{"kind": "array", "ignore_order": true}"#).unwrap();
        assert_eq!(spec.build().name(), "array");
        assert!(spec.build().compare("[3, 1, 2]", "1 2 3").matched);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let parsed = serde_json::from_str::<ComparatorSpec>(r#"{"kind": "fuzzy"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_default_is_text() {
        assert_eq!(ComparatorSpec::default().build().name(), "text");
        assert!(!ComparatorSpec::default().build().compare("YES", "yes").matched);
    }

    #[test]
    fn test_excerpt_truncates_long_content() {
        let long = "x".repeat(100);
        assert_eq!(excerpt(&long).len(), 67);
        assert_eq!(excerpt("short"), "short");
    }
}
