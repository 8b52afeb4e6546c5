use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::domain::TestSet;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorSpec {
    pub seeds: Vec<u64>,
    pub quotas: Vec<SetQuota>,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default = "default_patterns")]
    pub patterns: Vec<Pattern>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetQuota {
    pub set: TestSet,
    pub count: usize,
    #[serde(default)]
    pub constraints: Option<Constraints>,
    #[serde(default)]
    pub patterns: Option<Vec<Pattern>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Constraints {
    pub min_length: usize,
    pub max_length: usize,
    pub charset: Charset,
    pub min_value: i64,
    pub max_value: i64,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            min_length: 1,
            max_length: 10,
            charset: Charset::named("lowercase"),
            min_value: 0,
            max_value: 100,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    Random,
    Palindrome,
    Repeated,
    Alternating,
    Ascending,
    Descending,
    MixedCase,
    Words,
    FullCoverage,
    Integers,
}

fn default_patterns() -> Vec<Pattern> {
    vec![Pattern::Random]
}

/// A named alphabet (`lowercase`, `digits`, ...) or a literal one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Charset(pub String);

impl Charset {
    pub fn named(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn chars(&self) -> Vec<char> {
        const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
        const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        const DIGITS: &str = "0123456789";

        let alphabet: String = match self.0.as_str() {
            "lowercase" => LOWER.to_string(),
            "uppercase" => UPPER.to_string(),
            "letters" => format!("{LOWER}{UPPER}"),
            "digits" => DIGITS.to_string(),
            "alphanumeric" => format!("{LOWER}{UPPER}{DIGITS}"),
            "ascii_printable" => (' '..='~').collect(),
            "vowels" => "aeiou".to_string(),
            "consonants" => LOWER.chars().filter(|c| !"aeiou".contains(*c)).collect(),
            literal => literal.to_string(),
        };

        let mut seen = BTreeSet::new();
        alphabet.chars().filter(|c| seen.insert(*c)).collect()
    }
}

impl Constraints {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_length > self.max_length {
            return Err(format!(
                "min_length {} exceeds max_length {}",
                self.min_length, self.max_length
            ));
        }
        if self.min_value > self.max_value {
            return Err(format!(
                "min_value {} exceeds max_value {}",
                self.min_value, self.max_value
            ));
        }
        if self.charset.chars().is_empty() {
            return Err("charset is empty".to_string());
        }
        Ok(())
    }
}

impl GeneratorSpec {
    pub fn validate(&self) -> Result<(), String> {
        if self.seeds.is_empty() {
            return Err("at least one seed is required".to_string());
        }
        let unique: BTreeSet<_> = self.seeds.iter().collect();
        if unique.len() != self.seeds.len() {
            return Err("seeds must be unique".to_string());
        }
        if self.quotas.iter().all(|quota| quota.count == 0) {
            return Err("quotas request no cases".to_string());
        }
        if self.patterns.is_empty() {
            return Err("patterns must not be empty".to_string());
        }
        self.constraints.validate()?;
        for quota in &self.quotas {
            if let Some(constraints) = &quota.constraints {
                constraints.validate().map_err(|e| format!("{} quota: {e}", quota.set))?;
            }
            if quota.patterns.as_ref().is_some_and(Vec::is_empty) {
                return Err(format!("{} quota: patterns must not be empty", quota.set));
            }
        }
        Ok(())
    }

    pub fn total_cases(&self) -> usize {
        self.quotas.iter().map(|quota| quota.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_charsets() {
        assert_eq!(Charset::named("digits").chars().len(), 10);
        assert_eq!(Charset::named("consonants").chars().len(), 21);
        assert_eq!(Charset::named("ascii_printable").chars().len(), 95);
    }

    #[test]
    fn test_literal_charset_is_deduplicated_in_order() {
        assert_eq!(Charset::named("abca").chars(), vec!['a', 'b', 'c']);
    }

    #[test]
    fn test_spec_parses_with_defaults() {
        let spec: GeneratorSpec = serde_json::from_str(
            r#"{"seeds": [42], "quotas": [{"set": "sample", "count": 2}]}"#,
        )
        .unwrap();

        assert_eq!(spec.patterns, vec![Pattern::Random]);
        assert_eq!(spec.constraints, Constraints::default());
        assert_eq!(spec.total_cases(), 2);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut spec: GeneratorSpec =
            serde_json::from_str(r#"{"seeds": [1, 1], "quotas": [{"set": "unit", "count": 1}]}"#)
                .unwrap();
        assert_eq!(spec.validate(), Err("seeds must be unique".to_string()));

        spec.seeds = vec![1];
        spec.constraints.min_length = 20;
        assert!(spec.validate().unwrap_err().contains("min_length"));
    }
}
