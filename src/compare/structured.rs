use serde_json::{Number, Value};

use crate::compare::excerpt;
use crate::core::traits::comparator::{Comparator, Comparison};

/// Tolerance for numbers that differ only by formatting (`1` vs `1.0`).
const NUMBER_EPSILON: f64 = 1e-9;

/// Deep equality of two JSON documents. Object key order never matters;
/// array order matters unless `ignore_order` is set.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonComparator {
    /// Arrays match as multisets.
    pub ignore_order: bool,
    /// Keys present only in the actual output are accepted.
    pub ignore_extra_fields: bool,
}

impl Comparator for JsonComparator {
    fn name(&self) -> &'static str {
        "json"
    }

    fn compare(&self, expected: &str, actual: &str) -> Comparison {
        let expected: Value = match serde_json::from_str(expected.trim()) {
            Ok(value) => value,
            Err(e) => return Comparison::mismatch(format!("expected output is not valid JSON: {e}")),
        };
        let actual: Value = match serde_json::from_str(actual.trim()) {
            Ok(value) => value,
            Err(e) => return Comparison::mismatch(format!("output is not valid JSON: {e}")),
        };

        match self.first_divergence("$", &expected, &actual) {
            Some(diff) => Comparison::mismatch(diff),
            None => Comparison::matched(),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn render(value: &Value) -> String {
    excerpt(&value.to_string())
}

/// Integers compare exactly so values beyond 2^53 stay distinct; floats and
/// mixed pairs compare within `NUMBER_EPSILON`.
fn same_number(e: &Number, a: &Number) -> bool {
    if let (Some(x), Some(y)) = (e.as_i64(), a.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (e.as_u64(), a.as_u64()) {
        return x == y;
    }
    if (e.is_i64() || e.is_u64()) && (a.is_i64() || a.is_u64()) {
        return false;
    }
    match (e.as_f64(), a.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() <= NUMBER_EPSILON,
        _ => e == a,
    }
}

impl JsonComparator {
    fn first_divergence(&self, path: &str, expected: &Value, actual: &Value) -> Option<String> {
        match (expected, actual) {
            (Value::Number(e), Value::Number(a)) => {
                (!same_number(e, a)).then(|| format!("{path}: expected {e}, got {a}"))
            }
            (Value::Array(e), Value::Array(a)) if self.ignore_order => self.unordered(path, e, a),
            (Value::Array(e), Value::Array(a)) => {
                if let Some(diff) = e
                    .iter()
                    .zip(a.iter())
                    .enumerate()
                    .find_map(|(i, (x, y))| self.first_divergence(&format!("{path}[{i}]"), x, y))
                {
                    return Some(diff);
                }
                (e.len() != a.len())
                    .then(|| format!("{path}: expected {} elements, got {}", e.len(), a.len()))
            }
            (Value::Object(e), Value::Object(a)) => {
                // serde_json maps iterate in sorted key order.
                for (key, value) in e {
                    let child = format!("{path}.{key}");
                    match a.get(key) {
                        Some(other) => {
                            if let Some(diff) = self.first_divergence(&child, value, other) {
                                return Some(diff);
                            }
                        }
                        None => return Some(format!("{child}: missing key")),
                    }
                }
                if self.ignore_extra_fields {
                    return None;
                }
                a.keys()
                    .find(|key| !e.contains_key(*key))
                    .map(|key| format!("{path}.{key}: unexpected key"))
            }
            (e, a) if type_name(e) != type_name(a) => Some(format!(
                "{path}: expected {}, got {} {}",
                type_name(e),
                type_name(a),
                render(a)
            )),
            (e, a) => (e != a).then(|| format!("{path}: expected {}, got {}", render(e), render(a))),
        }
    }

    /// Multiset match: each expected element claims the first unclaimed
    /// actual element equal to it.
    fn unordered(&self, path: &str, expected: &[Value], actual: &[Value]) -> Option<String> {
        if expected.len() != actual.len() {
            return Some(format!(
                "{path}: expected {} elements, got {}",
                expected.len(),
                actual.len()
            ));
        }
        let mut claimed = vec![false; actual.len()];
        for (i, item) in expected.iter().enumerate() {
            let found = actual.iter().enumerate().position(|(j, candidate)| {
                !claimed[j] && self.first_divergence(path, item, candidate).is_none()
            });
            match found {
                Some(j) => claimed[j] = true,
                None => {
                    return Some(format!(
                        "{path}[{i}]: no element matching {} in any order",
                        render(item)
                    ));
                }
            }
        }
        None
    }
}
