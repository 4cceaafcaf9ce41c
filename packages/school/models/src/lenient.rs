//! Tolerant `serde` helpers for upstream JSON.
//!
//! The dashboard API emits counts as numbers, numeric strings, or `null`
//! depending on the endpoint, and booleans as `true`, `"yes"`, `1`, etc.
//! These helpers normalize all of that at the parse boundary so that the
//! typed models never carry "maybe a number" fields.
//!
//! Models read the raw record into one `Option<Value>` per spelling of a
//! field and fold the spellings with the `first_*` helpers.

use serde_json::Value;

/// Interprets a JSON value as a non-negative count, defaulting to `0`.
#[must_use]
pub fn value_to_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(f64_to_u64))
            .unwrap_or(0),
        Value::String(s) => s
            .trim()
            .replace(',', "")
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f > 0.0)
            .map_or(0, f64_to_u64),
        Value::Bool(b) => u64::from(*b),
        _ => 0,
    }
}

/// Interprets a JSON value as a floating point amount, defaulting to `0.0`.
#[must_use]
pub fn value_to_f64(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite()).unwrap_or(0.0)
}

/// Interprets a JSON value as a boolean flag, or `None` when absent or
/// unrecognized.
#[must_use]
pub fn value_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f.abs() > 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "present" => Some(true),
            "false" | "no" | "n" | "0" | "absent" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// The first of `candidates` that is present and not `null`.
///
#[must_use]
pub fn first_present<const N: usize>(candidates: [Option<Value>; N]) -> Option<Value> {
    candidates.into_iter().flatten().find(|v| !v.is_null())
}

/// [`value_to_u64`] over the first present candidate.
#[must_use]
pub fn first_count<const N: usize>(candidates: [Option<Value>; N]) -> u64 {
    first_present(candidates).as_ref().map_or(0, value_to_u64)
}

/// [`value_to_f64`] over the first present candidate.
#[must_use]
pub fn first_amount<const N: usize>(candidates: [Option<Value>; N]) -> f64 {
    first_present(candidates).as_ref().map_or(0.0, value_to_f64)
}

/// The first candidate that is a non-blank string or a number, as text.
#[must_use]
pub fn first_text<const N: usize>(candidates: [Option<Value>; N]) -> String {
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn f64_to_u64(f: f64) -> u64 {
    if f >= u64::MAX as f64 {
        u64::MAX
    } else {
        f.round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counts_from_mixed_shapes() {
        assert_eq!(value_to_u64(&json!(42)), 42);
        assert_eq!(value_to_u64(&json!("1,234")), 1234);
        assert_eq!(value_to_u64(&json!(" 7 ")), 7);
        assert_eq!(value_to_u64(&json!(3.6)), 4);
        assert_eq!(value_to_u64(&json!(-5)), 0);
        assert_eq!(value_to_u64(&json!(null)), 0);
        assert_eq!(value_to_u64(&json!("n/a")), 0);
    }

    #[test]
    fn flags_from_mixed_shapes() {
        assert_eq!(value_to_bool(&json!(true)), Some(true));
        assert_eq!(value_to_bool(&json!("Yes")), Some(true));
        assert_eq!(value_to_bool(&json!(0)), Some(false));
        assert_eq!(value_to_bool(&json!("maybe")), None);
        assert_eq!(value_to_bool(&json!(null)), None);
    }

    #[test]
    fn first_spelling_wins() {
        assert_eq!(first_count([None, Some(json!(null)), Some(json!("12"))]), 12);
        assert_eq!(first_count([Some(json!(3)), Some(json!(9))]), 3);
        assert_eq!(first_count::<2>([None, None]), 0);
        assert_eq!(first_text([Some(json!(" ")), Some(json!("Juba"))]), "Juba");
        assert_eq!(first_text([Some(json!({})), Some(json!(7))]), "7");
        assert!((first_amount([None, Some(json!("1,000.5"))]) - 1000.5).abs() < f64::EPSILON);
    }

    #[test]
    fn amounts() {
        assert!((value_to_f64(&json!("12,500.50")) - 12_500.5).abs() < f64::EPSILON);
        assert!(value_to_f64(&json!({})).abs() < f64::EPSILON);
    }
}
