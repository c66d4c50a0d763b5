//! Parameter-value input handling.
//!
//! The engine's external input is a flat JSON object mapping parameter
//! names to literals or lists of literals. This module owns the emptiness
//! predicate used by value resolution and the premise combinator, the
//! scalar/list coercions applied before formatting, and the reserved
//! parameter names that the engine interprets itself.

use serde_json::Value;

/// Flat mapping from parameter name to literal or list-of-literals.
pub type ParameterValues = serde_json::Map<String, Value>;

/// Reserved parameter controlling the terminal result cap of a search.
pub const LIMIT_PARAMETER: &str = "LimitQueryParameter";

/// Reserved parameter excluding embedding models from similarity
/// combination.
pub const IGNORE_MODELS_PARAMETER: &str = "IgnoreModelsParameter";

/// Returns true if a supplied value should be treated as absent.
///
/// `null`, the empty string, and the empty array all count as empty; a
/// present-but-empty value neither satisfies a mandatory parameter nor
/// counts as "supplied input" for premise satisfaction.
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Returns the non-empty value stored under `name`, if any.
#[must_use]
pub fn supplied_value<'a>(values: &'a ParameterValues, name: &str) -> Option<&'a Value> {
    values.get(name).filter(|v| !is_empty_value(v))
}

/// Returns true if at least one supplied parameter carries a non-empty
/// value.
#[must_use]
pub fn any_non_empty(values: &ParameterValues) -> bool {
    values.values().any(|v| !is_empty_value(v))
}

/// Renders a single JSON literal as the string the formatter works on.
///
/// Strings pass through without JSON quoting; other scalars use their
/// JSON rendering.
#[must_use]
pub fn literal_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Coerces a value to list shape.
///
/// A scalar that arrives where a list is expected becomes a single-element
/// list.
#[must_use]
pub fn as_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(literal_to_string).collect(),
        other => vec![literal_to_string(other)],
    }
}

/// Coerces a value to scalar shape.
///
/// A list that arrives where a scalar is expected is reduced to its first
/// element; `None` only when that list is empty.
#[must_use]
pub fn as_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.first().map(literal_to_string),
        other => Some(literal_to_string(other)),
    }
}
