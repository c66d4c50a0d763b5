//! Variadic (predicate, object) pair expansion.
//!
//! A SPARQL query can accept a caller-chosen number of (predicate,
//! object) pairs through one `MultiPredicateObjectPair` parameter. Before
//! formatting, the single placeholder line in the query body is rewritten
//! into one line per supplied pair, and the variadic parameter is
//! replaced by two ordinary typed parameters per pair. Downstream
//! formatting then treats the synthetic parameters like any other.

use regex::{NoExpand, Regex};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{DefinitionError, InferenceResult};
use crate::parameter::{ParameterSpecification, ParameterType};
use crate::query::QueryFamily;
use crate::values::{is_empty_value, ParameterValues};

/// One typed component of a pair.
#[derive(Debug, Clone, Deserialize)]
pub struct PairComponent {
    /// Declared type of the synthetic parameter derived from this
    /// component.
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,

    /// Literal value bound to the synthetic parameter.
    pub value: Value,
}

/// One supplied (predicate, object) pair.
#[derive(Debug, Clone, Deserialize)]
pub struct PredicateObjectPair {
    /// Predicate component.
    pub predicate: PairComponent,
    /// Object component.
    pub object: PairComponent,
}

/// Result of expanding a variadic pair parameter.
#[derive(Debug)]
pub struct PairExpansion {
    /// Query body with the placeholder line rewritten.
    pub body: String,
    /// Parameter specifications with the variadic one replaced by its
    /// derived slots.
    pub parameters: Vec<ParameterSpecification>,
    /// Parameter values with the pair list replaced by per-slot literals.
    pub values: ParameterValues,
}

/// Expands the query's `MultiPredicateObjectPair` parameter, if it
/// declares one.
///
/// At most one such parameter is honored (the first declared). Returns
/// `None` when the query declares none, leaving body and parameters
/// untouched.
pub fn expand_pairs(
    body: &str,
    specs: &[ParameterSpecification],
    values: &ParameterValues,
    family: QueryFamily,
) -> InferenceResult<Option<PairExpansion>> {
    let Some(variadic) = specs
        .iter()
        .find(|s| s.parameter_type == ParameterType::MultiPredicateObjectPair)
    else {
        return Ok(None);
    };

    if family != QueryFamily::Sparql {
        return Err(DefinitionError::MultiPairOutsideSparql {
            name: variadic.name.clone(),
        }
        .into());
    }

    let pairs = supplied_pairs(&variadic.name, values)?;

    let mut parameters: Vec<ParameterSpecification> = specs
        .iter()
        .filter(|s| s.name != variadic.name)
        .cloned()
        .collect();
    let mut expanded_values = values.clone();
    expanded_values.remove(&variadic.name);

    let body = rewrite_body(body, &variadic.name, pairs.len())?;

    for (i, pair) in pairs.iter().enumerate() {
        let predicate_name = format!("{}_{i}_predicate", variadic.name);
        let object_name = format!("{}_{i}_object", variadic.name);
        parameters.push(ParameterSpecification::new(
            &predicate_name,
            pair.predicate.parameter_type,
        ));
        parameters.push(ParameterSpecification::new(
            &object_name,
            pair.object.parameter_type,
        ));
        expanded_values.insert(predicate_name, pair.predicate.value.clone());
        expanded_values.insert(object_name, pair.object.value.clone());
    }

    Ok(Some(PairExpansion {
        body,
        parameters,
        values: expanded_values,
    }))
}

/// Parses the supplied pair list; absent or empty means zero pairs.
fn supplied_pairs(
    name: &str,
    values: &ParameterValues,
) -> Result<Vec<PredicateObjectPair>, DefinitionError> {
    let Some(raw) = values.get(name).filter(|v| !is_empty_value(v)) else {
        return Ok(Vec::new());
    };
    serde_json::from_value(raw.clone()).map_err(|e| DefinitionError::MalformedPair {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Replaces the single placeholder line with one line per pair; zero
/// pairs delete the line entirely.
fn rewrite_body(body: &str, name: &str, count: usize) -> Result<String, DefinitionError> {
    let token = Regex::new(&format!(r"\${}\b", regex::escape(name)))
        .expect("parameter names form valid patterns");

    let mut lines: Vec<String> = Vec::new();
    let mut found = false;
    for line in body.lines() {
        if !found && token.is_match(line) {
            found = true;
            for i in 0..count {
                let replacement = format!("${name}_{i}_predicate ${name}_{i}_object");
                lines.push(token.replace_all(line, NoExpand(&replacement)).into_owned());
            }
            continue;
        }
        lines.push(line.to_string());
    }

    if !found {
        return Err(DefinitionError::MultiPairPlaceholderMissing {
            name: name.to_string(),
        });
    }
    Ok(lines.join("\n"))
}
