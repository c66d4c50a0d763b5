//! Typed parameter formatting.
//!
//! Each parameter type maps to an exact textual representation that
//! depends on the backend family of the target query or premise. The
//! rules here are the contract the rest of the engine builds on; tests
//! pin the literal output for every type.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{DefinitionError, InferenceResult, ParameterError};
use crate::parameter::{ParameterSpecification, ParameterType};
use crate::query::QueryFamily;
use crate::session::UriExpander;
use crate::values::{as_list, as_scalar, ParameterValues};

/// Formatted parameters ready for template substitution, keyed by name.
pub type FormattedParameters = BTreeMap<String, String>;

/// Formats one resolved value according to its declared type and the
/// target backend family.
pub fn format_parameter(
    spec: &ParameterSpecification,
    value: &Value,
    family: QueryFamily,
    expander: &dyn UriExpander,
) -> InferenceResult<String> {
    let formatted = match spec.parameter_type {
        ParameterType::Str => format!("\"{}\"", scalar(spec, value)?),
        ParameterType::Path | ParameterType::QueryBlock => scalar(spec, value)?,
        ParameterType::Uri => {
            let expanded = expander.expand_short_uri(&scalar(spec, value)?)?;
            // Elasticsearch bodies and similarity filters are JSON, where
            // a bare URI would not parse.
            if matches!(family, QueryFamily::Elastic | QueryFamily::Similarity) {
                format!("\"{expanded}\"")
            } else {
                expanded
            }
        }
        ParameterType::Bool => {
            let raw = scalar(spec, value)?;
            let normalized = raw.to_lowercase();
            if normalized == "true" || normalized == "false" {
                normalized
            } else {
                return Err(ParameterError::InvalidBoolean {
                    name: spec.name.clone(),
                    value: raw,
                }
                .into());
            }
        }
        ParameterType::List => join_quoted(&as_list(value)),
        ParameterType::UriList => {
            if family == QueryFamily::Sparql {
                let mut items = Vec::new();
                for item in as_list(value) {
                    items.push(format!("<{}>", expander.expand_short_uri(&item)?));
                }
                items.join(", ")
            } else {
                join_quoted(&as_list(value))
            }
        }
        ParameterType::SparqlList => {
            require_sparql(spec, family)?;
            let items: Vec<String> = as_list(value)
                .into_iter()
                .map(|item| format!("<{item}>"))
                .collect();
            format!("({})", items.join(", "))
        }
        ParameterType::SparqlValueList => {
            require_sparql(spec, family)?;
            as_list(value)
                .into_iter()
                .map(|item| format!("(\"{item}\")"))
                .collect::<Vec<_>>()
                .join("\n")
        }
        ParameterType::SparqlValueUriList => {
            require_sparql(spec, family)?;
            let mut lines = Vec::new();
            for item in as_list(value) {
                lines.push(format!("(<{}>)", expander.expand_short_uri(&item)?));
            }
            lines.join("\n")
        }
        ParameterType::MultiPredicateObjectPair => {
            // Expanded into indexed slots before formatting; reaching the
            // formatter means expansion was skipped.
            return Err(DefinitionError::MalformedDocument {
                reason: format!(
                    "parameter '{}' was not expanded before formatting",
                    spec.name
                ),
            }
            .into());
        }
    };
    Ok(formatted)
}

/// Resolves and formats every declared parameter of a query.
///
/// Optional parameters that resolve to nothing are omitted from the
/// result; a mandatory parameter with no value surfaces as a
/// missing-parameter error.
pub fn format_parameters(
    specs: &[ParameterSpecification],
    values: &ParameterValues,
    family: QueryFamily,
    expander: &dyn UriExpander,
) -> InferenceResult<FormattedParameters> {
    let mut formatted = FormattedParameters::new();
    for spec in specs {
        match spec.resolve(values)? {
            Some(value) => {
                formatted.insert(
                    spec.name.clone(),
                    format_parameter(spec, &value, family, expander)?,
                );
            }
            None => continue,
        }
    }
    Ok(formatted)
}

fn scalar(spec: &ParameterSpecification, value: &Value) -> Result<String, ParameterError> {
    as_scalar(value).ok_or_else(|| ParameterError::EmptyValue {
        name: spec.name.clone(),
    })
}

fn join_quoted(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("\"{item}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn require_sparql(
    spec: &ParameterSpecification,
    family: QueryFamily,
) -> Result<(), DefinitionError> {
    if family == QueryFamily::Sparql {
        Ok(())
    } else {
        Err(DefinitionError::IncompatibleParameterType {
            name: spec.name.clone(),
            parameter_type: spec.parameter_type.to_string(),
            family: family.to_string(),
        })
    }
}
