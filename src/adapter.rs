//! Backend source adapters.
//!
//! One adapter per backend family: each substitutes formatted parameters
//! into the query's body or pattern, switches the session's active view
//! for the duration of the call when the configuration asks for one, and
//! executes through the session capability. Premise checks share the
//! same substitution path but reduce the result to a
//! [`PremiseExecution`] outcome.

use regex::{NoExpand, Regex};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{DefinitionError, InferenceError, InferenceResult, ParameterError};
use crate::executor::project_path;
use crate::format::{format_parameters, FormattedParameters};
use crate::multipair::expand_pairs;
use crate::parameter::ParameterSpecification;
use crate::premise::PremiseExecution;
use crate::query::{
    ElasticSearchQuery, GenericSearchQuery, Query, QueryFamily, SparqlQuery,
};
use crate::session::{GraphSession, IndexViewGuard, SparqlViewGuard};
use crate::values::ParameterValues;

/// Substitutes formatted parameters into a body template.
///
/// Substitution is plain text replacement of `$name` tokens, longest
/// name first so one parameter name being a prefix of another cannot
/// corrupt the result. A `$name` token still present afterwards and
/// naming a declared parameter is an unresolved-placeholder error; other
/// `$` tokens pass through (SPARQL allows `$var` variables).
pub fn substitute(
    body: &str,
    parameters: &FormattedParameters,
    declared: &[ParameterSpecification],
) -> InferenceResult<String> {
    let mut names: Vec<&String> = parameters.keys().collect();
    names.sort_by_key(|name| std::cmp::Reverse(name.len()));

    let mut substituted = body.to_string();
    for name in names {
        let token = placeholder(name);
        substituted = token
            .replace_all(&substituted, NoExpand(&parameters[name]))
            .into_owned();
    }

    for spec in declared {
        if placeholder(&spec.name).is_match(&substituted) {
            return Err(ParameterError::UnresolvedPlaceholder {
                name: spec.name.clone(),
            }
            .into());
        }
    }
    Ok(substituted)
}

fn placeholder(name: &str) -> Regex {
    Regex::new(&format!(r"\${}\b", regex::escape(name)))
        .expect("parameter names form valid patterns")
}

/// Substitutes formatted parameters into every string of a structured
/// search pattern.
fn substitute_pattern(
    pattern: &Value,
    parameters: &FormattedParameters,
    declared: &[ParameterSpecification],
) -> InferenceResult<Value> {
    match pattern {
        Value::String(s) => Ok(Value::String(substitute(s, parameters, declared)?)),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(substitute_pattern(item, parameters, declared)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), substitute_pattern(value, parameters, declared)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

/// Executes a SPARQL query.
pub fn execute_sparql(
    session: &dyn GraphSession,
    query: &SparqlQuery,
    values: &ParameterValues,
    limit: Option<usize>,
    debug_mode: bool,
) -> InferenceResult<Vec<Value>> {
    let (body, specs, values) = match expand_pairs(
        &query.body,
        &query.parameters,
        values,
        QueryFamily::Sparql,
    )? {
        Some(expansion) => (expansion.body, expansion.parameters, expansion.values),
        None => (query.body.clone(), query.parameters.clone(), values.clone()),
    };

    let formatted = format_parameters(&specs, &values, QueryFamily::Sparql, session)?;
    let text = substitute(&body, &formatted, &specs)?;
    debug!(query = %text, "running SPARQL query");

    let config = query.configurations.first();
    let _guard = config
        .and_then(|c| c.sparql_view.as_ref())
        .map(|view| SparqlViewGuard::switch(session, &view.id))
        .transpose()?;
    Ok(session.run_sparql(&text, limit, debug_mode)?)
}

/// Executes an Elasticsearch query.
pub fn execute_elastic(
    session: &dyn GraphSession,
    query: &ElasticSearchQuery,
    values: &ParameterValues,
    limit: Option<usize>,
    debug_mode: bool,
) -> InferenceResult<Vec<Value>> {
    let formatted =
        format_parameters(&query.parameters, values, QueryFamily::Elastic, session)?;
    let text = substitute(&query.body, &formatted, &query.parameters)?;
    let body: Value =
        serde_json::from_str(&text).map_err(|e| DefinitionError::MalformedDocument {
            reason: format!("substituted Elasticsearch body is not JSON: {e}"),
        })?;
    debug!(body = %body, "running Elasticsearch query");

    let config = query.configurations.first();
    let _guard = config
        .and_then(|c| c.elastic_search_view.as_ref())
        .map(|view| IndexViewGuard::switch(session, &view.id))
        .transpose()?;
    Ok(session.run_index_query(&body, limit, debug_mode)?)
}

/// Executes a capability-level graph search.
pub fn execute_generic(
    session: &dyn GraphSession,
    query: &GenericSearchQuery,
    values: &ParameterValues,
    limit: Option<usize>,
    debug_mode: bool,
) -> InferenceResult<Vec<Value>> {
    let formatted =
        format_parameters(&query.parameters, values, QueryFamily::GenericSearch, session)?;
    let pattern = substitute_pattern(&query.pattern, &formatted, &query.parameters)?;
    debug!(pattern = %pattern, "running graph search");
    Ok(session.run_graph_search(&pattern, limit, debug_mode)?)
}

/// Evaluates one premise to its outcome.
///
/// Missing mandatory parameters become the `MissingParameter` outcome;
/// malformed-definition errors (including the unsupported backends
/// below) become `Error`. Invalid values and session failures stay hard
/// errors and propagate.
pub fn check_premise(
    session: &dyn GraphSession,
    premise: &Query,
    values: &ParameterValues,
    debug_mode: bool,
) -> InferenceResult<PremiseExecution> {
    match run_premise(session, premise, values, debug_mode) {
        Ok(outcome) => Ok(outcome),
        Err(error) if error.is_missing_parameter() => {
            debug!(premise = %premise.label(), "premise parameter missing");
            Ok(PremiseExecution::MissingParameter)
        }
        Err(InferenceError::Definition(error)) => {
            warn!(premise = %premise.label(), %error, "premise definition unusable");
            Ok(PremiseExecution::Error)
        }
        Err(error) => Err(error),
    }
}

fn run_premise(
    session: &dyn GraphSession,
    premise: &Query,
    values: &ParameterValues,
    debug_mode: bool,
) -> InferenceResult<PremiseExecution> {
    match premise {
        Query::Sparql(query) => {
            let records = execute_sparql(session, query, values, None, debug_mode)?;
            Ok(if records.is_empty() {
                PremiseExecution::Fail
            } else {
                PremiseExecution::Success
            })
        }
        // No premise semantics exist for these backends; an explicit
        // error keeps the gap visible instead of silently passing.
        Query::Elastic(_) => Err(DefinitionError::UnsupportedPremiseBackend {
            family: QueryFamily::Elastic.to_string(),
        }
        .into()),
        Query::Similarity(_) => Err(DefinitionError::UnsupportedPremiseBackend {
            family: QueryFamily::Similarity.to_string(),
        }
        .into()),
        Query::GenericSearch(query) => check_generic_premise(session, query, values, debug_mode),
    }
}

/// Generic-search premise: with a target parameter the check passes only
/// if some result's projected id equals the caller-supplied target;
/// without one it passes iff the result set is non-empty.
fn check_generic_premise(
    session: &dyn GraphSession,
    query: &GenericSearchQuery,
    values: &ParameterValues,
    debug_mode: bool,
) -> InferenceResult<PremiseExecution> {
    let formatted =
        format_parameters(&query.parameters, values, QueryFamily::GenericSearch, session)?;
    let records = execute_generic(session, query, values, None, debug_mode)?;

    let Some(target_parameter) = query.target_parameter.as_deref() else {
        return Ok(if records.is_empty() {
            PremiseExecution::Fail
        } else {
            PremiseExecution::Success
        });
    };

    let Some(target) = formatted.get(target_parameter) else {
        return Ok(PremiseExecution::MissingParameter);
    };

    let path = query.target_path.as_deref().unwrap_or("id");
    for record in &records {
        let matches = match project_path(record, path) {
            Some(Value::String(id)) => &id == target,
            Some(other) => &other.to_string() == target,
            None => false,
        };
        if matches {
            return Ok(PremiseExecution::Success);
        }
    }
    Ok(PremiseExecution::Fail)
}
