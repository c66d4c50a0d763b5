//! Query-pipe execution.
//!
//! A pipe is evaluated left to right: each stage runs unbounded, its
//! results are projected through the stage's result-parameter mappings
//! and folded into a fresh parameter map for the next stage, and only
//! the terminal stage honors the caller's result limit. An empty
//! intermediate result short-circuits the whole pipe to an empty result.

use serde_json::Value;
use tracing::debug;

use crate::adapter;
use crate::error::{ExecutionError, InferenceResult};
use crate::query::{Query, SearchQuery};
use crate::session::GraphSession;
use crate::similarity;
use crate::values::ParameterValues;

/// Projects a dotted path out of a result record.
///
/// `None` when any path segment is absent; the caller decides whether
/// that is an error.
#[must_use]
pub(crate) fn project_path(record: &Value, path: &str) -> Option<Value> {
    let mut current = record;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current.clone())
}

/// Executes a single query or a pipe of queries.
///
/// `limit` caps only the terminal stage; intermediate stages run
/// unbounded so parameter folding sees the complete result set.
pub fn execute_search(
    session: &dyn GraphSession,
    search: &SearchQuery,
    values: &ParameterValues,
    limit: Option<usize>,
    debug_mode: bool,
) -> InferenceResult<Vec<Value>> {
    match search {
        SearchQuery::Query(query) => execute_query(session, query, values, limit, debug_mode),
        SearchQuery::Pipe { head, rest } => {
            let head_records = execute_search(session, head, values, None, debug_mode)?;
            if head_records.is_empty() {
                debug!("pipe stage returned no results, short-circuiting");
                return Ok(Vec::new());
            }

            let folded = fold_results(terminal_query(head), &head_records, values)?;
            execute_search(session, rest, &folded, limit, debug_mode)
        }
    }
}

/// Dispatches one query to its backend adapter.
pub fn execute_query(
    session: &dyn GraphSession,
    query: &Query,
    values: &ParameterValues,
    limit: Option<usize>,
    debug_mode: bool,
) -> InferenceResult<Vec<Value>> {
    match query {
        Query::Sparql(q) => adapter::execute_sparql(session, q, values, limit, debug_mode),
        Query::Elastic(q) => adapter::execute_elastic(session, q, values, limit, debug_mode),
        Query::GenericSearch(q) => adapter::execute_generic(session, q, values, limit, debug_mode),
        Query::Similarity(q) => {
            similarity::execute_similarity(session, q, values, limit, debug_mode)
        }
    }
}

/// The query whose results a composite stage ultimately yields.
fn terminal_query(search: &SearchQuery) -> &Query {
    match search {
        SearchQuery::Query(query) => query.as_ref(),
        SearchQuery::Pipe { rest, .. } => terminal_query(rest),
    }
}

/// Binds each declared mapping's projected values into a new parameter
/// map, keeping all prior values so later stages can still reference the
/// caller's original input.
fn fold_results(
    stage: &Query,
    records: &[Value],
    values: &ParameterValues,
) -> InferenceResult<ParameterValues> {
    let mut folded = values.clone();
    for mapping in stage.result_parameter_mapping() {
        let mut projected = Vec::with_capacity(records.len());
        for record in records {
            let value = project_path(record, &mapping.path).ok_or_else(|| {
                ExecutionError::ResultPathNotFound {
                    parameter: mapping.parameter_name.clone(),
                    path: mapping.path.clone(),
                }
            })?;
            projected.push(value);
        }
        debug!(
            parameter = %mapping.parameter_name,
            count = projected.len(),
            "folding stage results into parameter"
        );
        folded.insert(mapping.parameter_name.clone(), Value::Array(projected));
    }
    Ok(folded)
}
