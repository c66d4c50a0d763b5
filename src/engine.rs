//! The inference engine facade.
//!
//! Owns the session collaborator and exposes the three operations
//! callers compose: premise checking, search execution, and full rule
//! application (premises gate the search; an unsatisfied rule yields an
//! empty result with a warning, never an error).

use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::check_premise;
use crate::error::{ExecutionError, InferenceResult};
use crate::executor::execute_search;
use crate::premise::premises_satisfied;
use crate::query::SearchQuery;
use crate::rule::Rule;
use crate::session::GraphSession;
use crate::values::{as_scalar, supplied_value, ParameterValues, LIMIT_PARAMETER};

/// Rule-based inference engine over a knowledge-graph session.
pub struct InferenceEngine<S> {
    session: S,
}

impl<S: GraphSession> InferenceEngine<S> {
    /// Creates an engine over the given session.
    #[must_use]
    pub fn new(session: S) -> Self {
        Self { session }
    }

    /// Borrows the underlying session.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Consumes the engine, returning the session.
    pub fn into_session(self) -> S {
        self.session
    }

    /// Evaluates a rule's premises against the supplied parameter
    /// values.
    ///
    /// Premises run in declaration order and stop at the first outcome
    /// that denies the rule outright; the remaining outcomes are folded
    /// by the satisfaction combinator.
    pub fn check_premises(
        &self,
        rule: &Rule,
        values: &ParameterValues,
        debug_mode: bool,
    ) -> InferenceResult<bool> {
        let mut outcomes = Vec::with_capacity(rule.premises.len());
        for premise in &rule.premises {
            let outcome = check_premise(&self.session, premise, values, debug_mode)?;
            debug!(premise = %premise.label(), ?outcome, "premise evaluated");
            let terminal = outcome.is_terminal();
            outcomes.push(outcome);
            if terminal {
                break;
            }
        }
        Ok(premises_satisfied(&outcomes, values))
    }

    /// Executes a search query or pipe directly, without premise
    /// gating.
    pub fn execute(
        &self,
        search: &SearchQuery,
        values: &ParameterValues,
        limit: Option<usize>,
        debug_mode: bool,
    ) -> InferenceResult<Vec<Value>> {
        execute_search(&self.session, search, values, limit, debug_mode)
    }

    /// Applies a rule: checks its premises, then runs its search query.
    ///
    /// A rule whose premises are not satisfied returns an empty result
    /// set with a warning. Callers that do not want partial results must
    /// check for emptiness themselves.
    pub fn apply_rule(
        &self,
        rule: &Rule,
        values: &ParameterValues,
        debug_mode: bool,
    ) -> InferenceResult<Vec<Value>> {
        if !self.check_premises(rule, values, debug_mode)? {
            warn!(rule = %rule.name, "rule premises not satisfied, returning empty result");
            return Ok(Vec::new());
        }

        let limit = resolve_limit(values)?;
        self.execute(&rule.search_query, values, limit, debug_mode)
    }
}

/// Reads the reserved limit parameter, when supplied.
fn resolve_limit(values: &ParameterValues) -> InferenceResult<Option<usize>> {
    let Some(raw) = supplied_value(values, LIMIT_PARAMETER) else {
        return Ok(None);
    };
    let literal = as_scalar(raw).unwrap_or_default();
    literal
        .parse::<usize>()
        .map(Some)
        .map_err(|_| ExecutionError::InvalidLimit { value: literal }.into())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_resolve_limit() {
        let mut values = ParameterValues::new();
        assert_eq!(resolve_limit(&values).unwrap(), None);

        values.insert(LIMIT_PARAMETER.to_string(), json!("25"));
        assert_eq!(resolve_limit(&values).unwrap(), Some(25));

        values.insert(LIMIT_PARAMETER.to_string(), json!(5));
        assert_eq!(resolve_limit(&values).unwrap(), Some(5));

        values.insert(LIMIT_PARAMETER.to_string(), json!("lots"));
        assert!(resolve_limit(&values).is_err());
    }
}
