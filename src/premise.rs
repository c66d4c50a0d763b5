//! Premise outcomes and the satisfaction combinator.
//!
//! Each premise of a rule evaluates to one outcome; the combinator folds
//! the outcomes of all premises into a single allow/deny decision. The
//! default is open-world: absence of disqualifying evidence does not
//! block a rule, but a caller who supplied real input without reaching
//! the premises is conservatively denied.

use crate::values::{any_non_empty, ParameterValues};

/// Outcome of evaluating one premise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PremiseExecution {
    /// The premise ran and holds.
    Success,
    /// The premise ran and does not hold.
    Fail,
    /// A parameter the premise requires was never supplied.
    ///
    /// Distinguished from [`Fail`](Self::Fail): the premise never ran,
    /// so nothing disqualifying was observed.
    MissingParameter,
    /// The premise definition is unusable independent of the input.
    Error,
}

impl PremiseExecution {
    /// Returns true for outcomes that deny the rule outright and stop
    /// further premise evaluation.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Fail | Self::Error)
    }
}

/// Combines per-premise outcomes into one allow/deny decision.
///
/// Truth table:
/// - no premises: satisfied
/// - any `Fail` or `Error`: not satisfied
/// - all `Success`: satisfied
/// - mix of `Success` and `MissingParameter`: satisfied
/// - all `MissingParameter`: satisfied unless the caller supplied at
///   least one non-empty parameter value, in which case the caller
///   clearly intended to drive the premises and is denied
#[must_use]
pub fn premises_satisfied(outcomes: &[PremiseExecution], values: &ParameterValues) -> bool {
    if outcomes.is_empty() {
        return true;
    }
    if outcomes.iter().any(|o| o.is_terminal()) {
        return false;
    }
    if outcomes
        .iter()
        .all(|o| *o == PremiseExecution::MissingParameter)
    {
        return !any_non_empty(values);
    }
    // Only Success and MissingParameter remain.
    true
}
