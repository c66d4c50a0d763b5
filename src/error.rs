//! Error types for ruleforge.
//!
//! All errors are strongly typed using thiserror, grouped by the phase in
//! which they arise: definition errors are detected while parsing rule
//! documents, parameter errors while resolving and formatting values,
//! execution errors while running queries, and session errors are raised
//! by the external knowledge-graph collaborator and propagate unchanged.

use thiserror::Error;

/// Errors detected while constructing rules, queries, or premises from
/// their JSON documents.
///
/// These are always fatal and never retried: the document itself is wrong
/// and re-running the same input cannot succeed.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("{object} is missing mandatory field '{field}'")]
    MissingField {
        /// Human-readable name of the offending object (rule, query, ...).
        object: String,
        /// The absent field.
        field: String,
    },

    #[error("Unsupported query type '{value}'")]
    UnsupportedQueryType {
        value: String,
    },

    #[error("Query '{query}' has no backend configuration")]
    MissingQueryConfiguration {
        query: String,
    },

    #[error("Parameter '{name}' has type '{parameter_type}' which is not valid for a {family} query")]
    IncompatibleParameterType {
        name: String,
        parameter_type: String,
        family: String,
    },

    #[error("Multi predicate-object pairs are only supported in SPARQL queries (parameter '{name}')")]
    MultiPairOutsideSparql {
        name: String,
    },

    #[error("Query body has no line containing the placeholder '${name}'")]
    MultiPairPlaceholderMissing {
        name: String,
    },

    #[error("Malformed predicate-object pair for parameter '{name}': {reason}")]
    MalformedPair {
        name: String,
        reason: String,
    },

    #[error("Premise checks are not supported for {family} premises")]
    UnsupportedPremiseBackend {
        family: String,
    },

    #[error("Embedding model '{model}' declares unknown similarity formula '{value}'")]
    UnknownSimilarityFormula {
        model: String,
        value: String,
    },

    #[error("Similarity configuration for model '{model}' is missing its {view} view")]
    MissingSimilarityView {
        model: String,
        view: String,
    },

    #[error("Malformed document: {reason}")]
    MalformedDocument {
        reason: String,
    },
}

/// Errors raised while resolving or formatting parameter values.
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("Missing mandatory parameter '{name}'")]
    MissingMandatory {
        name: String,
    },

    #[error("Value '{key}' of parameter '{name}' is not one of its allowed choices")]
    InvalidChoice {
        name: String,
        key: String,
    },

    #[error("Parameter '{name}' expects a boolean, got '{value}'")]
    InvalidBoolean {
        name: String,
        value: String,
    },

    #[error("Parameter '{name}' has no usable value")]
    EmptyValue {
        name: String,
    },

    #[error("Placeholder '${name}' was not substituted in the query body")]
    UnresolvedPlaceholder {
        name: String,
    },
}

/// Errors raised while executing a query, a pipe, or a similarity search.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Result path '{path}' for parameter '{parameter}' cannot be resolved in a result record")]
    ResultPathNotFound {
        parameter: String,
        path: String,
    },

    #[error("No stored embedding found for entity '{id}'")]
    MissingEmbedding {
        id: String,
    },

    #[error("No {kind} statistics found in view '{view}'")]
    MissingStatistics {
        kind: String,
        view: String,
    },

    #[error("No boosting factor found for entity '{id}' in view '{view}'")]
    MissingBoostingFactor {
        id: String,
        view: String,
    },

    #[error("Every embedding model of the similarity query was excluded")]
    AllModelsExcluded,

    #[error("Invalid result limit '{value}'")]
    InvalidLimit {
        value: String,
    },

    #[error("Malformed backend record: {reason}")]
    MalformedRecord {
        reason: String,
    },
}

/// Opaque failure raised by the knowledge-graph session collaborator.
///
/// The core never catches or retries these; they surface to the caller
/// unchanged. "Zero results" is a legitimate value and never reported
/// through this type.
#[derive(Debug, Error)]
#[error("Session error: {message}")]
pub struct SessionError {
    message: String,
}

impl SessionError {
    /// Creates a session error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Top-level error type for ruleforge.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl InferenceError {
    /// Returns true if this is a definition error.
    #[must_use]
    pub const fn is_definition(&self) -> bool {
        matches!(self, Self::Definition(_))
    }

    /// Returns true if this is a parameter error.
    #[must_use]
    pub const fn is_parameter(&self) -> bool {
        matches!(self, Self::Parameter(_))
    }

    /// Returns true if this is a missing-mandatory-parameter error.
    ///
    /// Premise evaluation uses this to fold the error into a
    /// `MissingParameter` outcome instead of aborting the whole rule.
    #[must_use]
    pub const fn is_missing_parameter(&self) -> bool {
        matches!(
            self,
            Self::Parameter(ParameterError::MissingMandatory { .. })
        )
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this error came from the session collaborator.
    #[must_use]
    pub const fn is_session(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}

/// Result type alias for ruleforge operations.
pub type InferenceResult<T> = Result<T, InferenceError>;
