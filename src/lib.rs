//! # RuleForge - Rule-based inference over knowledge graphs
//!
//! RuleForge evaluates declarative rules against a knowledge graph. A
//! rule is a JSON document bundling guard premises, typed parameter
//! specifications, and a search query (or a pipe of queries) spanning
//! heterogeneous backends: SPARQL endpoints, Elasticsearch indices,
//! capability-level graph search, and vector similarity search.
//!
//! ## Core Concepts
//!
//! - **Rule**: the unit of inference, gating a search query behind premises
//! - **Premise**: a guard query whose outcome feeds the satisfaction combinator
//! - **Query pipe**: an ordered chain where each stage's results seed the next stage's parameters
//! - **Parameter specification**: the typed, named declaration of an input, with exact per-backend formatting rules
//! - **Similarity search**: nearest-neighbor lookup over stored embeddings, optionally combining several models with score normalization and boosting
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ruleforge::{InferenceEngine, Rule};
//!
//! let rule = Rule::from_json_str(&rule_document)?;
//! let engine = InferenceEngine::new(session);
//!
//! let mut values = ruleforge::ParameterValues::new();
//! values.insert("BrainRegion".to_string(), "mba:549".into());
//!
//! let results = engine.apply_rule(&rule, &values, false)?;
//! ```
//!
//! All backend I/O goes through the [`GraphSession`] trait, provided by
//! the caller; the engine itself is synchronous and stateless across
//! invocations.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod engine;
pub mod error;
pub mod executor;
pub mod format;
pub mod multipair;
pub mod parameter;
pub mod premise;
pub mod query;
pub mod rule;
pub mod session;
pub mod similarity;
pub mod values;

// Re-export primary types at crate root for convenience
pub use engine::InferenceEngine;
pub use error::{
    DefinitionError, ExecutionError, InferenceError, InferenceResult, ParameterError, SessionError,
};
pub use executor::{execute_query, execute_search};
pub use format::{format_parameter, format_parameters, FormattedParameters};
pub use multipair::{expand_pairs, PairExpansion, PredicateObjectPair};
pub use parameter::{ParameterSpecification, ParameterType};
pub use premise::{premises_satisfied, PremiseExecution};
pub use query::{
    ElasticSearchQuery, EmbeddingModelRef, GenericSearchQuery, Query, QueryConfiguration,
    QueryFamily, ResultParameterMapping, SearchQuery, SimilaritySearchConfiguration,
    SimilaritySearchQuery, SparqlQuery, ViewReference,
};
pub use rule::Rule;
pub use session::{GraphSession, IndexViewGuard, SparqlViewGuard, UriExpander};
pub use similarity::{execute_similarity, Formula, Neighbor, ScoreStatistics};
pub use values::{ParameterValues, IGNORE_MODELS_PARAMETER, LIMIT_PARAMETER};
