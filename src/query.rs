//! Typed query and premise model.
//!
//! Rule documents describe queries polymorphically through a `type`
//! discriminant. This module owns the closed set of query variants, their
//! backend configurations, the recursive query-pipe structure, and the
//! factory that builds all of them from JSON documents, failing fast on
//! malformed input.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DefinitionError;
use crate::parameter::{ParameterSpecification, ParameterType};

/// Backend family of a query or premise.
///
/// Formatting rules and premise semantics key off the family, never off
/// whether the document is used as a query or as a premise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryFamily {
    /// SPARQL endpoint queries and premises.
    Sparql,
    /// Elasticsearch index queries and premises.
    Elastic,
    /// Capability-level graph search.
    GenericSearch,
    /// Vector nearest-neighbor search.
    Similarity,
}

impl std::fmt::Display for QueryFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Sparql => "SPARQL",
            Self::Elastic => "Elasticsearch",
            Self::GenericSearch => "generic search",
            Self::Similarity => "similarity search",
        };
        f.write_str(name)
    }
}

/// Reference to an indexed view living in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewReference {
    /// View identifier.
    pub id: String,
}

/// Backend-connection descriptor shared by all query kinds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfiguration {
    /// Organization owning the target bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,

    /// Project owning the target bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// SPARQL endpoint view to activate while executing.
    #[serde(default, rename = "sparqlView", skip_serializing_if = "Option::is_none")]
    pub sparql_view: Option<ViewReference>,

    /// Elasticsearch index view to activate while executing.
    #[serde(
        default,
        rename = "elasticSearchView",
        skip_serializing_if = "Option::is_none"
    )]
    pub elastic_search_view: Option<ViewReference>,
}

/// Reference to an embedding-model resource in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingModelRef {
    /// Model resource id.
    pub id: String,

    /// Organization holding the model, when not the session default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,

    /// Project holding the model, when not the session default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Pinned model revision; latest when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
}

/// Backend configuration of one embedding model in a similarity search.
///
/// A similarity query carries one of these per model being combined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilaritySearchConfiguration {
    /// Organization owning the views.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,

    /// Project owning the views.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// The embedding model this configuration scores with.
    #[serde(rename = "embeddingModel")]
    pub embedding_model: EmbeddingModelRef,

    /// Vector index holding the embeddings.
    #[serde(rename = "similarityView")]
    pub similarity_view: ViewReference,

    /// Index holding per-entity boosting factors.
    #[serde(default, rename = "boostingView", skip_serializing_if = "Option::is_none")]
    pub boosting_view: Option<ViewReference>,

    /// Index holding precomputed min/max score statistics.
    #[serde(
        default,
        rename = "statisticsView",
        skip_serializing_if = "Option::is_none"
    )]
    pub statistics_view: Option<ViewReference>,

    /// Whether boosting factors apply to this model's scores.
    #[serde(default)]
    pub boosted: bool,
}

/// Declares how one field of a stage's results feeds the next stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultParameterMapping {
    /// Name the projected values are bound under.
    #[serde(rename = "parameterName")]
    pub parameter_name: String,

    /// Dotted path into each result record.
    pub path: String,
}

/// A SPARQL query or premise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparqlQuery {
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Query body template with `$name` placeholders.
    #[serde(rename = "hasBody")]
    pub body: String,

    /// Declared parameters.
    #[serde(default, rename = "hasParameter", deserialize_with = "one_or_many")]
    pub parameters: Vec<ParameterSpecification>,

    /// Backend configuration(s).
    #[serde(rename = "queryConfiguration", deserialize_with = "one_or_many")]
    pub configurations: Vec<QueryConfiguration>,

    /// Result-to-parameter mappings used when piping.
    #[serde(
        default,
        rename = "resultParameterMapping",
        deserialize_with = "one_or_many"
    )]
    pub result_parameter_mapping: Vec<ResultParameterMapping>,
}

/// An Elasticsearch query or premise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticSearchQuery {
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON query body template with `$name` placeholders.
    #[serde(rename = "hasBody")]
    pub body: String,

    /// Declared parameters.
    #[serde(default, rename = "hasParameter", deserialize_with = "one_or_many")]
    pub parameters: Vec<ParameterSpecification>,

    /// Backend configuration(s).
    #[serde(rename = "queryConfiguration", deserialize_with = "one_or_many")]
    pub configurations: Vec<QueryConfiguration>,

    /// Result-to-parameter mappings used when piping.
    #[serde(
        default,
        rename = "resultParameterMapping",
        deserialize_with = "one_or_many"
    )]
    pub result_parameter_mapping: Vec<ResultParameterMapping>,
}

/// A capability-level graph-search query or premise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericSearchQuery {
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Structured search pattern with `$name` placeholders in its string
    /// values.
    pub pattern: Value,

    /// Parameter naming the entity a premise check compares results
    /// against.
    #[serde(default, rename = "targetParameter", skip_serializing_if = "Option::is_none")]
    pub target_parameter: Option<String>,

    /// Dotted path projecting the id out of each result record during a
    /// premise check.
    #[serde(default, rename = "targetPath", skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,

    /// Declared parameters.
    #[serde(default, rename = "hasParameter", deserialize_with = "one_or_many")]
    pub parameters: Vec<ParameterSpecification>,

    /// Backend configuration(s).
    #[serde(rename = "queryConfiguration", deserialize_with = "one_or_many")]
    pub configurations: Vec<QueryConfiguration>,

    /// Result-to-parameter mappings used when piping.
    #[serde(
        default,
        rename = "resultParameterMapping",
        deserialize_with = "one_or_many"
    )]
    pub result_parameter_mapping: Vec<ResultParameterMapping>,
}

/// A vector nearest-neighbor search query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilaritySearchQuery {
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Name of the parameter holding the target entity id.
    #[serde(rename = "searchTargetParameter")]
    pub search_target_parameter: String,

    /// Optional filter fragment merged into the neighbor query after
    /// parameter substitution.
    #[serde(default, rename = "resultFilter", skip_serializing_if = "Option::is_none")]
    pub result_filter: Option<String>,

    /// Neighbor count: a number, or a `$name` template resolved through
    /// the parameter values.
    pub k: Value,

    /// Declared parameters.
    #[serde(default, rename = "hasParameter", deserialize_with = "one_or_many")]
    pub parameters: Vec<ParameterSpecification>,

    /// One configuration per embedding model being combined.
    #[serde(rename = "queryConfiguration", deserialize_with = "one_or_many")]
    pub configurations: Vec<SimilaritySearchConfiguration>,

    /// Result-to-parameter mappings used when piping.
    #[serde(
        default,
        rename = "resultParameterMapping",
        deserialize_with = "one_or_many"
    )]
    pub result_parameter_mapping: Vec<ResultParameterMapping>,
}

/// A query or premise, polymorphic over its backend family.
#[derive(Debug, Clone)]
pub enum Query {
    /// SPARQL endpoint query.
    Sparql(SparqlQuery),
    /// Elasticsearch index query.
    Elastic(ElasticSearchQuery),
    /// Capability-level graph search.
    GenericSearch(GenericSearchQuery),
    /// Vector nearest-neighbor search.
    Similarity(SimilaritySearchQuery),
}

impl Query {
    /// Builds a query from its JSON document.
    ///
    /// The factory inspects the document's `type` discriminant; unknown
    /// discriminants and documents without a backend configuration are
    /// definition errors.
    pub fn from_document(document: &Value) -> Result<Self, DefinitionError> {
        let discriminant = discriminant(document)?;
        let query = match discriminant {
            "SparqlQuery" | "SparqlPremise" => Self::Sparql(decode(document)?),
            "ElasticSearchQuery" | "ElasticSearchPremise" => Self::Elastic(decode(document)?),
            "GenericSearchQuery" | "GenericSearchPremise" => {
                Self::GenericSearch(decode(document)?)
            }
            "SimilaritySearchQuery" | "SimilaritySearchPremise" => {
                Self::Similarity(decode(document)?)
            }
            other => {
                return Err(DefinitionError::UnsupportedQueryType {
                    value: other.to_string(),
                })
            }
        };
        query.validate()?;
        Ok(query)
    }

    /// Backend family of this query.
    #[must_use]
    pub const fn family(&self) -> QueryFamily {
        match self {
            Self::Sparql(_) => QueryFamily::Sparql,
            Self::Elastic(_) => QueryFamily::Elastic,
            Self::GenericSearch(_) => QueryFamily::GenericSearch,
            Self::Similarity(_) => QueryFamily::Similarity,
        }
    }

    /// Declared parameter specifications.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterSpecification] {
        match self {
            Self::Sparql(q) => &q.parameters,
            Self::Elastic(q) => &q.parameters,
            Self::GenericSearch(q) => &q.parameters,
            Self::Similarity(q) => &q.parameters,
        }
    }

    /// Result-to-parameter mappings declared for piping.
    #[must_use]
    pub fn result_parameter_mapping(&self) -> &[ResultParameterMapping] {
        match self {
            Self::Sparql(q) => &q.result_parameter_mapping,
            Self::Elastic(q) => &q.result_parameter_mapping,
            Self::GenericSearch(q) => &q.result_parameter_mapping,
            Self::Similarity(q) => &q.result_parameter_mapping,
        }
    }

    /// Human-readable description, falling back to the family name.
    #[must_use]
    pub fn label(&self) -> String {
        let description = match self {
            Self::Sparql(q) => q.description.as_deref(),
            Self::Elastic(q) => q.description.as_deref(),
            Self::GenericSearch(q) => q.description.as_deref(),
            Self::Similarity(q) => q.description.as_deref(),
        };
        description
            .map_or_else(|| format!("{} query", self.family()), ToString::to_string)
    }

    /// First backend configuration of a non-similarity query.
    ///
    /// Construction guarantees at least one is present.
    #[must_use]
    pub fn configuration(&self) -> Option<&QueryConfiguration> {
        match self {
            Self::Sparql(q) => q.configurations.first(),
            Self::Elastic(q) => q.configurations.first(),
            Self::GenericSearch(q) => q.configurations.first(),
            Self::Similarity(_) => None,
        }
    }

    /// Construction-time invariants: a backend configuration must be
    /// present and every declared parameter type must be valid for this
    /// query's backend family.
    fn validate(&self) -> Result<(), DefinitionError> {
        let configured = match self {
            Self::Sparql(q) => !q.configurations.is_empty(),
            Self::Elastic(q) => !q.configurations.is_empty(),
            Self::GenericSearch(q) => !q.configurations.is_empty(),
            Self::Similarity(q) => !q.configurations.is_empty(),
        };
        if !configured {
            return Err(DefinitionError::MissingQueryConfiguration {
                query: self.label(),
            });
        }

        let family = self.family();
        for spec in self.parameters() {
            if spec.parameter_type == ParameterType::MultiPredicateObjectPair
                && family != QueryFamily::Sparql
            {
                return Err(DefinitionError::MultiPairOutsideSparql {
                    name: spec.name.clone(),
                });
            }
            if spec.parameter_type.is_sparql_only() && family != QueryFamily::Sparql {
                return Err(DefinitionError::IncompatibleParameterType {
                    name: spec.name.clone(),
                    parameter_type: spec.parameter_type.to_string(),
                    family: family.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A single query, or an ordered chain of queries where each stage's
/// results seed the next stage's parameters.
#[derive(Debug, Clone)]
pub enum SearchQuery {
    /// Leaf query.
    Query(Box<Query>),
    /// Ordered chain, evaluated left to right.
    Pipe {
        /// First stage(s).
        head: Box<SearchQuery>,
        /// Remaining stage(s).
        rest: Box<SearchQuery>,
    },
}

impl SearchQuery {
    /// Builds a search query (possibly a pipe) from its JSON document.
    pub fn from_document(document: &Value) -> Result<Self, DefinitionError> {
        let search = Self::from_document_inner(document)?;
        search.validate_mappings(true)?;
        Ok(search)
    }

    fn from_document_inner(document: &Value) -> Result<Self, DefinitionError> {
        if discriminant(document)? == "QueryPipe" {
            let head = document
                .get("head")
                .ok_or_else(|| missing("query pipe", "head"))?;
            let rest = document
                .get("rest")
                .ok_or_else(|| missing("query pipe", "rest"))?;
            return Ok(Self::Pipe {
                head: Box::new(Self::from_document_inner(head)?),
                rest: Box::new(Self::from_document_inner(rest)?),
            });
        }
        Ok(Self::Query(Box::new(Query::from_document(document)?)))
    }

    /// Every non-terminal stage of a pipe must declare result-parameter
    /// mappings; without them the next stage would receive nothing.
    fn validate_mappings(&self, terminal: bool) -> Result<(), DefinitionError> {
        match self {
            Self::Query(query) => {
                if !terminal && query.result_parameter_mapping().is_empty() {
                    return Err(missing(&query.label(), "resultParameterMapping"));
                }
                Ok(())
            }
            Self::Pipe { head, rest } => {
                head.validate_mappings(false)?;
                rest.validate_mappings(terminal)
            }
        }
    }

    /// Parameter specifications of every stage, in pipe order.
    ///
    /// Duplicate names keep the first occurrence; later stages commonly
    /// re-declare parameters that earlier stages bind through result
    /// mappings.
    #[must_use]
    pub fn parameters(&self) -> Vec<&ParameterSpecification> {
        let mut specs: Vec<&ParameterSpecification> = Vec::new();
        self.collect_parameters(&mut specs);
        specs
    }

    fn collect_parameters<'a>(&'a self, into: &mut Vec<&'a ParameterSpecification>) {
        match self {
            Self::Query(query) => {
                for spec in query.parameters() {
                    if !into.iter().any(|s| s.name == spec.name) {
                        into.push(spec);
                    }
                }
            }
            Self::Pipe { head, rest } => {
                head.collect_parameters(into);
                rest.collect_parameters(into);
            }
        }
    }
}

fn discriminant(document: &Value) -> Result<&str, DefinitionError> {
    document
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("query document", "type"))
}

fn missing(object: &str, field: &str) -> DefinitionError {
    DefinitionError::MissingField {
        object: object.to_string(),
        field: field.to_string(),
    }
}

fn decode<T: DeserializeOwned>(document: &Value) -> Result<T, DefinitionError> {
    serde_json::from_value(document.clone()).map_err(|e| DefinitionError::MalformedDocument {
        reason: e.to_string(),
    })
}

/// Accepts either a single document or an array of documents.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}
