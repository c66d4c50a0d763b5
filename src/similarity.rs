//! Vector similarity search.
//!
//! Nearest-neighbor search over entity embeddings stored in indexed
//! vector views. The single-model path resolves the target entity's
//! embedding, looks up the scoring formula declared by the embedding
//! model, and runs a k-nearest-neighbor query scored server-side by the
//! backing store. When a query carries several model configurations,
//! each model's scores are min-max normalized (against boosted
//! statistics when boosting applies) and combined with equal weights; a
//! neighbor missing from any model combines to zero so partial-coverage
//! neighbors stay visible but rank last.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};
use tracing::debug;

use crate::adapter::substitute;
use crate::error::{
    DefinitionError, ExecutionError, InferenceResult, ParameterError,
};
use crate::format::format_parameters;
use crate::query::{
    EmbeddingModelRef, QueryFamily, SimilaritySearchConfiguration, SimilaritySearchQuery,
};
use crate::session::{GraphSession, IndexViewGuard};
use crate::values::{as_list, as_scalar, supplied_value, ParameterValues, IGNORE_MODELS_PARAMETER};

/// One scored neighbor.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Neighbor entity id.
    pub id: String,
    /// Similarity score; higher is closer.
    pub score: f64,
}

/// Closed set of similarity-scoring formulas an embedding model can
/// declare. Each is a distance-to-similarity transform evaluated
/// server-side by the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formula {
    /// Cosine similarity, shifted to stay positive.
    Cosine,
    /// Inverse euclidean distance.
    Euclidean,
    /// Inverse hyperbolic (Poincare ball) distance.
    Poincare,
}

impl Formula {
    /// Parses the formula name declared on an embedding-model resource.
    pub fn parse(model: &str, value: &str) -> Result<Self, DefinitionError> {
        match value {
            "cosine" => Ok(Self::Cosine),
            "euclidean" => Ok(Self::Euclidean),
            "poincare" => Ok(Self::Poincare),
            other => Err(DefinitionError::UnknownSimilarityFormula {
                model: model.to_string(),
                value: other.to_string(),
            }),
        }
    }

    /// Script source handed to the backing store for scoring.
    #[must_use]
    pub const fn script_source(self) -> &'static str {
        match self {
            Self::Cosine => "cosineSimilarity(params.query_vector, 'embedding') + 1.0",
            Self::Euclidean => "1 / (1 + l2norm(params.query_vector, 'embedding'))",
            Self::Poincare => "1 / (1 + poincareDistance(params.query_vector, 'embedding'))",
        }
    }
}

/// Precomputed score bounds of one similarity view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreStatistics {
    /// Smallest stored score.
    pub min: f64,
    /// Largest stored score.
    pub max: f64,
}

impl ScoreStatistics {
    /// Min-max normalizes a raw score into `[0, 1]`.
    #[must_use]
    pub fn normalize(self, score: f64) -> f64 {
        let range = self.max - self.min;
        if range <= f64::EPSILON {
            return 0.0;
        }
        ((score - self.min) / range).clamp(0.0, 1.0)
    }
}

/// Executes a similarity search query.
pub fn execute_similarity(
    session: &dyn GraphSession,
    query: &SimilaritySearchQuery,
    values: &ParameterValues,
    limit: Option<usize>,
    debug_mode: bool,
) -> InferenceResult<Vec<Value>> {
    let formatted =
        format_parameters(&query.parameters, values, QueryFamily::Similarity, session)?;

    let target = target_entity(session, query, values)?;
    let k = resolve_k(&query.k, values)?;
    let cap = limit.map_or(k, |l| k.min(l));

    let filter = match query.result_filter.as_deref() {
        Some(fragment) => {
            let substituted = substitute(fragment, &formatted, &query.parameters)?;
            Some(serde_json::from_str(&substituted).map_err(|e| {
                DefinitionError::MalformedDocument {
                    reason: format!("substituted result filter is not JSON: {e}"),
                }
            })?)
        }
        None => None,
    };

    let configurations = active_configurations(query, values)?;

    let neighbors = if configurations.len() == 1 {
        let mut neighbors = model_neighbors(
            session,
            configurations[0],
            &target,
            Some(k),
            filter.as_ref(),
            debug_mode,
        )?;
        neighbors.truncate(cap);
        neighbors
    } else {
        combined_neighbors(
            session,
            &configurations,
            &target,
            cap,
            filter.as_ref(),
            debug_mode,
        )?
    };

    Ok(neighbors
        .into_iter()
        .map(|n| json!({"id": n.id, "score": n.score}))
        .collect())
}

/// Resolves and expands the target entity id.
fn target_entity(
    session: &dyn GraphSession,
    query: &SimilaritySearchQuery,
    values: &ParameterValues,
) -> InferenceResult<String> {
    let name = &query.search_target_parameter;
    let spec = query
        .parameters
        .iter()
        .find(|s| &s.name == name)
        .ok_or_else(|| DefinitionError::MissingField {
            object: "similarity search query".to_string(),
            field: format!("hasParameter entry '{name}'"),
        })?;

    let resolved = spec
        .resolve(values)?
        .and_then(|v| as_scalar(&v))
        .ok_or_else(|| ParameterError::MissingMandatory { name: name.clone() })?;
    Ok(session.expand_short_uri(&resolved)?)
}

/// Resolves `k`: a number, or a `$name` template looked up in the
/// parameter values.
fn resolve_k(k: &Value, values: &ParameterValues) -> InferenceResult<usize> {
    let invalid = || ExecutionError::InvalidLimit {
        value: k.to_string(),
    };

    match k {
        Value::Number(n) => n
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| invalid().into()),
        Value::String(text) => {
            let literal = match text.strip_prefix('$') {
                Some(name) => supplied_value(values, name)
                    .and_then(as_scalar)
                    .ok_or_else(|| ParameterError::MissingMandatory {
                        name: name.to_string(),
                    })?,
                None => text.clone(),
            };
            literal.parse::<usize>().map_err(|_| invalid().into())
        }
        _ => Err(invalid().into()),
    }
}

/// Configurations left after applying the ignore-models parameter.
fn active_configurations<'a>(
    query: &'a SimilaritySearchQuery,
    values: &ParameterValues,
) -> InferenceResult<Vec<&'a SimilaritySearchConfiguration>> {
    let ignored: Vec<String> = supplied_value(values, IGNORE_MODELS_PARAMETER)
        .map(as_list)
        .unwrap_or_default();

    let configurations: Vec<&SimilaritySearchConfiguration> = query
        .configurations
        .iter()
        .filter(|c| !ignored.iter().any(|m| m == &c.embedding_model.id))
        .collect();

    if configurations.is_empty() {
        return Err(ExecutionError::AllModelsExcluded.into());
    }
    Ok(configurations)
}

/// Runs the single-model nearest-neighbor query.
///
/// `size` of `None` runs unbounded, which the combination path uses to
/// see every scored neighbor before normalizing.
fn model_neighbors(
    session: &dyn GraphSession,
    configuration: &SimilaritySearchConfiguration,
    target: &str,
    size: Option<usize>,
    filter: Option<&Value>,
    debug_mode: bool,
) -> InferenceResult<Vec<Neighbor>> {
    let formula = model_formula(session, &configuration.embedding_model)?;

    let _guard = IndexViewGuard::switch(session, &configuration.similarity_view.id)?;
    let embedding = target_embedding(session, target, debug_mode)?;
    let body = neighbor_query(target, &embedding, formula, size, filter);
    debug!(
        model = %configuration.embedding_model.id,
        view = %configuration.similarity_view.id,
        "running nearest-neighbor query"
    );

    let records = session.run_index_query(&body, size, debug_mode)?;
    records.iter().map(neighbor_from_record).collect()
}

/// Looks up the scoring formula on the embedding-model resource.
fn model_formula(
    session: &dyn GraphSession,
    model: &EmbeddingModelRef,
) -> InferenceResult<Formula> {
    let resource = session.retrieve_by_id(&model.id, model.revision)?;
    let declared = resource
        .get("similarity")
        .and_then(Value::as_str)
        .ok_or_else(|| DefinitionError::MissingField {
            object: format!("embedding model '{}'", model.id),
            field: "similarity".to_string(),
        })?;
    Ok(Formula::parse(&model.id, declared)?)
}

/// Fetches the target entity's stored embedding from the active
/// similarity view.
fn target_embedding(
    session: &dyn GraphSession,
    target: &str,
    debug_mode: bool,
) -> InferenceResult<Vec<f64>> {
    let body = json!({"size": 1, "query": {"term": {"@id": target}}});
    let records = session.run_index_query(&body, Some(1), debug_mode)?;

    let embedding = records
        .first()
        .and_then(|record| record.get("embedding"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_f64).collect::<Vec<f64>>());

    match embedding {
        Some(vector) if !vector.is_empty() => Ok(vector),
        _ => Err(ExecutionError::MissingEmbedding {
            id: target.to_string(),
        }
        .into()),
    }
}

/// Builds the k-nearest-neighbor query: excludes the target itself,
/// requires an embedding field, and merges the caller's filter fragment.
fn neighbor_query(
    target: &str,
    embedding: &[f64],
    formula: Formula,
    size: Option<usize>,
    filter: Option<&Value>,
) -> Value {
    let mut must = vec![json!({"exists": {"field": "embedding"}})];
    if let Some(fragment) = filter {
        must.push(fragment.clone());
    }

    let mut body = json!({
        "query": {
            "script_score": {
                "query": {
                    "bool": {
                        "must_not": {"term": {"@id": target}},
                        "must": must
                    }
                },
                "script": {
                    "source": formula.script_source(),
                    "params": {"query_vector": embedding}
                }
            }
        }
    });
    if let Some(size) = size {
        body["size"] = json!(size);
    }
    body
}

fn neighbor_from_record(record: &Value) -> InferenceResult<Neighbor> {
    let id = record
        .get("@id")
        .and_then(Value::as_str)
        .ok_or_else(|| ExecutionError::MalformedRecord {
            reason: "similarity result without '@id'".to_string(),
        })?;
    let score = record
        .get("_score")
        .and_then(Value::as_f64)
        .ok_or_else(|| ExecutionError::MalformedRecord {
            reason: format!("similarity result '{id}' without '_score'"),
        })?;
    Ok(Neighbor {
        id: id.to_string(),
        score,
    })
}

/// Fetches the min/max score statistics matching the configuration's
/// boosted flag.
fn model_statistics(
    session: &dyn GraphSession,
    configuration: &SimilaritySearchConfiguration,
    debug_mode: bool,
) -> InferenceResult<ScoreStatistics> {
    let model = &configuration.embedding_model.id;
    let view = configuration.statistics_view.as_ref().ok_or_else(|| {
        DefinitionError::MissingSimilarityView {
            model: model.clone(),
            view: "statistics".to_string(),
        }
    })?;

    let _guard = IndexViewGuard::switch(session, &view.id)?;
    let body = json!({"size": 1, "query": {"term": {"boosted": configuration.boosted}}});
    let records = session.run_index_query(&body, Some(1), debug_mode)?;

    let statistics = records.first().and_then(|record| {
        let min = record.get("min").and_then(Value::as_f64)?;
        let max = record.get("max").and_then(Value::as_f64)?;
        Some(ScoreStatistics { min, max })
    });

    statistics.ok_or_else(|| {
        ExecutionError::MissingStatistics {
            kind: if configuration.boosted {
                "boosted".to_string()
            } else {
                "unboosted".to_string()
            },
            view: view.id.clone(),
        }
        .into()
    })
}

/// Fetches the target entity's boosting multiplier.
fn boosting_factor(
    session: &dyn GraphSession,
    configuration: &SimilaritySearchConfiguration,
    target: &str,
    debug_mode: bool,
) -> InferenceResult<f64> {
    let model = &configuration.embedding_model.id;
    let view = configuration.boosting_view.as_ref().ok_or_else(|| {
        DefinitionError::MissingSimilarityView {
            model: model.clone(),
            view: "boosting".to_string(),
        }
    })?;

    let _guard = IndexViewGuard::switch(session, &view.id)?;
    let body = json!({"size": 1, "query": {"term": {"@id": target}}});
    let records = session.run_index_query(&body, Some(1), debug_mode)?;

    records
        .first()
        .and_then(|record| record.get("value"))
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            ExecutionError::MissingBoostingFactor {
                id: target.to_string(),
                view: view.id.clone(),
            }
            .into()
        })
}

/// Runs every model unbounded, normalizes each model's scores, and
/// combines them.
fn combined_neighbors(
    session: &dyn GraphSession,
    configurations: &[&SimilaritySearchConfiguration],
    target: &str,
    k: usize,
    filter: Option<&Value>,
    debug_mode: bool,
) -> InferenceResult<Vec<Neighbor>> {
    let mut per_model: Vec<BTreeMap<String, f64>> = Vec::with_capacity(configurations.len());

    for configuration in configurations {
        let neighbors =
            model_neighbors(session, configuration, target, None, filter, debug_mode)?;
        let statistics = model_statistics(session, configuration, debug_mode)?;
        let factor = if configuration.boosted {
            boosting_factor(session, configuration, target, debug_mode)?
        } else {
            1.0
        };

        let normalized = neighbors
            .into_iter()
            .map(|n| (n.id, statistics.normalize(n.score * factor)))
            .collect();
        per_model.push(normalized);
    }

    Ok(combine_models(&per_model, k))
}

/// Equal-weight combination across models.
///
/// A neighbor scored by every model combines to the weighted sum of its
/// normalized scores; a neighbor missing from any model combines to
/// zero. Ties order by ascending id so rankings are deterministic.
fn combine_models(per_model: &[BTreeMap<String, f64>], k: usize) -> Vec<Neighbor> {
    let weight = 1.0 / per_model.len() as f64;

    let ids: BTreeSet<&String> = per_model.iter().flat_map(BTreeMap::keys).collect();
    let mut combined: Vec<Neighbor> = ids
        .into_iter()
        .map(|id| {
            let score = if per_model.iter().all(|m| m.contains_key(id)) {
                per_model.iter().map(|m| m[id]).sum::<f64>() * weight
            } else {
                0.0
            };
            Neighbor {
                id: id.clone(),
                score,
            }
        })
        .collect();

    combined.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    combined.truncate(k);
    combined
}
