mod common;

use serde_json::json;

use common::MockSession;
use ruleforge::{GraphSession, InferenceEngine, ParameterValues, Rule, IGNORE_MODELS_PARAMETER};

fn similarity_rule(k: serde_json::Value) -> Rule {
    Rule::from_document(&json!({
        "id": "rules/similar-morphologies",
        "name": "Find similar morphologies",
        "targetResourceType": "NeuronMorphology",
        "searchQuery": {
            "type": "SimilaritySearchQuery",
            "searchTargetParameter": "Target",
            "resultFilter": "{\"term\": {\"type\": $ResourceType}}",
            "k": k,
            "hasParameter": [
                {"name": "Target", "type": "uri"},
                {"name": "ResourceType", "type": "uri", "optional": true,
                 "default": "nsg:NeuronMorphology"}
            ],
            "queryConfiguration": [
                {
                    "embeddingModel": {"id": "models/tmd", "revision": 2},
                    "similarityView": {"id": "views/sim/tmd"},
                    "statisticsView": {"id": "views/stats/tmd"}
                },
                {
                    "embeddingModel": {"id": "models/coordinates"},
                    "similarityView": {"id": "views/sim/coordinates"},
                    "statisticsView": {"id": "views/stats/coordinates"},
                    "boostingView": {"id": "views/boost/coordinates"},
                    "boosted": true
                }
            ]
        }
    }))
    .unwrap()
}

fn seeded_session() -> MockSession {
    let session = MockSession::new("http://example.org/");
    session.insert_resource("models/tmd", json!({"similarity": "cosine"}));
    session.insert_resource("models/coordinates", json!({"similarity": "euclidean"}));

    // TMD model: embedding lookup, then neighbors.
    session.push_index_result(
        "views/sim/tmd",
        vec![json!({"@id": "http://example.org/m:t", "embedding": [0.5, 0.5]})],
    );
    session.push_index_result(
        "views/sim/tmd",
        vec![
            json!({"@id": "morph/A", "_score": 1.5}),
            json!({"@id": "morph/B", "_score": 1.0}),
        ],
    );
    session.push_index_result("views/stats/tmd", vec![json!({"min": 0.5, "max": 2.5})]);

    // Coordinates model: boosted by 2.0, covers only morph/A.
    session.push_index_result(
        "views/sim/coordinates",
        vec![json!({"@id": "http://example.org/m:t", "embedding": [0.1]})],
    );
    session.push_index_result(
        "views/sim/coordinates",
        vec![json!({"@id": "morph/A", "_score": 0.2})],
    );
    session.push_index_result(
        "views/stats/coordinates",
        vec![json!({"min": 0.0, "max": 0.8})],
    );
    session.push_index_result("views/boost/coordinates", vec![json!({"value": 2.0})]);
    session
}

fn target_values() -> ParameterValues {
    let mut values = ParameterValues::new();
    values.insert("Target".to_string(), json!("m:t"));
    values
}

#[test]
fn multi_model_scores_are_normalized_boosted_and_combined() {
    let engine = InferenceEngine::new(seeded_session());
    let results = engine
        .apply_rule(&similarity_rule(json!(10)), &target_values(), false)
        .unwrap();

    // TMD normalizes A to 0.5 and B to 0.25; coordinates boosts A to
    // 0.4 and normalizes to 0.5. A combines to 0.5, B lacks coordinate
    // coverage and combines to 0.
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["id"], json!("morph/A"));
    assert!((results[0]["score"].as_f64().unwrap() - 0.5).abs() < 1e-12);
    assert_eq!(results[1]["id"], json!("morph/B"));
    assert!(results[1]["score"].as_f64().unwrap().abs() < 1e-12);

    // No view override leaks out of the search.
    assert_eq!(engine.session().active_index_view(), None);
}

#[test]
fn result_filter_is_substituted_into_every_neighbor_query() {
    let engine = InferenceEngine::new(seeded_session());
    engine
        .apply_rule(&similarity_rule(json!(10)), &target_values(), false)
        .unwrap();

    let bodies = engine.session().executed_index_bodies.lock().unwrap();
    let neighbor_bodies: Vec<_> = bodies
        .iter()
        .filter(|(_, body)| body.get("query").and_then(|q| q.get("script_score")).is_some())
        .collect();
    assert_eq!(neighbor_bodies.len(), 2);
    for (_, body) in neighbor_bodies {
        // The default for ResourceType resolves, expands, and is quoted
        // into the JSON filter fragment.
        assert_eq!(
            body["query"]["script_score"]["query"]["bool"]["must"][1],
            json!({"term": {"type": "http://example.org/nsg:NeuronMorphology"}})
        );
    }
}

#[test]
fn ignoring_a_model_uses_the_raw_single_model_ranking() {
    let engine = InferenceEngine::new(seeded_session());
    let mut values = target_values();
    values.insert(
        IGNORE_MODELS_PARAMETER.to_string(),
        json!(["models/coordinates"]),
    );

    let results = engine
        .apply_rule(&similarity_rule(json!(10)), &values, false)
        .unwrap();
    assert_eq!(results[0], json!({"id": "morph/A", "score": 1.5}));
    assert_eq!(results[1], json!({"id": "morph/B", "score": 1.0}));
}

#[test]
fn k_template_resolves_through_parameter_values() {
    let engine = InferenceEngine::new(seeded_session());
    let mut values = target_values();
    values.insert("NeighborCount".to_string(), json!("1"));
    values.insert(
        IGNORE_MODELS_PARAMETER.to_string(),
        json!(["models/coordinates"]),
    );

    let results = engine
        .apply_rule(&similarity_rule(json!("$NeighborCount")), &values, false)
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], json!("morph/A"));
}
