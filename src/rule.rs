//! Rule model and parsing.
//!
//! A rule is the unit of inference: a named bundle of guard premises and
//! one search query (or pipe). Rules are parsed fresh from their JSON
//! document on each invocation and hold no state across invocations.

use serde_json::Value;

use crate::error::DefinitionError;
use crate::parameter::ParameterSpecification;
use crate::query::{Query, SearchQuery};

/// A named, typed bundle of premises and a search query.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Rule identifier.
    pub id: String,

    /// Human-readable rule name.
    pub name: String,

    /// Rule kind declared by the document.
    pub rule_type: Option<String>,

    /// Human-readable description.
    pub description: Option<String>,

    /// Resource type the rule produces.
    pub target_resource_type: Option<String>,

    /// Guard queries gating the search.
    pub premises: Vec<Query>,

    /// The search query or pipe executed when the premises hold.
    pub search_query: SearchQuery,
}

impl Rule {
    /// Parses a rule from its JSON document.
    pub fn from_document(document: &Value) -> Result<Self, DefinitionError> {
        let id = required_string(document, "id")?;
        let name = required_string(document, "name")?;

        let premises = match document.get("premise") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(Query::from_document)
                .collect::<Result<Vec<_>, _>>()?,
            Some(single) => vec![Query::from_document(single)?],
        };

        let search_document =
            document
                .get("searchQuery")
                .ok_or_else(|| DefinitionError::MissingField {
                    object: format!("rule '{name}'"),
                    field: "searchQuery".to_string(),
                })?;
        let search_query = SearchQuery::from_document(search_document)?;

        Ok(Self {
            id,
            name,
            rule_type: optional_string(document, "type"),
            description: optional_string(document, "description"),
            target_resource_type: optional_string(document, "targetResourceType"),
            premises,
            search_query,
        })
    }

    /// Parses a rule from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, DefinitionError> {
        let document: Value =
            serde_json::from_str(text).map_err(|e| DefinitionError::MalformedDocument {
                reason: e.to_string(),
            })?;
        Self::from_document(&document)
    }

    /// All parameter specifications this rule accepts, across its
    /// premises and every stage of its search query.
    ///
    /// Duplicate names keep the first occurrence, so a rule catalog can
    /// present one entry per caller-facing parameter.
    #[must_use]
    pub fn parameters(&self) -> Vec<&ParameterSpecification> {
        let mut specs: Vec<&ParameterSpecification> = Vec::new();
        for premise in &self.premises {
            for spec in premise.parameters() {
                if !specs.iter().any(|s| s.name == spec.name) {
                    specs.push(spec);
                }
            }
        }
        for spec in self.search_query.parameters() {
            if !specs.iter().any(|s| s.name == spec.name) {
                specs.push(spec);
            }
        }
        specs
    }
}

fn required_string(document: &Value, field: &str) -> Result<String, DefinitionError> {
    document
        .get(field)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| DefinitionError::MissingField {
            object: "rule".to_string(),
            field: field.to_string(),
        })
}

fn optional_string(document: &Value, field: &str) -> Option<String> {
    document
        .get(field)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}
