//! Parameter specifications and value resolution.
//!
//! Every query and premise declares the inputs it accepts as a list of
//! [`ParameterSpecification`]s. Resolution turns the caller's flat value
//! map into the effective value of each parameter, honoring defaults,
//! optionality, and restricted-choice tables.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParameterError;
use crate::values::{as_list, is_empty_value, supplied_value, ParameterValues};

/// The closed set of parameter types.
///
/// The type determines the formatting rules applied before substitution
/// and whether the parameter is list-shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    /// Single value, double-quoted.
    #[serde(rename = "str")]
    Str,
    /// Single value, passed through unmodified.
    #[serde(rename = "path")]
    Path,
    /// Single short-form URI, expanded to its full form.
    #[serde(rename = "uri")]
    Uri,
    /// `true`/`false`, case-insensitive, normalized to lowercase.
    #[serde(rename = "bool")]
    Bool,
    /// Each element double-quoted, comma-joined.
    #[serde(rename = "list")]
    List,
    /// URI list; representation depends on the target backend family.
    #[serde(rename = "uri_list")]
    UriList,
    /// `(<a>, <b>)` - SPARQL only.
    #[serde(rename = "sparql_list")]
    SparqlList,
    /// One `("v")` per line - SPARQL only.
    #[serde(rename = "sparql_value_list")]
    SparqlValueList,
    /// One `(<v>)` per line, URIs expanded - SPARQL only.
    #[serde(rename = "sparql_value_uri_list")]
    SparqlValueUriList,
    /// Raw query fragment spliced into the body unmodified.
    #[serde(rename = "query_block")]
    QueryBlock,
    /// Variadic (predicate, object) pairs, rewritten into indexed
    /// parameter slots before formatting. SPARQL only.
    #[serde(rename = "MultiPredicateObjectPair")]
    MultiPredicateObjectPair,
}

impl ParameterType {
    /// Returns true for list-shaped types.
    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(
            self,
            Self::List
                | Self::UriList
                | Self::SparqlList
                | Self::SparqlValueList
                | Self::SparqlValueUriList
        )
    }

    /// Returns true for types only valid in SPARQL queries and premises.
    #[must_use]
    pub const fn is_sparql_only(self) -> bool {
        matches!(
            self,
            Self::SparqlList
                | Self::SparqlValueList
                | Self::SparqlValueUriList
                | Self::MultiPredicateObjectPair
        )
    }

    /// The external name of this type, as it appears in rule documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Path => "path",
            Self::Uri => "uri",
            Self::Bool => "bool",
            Self::List => "list",
            Self::UriList => "uri_list",
            Self::SparqlList => "sparql_list",
            Self::SparqlValueList => "sparql_value_list",
            Self::SparqlValueUriList => "sparql_value_uri_list",
            Self::QueryBlock => "query_block",
            Self::MultiPredicateObjectPair => "MultiPredicateObjectPair",
        }
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The typed, named declaration of one input a query or premise accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpecification {
    /// Parameter name, unique within its query.
    pub name: String,

    /// The parameter type.
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,

    /// Whether the parameter may be left unset.
    #[serde(default)]
    pub optional: bool,

    /// Fallback value used when the caller supplies nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Restricted-choice table: user-facing keys mapped to the literals
    /// actually substituted. When set, supplied values must be keys of
    /// this table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<serde_json::Map<String, Value>>,
}

impl ParameterSpecification {
    /// Creates a mandatory parameter specification.
    #[must_use]
    pub fn new(name: impl Into<String>, parameter_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            parameter_type,
            optional: false,
            default: None,
            description: None,
            values: None,
        }
    }

    /// Marks the parameter optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Sets the restricted-choice table.
    #[must_use]
    pub fn with_choices(mut self, values: serde_json::Map<String, Value>) -> Self {
        self.values = Some(values);
        self
    }

    /// Resolves this parameter's effective value from the caller's input.
    ///
    /// Resolution order: a non-empty user value (mapped through the
    /// restricted-choice table when one is declared), then the default,
    /// then `None` for optional parameters. A mandatory parameter with no
    /// resolvable value is a [`ParameterError::MissingMandatory`]; the
    /// premise evaluator folds that error into a `MissingParameter`
    /// outcome while query execution surfaces it.
    pub fn resolve(&self, values: &ParameterValues) -> Result<Option<Value>, ParameterError> {
        if let Some(supplied) = supplied_value(values, &self.name) {
            if let Some(choices) = &self.values {
                return self.resolve_choices(supplied, choices).map(Some);
            }
            return Ok(Some(supplied.clone()));
        }

        if let Some(default) = &self.default {
            if !is_empty_value(default) {
                return Ok(Some(default.clone()));
            }
        }

        if self.optional {
            return Ok(None);
        }

        Err(ParameterError::MissingMandatory {
            name: self.name.clone(),
        })
    }

    /// Maps supplied key(s) through the restricted-choice table.
    ///
    /// Exactly one selected key resolves to its literal directly; several
    /// keys resolve to the list of their literals.
    fn resolve_choices(
        &self,
        supplied: &Value,
        choices: &serde_json::Map<String, Value>,
    ) -> Result<Value, ParameterError> {
        let keys = as_list(supplied);
        let mut mapped = Vec::with_capacity(keys.len());
        for key in keys {
            let literal = choices.get(&key).ok_or_else(|| ParameterError::InvalidChoice {
                name: self.name.clone(),
                key,
            })?;
            mapped.push(literal.clone());
        }

        if mapped.len() == 1 {
            Ok(mapped.remove(0))
        } else {
            Ok(Value::Array(mapped))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn values_of(pairs: &[(&str, Value)]) -> ParameterValues {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_type_names_round_trip() {
        for ty in [
            ParameterType::Str,
            ParameterType::Path,
            ParameterType::Uri,
            ParameterType::Bool,
            ParameterType::List,
            ParameterType::UriList,
            ParameterType::SparqlList,
            ParameterType::SparqlValueList,
            ParameterType::SparqlValueUriList,
            ParameterType::QueryBlock,
            ParameterType::MultiPredicateObjectPair,
        ] {
            let json = serde_json::to_value(ty).unwrap();
            assert_eq!(json, json!(ty.as_str()));
            let back: ParameterType = serde_json::from_value(json).unwrap();
            assert_eq!(back, ty);
        }
    }

    #[test]
    fn test_list_shaped_types() {
        assert!(ParameterType::List.is_list());
        assert!(ParameterType::SparqlValueUriList.is_list());
        assert!(!ParameterType::Str.is_list());
        assert!(!ParameterType::QueryBlock.is_list());
    }

    #[test]
    fn test_resolve_supplied_value_wins_over_default() {
        let spec = ParameterSpecification::new("p", ParameterType::Str)
            .with_default(json!("fallback"));
        let resolved = spec.resolve(&values_of(&[("p", json!("given"))])).unwrap();
        assert_eq!(resolved, Some(json!("given")));
    }

    #[test]
    fn test_resolve_empty_supplied_value_falls_back_to_default() {
        let spec = ParameterSpecification::new("p", ParameterType::Str)
            .with_default(json!("fallback"));
        let resolved = spec.resolve(&values_of(&[("p", json!(""))])).unwrap();
        assert_eq!(resolved, Some(json!("fallback")));
    }

    #[test]
    fn test_resolve_optional_without_value() {
        let spec = ParameterSpecification::new("p", ParameterType::Str).optional();
        assert_eq!(spec.resolve(&ParameterValues::new()).unwrap(), None);
    }

    #[test]
    fn test_resolve_mandatory_without_value_fails() {
        let spec = ParameterSpecification::new("p", ParameterType::Str);
        let err = spec.resolve(&ParameterValues::new()).unwrap_err();
        assert!(matches!(err, ParameterError::MissingMandatory { name } if name == "p"));
    }

    #[test]
    fn test_restricted_choice_single_key() {
        let mut choices = serde_json::Map::new();
        choices.insert("thalamus".to_string(), json!("http://uri/thalamus"));
        choices.insert("cortex".to_string(), json!("http://uri/cortex"));
        let spec =
            ParameterSpecification::new("region", ParameterType::Uri).with_choices(choices);

        let resolved = spec
            .resolve(&values_of(&[("region", json!("thalamus"))]))
            .unwrap();
        assert_eq!(resolved, Some(json!("http://uri/thalamus")));
    }

    #[test]
    fn test_restricted_choice_multiple_keys() {
        let mut choices = serde_json::Map::new();
        choices.insert("a".to_string(), json!("lit_a"));
        choices.insert("b".to_string(), json!("lit_b"));
        let spec =
            ParameterSpecification::new("region", ParameterType::List).with_choices(choices);

        let resolved = spec
            .resolve(&values_of(&[("region", json!(["a", "b"]))]))
            .unwrap();
        assert_eq!(resolved, Some(json!(["lit_a", "lit_b"])));
    }

    #[test]
    fn test_restricted_choice_unknown_key_fails() {
        let mut choices = serde_json::Map::new();
        choices.insert("a".to_string(), json!("lit_a"));
        let spec =
            ParameterSpecification::new("region", ParameterType::Str).with_choices(choices);

        let err = spec
            .resolve(&values_of(&[("region", json!("nope"))]))
            .unwrap_err();
        assert!(matches!(
            err,
            ParameterError::InvalidChoice { name, key } if name == "region" && key == "nope"
        ));
    }

    #[test]
    fn test_specification_deserializes_external_field_names() {
        let doc = json!({
            "name": "species",
            "type": "uri",
            "optional": true,
            "description": "Target species",
            "values": {"mouse": "http://uri/mouse"}
        });
        let spec: ParameterSpecification = serde_json::from_value(doc).unwrap();
        assert_eq!(spec.name, "species");
        assert_eq!(spec.parameter_type, ParameterType::Uri);
        assert!(spec.optional);
        assert!(spec.values.is_some());
    }
}
