//! Model identifiers, element references and addressing helpers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key carrying an element's type tag.
pub const TYPE_KEY: &str = "$type";
/// Key carrying a stable element id in the v2 addressing scheme.
pub const ID_KEY: &str = "$id";
/// Key carrying a cross-model reference.
pub const REF_KEY: &str = "$ref";

/// A model hosted by the server together with its decoded content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Identifier of the model on the server.
    pub model_uri: String,
    /// Model content as returned by the server.
    pub content: Value,
}

impl Model {
    /// Pairs a model identifier with its content.
    #[must_use]
    pub fn new(model_uri: impl Into<String>, content: Value) -> Self {
        Self {
            model_uri: model_uri.into(),
            content,
        }
    }
}

/// Reference to an element inside a model.
///
/// The `$ref` value has the shape `modeluri#fragment`; the fragment is the
/// element's `$id` for `json-v2` models or a path-style fragment otherwise.
/// A reference only resolves against the model named before the `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelReference {
    /// Type tag of the referenced element, when known.
    #[serde(
        rename = "$type",
        alias = "eClass",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub type_tag: Option<String>,
    /// `modeluri#fragment` address of the element.
    #[serde(rename = "$ref")]
    pub reference: String,
}

impl ModelReference {
    /// Builds a reference to `element_id` inside `model_uri`.
    #[must_use]
    pub fn new(model_uri: &str, element_id: &str) -> Self {
        Self {
            type_tag: None,
            reference: format!("{model_uri}#{element_id}"),
        }
    }

    /// Attaches a type tag.
    #[must_use]
    pub fn with_type(mut self, type_tag: impl Into<String>) -> Self {
        self.type_tag = Some(type_tag.into());
        self
    }

    /// Builds a reference to an element of `model_uri`.
    ///
    /// Returns `None` when the element carries no id.
    #[must_use]
    pub fn to_element(model_uri: &str, element: &impl ModelElement) -> Option<Self> {
        let id = element.element_id()?;
        let reference = Self::new(model_uri, id);
        Some(match element.element_type() {
            Some(type_tag) => reference.with_type(type_tag),
            None => reference,
        })
    }

    /// Model identifier part of the reference.
    #[must_use]
    pub fn model_uri(&self) -> &str {
        self.reference
            .split_once('#')
            .map_or(self.reference.as_str(), |(uri, _)| uri)
    }

    /// Fragment part of the reference, empty when absent.
    #[must_use]
    pub fn fragment(&self) -> &str {
        self.reference
            .split_once('#')
            .map_or("", |(_, fragment)| fragment)
    }
}

impl fmt::Display for ModelReference {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.reference)
    }
}

/// Anything that can be addressed as an element of a model.
pub trait ModelElement {
    /// Stable element id, if the element has one.
    fn element_id(&self) -> Option<&str>;

    /// Type tag, if the element declares one.
    fn element_type(&self) -> Option<&str>;
}

impl ModelElement for Value {
    fn element_id(&self) -> Option<&str> {
        if let Some(id) = self.get(ID_KEY).and_then(Value::as_str) {
            return Some(id);
        }
        self.get(REF_KEY)
            .and_then(Value::as_str)
            .and_then(|reference| reference.split_once('#'))
            .map(|(_, fragment)| fragment)
            .filter(|fragment| !fragment.is_empty())
    }

    fn element_type(&self) -> Option<&str> {
        self.get(TYPE_KEY)
            .or_else(|| self.get("eClass"))
            .and_then(Value::as_str)
    }
}

impl ModelElement for ModelReference {
    fn element_id(&self) -> Option<&str> {
        Some(self.fragment()).filter(|fragment| !fragment.is_empty())
    }

    fn element_type(&self) -> Option<&str> {
        self.type_tag.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn splits_reference_into_uri_and_fragment() {
        let reference = ModelReference::new("SuperBrewer3000.coffee", "brewing-unit");

        assert_eq!(reference.model_uri(), "SuperBrewer3000.coffee");
        assert_eq!(reference.fragment(), "brewing-unit");
    }

    #[rstest]
    fn serialises_with_dollar_keys() {
        let reference = ModelReference::new("a.coffee", "x").with_type("Machine");
        let json = serde_json::to_value(&reference).expect("serialise reference");

        assert_eq!(json, json!({"$type": "Machine", "$ref": "a.coffee#x"}));
    }

    #[rstest]
    fn accepts_legacy_eclass_tag() {
        let reference: ModelReference =
            serde_json::from_value(json!({"eClass": "Machine", "$ref": "a.coffee#//@children.0"}))
                .expect("deserialise reference");

        assert_eq!(reference.type_tag.as_deref(), Some("Machine"));
        assert_eq!(reference.fragment(), "//@children.0");
    }

    #[rstest]
    #[case(json!({"$id": "abc", "$type": "Task"}), Some("abc"))]
    #[case(json!({"$ref": "m.coffee#def"}), Some("def"))]
    #[case(json!({"$ref": "m.coffee"}), None)]
    #[case(json!({"name": "plain"}), None)]
    fn derives_element_ids_from_json(#[case] value: Value, #[case] expected: Option<&str>) {
        assert_eq!(value.element_id(), expected);
    }

    #[rstest]
    fn builds_reference_to_json_element() {
        let element = json!({"$id": "abc", "$type": "Task"});
        let reference =
            ModelReference::to_element("m.coffee", &element).expect("element has an id");

        assert_eq!(reference.reference, "m.coffee#abc");
        assert_eq!(reference.type_tag.as_deref(), Some("Task"));
    }
}
