//! Type-guarded narrowing of untyped wire payloads.
//!
//! Every payload received from the server passes through this module before
//! the rest of the crate looks at it. A [`TypeGuard`] pairs a shape predicate
//! with a target type; [`decode`] checks the predicate and then deserialises,
//! so a payload either narrows completely or fails with a [`DecodeError`]
//! that names the expected shape and renders the offending JSON.
//!
//! The `is_*` predicates are the only place in the crate that inspects raw
//! JSON shapes.

use std::fmt;
use std::marker::PhantomData;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{Model, REF_KEY, TYPE_KEY};

/// A payload did not have the expected shape.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("expected {expected} but received {payload}")]
pub struct DecodeError {
    expected: String,
    payload: String,
}

impl DecodeError {
    /// Builds an error for `value` failing to match `expected`.
    #[must_use]
    pub fn new(expected: impl Into<String>, value: &Value) -> Self {
        Self {
            expected: expected.into(),
            payload: render(value),
        }
    }

    /// Name of the shape the decoder expected.
    #[must_use]
    pub fn expected(&self) -> &str {
        self.expected.as_str()
    }

    /// JSON rendering of the payload that failed to decode.
    #[must_use]
    pub fn payload(&self) -> &str {
        self.payload.as_str()
    }
}

/// Predicate plus target type used to narrow an untyped value.
pub struct TypeGuard<T> {
    expected: &'static str,
    check: fn(&Value) -> bool,
    target: PhantomData<fn() -> T>,
}

impl<T> TypeGuard<T> {
    /// Creates a guard that accepts values satisfying `check`.
    #[must_use]
    pub const fn new(expected: &'static str, check: fn(&Value) -> bool) -> Self {
        Self {
            expected,
            check,
            target: PhantomData,
        }
    }

    /// Human-readable name of the accepted shape.
    #[must_use]
    pub const fn expected(&self) -> &'static str {
        self.expected
    }

    /// Whether `value` satisfies the guard's predicate.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        (self.check)(value)
    }
}

impl<T> Clone for TypeGuard<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypeGuard<T> {}

impl<T> fmt::Debug for TypeGuard<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TypeGuard")
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

/// Narrows `value` through `guard`.
///
/// # Errors
///
/// Returns [`DecodeError`] when the predicate rejects the value or the value
/// cannot be deserialised into `T`.
pub fn decode<T: DeserializeOwned>(value: &Value, guard: &TypeGuard<T>) -> Result<T, DecodeError> {
    if !guard.matches(value) {
        return Err(DecodeError::new(guard.expected(), value));
    }
    T::deserialize(value).map_err(|_| DecodeError::new(guard.expected(), value))
}

/// Narrows `value` through a caller-supplied guard.
///
/// # Errors
///
/// See [`decode`].
pub fn as_type<T: DeserializeOwned>(value: &Value, guard: &TypeGuard<T>) -> Result<T, DecodeError> {
    decode(value, guard)
}

/// Narrows a string payload.
///
/// # Errors
///
/// Returns [`DecodeError`] for non-string payloads.
pub fn as_string(value: &Value) -> Result<String, DecodeError> {
    decode(value, &STRING)
}

/// Narrows a payload to text, rendering JSON documents when the server sent
/// structured content instead of a string.
///
/// # Errors
///
/// Returns [`DecodeError`] for scalars other than strings.
pub fn as_text(value: &Value) -> Result<String, DecodeError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Object(_) | Value::Array(_) => Ok(render(value)),
        _ => Err(DecodeError::new("text or JSON document", value)),
    }
}

/// Narrows an array of strings.
///
/// # Errors
///
/// Returns [`DecodeError`] when the payload is not an array or contains a
/// non-string element.
pub fn as_string_array(value: &Value) -> Result<Vec<String>, DecodeError> {
    decode(value, &STRING_ARRAY)
}

/// Narrows a boolean payload; an absent (`null`) payload reads as `false`.
///
/// # Errors
///
/// Returns [`DecodeError`] for any other shape.
pub fn as_boolean(value: &Value) -> Result<bool, DecodeError> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(flag) => Ok(*flag),
        _ => Err(DecodeError::new("boolean", value)),
    }
}

/// Narrows a plain JSON object.
///
/// # Errors
///
/// Returns [`DecodeError`] for non-object payloads.
pub fn as_object(value: &Value) -> Result<Map<String, Value>, DecodeError> {
    decode(value, &OBJECT)
}

/// Narrows a collection of models.
///
/// A dictionary payload `{ uri: content, .. }` yields one [`Model`] per
/// entry in key order. An array of `{ modelUri, content }` records is also
/// accepted.
///
/// # Errors
///
/// Returns [`DecodeError`] for any other shape.
pub fn as_model_array(value: &Value) -> Result<Vec<Model>, DecodeError> {
    match value {
        Value::Object(entries) => Ok(entries
            .iter()
            .map(|(uri, content)| Model::new(uri.clone(), content.clone()))
            .collect()),
        Value::Array(_) => decode(value, &MODEL_RECORDS),
        _ => Err(DecodeError::new("model dictionary", value)),
    }
}

/// Renders a value as compact JSON for diagnostics.
#[must_use]
pub fn render(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| String::from("<unrenderable>"))
}

/// Guard for strings.
pub const STRING: TypeGuard<String> = TypeGuard::new("string", is_string);
/// Guard for string arrays.
pub const STRING_ARRAY: TypeGuard<Vec<String>> = TypeGuard::new("string array", is_string_array);
/// Guard for plain objects.
pub const OBJECT: TypeGuard<Map<String, Value>> = TypeGuard::new("object", Value::is_object);
const MODEL_RECORDS: TypeGuard<Vec<Model>> = TypeGuard::new("model records", is_model_records);

/// Whether the value is a string.
#[must_use]
pub const fn is_string(value: &Value) -> bool {
    matches!(value, Value::String(_))
}

/// Whether the value is an array whose elements are all strings.
#[must_use]
pub fn is_string_array(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|items| items.iter().all(Value::is_string))
}

/// Whether the value has the `{ type: string, data?: any }` envelope shape.
#[must_use]
pub fn is_envelope(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.get("type").is_some_and(Value::is_string))
}

/// Whether the value is an envelope of the given type.
#[must_use]
pub fn is_envelope_of(value: &Value, message_type: &str) -> bool {
    is_envelope(value) && value.get("type").and_then(Value::as_str) == Some(message_type)
}

/// Whether the value is a success envelope.
#[must_use]
pub fn is_success(value: &Value) -> bool {
    is_envelope_of(value, "success")
}

/// Whether the value is an error envelope.
#[must_use]
pub fn is_error(value: &Value) -> bool {
    is_envelope_of(value, "error")
}

/// Whether the value is a single add/remove/replace operation.
#[must_use]
pub fn is_patch_operation(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    if !object.get("path").is_some_and(Value::is_string) {
        return false;
    }
    match object.get("op").and_then(Value::as_str) {
        Some("add" | "replace") => object.contains_key("value"),
        Some("remove") => true,
        _ => false,
    }
}

/// Whether the value is a list of well-formed patch operations.
#[must_use]
pub fn is_patch_list(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|operations| operations.iter().all(is_patch_operation))
}

/// Whether the value is a model element, i.e. an object with a type tag.
#[must_use]
pub fn is_model_object(value: &Value) -> bool {
    value.as_object().is_some_and(|object| {
        object
            .get(TYPE_KEY)
            .or_else(|| object.get("eClass"))
            .is_some_and(Value::is_string)
    })
}

/// Whether the value is a reference to a model element.
#[must_use]
pub fn is_model_reference(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.get(REF_KEY).is_some_and(Value::is_string))
}

/// Whether the value is a diagnostic node.
#[must_use]
pub fn is_diagnostic(value: &Value) -> bool {
    value.as_object().is_some_and(|object| {
        object.get("severity").is_some_and(Value::is_u64)
            && object.get("message").is_some_and(Value::is_string)
            && object.get("children").is_none_or(|children| {
                children
                    .as_array()
                    .is_some_and(|nodes| nodes.iter().all(is_diagnostic))
            })
    })
}

/// Whether the value is a structural command with a string type tag.
#[must_use]
pub fn is_command(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.get("type").is_some_and(Value::is_string))
}

fn is_model_records(value: &Value) -> bool {
    value.as_array().is_some_and(|records| {
        records.iter().all(|record| {
            record.get("modelUri").is_some_and(Value::is_string) && record.get("content").is_some()
        })
    })
}

/// Deserialises a value known to match a guard, reusing [`Deserialize`] on
/// borrowed JSON.
pub(crate) fn deserialize_ref<T: DeserializeOwned>(
    value: &Value,
    expected: &str,
) -> Result<T, DecodeError> {
    T::deserialize(value).map_err(|_| DecodeError::new(expected, value))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn string_array_rejects_non_array() {
        let error = as_string_array(&json!("a.coffee")).expect_err("string is not an array");

        assert_eq!(error.expected(), "string array");
        assert_eq!(error.payload(), "\"a.coffee\"");
    }

    #[rstest]
    fn string_array_rejects_mixed_elements() {
        assert!(as_string_array(&json!(["a", 1])).is_err());
    }

    #[rstest]
    fn string_array_accepts_strings() {
        let uris = as_string_array(&json!(["a.coffee", "b.coffee"])).expect("valid array");
        assert_eq!(uris, vec!["a.coffee", "b.coffee"]);
    }

    #[rstest]
    #[case(json!(null), false)]
    #[case(json!(true), true)]
    #[case(json!(false), false)]
    fn boolean_defaults_to_false(#[case] input: Value, #[case] expected: bool) {
        assert_eq!(as_boolean(&input).expect("boolean decodes"), expected);
    }

    #[rstest]
    fn boolean_rejects_strings() {
        assert!(as_boolean(&json!("true")).is_err());
    }

    #[rstest]
    fn object_rejects_arrays() {
        let error = as_object(&json!([1, 2])).expect_err("array is not an object");
        assert_eq!(error.to_string(), "expected object but received [1,2]");
    }

    #[rstest]
    fn model_array_reads_dictionary_entries() {
        let models = as_model_array(&json!({
            "a.coffee": {"$type": "Machine"},
            "b.coffee": {"$type": "Machine", "name": "B"},
        }))
        .expect("dictionary decodes");

        assert_eq!(models.len(), 2);
        assert!(models.iter().any(|model| model.model_uri == "b.coffee"
            && model.content == json!({"$type": "Machine", "name": "B"})));
    }

    #[rstest]
    fn model_array_reads_record_lists() {
        let models = as_model_array(&json!([{"modelUri": "a.coffee", "content": {}}]))
            .expect("records decode");

        assert_eq!(models, vec![Model::new("a.coffee", json!({}))]);
    }

    #[rstest]
    fn model_array_rejects_scalars() {
        assert!(as_model_array(&json!(42)).is_err());
    }

    #[rstest]
    fn text_renders_documents() {
        assert_eq!(as_text(&json!({"a": 1})).expect("object renders"), r#"{"a":1}"#);
        assert_eq!(as_text(&json!("<xmi/>")).expect("string passes"), "<xmi/>");
        assert!(as_text(&json!(3)).is_err());
    }

    #[rstest]
    fn custom_guard_narrows_to_target_type() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Machine {
            name: String,
        }

        fn is_machine(value: &Value) -> bool {
            value.get("$type").and_then(Value::as_str) == Some("Machine")
        }

        const MACHINE: TypeGuard<Machine> = TypeGuard::new("machine", is_machine);

        let machine = as_type(&json!({"$type": "Machine", "name": "SB3000"}), &MACHINE)
            .expect("machine decodes");
        assert_eq!(machine.name, "SB3000");

        let error = as_type(&json!({"$type": "Task"}), &MACHINE).expect_err("wrong type");
        assert_eq!(error.expected(), "machine");
    }

    #[rstest]
    #[case(json!({"op": "replace", "path": "/name", "value": "Foo"}), true)]
    #[case(json!({"op": "remove", "path": "/name"}), true)]
    #[case(json!({"op": "add", "path": "/name"}), false)]
    #[case(json!({"op": "move", "path": "/name", "from": "/x"}), false)]
    #[case(json!({"op": "replace", "value": 1}), false)]
    fn recognises_patch_operations(#[case] value: Value, #[case] expected: bool) {
        assert_eq!(is_patch_operation(&value), expected);
    }

    #[rstest]
    fn recognises_envelopes() {
        assert!(is_success(&json!({"type": "success", "data": {}})));
        assert!(is_error(&json!({"type": "error", "data": "boom"})));
        assert!(is_envelope(&json!({"type": "keepAlive"})));
        assert!(!is_envelope(&json!({"data": 1})));
        assert!(!is_envelope(&json!("success")));
    }

    #[rstest]
    fn distinguishes_objects_from_references() {
        let object = json!({"$type": "Task", "$id": "t1"});
        let reference = json!({"$type": "Task", "$ref": "m.coffee#t1"});

        assert!(is_model_object(&object));
        assert!(!is_model_reference(&object));
        assert!(is_model_reference(&reference));
        assert!(!is_model_object(&json!(1)));
    }
}
