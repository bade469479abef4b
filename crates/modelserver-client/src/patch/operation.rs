//! Patch operation type and model-addressed constructors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::PatchError;
use crate::decode::{self, TypeGuard};
use crate::model::{ModelElement, ModelReference, TYPE_KEY};

/// One `add`, `remove` or `replace` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Insert `value` at `path`.
    Add {
        /// Target location.
        path: String,
        /// Inserted value.
        value: Value,
    },
    /// Delete the value at `path`.
    Remove {
        /// Target location.
        path: String,
    },
    /// Overwrite the value at `path`.
    Replace {
        /// Target location.
        path: String,
        /// New value.
        value: Value,
    },
}

/// Guard for well-formed operation lists.
pub const PATCH_LIST: TypeGuard<Vec<PatchOperation>> =
    TypeGuard::new("patch operation list", decode::is_patch_list);

impl PatchOperation {
    /// Address the operation applies to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Remove { path } | Self::Replace { path, .. } => path,
        }
    }

    /// Wire name of the operation.
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
        }
    }
}

/// Builds `modeluri#elementId` for an element.
///
/// # Errors
///
/// Returns [`PatchError::UnidentifiedElement`] when the element has no id.
pub fn element_path(modeluri: &str, element: &impl ModelElement) -> Result<String, PatchError> {
    element
        .element_id()
        .map(|id| format!("{modeluri}#{id}"))
        .ok_or(PatchError::UnidentifiedElement)
}

/// Replaces `feature` of `element` with `value`.
///
/// # Errors
///
/// Returns [`PatchError::UnidentifiedElement`] when the element has no id.
pub fn replace(
    modeluri: &str,
    element: &impl ModelElement,
    feature: &str,
    value: Value,
) -> Result<PatchOperation, PatchError> {
    Ok(PatchOperation::Replace {
        path: format!("{}/{feature}", element_path(modeluri, element)?),
        value,
    })
}

/// Adds a brand-new object of `type_tag` under `feature` of `parent`.
///
/// # Errors
///
/// Returns [`PatchError::UnidentifiedElement`] when the parent has no id.
pub fn create(
    modeluri: &str,
    parent: &impl ModelElement,
    feature: &str,
    type_tag: &str,
    attributes: Option<Map<String, Value>>,
) -> Result<PatchOperation, PatchError> {
    let mut object = Map::new();
    object.insert(String::from(TYPE_KEY), Value::String(type_tag.to_owned()));
    object.extend(attributes.unwrap_or_default());
    Ok(PatchOperation::Add {
        path: format!("{}/{feature}", element_path(modeluri, parent)?),
        value: Value::Object(object),
    })
}

/// Adds a reference to an `existing` element under `feature` of `parent`.
///
/// # Errors
///
/// Returns [`PatchError::UnidentifiedElement`] when either element has no id.
pub fn add(
    modeluri: &str,
    parent: &impl ModelElement,
    feature: &str,
    existing: &impl ModelElement,
) -> Result<PatchOperation, PatchError> {
    let reference =
        ModelReference::to_element(modeluri, existing).ok_or(PatchError::UnidentifiedElement)?;
    let value = serde_json::to_value(reference).map_err(|_| PatchError::UnidentifiedElement)?;
    Ok(PatchOperation::Add {
        path: format!("{}/{feature}", element_path(modeluri, parent)?),
        value,
    })
}

/// Removes the value at `index` of `feature` of `element`.
///
/// # Errors
///
/// Returns [`PatchError::UnidentifiedElement`] when the element has no id.
pub fn remove_value_at(
    modeluri: &str,
    element: &impl ModelElement,
    feature: &str,
    index: usize,
) -> Result<PatchOperation, PatchError> {
    Ok(PatchOperation::Remove {
        path: format!("{}/{feature}/{index}", element_path(modeluri, element)?),
    })
}

/// Removes `element` from the model.
///
/// # Errors
///
/// Returns [`PatchError::UnidentifiedElement`] when the element has no id.
pub fn remove_object(
    modeluri: &str,
    element: &impl ModelElement,
) -> Result<PatchOperation, PatchError> {
    Ok(PatchOperation::Remove {
        path: element_path(modeluri, element)?,
    })
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;

    const URI: &str = "SuperBrewer3000.coffee";

    #[fixture]
    fn machine() -> Value {
        json!({"$type": "Machine", "$id": "machine-1", "name": "Bar"})
    }

    #[rstest]
    fn replace_targets_element_feature(machine: Value) {
        let operation = replace(URI, &machine, "name", json!("Foo")).expect("machine has an id");

        assert_eq!(
            serde_json::to_value(&operation).expect("encode"),
            json!({"op": "replace", "path": "SuperBrewer3000.coffee#machine-1/name", "value": "Foo"})
        );
    }

    #[rstest]
    fn create_builds_typed_object(machine: Value) {
        let mut attributes = Map::new();
        attributes.insert(String::from("name"), json!("Grinder"));

        let operation = create(URI, &machine, "children", "BrewingUnit", Some(attributes))
            .expect("machine has an id");

        assert_eq!(operation.path(), "SuperBrewer3000.coffee#machine-1/children");
        let PatchOperation::Add { value, .. } = operation else {
            panic!("expected an add operation");
        };
        assert_eq!(value, json!({"$type": "BrewingUnit", "name": "Grinder"}));
    }

    #[rstest]
    fn add_inserts_reference(machine: Value) {
        let task = json!({"$type": "Task", "$id": "task-7"});

        let operation = add(URI, &machine, "tasks", &task).expect("both elements have ids");

        let PatchOperation::Add { value, .. } = operation else {
            panic!("expected an add operation");
        };
        assert_eq!(value, json!({"$type": "Task", "$ref": "SuperBrewer3000.coffee#task-7"}));
    }

    #[rstest]
    fn removes_by_index_and_by_object(machine: Value) {
        let by_index = remove_value_at(URI, &machine, "children", 2).expect("id");
        let by_object = remove_object(URI, &machine).expect("id");

        assert_eq!(by_index.path(), "SuperBrewer3000.coffee#machine-1/children/2");
        assert_eq!(by_object.path(), "SuperBrewer3000.coffee#machine-1");
        assert_eq!(by_object.op(), "remove");
    }

    #[rstest]
    fn falls_back_to_reference_fragment() {
        let reference = json!({"$type": "Task", "$ref": "other.coffee#task-9"});
        let operation = remove_object(URI, &reference).expect("fragment is the id");
        assert_eq!(operation.path(), "SuperBrewer3000.coffee#task-9");
    }

    #[rstest]
    fn rejects_elements_without_ids() {
        let error = replace(URI, &json!({"name": "x"}), "name", json!("y"))
            .expect_err("no id available");
        assert_eq!(error, PatchError::UnidentifiedElement);
    }

    #[rstest]
    fn guard_accepts_server_patches() {
        let operations = decode::decode(
            &json!([{"op": "replace", "path": "/name", "value": "Foo"}, {"op": "remove", "path": "/x"}]),
            &PATCH_LIST,
        )
        .expect("patch list decodes");

        assert_eq!(operations.len(), 2);
    }
}
