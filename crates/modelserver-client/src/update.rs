//! Edit requests and the results the server reports for them.

use serde_json::{Value, json};

use crate::command::Command;
use crate::decode;
use crate::envelope::Envelope;
use crate::patch::{self, PATCH_LIST, PatchError, PatchOperation};

const COMMAND_EDIT: &str = "modelserver.emfcommand";
const PATCH_EDIT: &str = "modelserver.patch";

/// Mutation submitted through the edit endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum EditRequest {
    /// A structural command.
    Command(Command),
    /// An ordered list of patch operations.
    Patch(Vec<PatchOperation>),
}

impl EditRequest {
    /// Wire `type` literal of the edit message.
    #[must_use]
    pub const fn message_type(&self) -> &'static str {
        match self {
            Self::Command(_) => COMMAND_EDIT,
            Self::Patch(_) => PATCH_EDIT,
        }
    }

    /// Encodes the request as `{ type, data }`.
    ///
    /// # Errors
    ///
    /// Returns the serialiser's error when the payload cannot be encoded.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let data = match self {
            Self::Command(command) => command.to_value()?,
            Self::Patch(operations) => serde_json::to_value(operations)?,
        };
        Ok(json!({ "type": self.message_type(), "data": data }))
    }
}

impl From<Command> for EditRequest {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

impl From<Vec<PatchOperation>> for EditRequest {
    fn from(operations: Vec<PatchOperation>) -> Self {
        Self::Patch(operations)
    }
}

impl From<PatchOperation> for EditRequest {
    fn from(operation: PatchOperation) -> Self {
        Self::Patch(vec![operation])
    }
}

/// Server-produced operations that reproduce an edit on a local copy.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPatch {
    operations: Vec<PatchOperation>,
}

impl LocalPatch {
    /// Wraps a decoded operation list.
    #[must_use]
    pub const fn new(operations: Vec<PatchOperation>) -> Self {
        Self { operations }
    }

    /// Operations in application order.
    #[must_use]
    pub fn operations(&self) -> &[PatchOperation] {
        &self.operations
    }

    /// Returns the patched model; `model` is not modified.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError`] when an operation does not fit the model.
    pub fn apply(&self, model: &Value) -> Result<Value, PatchError> {
        patch::apply_patch(model, &self.operations)
    }
}

/// Outcome of an edit, undo or redo.
///
/// `patch` is present only for successful edits whose response carried a
/// well-formed operation list. Without it the caller re-fetches the model.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    /// Whether the server applied the change.
    pub success: bool,
    /// Operations for updating a local copy.
    pub patch: Option<LocalPatch>,
}

impl UpdateResult {
    /// A failed update.
    #[must_use]
    pub const fn failed() -> Self {
        Self {
            success: false,
            patch: None,
        }
    }

    /// Interprets an edit response.
    #[must_use]
    pub fn from_envelope(envelope: &Envelope) -> Self {
        if !envelope.is_success() {
            return Self::failed();
        }
        Self {
            success: true,
            patch: patch_list(envelope.data()).map(LocalPatch::new),
        }
    }

    /// Applies the local patch when one is present.
    ///
    /// Returns `None` when the caller has to re-fetch the model.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError`] when an operation does not fit the model.
    pub fn patch_model(&self, model: &Value) -> Result<Option<Value>, PatchError> {
        self.patch
            .as_ref()
            .map(|local| local.apply(model))
            .transpose()
    }
}

/// Extracts an operation list from `{ patch: [..] }` or a bare list.
pub(crate) fn patch_list(data: &Value) -> Option<Vec<PatchOperation>> {
    let candidate = match data {
        Value::Object(object) => object.get("patch")?,
        Value::Array(_) => data,
        _ => return None,
    };
    decode::decode(candidate, &PATCH_LIST).ok()
}
