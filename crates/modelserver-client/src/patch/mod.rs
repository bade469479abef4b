//! Generic patch operations over model content.
//!
//! Operations address either a model element (`modeluri#elementId/feature`)
//! or a JSON Pointer relative to the model root (`/name`). The helper
//! constructors build model-addressed operations; servers typically answer
//! with pointer-addressed ones. [`apply_patch`] understands both.

mod apply;
mod operation;

use thiserror::Error;

pub use apply::apply_patch;
pub use operation::{
    PATCH_LIST, PatchOperation, add, create, element_path, remove_object, remove_value_at,
    replace,
};

/// Errors raised while building or applying patch operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatchError {
    /// The element has neither `$id` nor a `$ref` fragment.
    #[error("element has no id to address it by")]
    UnidentifiedElement,

    /// A pointer path did not start with `/`.
    #[error("invalid patch path '{path}'")]
    InvalidPath {
        /// Offending path.
        path: String,
    },

    /// No element in the model carries the addressed id.
    #[error("no element with id '{element_id}' in the model")]
    ElementNotFound {
        /// Id taken from the path fragment.
        element_id: String,
    },

    /// The path does not lead to an existing value.
    #[error("nothing found at '{path}'")]
    NotFound {
        /// Offending path.
        path: String,
    },

    /// An array position is malformed or out of bounds.
    #[error("invalid index '{index}' in '{path}'")]
    InvalidIndex {
        /// Offending path.
        path: String,
        /// Offending token.
        index: String,
    },

    /// The parent of the addressed location is neither an object nor an array,
    /// or the operation cannot apply to the model root.
    #[error("operation cannot target '{path}'")]
    InvalidTarget {
        /// Offending path.
        path: String,
    },
}
