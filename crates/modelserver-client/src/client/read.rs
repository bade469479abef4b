//! How read operations interpret the returned model.

use modelserver_config::Format;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::decode::{self, DecodeError, TypeGuard};

/// Requested representation of a read result.
#[derive(Debug, Clone, Copy)]
pub enum ReadAs<T> {
    /// The client's default format: an object for JSON formats, text for XML.
    Default,
    /// An explicit format, returned as the server's serialised text.
    Format(Format),
    /// The default format narrowed through a guard.
    Guard(TypeGuard<T>),
}

impl<T> ReadAs<T> {
    /// Wire format to request given the client's default.
    #[must_use]
    pub const fn format(&self, default: Format) -> Format {
        match self {
            Self::Format(format) => *format,
            Self::Default | Self::Guard(_) => default,
        }
    }
}

impl<T> Default for ReadAs<T> {
    fn default() -> Self {
        Self::Default
    }
}

/// Result of a read operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<T> {
    /// A JSON model.
    Object(Map<String, Value>),
    /// A serialised model, e.g. XMI.
    Text(String),
    /// A model narrowed through a caller-supplied guard.
    Typed(T),
}

impl<T> ReadOutcome<T> {
    /// The object, if the outcome is one.
    #[must_use]
    pub fn into_object(self) -> Option<Map<String, Value>> {
        match self {
            Self::Object(object) => Some(object),
            Self::Text(_) | Self::Typed(_) => None,
        }
    }

    /// The text, if the outcome is text.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Object(_) | Self::Typed(_) => None,
        }
    }

    /// The narrowed value, if a guard was used.
    #[must_use]
    pub fn into_typed(self) -> Option<T> {
        match self {
            Self::Typed(typed) => Some(typed),
            Self::Object(_) | Self::Text(_) => None,
        }
    }
}

pub(crate) fn interpret<T: DeserializeOwned>(
    data: &Value,
    read_as: &ReadAs<T>,
    format: Format,
) -> Result<ReadOutcome<T>, DecodeError> {
    match read_as {
        ReadAs::Guard(guard) => decode::decode(data, guard).map(ReadOutcome::Typed),
        ReadAs::Default if format.is_json() => decode::as_object(data).map(ReadOutcome::Object),
        ReadAs::Default | ReadAs::Format(_) => decode::as_text(data).map(ReadOutcome::Text),
    }
}
