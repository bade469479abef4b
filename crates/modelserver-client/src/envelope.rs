//! The `{ data, type }` wrapper carried by every response and push message.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decode::{self, DecodeError, TypeGuard};

/// Vocabulary of envelope types understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Request completed.
    Success,
    /// Request failed; `data` carries the server's message.
    Error,
    /// Heartbeat on a subscription channel.
    KeepAlive,
    /// Dirty flag of the subscribed model changed.
    DirtyState,
    /// The model changed; `data` describes the change.
    IncrementalUpdate,
    /// The model was replaced; `data` is the new model.
    FullUpdate,
    /// Live validation produced a diagnostic.
    ValidationResult,
    /// Any other literal.
    Unknown,
}

impl MessageKind {
    /// Classifies a wire `type` literal.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "success" => Self::Success,
            "error" => Self::Error,
            "keepAlive" => Self::KeepAlive,
            "dirtyState" => Self::DirtyState,
            "incrementalUpdate" => Self::IncrementalUpdate,
            "fullUpdate" => Self::FullUpdate,
            "validationResult" => Self::ValidationResult,
            _ => Self::Unknown,
        }
    }

    /// Wire literal for known kinds; `None` for [`MessageKind::Unknown`].
    #[must_use]
    pub const fn tag(self) -> Option<&'static str> {
        match self {
            Self::Success => Some("success"),
            Self::Error => Some("error"),
            Self::KeepAlive => Some("keepAlive"),
            Self::DirtyState => Some("dirtyState"),
            Self::IncrementalUpdate => Some("incrementalUpdate"),
            Self::FullUpdate => Some("fullUpdate"),
            Self::ValidationResult => Some("validationResult"),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.tag().unwrap_or("unknown"))
    }
}

/// Envelope around a request result or push notification.
///
/// The `type` literal is preserved verbatim so unknown message types can be
/// handed to custom handlers unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    data: Value,
    #[serde(
        default,
        alias = "modelUri",
        skip_serializing_if = "Option::is_none"
    )]
    modeluri: Option<String>,
}

const ENVELOPE: TypeGuard<Envelope> = TypeGuard::new("message envelope", decode::is_envelope);

impl Envelope {
    /// Builds an envelope with an arbitrary type literal.
    #[must_use]
    pub fn new(message_type: impl Into<String>, data: Value) -> Self {
        Self {
            message_type: message_type.into(),
            data,
            modeluri: None,
        }
    }

    /// Builds a success envelope.
    #[must_use]
    pub fn success(data: Value) -> Self {
        Self::new("success", data)
    }

    /// Builds an error envelope carrying a message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new("error", Value::String(message.into()))
    }

    /// Builds the heartbeat sent on subscription channels.
    #[must_use]
    pub fn keep_alive() -> Self {
        Self::new("keepAlive", Value::Null)
    }

    /// Narrows an untyped value into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the value lacks a string `type` field.
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        decode::decode(value, &ENVELOPE)
    }

    /// Parses and narrows a JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] for invalid JSON or non-envelope documents.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|_| DecodeError::new("JSON message", &Value::String(text.to_owned())))?;
        Self::from_value(&value)
    }

    /// Classified message type.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        MessageKind::from_tag(&self.message_type)
    }

    /// Raw `type` literal.
    #[must_use]
    pub fn message_type(&self) -> &str {
        self.message_type.as_str()
    }

    /// Type-specific payload; `null` when absent.
    #[must_use]
    pub const fn data(&self) -> &Value {
        &self.data
    }

    /// Consumes the envelope, returning its payload.
    #[must_use]
    pub fn into_data(self) -> Value {
        self.data
    }

    /// Model identifier embedded by v2 servers in push notifications.
    #[must_use]
    pub fn embedded_model_uri(&self) -> Option<&str> {
        self.modeluri.as_deref()
    }

    /// Whether the envelope reports success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.kind() == MessageKind::Success
    }

    /// Whether the envelope reports an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind() == MessageKind::Error
    }

    /// Extracts the failure description from an error envelope.
    ///
    /// Returns `None` for other envelope types.
    #[must_use]
    pub fn failure(&self) -> Option<ServerFailure> {
        self.is_error().then(|| ServerFailure::from_data(&self.data))
    }

    /// Maps the payload through a decoder.
    ///
    /// # Errors
    ///
    /// Propagates the decoder's [`DecodeError`].
    pub fn map_data<T>(
        &self,
        mapper: impl FnOnce(&Value) -> Result<T, DecodeError>,
    ) -> Result<T, DecodeError> {
        mapper(&self.data)
    }
}

/// Message and optional code reported by an error envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFailure {
    /// Server-supplied message.
    pub message: String,
    /// Server-supplied error code.
    pub code: Option<i64>,
}

impl ServerFailure {
    fn from_data(data: &Value) -> Self {
        match data {
            Value::String(message) => Self {
                message: message.clone(),
                code: None,
            },
            Value::Object(object) => Self {
                message: object
                    .get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| decode::render(data), ToOwned::to_owned),
                code: object.get("code").and_then(Value::as_i64),
            },
            Value::Null => Self {
                message: String::from("unspecified server error"),
                code: None,
            },
            other => Self {
                message: decode::render(other),
                code: None,
            },
        }
    }
}
