//! Typed push notifications decoded from subscription channel messages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::command::Command;
use crate::decode::{self, DecodeError, TypeGuard};
use crate::diagnostic::Diagnostic;
use crate::envelope::{Envelope, MessageKind};
use crate::update::{self, LocalPatch};

const NORMAL_CLOSURE: u16 = 1000;
const GOING_AWAY: u16 = 1001;

/// How a v1 server executed the command reported in an incremental update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionKind {
    /// The command ran for the first time.
    Execute,
    /// The command was undone.
    Undo,
    /// The command was redone.
    Redo,
}

/// Incremental update body sent by v1 servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandExecutionResult {
    /// Execution mode.
    #[serde(rename = "type")]
    pub kind: ExecutionKind,
    /// Command that changed the model.
    pub source: Command,
    /// Elements touched by the command.
    #[serde(default)]
    pub affected_objects: Vec<Value>,
}

const COMMAND_EXECUTION: TypeGuard<CommandExecutionResult> =
    TypeGuard::new("command execution result", is_command_execution);

fn is_command_execution(value: &Value) -> bool {
    value.get("type").is_some_and(Value::is_string)
        && value.get("source").is_some_and(decode::is_command)
}

/// Description of a model change.
#[derive(Debug, Clone, PartialEq)]
pub enum IncrementalUpdate {
    /// v1: the command the server executed.
    Command(CommandExecutionResult),
    /// v2: operations reproducing the change.
    Patch(LocalPatch),
}

/// Replacement content of a model.
#[derive(Debug, Clone, PartialEq)]
pub enum FullModel {
    /// JSON content.
    Object(Map<String, Value>),
    /// Serialised content, e.g. XMI.
    Text(String),
}

/// The channel closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseNotification {
    /// Model the channel served.
    pub modeluri: String,
    /// Close code reported by the transport.
    pub code: u16,
    /// Human-readable reason.
    pub reason: String,
}

impl CloseNotification {
    /// Builds a close notification, naming well-known close codes.
    #[must_use]
    pub fn new(modeluri: impl Into<String>, code: u16, reason: &str) -> Self {
        let described = match code {
            NORMAL_CLOSURE => "connection closed by peer",
            GOING_AWAY => "server shutdown",
            _ => reason,
        };
        Self {
            modeluri: modeluri.into(),
            code,
            reason: described.to_owned(),
        }
    }
}

/// The channel or one of its messages failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorNotification {
    /// Model the channel serves.
    pub modeluri: String,
    /// Description of the failure.
    pub message: String,
    /// Offending message payload, when one was received.
    pub payload: Option<Value>,
}

/// Event delivered to a [`super::SubscriptionListener`].
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The channel opened.
    Open {
        /// Subscribed model.
        modeluri: String,
    },
    /// The channel closed.
    Close(CloseNotification),
    /// The channel or a message failed.
    Error(ErrorNotification),
    /// A `success` or `keepAlive` message.
    Success {
        /// Subscribed model.
        modeluri: String,
        /// Whether the message was a heartbeat.
        keep_alive: bool,
        /// Message payload.
        data: Value,
    },
    /// The model's dirty flag changed.
    DirtyState {
        /// Subscribed model.
        modeluri: String,
        /// New dirty flag.
        is_dirty: bool,
    },
    /// The model changed.
    IncrementalUpdate {
        /// Subscribed model.
        modeluri: String,
        /// Change description.
        update: IncrementalUpdate,
    },
    /// The model was replaced.
    FullUpdate {
        /// Subscribed model.
        modeluri: String,
        /// New content.
        model: FullModel,
    },
    /// Live validation produced a result.
    ValidationResult {
        /// Subscribed model.
        modeluri: String,
        /// Validation result.
        diagnostic: Diagnostic,
    },
    /// A message type without a dedicated callback.
    Unknown {
        /// Subscribed model.
        modeluri: String,
        /// Raw message.
        envelope: Envelope,
    },
}

impl Notification {
    /// Classifies an inbound envelope received on the channel for a model.
    ///
    /// Payloads that do not fit their declared type become
    /// [`Notification::Error`].
    #[must_use]
    pub fn from_envelope(channel: &str, envelope: Envelope) -> Self {
        let modeluri = channel.to_owned();
        let kind = envelope.kind();
        let classified = match kind {
            MessageKind::Success | MessageKind::KeepAlive => Ok(Self::Success {
                keep_alive: kind == MessageKind::KeepAlive,
                data: envelope.data().clone(),
                modeluri: modeluri.clone(),
            }),
            MessageKind::Error => {
                let message = envelope
                    .failure()
                    .map(|failure| failure.message)
                    .unwrap_or_default();
                Ok(Self::Error(ErrorNotification {
                    modeluri: modeluri.clone(),
                    message,
                    payload: Some(envelope.data().clone()),
                }))
            }
            MessageKind::DirtyState => {
                decode::as_boolean(envelope.data()).map(|is_dirty| Self::DirtyState {
                    modeluri: modeluri.clone(),
                    is_dirty,
                })
            }
            MessageKind::IncrementalUpdate => {
                incremental_update(envelope.data()).map(|update| Self::IncrementalUpdate {
                    modeluri: modeluri.clone(),
                    update,
                })
            }
            MessageKind::FullUpdate => full_model(envelope.data()).map(|model| Self::FullUpdate {
                modeluri: modeluri.clone(),
                model,
            }),
            MessageKind::ValidationResult => {
                Diagnostic::from_value(envelope.data()).map(|diagnostic| Self::ValidationResult {
                    modeluri: modeluri.clone(),
                    diagnostic,
                })
            }
            MessageKind::Unknown => Ok(Self::Unknown {
                modeluri: modeluri.clone(),
                envelope: envelope.clone(),
            }),
        };

        classified
            .unwrap_or_else(|error| Self::malformed(modeluri, &error, Some(envelope.into_data())))
    }

    /// Builds the error notification for a message that failed to decode.
    #[must_use]
    pub fn malformed(modeluri: String, error: &DecodeError, payload: Option<Value>) -> Self {
        Self::Error(ErrorNotification {
            modeluri,
            message: error.to_string(),
            payload,
        })
    }

    /// Model the notification belongs to.
    #[must_use]
    pub fn modeluri(&self) -> &str {
        match self {
            Self::Close(close) => &close.modeluri,
            Self::Error(error) => &error.modeluri,
            Self::Open { modeluri }
            | Self::Success { modeluri, .. }
            | Self::DirtyState { modeluri, .. }
            | Self::IncrementalUpdate { modeluri, .. }
            | Self::FullUpdate { modeluri, .. }
            | Self::ValidationResult { modeluri, .. }
            | Self::Unknown { modeluri, .. } => modeluri,
        }
    }
}

fn incremental_update(data: &Value) -> Result<IncrementalUpdate, DecodeError> {
    if let Some(operations) = update::patch_list(data) {
        return Ok(IncrementalUpdate::Patch(LocalPatch::new(operations)));
    }
    decode::decode(data, &COMMAND_EXECUTION).map(IncrementalUpdate::Command)
}

fn full_model(data: &Value) -> Result<FullModel, DecodeError> {
    match data {
        Value::String(text) => Ok(FullModel::Text(text.clone())),
        _ => decode::as_object(data).map(FullModel::Object),
    }
}
