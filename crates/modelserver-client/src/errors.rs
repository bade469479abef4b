//! Error types surfaced by the client and the subscription manager.

use std::fmt;

use modelserver_config::ConfigError;
use thiserror::Error;

use crate::decode::DecodeError;
use crate::transport::TransportError;

/// Server capability being exercised when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Reading a model.
    GetModel,
    /// Looking an element up by id or name.
    GetElement,
    /// Reading every model.
    GetAll,
    /// Listing model identifiers.
    GetModelUris,
    /// Creating a model.
    Create,
    /// Replacing a model.
    Update,
    /// Deleting a model.
    Delete,
    /// Closing a model.
    Close,
    /// Saving a model.
    Save,
    /// Saving every model.
    SaveAll,
    /// Validating a model.
    Validate,
    /// Reading validation constraints.
    GetValidationConstraints,
    /// Reading a type schema.
    GetTypeSchema,
    /// Reading a UI schema.
    GetUiSchema,
    /// Configuring the server.
    Configure,
    /// Checking server liveness.
    Ping,
    /// Applying a command or patch.
    Edit,
    /// Undoing the last edit.
    Undo,
    /// Redoing the last undone edit.
    Redo,
}

impl fmt::Display for Operation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::GetModel => "get model",
            Self::GetElement => "get element",
            Self::GetAll => "get all",
            Self::GetModelUris => "get model URIs",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Close => "close",
            Self::Save => "save",
            Self::SaveAll => "save all",
            Self::Validate => "validate",
            Self::GetValidationConstraints => "get validation constraints",
            Self::GetTypeSchema => "get type schema",
            Self::GetUiSchema => "get UI schema",
            Self::Configure => "configure",
            Self::Ping => "ping",
            Self::Edit => "edit",
            Self::Undo => "undo",
            Self::Redo => "redo",
        };
        formatter.write_str(label)
    }
}

/// Errors returned by [`crate::ModelServerClient`] and
/// [`crate::SubscriptionManager`].
#[derive(Debug, Error)]
pub enum ModelServerError {
    /// The response payload did not have the expected shape.
    #[error("{operation} returned an unexpected payload: {source}")]
    Decode {
        /// Operation that received the payload.
        operation: Operation,
        /// Underlying decode failure.
        #[source]
        source: DecodeError,
    },

    /// The server answered with an error envelope.
    #[error("{operation} failed on the server: {message}")]
    Server {
        /// Operation that failed.
        operation: Operation,
        /// Server-supplied message.
        message: String,
        /// Server-supplied code.
        code: Option<i64>,
    },

    /// The transport failed before a valid envelope arrived.
    #[error("{operation} request failed: {source}")]
    Transport {
        /// Operation that failed.
        operation: Operation,
        /// Transport failure.
        #[source]
        source: Box<TransportError>,
    },

    /// A request or channel message could not be serialised.
    #[error("failed to encode message: {0}")]
    Codec(#[from] serde_json::Error),

    /// The client configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A request path could not be resolved against the base URL.
    #[error("cannot resolve '{path}' against the base URL: {source}")]
    Address {
        /// Path that failed to resolve.
        path: String,
        /// Underlying parse failure.
        #[source]
        source: url::ParseError,
    },

    /// A channel for the model is already registered.
    #[error("already subscribed to '{modeluri}'")]
    AlreadySubscribed {
        /// Subscribed model.
        modeluri: String,
    },

    /// No channel is registered for the model.
    #[error("not subscribed to '{modeluri}'")]
    NotSubscribed {
        /// Requested model.
        modeluri: String,
    },

    /// Opening, writing to or closing a channel failed.
    #[error("channel for '{modeluri}' failed: {source}")]
    Channel {
        /// Model served by the channel.
        modeluri: String,
        /// Transport failure.
        #[source]
        source: Box<TransportError>,
    },
}

impl ModelServerError {
    pub(crate) const fn decode(operation: Operation, source: DecodeError) -> Self {
        Self::Decode { operation, source }
    }

    pub(crate) const fn server(operation: Operation, message: String, code: Option<i64>) -> Self {
        Self::Server {
            operation,
            message,
            code,
        }
    }

    pub(crate) fn transport(operation: Operation, source: TransportError) -> Self {
        Self::Transport {
            operation,
            source: Box::new(source),
        }
    }

    pub(crate) fn channel(modeluri: &str, source: TransportError) -> Self {
        Self::Channel {
            modeluri: modeluri.to_owned(),
            source: Box::new(source),
        }
    }

    /// Message reported by the server or transport, or the error's rendering.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Server { message, .. } => message.clone(),
            Self::Transport { source, .. } | Self::Channel { source, .. } => {
                source.message().to_owned()
            }
            other => other.to_string(),
        }
    }

    /// Code reported by the server or transport.
    #[must_use]
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Server { code, .. } => *code,
            Self::Transport { source, .. } | Self::Channel { source, .. } => source.code(),
            _ => None,
        }
    }

    /// Operation the error belongs to, for request/response failures.
    #[must_use]
    pub const fn operation(&self) -> Option<Operation> {
        match self {
            Self::Decode { operation, .. }
            | Self::Server { operation, .. }
            | Self::Transport { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn transport_errors_expose_message_and_code() {
        let error = ModelServerError::transport(
            Operation::Ping,
            TransportError::new("connection refused").with_code(503),
        );

        assert_eq!(error.message(), "connection refused");
        assert_eq!(error.code(), Some(503));
        assert_eq!(error.operation(), Some(Operation::Ping));
        assert_eq!(error.to_string(), "ping request failed: connection refused");
    }

    #[rstest]
    fn server_errors_keep_server_message() {
        let error = ModelServerError::server(Operation::Save, String::from("locked"), Some(409));

        assert_eq!(error.message(), "locked");
        assert_eq!(error.code(), Some(409));
        assert_eq!(error.to_string(), "save failed on the server: locked");
    }
}
