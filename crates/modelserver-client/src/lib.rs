//! Client-side protocol core for a model-management server.
//!
//! The crate maps typed operations onto the server's request/response API,
//! demultiplexes push notifications from per-model subscription channels into
//! listener callbacks, and models edits as structural commands or patch
//! operations whose results can be replayed on a local copy.
//!
//! Networking stays outside the crate: hosts supply a [`RequestTransport`]
//! for requests and a [`ChannelFactory`] for subscription channels, and feed
//! channel events back into the [`SubscriptionManager`].

#![deny(missing_docs)]

mod client;
mod command;
pub mod decode;
mod diagnostic;
mod envelope;
mod errors;
mod model;
pub mod patch;
mod subscription;
pub mod telemetry;
mod transport;
mod update;

pub use client::{ModelServerClient, ReadAs, ReadOutcome, ServerConfiguration};
pub use command::{COMMAND, Command, CommandKind, CompoundCommand, CustomCommand, FeatureChange};
pub use decode::{DecodeError, TypeGuard};
pub use diagnostic::{DIAGNOSTIC, Diagnostic, Severity, SeverityLabel, worst_of};
pub use envelope::{Envelope, MessageKind, ServerFailure};
pub use errors::{ModelServerError, Operation};
pub use model::{ID_KEY, Model, ModelElement, ModelReference, REF_KEY, TYPE_KEY};
pub use modelserver_config::{ApiVersion, Config, Format};
pub use patch::{PatchError, PatchOperation, apply_patch};
pub use subscription::{
    ChannelState, CloseNotification, CommandExecutionResult, ErrorNotification, ExecutionKind,
    FullModel, IncrementalUpdate, Notification, SubscriptionListener, SubscriptionManager,
    SubscriptionOptions,
};
pub use transport::{
    Channel, ChannelAddress, ChannelFactory, Method, RequestTransport, TransportError,
    WireRequest,
};
pub use update::{EditRequest, LocalPatch, UpdateResult};

#[cfg(test)]
mod tests;
