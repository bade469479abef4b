//! Seams to the host application's HTTP and WebSocket stacks.
//!
//! The client never opens sockets itself. A [`RequestTransport`] executes
//! one request and hands back the decoded JSON body; a [`ChannelFactory`]
//! opens the bidirectional channel used by subscriptions. Both are blocking
//! and shareable across threads.

use std::error::Error;
use std::fmt;

use serde_json::Value;
use thiserror::Error;
use url::Url;

/// HTTP verb of a wire request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Upper-case verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Request handed to a [`RequestTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    /// HTTP verb.
    pub method: Method,
    /// Path relative to the configured base URL, e.g. `api/v2/models`.
    pub path: String,
    /// Query parameters in insertion order.
    pub query: Vec<(String, String)>,
    /// JSON body, when the verb carries one.
    pub body: Option<Value>,
}

impl WireRequest {
    /// Builds a request without query parameters or body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attaches a JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of the first query parameter named `key`.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Resolves the request against `base`, encoding the query string.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] when the path cannot be joined onto `base`.
    pub fn url(&self, base: &Url) -> Result<Url, url::ParseError> {
        let mut url = base.join(&self.path)?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        Ok(url)
    }
}

/// Failure reported by a transport.
///
/// `body` carries whatever JSON the server sent alongside a failure status so
/// the client can still surface an error envelope.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    code: Option<i64>,
    body: Option<Value>,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl TransportError {
    /// Builds an error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            body: None,
            source: None,
        }
    }

    /// Attaches a status or close code.
    #[must_use]
    pub const fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    /// Attaches the response body received with the failure.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Wraps an underlying error.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Status or close code, if known.
    #[must_use]
    pub const fn code(&self) -> Option<i64> {
        self.code
    }

    /// Response body received with the failure.
    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// Executes request/response calls against the model server.
pub trait RequestTransport: Send + Sync {
    /// Sends `request` and returns the decoded JSON response body.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response body could be obtained.
    fn execute(&self, request: &WireRequest) -> Result<Value, TransportError>;
}

/// Where a subscription channel connects to.
///
/// Each registration gets a fresh `generation`. Transports echo the address
/// back with every channel event so events from a superseded channel for the
/// same model are told apart from the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAddress {
    modeluri: String,
    url: Url,
    generation: u64,
}

impl ChannelAddress {
    /// Pairs a model identifier and registration generation with the socket
    /// URL serving it.
    #[must_use]
    pub fn new(modeluri: impl Into<String>, url: Url, generation: u64) -> Self {
        Self {
            modeluri: modeluri.into(),
            url,
            generation,
        }
    }

    /// Subscribed model.
    #[must_use]
    pub fn modeluri(&self) -> &str {
        self.modeluri.as_str()
    }

    /// Socket URL including the subscription query.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Registration the channel belongs to.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// Open bidirectional text channel.
pub trait Channel: Send {
    /// Writes one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the frame cannot be written.
    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Closes the channel.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the close handshake fails.
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens subscription channels.
///
/// Implementations report channel lifecycle events back to the
/// [`crate::SubscriptionManager`] that requested the channel, passing the
/// [`ChannelAddress`] given to `open`. Reporting may happen synchronously
/// from inside [`Channel::send`] or [`Channel::close`].
pub trait ChannelFactory: Send + Sync {
    /// Starts connecting to `address`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the connection cannot be initiated.
    fn open(&self, address: &ChannelAddress) -> Result<Box<dyn Channel>, TransportError>;
}
