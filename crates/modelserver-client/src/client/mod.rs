//! Typed request/response client.
//!
//! Every operation follows the same pipeline: build a [`WireRequest`] from
//! the route table, execute it through the [`RequestTransport`], narrow the
//! body into an [`Envelope`], turn error envelopes into
//! [`ModelServerError::Server`], and decode `data` into the operation's
//! result type.

pub(crate) mod paths;
mod read;

use modelserver_config::{ApiVersion, Config, Format};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use url::Url;

use self::paths::{ELEMENT_ID, ELEMENT_NAME, FORMAT, MODEL_URI, Route, SCHEMA_NAME};
pub use self::read::{ReadAs, ReadOutcome};
use crate::decode::{self, DecodeError};
use crate::diagnostic::{DIAGNOSTIC, Diagnostic};
use crate::envelope::Envelope;
use crate::errors::{ModelServerError, Operation};
use crate::model::Model;
use crate::transport::{Method, RequestTransport, WireRequest};
use crate::update::{EditRequest, UpdateResult};

/// Tracing target for request/response activity.
pub(crate) const CLIENT_TARGET: &str = "modelserver_client::client";

/// Server-side settings applied by [`ModelServerClient::configure`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfiguration {
    /// Workspace the server loads models from.
    pub workspace_root: String,
    /// Folder holding UI schemas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_schema_folder: Option<String>,
}

/// Client for the model server's request/response API.
#[derive(Debug)]
pub struct ModelServerClient<T> {
    transport: T,
    base_url: Url,
    api_version: ApiVersion,
    default_format: Format,
}

impl<T: RequestTransport> ModelServerClient<T> {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError::Config`] when the base URL is invalid.
    pub fn new(transport: T, config: &Config) -> Result<Self, ModelServerError> {
        Ok(Self {
            transport,
            base_url: config.base_url()?,
            api_version: config.api_version(),
            default_format: config.default_format(),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// API version whose routes the client uses.
    #[must_use]
    pub const fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    /// Format used when a call does not name one.
    #[must_use]
    pub const fn default_format(&self) -> Format {
        self.default_format
    }

    /// Changes the format used when a call does not name one.
    pub const fn set_default_format(&mut self, format: Format) {
        self.default_format = format;
    }

    /// Underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Reads a model in the default format.
    ///
    /// # Errors
    ///
    /// See [`ModelServerClient::get_model_as`].
    pub fn get_model(&self, modeluri: &str) -> Result<ReadOutcome<Value>, ModelServerError> {
        self.get_model_as(modeluri, ReadAs::Default)
    }

    /// Reads a model as an object, text, or a guarded type.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport, server, or decode failure.
    pub fn get_model_as<R: DeserializeOwned>(
        &self,
        modeluri: &str,
        read_as: ReadAs<R>,
    ) -> Result<ReadOutcome<R>, ModelServerError> {
        let format = read_as.format(self.default_format);
        let request = self
            .request(Method::Get, Route::Models)
            .with_query(MODEL_URI, modeluri)
            .with_query(FORMAT, format.as_str());
        let envelope = self.execute(Operation::GetModel, &request)?;
        decoded(Operation::GetModel, &envelope, |data| {
            read::interpret(data, &read_as, format)
        })
    }

    /// Reads the element with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport, server, or decode failure.
    pub fn get_model_element_by_id<R: DeserializeOwned>(
        &self,
        modeluri: &str,
        element_id: &str,
        read_as: ReadAs<R>,
    ) -> Result<ReadOutcome<R>, ModelServerError> {
        self.get_element(modeluri, (ELEMENT_ID, element_id), read_as)
    }

    /// Reads the first element with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport, server, or decode failure.
    pub fn get_model_element_by_name<R: DeserializeOwned>(
        &self,
        modeluri: &str,
        element_name: &str,
        read_as: ReadAs<R>,
    ) -> Result<ReadOutcome<R>, ModelServerError> {
        self.get_element(modeluri, (ELEMENT_NAME, element_name), read_as)
    }

    fn get_element<R: DeserializeOwned>(
        &self,
        modeluri: &str,
        (key, value): (&str, &str),
        read_as: ReadAs<R>,
    ) -> Result<ReadOutcome<R>, ModelServerError> {
        let format = read_as.format(self.default_format);
        let request = self
            .request(Method::Get, Route::ModelElement)
            .with_query(MODEL_URI, modeluri)
            .with_query(key, value)
            .with_query(FORMAT, format.as_str());
        let envelope = self.execute(Operation::GetElement, &request)?;
        decoded(Operation::GetElement, &envelope, |data| {
            read::interpret(data, &read_as, format)
        })
    }

    /// Reads every model known to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport, server, or decode failure.
    pub fn get_all(&self, format: Option<Format>) -> Result<Vec<Model>, ModelServerError> {
        let request = self
            .request(Method::Get, Route::Models)
            .with_query(FORMAT, self.format_or_default(format));
        let envelope = self.execute(Operation::GetAll, &request)?;
        decoded(Operation::GetAll, &envelope, decode::as_model_array)
    }

    /// Lists the identifiers of every model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport, server, or decode failure.
    pub fn get_model_uris(&self) -> Result<Vec<String>, ModelServerError> {
        let request = self.request(Method::Get, Route::ModelUris);
        let envelope = self.execute(Operation::GetModelUris, &request)?;
        decoded(Operation::GetModelUris, &envelope, decode::as_string_array)
    }

    /// Creates a model and returns the stored content.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport, server, or decode failure.
    pub fn create(
        &self,
        modeluri: &str,
        model: &Value,
        format: Option<Format>,
    ) -> Result<Map<String, Value>, ModelServerError> {
        let request = self
            .request(Method::Post, Route::Models)
            .with_query(MODEL_URI, modeluri)
            .with_query(FORMAT, self.format_or_default(format))
            .with_body(body(model.clone()));
        let envelope = self.execute(Operation::Create, &request)?;
        decoded(Operation::Create, &envelope, decode::as_object)
    }

    /// Replaces a model and returns the stored content.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport, server, or decode failure.
    pub fn update(
        &self,
        modeluri: &str,
        model: &Value,
        format: Option<Format>,
    ) -> Result<Map<String, Value>, ModelServerError> {
        let request = self
            .request(paths::update_method(self.api_version), Route::Models)
            .with_query(MODEL_URI, modeluri)
            .with_query(FORMAT, self.format_or_default(format))
            .with_body(body(model.clone()));
        let envelope = self.execute(Operation::Update, &request)?;
        decoded(Operation::Update, &envelope, decode::as_object)
    }

    /// Deletes a model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport or server failure.
    pub fn delete(&self, modeluri: &str) -> Result<bool, ModelServerError> {
        self.acknowledge(Operation::Delete, Method::Delete, Route::Models, Some(modeluri))
    }

    /// Closes a model, discarding unsaved changes.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport or server failure.
    pub fn close(&self, modeluri: &str) -> Result<bool, ModelServerError> {
        self.acknowledge(Operation::Close, Method::Post, Route::Close, Some(modeluri))
    }

    /// Saves a model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport or server failure.
    pub fn save(&self, modeluri: &str) -> Result<bool, ModelServerError> {
        self.acknowledge(Operation::Save, Method::Get, Route::Save, Some(modeluri))
    }

    /// Saves every model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport or server failure.
    pub fn save_all(&self) -> Result<bool, ModelServerError> {
        self.acknowledge(Operation::SaveAll, Method::Get, Route::SaveAll, None)
    }

    /// Validates a model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport, server, or decode failure.
    pub fn validate(&self, modeluri: &str) -> Result<Diagnostic, ModelServerError> {
        let request = self
            .request(Method::Get, Route::Validation)
            .with_query(MODEL_URI, modeluri);
        let envelope = self.execute(Operation::Validate, &request)?;
        decoded(Operation::Validate, &envelope, |data| {
            decode::decode(data, &DIAGNOSTIC)
        })
    }

    /// Reads the validation constraints of a model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport, server, or decode failure.
    pub fn get_validation_constraints(&self, modeluri: &str) -> Result<String, ModelServerError> {
        self.read_text(
            Operation::GetValidationConstraints,
            Route::ValidationConstraints,
            (MODEL_URI, modeluri),
        )
    }

    /// Reads the JSON schema of a model's types.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport, server, or decode failure.
    pub fn get_type_schema(&self, modeluri: &str) -> Result<String, ModelServerError> {
        self.read_text(Operation::GetTypeSchema, Route::TypeSchema, (MODEL_URI, modeluri))
    }

    /// Reads a named UI schema.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport, server, or decode failure.
    pub fn get_ui_schema(&self, schema_name: &str) -> Result<String, ModelServerError> {
        self.read_text(Operation::GetUiSchema, Route::UiSchema, (SCHEMA_NAME, schema_name))
    }

    /// Applies server-side settings.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on encode, transport, or server failure.
    pub fn configure(&self, configuration: &ServerConfiguration) -> Result<bool, ModelServerError> {
        let request = self
            .request(Method::Put, Route::Configure)
            .with_body(body(serde_json::to_value(configuration)?));
        let envelope = self.execute(Operation::Configure, &request)?;
        Ok(envelope.is_success())
    }

    /// Checks that the server is alive.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport or server failure.
    pub fn ping(&self) -> Result<bool, ModelServerError> {
        self.acknowledge(Operation::Ping, Method::Get, Route::Ping, None)
    }

    /// Applies a command or a patch list.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on encode, transport, or server failure.
    pub fn edit(
        &self,
        modeluri: &str,
        edit: impl Into<EditRequest>,
    ) -> Result<UpdateResult, ModelServerError> {
        let request_body = edit.into();
        let payload = match (&request_body, self.api_version) {
            (EditRequest::Command(command), ApiVersion::V1) => command.to_value()?,
            _ => request_body.to_value()?,
        };
        let request = self
            .request(Method::Patch, Route::Edit)
            .with_query(MODEL_URI, modeluri)
            .with_query(FORMAT, self.default_format.as_str())
            .with_body(body(payload));
        let envelope = self.execute(Operation::Edit, &request)?;
        Ok(UpdateResult::from_envelope(&envelope))
    }

    /// Undoes the last edit of a model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport or server failure.
    pub fn undo(&self, modeluri: &str) -> Result<UpdateResult, ModelServerError> {
        self.replay(Operation::Undo, Route::Undo, modeluri)
    }

    /// Redoes the last undone edit of a model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] on transport or server failure.
    pub fn redo(&self, modeluri: &str) -> Result<UpdateResult, ModelServerError> {
        self.replay(Operation::Redo, Route::Redo, modeluri)
    }

    fn replay(
        &self,
        operation: Operation,
        route: Route,
        modeluri: &str,
    ) -> Result<UpdateResult, ModelServerError> {
        let request = self
            .request(Method::Get, route)
            .with_query(MODEL_URI, modeluri);
        let envelope = self.execute(operation, &request)?;
        Ok(UpdateResult::from_envelope(&envelope))
    }

    fn acknowledge(
        &self,
        operation: Operation,
        method: Method,
        route: Route,
        modeluri: Option<&str>,
    ) -> Result<bool, ModelServerError> {
        let mut request = self.request(method, route);
        if let Some(uri) = modeluri {
            request = request.with_query(MODEL_URI, uri);
        }
        let envelope = self.execute(operation, &request)?;
        Ok(envelope.is_success())
    }

    fn read_text(
        &self,
        operation: Operation,
        route: Route,
        (key, value): (&str, &str),
    ) -> Result<String, ModelServerError> {
        let request = self.request(Method::Get, route).with_query(key, value);
        let envelope = self.execute(operation, &request)?;
        decoded(operation, &envelope, decode::as_text)
    }

    fn format_or_default(&self, format: Option<Format>) -> &'static str {
        format.unwrap_or(self.default_format).as_str()
    }

    fn request(&self, method: Method, route: Route) -> WireRequest {
        WireRequest::new(method, route.path(self.api_version))
    }

    fn execute(
        &self,
        operation: Operation,
        request: &WireRequest,
    ) -> Result<Envelope, ModelServerError> {
        debug!(
            target: CLIENT_TARGET,
            %operation,
            method = %request.method,
            path = %request.path,
            modeluri = request.query_value(MODEL_URI),
            "sending request"
        );

        let envelope = match self.transport.execute(request) {
            Ok(body) => Envelope::from_value(&body)
                .map_err(|source| ModelServerError::decode(operation, source))?,
            Err(error) => {
                let reported = error
                    .body()
                    .and_then(|body| Envelope::from_value(body).ok())
                    .filter(Envelope::is_error);
                match reported {
                    Some(envelope) => envelope,
                    None => {
                        warn!(
                            target: CLIENT_TARGET,
                            %operation,
                            error = %error,
                            code = error.code(),
                            "transport failed"
                        );
                        return Err(ModelServerError::transport(operation, error));
                    }
                }
            }
        };

        if let Some(failure) = envelope.failure() {
            debug!(
                target: CLIENT_TARGET,
                %operation,
                message = %failure.message,
                "server reported an error"
            );
            return Err(ModelServerError::server(
                operation,
                failure.message,
                failure.code,
            ));
        }
        Ok(envelope)
    }
}

fn decoded<R>(
    operation: Operation,
    envelope: &Envelope,
    decoder: impl FnOnce(&Value) -> Result<R, DecodeError>,
) -> Result<R, ModelServerError> {
    envelope
        .map_data(decoder)
        .map_err(|source| ModelServerError::decode(operation, source))
}

fn body(payload: Value) -> Value {
    json!({ "data": payload })
}
