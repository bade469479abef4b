//! Shared configuration for the model server client.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then a
//! configuration file, then `MODELSERVER_*` environment variables, then
//! command-line flags. Every field is optional on the wire; accessors fall
//! back to the values in [`defaults`] so partially specified sources still
//! yield a complete configuration.

pub mod defaults;
mod format;
mod logging;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub use defaults::{
    DEFAULT_BASE_URL, DEFAULT_LOG_FILTER, default_api_version, default_base_url, default_format,
    default_log_filter, default_log_format,
};
pub use format::{ApiVersion, Format, FormatParseError};
pub use logging::{LogFormat, LogFormatParseError};

/// Client configuration resolved from all configuration layers.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "MODELSERVER")]
pub struct Config {
    /// Root URL of the model server, without the `api/vN/` suffix.
    pub base_url: Option<String>,
    /// Protocol revision used for paths and edit encoding.
    pub api_version: Option<ApiVersion>,
    /// Format requested when callers do not pick one explicitly.
    pub default_format: Option<Format>,
    /// `tracing` filter expression.
    pub log_filter: Option<String>,
    /// Output format for log lines.
    pub log_format: Option<LogFormat>,
}

impl Config {
    /// Sets the server root URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the protocol revision.
    #[must_use]
    pub const fn with_api_version(mut self, api_version: ApiVersion) -> Self {
        self.api_version = Some(api_version);
        self
    }

    /// Sets the default wire format.
    #[must_use]
    pub const fn with_default_format(mut self, format: Format) -> Self {
        self.default_format = Some(format);
        self
    }

    /// Parses the configured server root.
    ///
    /// A trailing slash is appended when missing so relative endpoint paths
    /// join beneath the root instead of replacing its last segment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] when the value is not an
    /// absolute URL.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let raw = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let normalised = if raw.ends_with('/') {
            raw.to_owned()
        } else {
            format!("{raw}/")
        };
        Url::parse(&normalised).map_err(|source| ConfigError::InvalidBaseUrl {
            value: raw.to_owned(),
            source,
        })
    }

    /// Protocol revision, defaulting to [`ApiVersion::V2`].
    #[must_use]
    pub fn api_version(&self) -> ApiVersion {
        self.api_version.unwrap_or_else(default_api_version)
    }

    /// Default wire format, defaulting to [`Format::Json`].
    #[must_use]
    pub fn default_format(&self) -> Format {
        self.default_format.unwrap_or_else(default_format)
    }

    /// Log filter expression, defaulting to [`DEFAULT_LOG_FILTER`].
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Log output format, defaulting to JSON.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }
}

/// Errors raised while interpreting configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configured base URL could not be parsed.
    #[error("invalid model server URL '{value}': {source}")]
    InvalidBaseUrl {
        /// Raw configured value.
        value: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },
}
