//! Wire-level selectors shared by requests and subscriptions.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Serialisation format requested from the model server.
///
/// The value travels as the `format` query parameter on reads, writes and
/// subscriptions.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[strum(ascii_case_insensitive)]
pub enum Format {
    /// Plain JSON with path-style object references.
    #[default]
    #[serde(rename = "json")]
    #[strum(serialize = "json")]
    Json,
    /// JSON with stable `$id` element identifiers.
    #[serde(rename = "json-v2")]
    #[strum(serialize = "json-v2")]
    JsonV2,
    /// XMI serialisation, returned to callers as text.
    #[serde(rename = "xml")]
    #[strum(serialize = "xml")]
    Xml,
}

impl Format {
    /// Returns the literal used in query parameters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::JsonV2 => "json-v2",
            Self::Xml => "xml",
        }
    }

    /// Whether payloads in this format decode to JSON objects.
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json | Self::JsonV2)
    }
}

/// Errors encountered while parsing a [`Format`] from text.
pub type FormatParseError = strum::ParseError;

/// Protocol revision spoken by the model server.
///
/// `V2` is patch-based and embeds model identifiers in notifications; `V1`
/// reports edits as command executions and is kept for older servers.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ApiVersion {
    /// Command-execution based protocol.
    V1,
    /// Patch based protocol.
    #[default]
    V2,
}

impl ApiVersion {
    /// Path segment prefixed to every endpoint, including the trailing slash.
    #[must_use]
    pub const fn base_path(self) -> &'static str {
        match self {
            Self::V1 => "api/v1/",
            Self::V2 => "api/v2/",
        }
    }
}
