//! Log line formats for hosts that let the client install telemetry.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output format of the subscriber installed by `modelserver_client::telemetry`.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event with fields flattened.
    #[default]
    Json,
    /// Single-line text for terminals.
    Compact,
}

impl LogFormat {
    /// Whether events are emitted as machine-readable records.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Error returned when a [`LogFormat`] literal is not recognised.
pub type LogFormatParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("Compact", LogFormat::Compact)]
    fn parses_log_formats(#[case] input: &str, #[case] expected: LogFormat) {
        let parsed: LogFormat = input.parse().expect("log format should parse");
        assert_eq!(parsed, expected);
    }

    #[rstest]
    fn rejects_unknown_log_formats() {
        assert!("pretty".parse::<LogFormat>().is_err());
    }

    #[rstest]
    fn only_json_is_structured() {
        assert!(LogFormat::Json.is_structured());
        assert!(!LogFormat::Compact.is_structured());
    }
}
