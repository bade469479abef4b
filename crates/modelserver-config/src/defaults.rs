//! Fallback values applied when a configuration layer leaves a field unset.

use crate::format::{ApiVersion, Format};
use crate::logging::LogFormat;

/// Default model server endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8081/";

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default model server endpoint.
#[must_use]
pub const fn default_base_url() -> &'static str {
    DEFAULT_BASE_URL
}

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default wire format for reads and subscriptions.
#[must_use]
pub const fn default_format() -> Format {
    Format::Json
}

/// Default protocol revision.
#[must_use]
pub const fn default_api_version() -> ApiVersion {
    ApiVersion::V2
}
