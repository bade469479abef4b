//! Endpoint table for both API versions.

use modelserver_config::ApiVersion;

use crate::transport::Method;

/// Query key naming the addressed model.
pub(crate) const MODEL_URI: &str = "modeluri";
/// Query key naming the response format.
pub(crate) const FORMAT: &str = "format";
pub(crate) const ELEMENT_ID: &str = "elementid";
pub(crate) const ELEMENT_NAME: &str = "elementname";
pub(crate) const SCHEMA_NAME: &str = "schemaname";

/// Server endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    Models,
    ModelElement,
    ModelUris,
    TypeSchema,
    UiSchema,
    Configure,
    Ping,
    Subscribe,
    Edit,
    Close,
    Save,
    SaveAll,
    Undo,
    Redo,
    Validation,
    ValidationConstraints,
}

impl Route {
    const fn segment(self, version: ApiVersion) -> &'static str {
        match (self, version) {
            (Self::Models, _) | (Self::Edit, ApiVersion::V2) => "models",
            (Self::Edit, ApiVersion::V1) => "edit",
            (Self::ModelElement, _) => "modelelement",
            (Self::ModelUris, _) => "modeluris",
            (Self::TypeSchema, _) => "typeschema",
            (Self::UiSchema, _) => "uischema",
            (Self::Configure, _) => "server/configure",
            (Self::Ping, _) => "server/ping",
            (Self::Subscribe, _) => "subscribe",
            (Self::Close, _) => "close",
            (Self::Save, _) => "save",
            (Self::SaveAll, _) => "saveall",
            (Self::Undo, _) => "undo",
            (Self::Redo, _) => "redo",
            (Self::Validation, _) => "validation",
            (Self::ValidationConstraints, _) => "validation/constraints",
        }
    }

    /// Path relative to the base URL, e.g. `api/v2/models`.
    pub(crate) fn path(self, version: ApiVersion) -> String {
        format!("{}{}", version.base_path(), self.segment(version))
    }
}

/// Verb used to replace a whole model.
pub(crate) const fn update_method(version: ApiVersion) -> Method {
    match version {
        ApiVersion::V1 => Method::Patch,
        ApiVersion::V2 => Method::Put,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Route::Models, ApiVersion::V1, "api/v1/models")]
    #[case(Route::Edit, ApiVersion::V1, "api/v1/edit")]
    #[case(Route::Edit, ApiVersion::V2, "api/v2/models")]
    #[case(Route::Ping, ApiVersion::V2, "api/v2/server/ping")]
    #[case(Route::ValidationConstraints, ApiVersion::V2, "api/v2/validation/constraints")]
    #[case(Route::SaveAll, ApiVersion::V1, "api/v1/saveall")]
    fn resolves_versioned_paths(
        #[case] route: Route,
        #[case] version: ApiVersion,
        #[case] expected: &str,
    ) {
        assert_eq!(route.path(version), expected);
    }

    #[rstest]
    fn update_verb_depends_on_version() {
        assert_eq!(update_method(ApiVersion::V1), Method::Patch);
        assert_eq!(update_method(ApiVersion::V2), Method::Put);
    }
}
