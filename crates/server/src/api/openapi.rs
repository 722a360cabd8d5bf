//! OpenAPI/Utoipa configuration.

use crate::api::{alerts::ALERTS_TAG, health::MISC_TAG};
use crate::session::AUTHENTICATED_EMAIL_HEADER;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

/// Documents the identity header set by the upstream auth layer.
pub struct IdentityAddon;

impl Modify for IdentityAddon {
    #[tracing::instrument(skip(self, openapi))]
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let header = ApiKey::Header(ApiKeyValue::with_description(
            AUTHENTICATED_EMAIL_HEADER,
            "Verified email of the signed-in visitor. Set by the trusted auth proxy, never by clients.",
        ));
        components.add_security_scheme("AuthenticatedEmail", SecurityScheme::ApiKey(header));
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&IdentityAddon),
    info(
        title = "Parliament Alerts API",
        version = "1.0.0",
        description = "Email alerts for politicians and saved searches of House of Commons debates."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = ALERTS_TAG, description = "Alert subscription endpoints")
    )
)]
pub struct ApiDoc;
