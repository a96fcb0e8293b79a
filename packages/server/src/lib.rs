pub mod access;
pub mod builtins;
pub mod config;
pub mod document;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod quota;
pub mod repo;
pub mod routes;
pub mod runs;
pub mod session;
pub mod state;
pub mod utils;

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable as ScalarServable};
use utoipa_swagger_ui::SwaggerUi;

use crate::extractors::IDENTITY_HEADER;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Polygon Problem Authoring API",
        version = "1.0.0",
        description = "API for authoring, testing and publishing competitive programming problems"
    ),
    tags(
        (name = "Problems", description = "Canonical problems and access control"),
        (name = "Sessions", description = "Per-user editing sessions"),
        (name = "Cases", description = "Test case management within a session"),
        (name = "Programs", description = "Checker, validator, generator and solution sources"),
        (name = "Statements", description = "Problem statement texts"),
        (name = "Files", description = "Auxiliary session files"),
        (name = "Runs", description = "Queued executions against a session"),
    ),
    modifiers(&SecurityAddon),
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "identity",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(IDENTITY_HEADER))),
        );
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api", routes::api_routes(&state.config))
        .split_for_parts();

    router
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api.clone()))
        .merge(Scalar::with_url("/scalar", api))
}
