//! OpenAPI document for the auth surface.

use utoipa::OpenApi;

use super::handlers::{auth, health};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::signin::signup,
        auth::signin::signin,
        auth::signin::exchange,
        auth::signin::signout,
        auth::signin::session,
        auth::signin::deactivate,
    ),
    components(schemas(
        health::Health,
        auth::types::SignUpRequest,
        auth::types::SignInRequest,
        auth::types::ExchangeRequest,
        auth::types::TokenPairResponse,
        auth::types::SignOutRequest,
        auth::types::SessionResponse,
        auth::types::ErrorResponse,
    )),
    tags(
        (name = "auth", description = "Sessions, token rotation, and revocation"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
