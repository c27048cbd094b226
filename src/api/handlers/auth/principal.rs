//! Authenticated principal attached to requests by the auth filters.

use axum::http::StatusCode;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Authenticated account context. Inserted as a request extension by the
/// bearer or cookie filter; absent means the request is unauthenticated.
#[derive(Clone, Debug)]
pub struct Principal {
    pub account_id: Uuid,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
