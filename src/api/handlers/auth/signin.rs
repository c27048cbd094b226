//! HTTP endpoints over the credential issuer.
//!
//! These handlers stay thin: decode the body, call the issuer, map its error
//! enum to a status. The anti-enumeration contract lives in the issuer, so
//! sign-up and sign-in answer 202 whether or not the email was known.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

use super::issuer::{self, AuthError};
use super::principal::Principal;
use super::state::AuthState;
use super::types::{
    ErrorResponse, ExchangeRequest, SessionResponse, SignInRequest, SignOutRequest,
    SignUpRequest, TokenPairResponse,
};

fn deny(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn auth_error_response(err: &AuthError) -> Response {
    match err {
        AuthError::Invalid => deny(StatusCode::UNAUTHORIZED, "invalid_credentials"),
        AuthError::Reuse => deny(StatusCode::UNAUTHORIZED, "token_reuse"),
        AuthError::Throttled => deny(StatusCode::TOO_MANY_REQUESTS, "throttled"),
        AuthError::Internal(err) => {
            error!("auth operation failed: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    request_body = SignUpRequest,
    responses(
        (status = 202, description = "Sign-in token dispatched (or silently ignored)"),
        (status = 429, description = "Account is throttled", body = ErrorResponse),
        (status = 500, description = "Token dispatch failed")
    ),
    tag = "auth"
)]
pub async fn signup(
    auth_state: Extension<Arc<AuthState>>,
    Json(request): Json<SignUpRequest>,
) -> Response {
    match issuer::initiate(
        &auth_state,
        &request.email,
        Some(&request.display_name),
        "sign-up",
    )
    .await
    {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => auth_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/signin",
    request_body = SignInRequest,
    responses(
        (status = 202, description = "Sign-in token dispatched (or silently ignored)"),
        (status = 429, description = "Account is throttled", body = ErrorResponse),
        (status = 500, description = "Token dispatch failed")
    ),
    tag = "auth"
)]
pub async fn signin(
    auth_state: Extension<Arc<AuthState>>,
    Json(request): Json<SignInRequest>,
) -> Response {
    match issuer::initiate(&auth_state, &request.email, None, "sign-in").await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => auth_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/exchange",
    request_body = ExchangeRequest,
    responses(
        (status = 200, description = "Fresh token pair", body = TokenPairResponse),
        (status = 401, description = "Invalid or reused refresh token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn exchange(
    auth_state: Extension<Arc<AuthState>>,
    Json(request): Json<ExchangeRequest>,
) -> Response {
    let descriptor = request.client_name.as_deref().unwrap_or("api client");
    match issuer::exchange(&auth_state, &request.refresh_token, descriptor).await {
        Ok(pair) => Json(TokenPairResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.access_expires_in,
        })
        .into_response(),
        Err(err) => auth_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/signout",
    request_body = SignOutRequest,
    responses(
        (status = 204, description = "Session terminated, access token revoked"),
        (status = 401, description = "Refresh token did not verify", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn signout(
    auth_state: Extension<Arc<AuthState>>,
    Json(request): Json<SignOutRequest>,
) -> Response {
    match issuer::sign_out(&auth_state, &request.refresh_token, &request.access_token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => auth_error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 401, description = "Not authenticated")
    ),
    tag = "auth"
)]
pub async fn session(principal: Principal) -> Json<SessionResponse> {
    Json(SessionResponse {
        account_id: principal.account_id.to_string(),
    })
}

#[utoipa::path(
    delete,
    path = "/v1/me",
    responses(
        (status = 204, description = "Account tombstoned, all sessions revoked"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "auth"
)]
pub async fn deactivate(
    auth_state: Extension<Arc<AuthState>>,
    principal: Principal,
) -> Response {
    if let Err(err) = auth_state.store().deactivate_account(principal.account_id).await {
        error!("failed to deactivate account: {err:#}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    match issuer::on_account_deactivated(&auth_state, principal.account_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => auth_error_response(&err),
    }
}
