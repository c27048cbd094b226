//! Request authentication filters.
//!
//! Two middleware layers feed the same [`Principal`] extension. The bearer
//! filter is stateless: verify the header token, attach the principal, never
//! touch the response. The cookie filter additionally performs a silent
//! refresh: when the access cookie no longer verifies but a refresh cookie is
//! present, it calls `exchange()` like any other caller (same reuse and race
//! semantics) and, on success, writes the rotated pair back as cookies.
//!
//! Neither filter rejects anything; 401 decisions belong to the handlers.

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{AUTHORIZATION, COOKIE, InvalidHeaderValue, SET_COOKIE, USER_AGENT},
    },
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use super::issuer::{self, AuthError, TokenPair};
use super::principal::Principal;
use super::state::{AuthConfig, AuthState};
use super::verifier;

pub(crate) const ACCESS_COOKIE_NAME: &str = "blare_access";
pub(crate) const REFRESH_COOKIE_NAME: &str = "blare_refresh";

/// Bearer filter: `Authorization: Bearer <access-token>`.
pub async fn bearer_auth(
    State(state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_bearer_token(request.headers()) {
        if let Some(account_id) = verifier::verify_access(&state, &token).await {
            request.extensions_mut().insert(Principal { account_id });
        }
    }
    next.run(request).await
}

/// Cookie filter with silent refresh.
pub async fn cookie_auth(
    State(state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut rotated: Option<TokenPair> = None;

    if request.extensions().get::<Principal>().is_none() {
        let access = cookie_value(request.headers(), ACCESS_COOKIE_NAME);
        let refresh = cookie_value(request.headers(), REFRESH_COOKIE_NAME);

        let mut account_id = None;
        if let Some(token) = access.as_deref() {
            account_id = verifier::verify_access(&state, token).await;
        }
        if account_id.is_none() {
            if let Some(token) = refresh.as_deref() {
                let descriptor = client_descriptor(request.headers());
                match issuer::exchange(&state, token, &descriptor).await {
                    Ok(pair) => {
                        account_id = Some(pair.account_id);
                        rotated = Some(pair);
                    }
                    Err(AuthError::Internal(err)) => {
                        error!("silent refresh failed: {err:#}");
                    }
                    // Invalid/reused refresh cookie: proceed unauthenticated.
                    Err(_) => {}
                }
            }
        }
        if let Some(account_id) = account_id {
            request.extensions_mut().insert(Principal { account_id });
        }
    }

    let mut response = next.run(request).await;
    if let Some(pair) = rotated {
        match token_cookies(state.config(), &pair) {
            Ok((access_cookie, refresh_cookie)) => {
                response.headers_mut().append(SET_COOKIE, access_cookie);
                response.headers_mut().append(SET_COOKIE, refresh_cookie);
            }
            Err(err) => error!("failed to build session cookies: {err}"),
        }
    }
    response
}

/// Build the access and refresh cookies for a rotated pair. `HttpOnly`,
/// domain-scoped, `Max-Age` matching each token's TTL.
pub(crate) fn token_cookies(
    config: &AuthConfig,
    pair: &TokenPair,
) -> Result<(HeaderValue, HeaderValue), InvalidHeaderValue> {
    let access = build_cookie(
        config,
        ACCESS_COOKIE_NAME,
        &pair.access_token,
        pair.access_expires_in,
    )?;
    let refresh = build_cookie(
        config,
        REFRESH_COOKIE_NAME,
        &pair.refresh_token,
        config.refresh_ttl_seconds(),
    )?;
    Ok((access, refresh))
}

fn build_cookie(
    config: &AuthConfig,
    name: &str,
    value: &str,
    max_age: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let domain = config.cookie_domain();
    let mut cookie = format!(
        "{name}={value}; Path=/; HttpOnly; SameSite=Lax; Domain={domain}; Max-Age={max_age}"
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        // A non-ASCII Cookie header only disqualifies itself, not the scan.
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            if key.trim() == name && !val.trim().is_empty() {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}

/// Human-readable descriptor stored on the session row; not security
/// relevant.
fn client_descriptor(headers: &HeaderMap) -> String {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown client")
        .chars()
        .take(120)
        .collect()
}
