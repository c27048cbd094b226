//! Access token verification: codec first, then the revocation caches.

use uuid::Uuid;

use super::state::AuthState;

/// Resolve an access token to its account id.
///
/// The cryptographic check runs first because it needs no I/O; only tokens
/// that pass it are looked up in the revoked-token and deactivated-account
/// caches.
pub async fn verify_access(state: &AuthState, token: &str) -> Option<Uuid> {
    let claims = state.codec().verify_access(token)?;
    if state.revoked_tokens().contains(token).await {
        return None;
    }
    if state.deactivated_accounts().contains(&claims.sub).await {
        return None;
    }
    Some(claims.sub)
}
