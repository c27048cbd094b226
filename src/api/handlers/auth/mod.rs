//! Session and credential management.
//!
//! One session row per login lineage, advanced in place by a sequence number
//! that is mirrored in every refresh token. Refresh tokens are single-use:
//! replaying a stale one (or losing the rotation race, which looks identical
//! from here) revokes the whole lineage across all devices.
//!
//! ## Revocation caches
//!
//! Revoked access tokens and deactivated account ids live in two bounded
//! in-memory caches whose entries expire with the access-token lifetime.
//! They are process-local; running more than one instance needs an external
//! store for immediate cross-node revocation.

pub(crate) mod filters;
pub(crate) mod issuer;
pub(crate) mod principal;
mod revocation;
pub(crate) mod signin;
mod state;
mod storage;
mod throttle;
mod tokens;
pub(crate) mod types;
mod utils;
pub(crate) mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use issuer::{AuthError, TokenPair};
pub use state::{AuthConfig, AuthState};
pub use storage::{AuthStore, PgAuthStore};
pub use tokens::TokenCodec;
