//! # Blare (Sound Catalog API Backend)
//!
//! `blare` is the API backend for a community sound catalog. This crate holds
//! the session and credential core: passwordless sign-in over email tokens,
//! refresh-token rotation with reuse detection, and access verification for
//! the HTTP surface.
//!
//! ## Sessions
//!
//! Every sign-in creates one session row that is advanced in place on each
//! refresh. The row carries a sequence number mirrored inside the refresh
//! token; replaying a stale token revokes the whole lineage.
//!
//! - **Anti-enumeration:** Sign-in with an unknown email reports success, and
//!   deactivated accounts are indistinguishable from absent ones.
//! - **Throttling:** Incomplete sign-in attempts back off exponentially per
//!   account, capped by configuration.
//! - **Cookies:** Browser clients carry the token pair in two `HttpOnly`
//!   cookies that are refreshed silently by the cookie filter.

pub mod api;
pub mod cli;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
