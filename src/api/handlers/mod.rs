//! HTTP handlers for the auth surface and service plumbing.

pub(crate) mod auth;
pub(crate) mod health;
