//! Auth configuration and shared state.
//!
//! `AuthState` is built once at process start and passed by reference into the
//! issuer, the verifier, and the filters; the revocation caches live here so
//! there is no hidden global mutable state.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::revocation::RevocationCache;
use super::storage::AuthStore;
use super::tokens::TokenCodec;
use crate::api::email::SignInSender;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_SIGNIN_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_MAX_THROTTLE_DELAY_SECONDS: u64 = 15 * 60;
const DEFAULT_REVOCATION_CACHE_CAPACITY: usize = 10_000;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    signin_ttl_seconds: i64,
    max_throttle_delay_seconds: u64,
    revocation_cache_capacity: usize,
    cookie_domain: String,
    cookie_secure: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(cookie_domain: String) -> Self {
        Self {
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            signin_ttl_seconds: DEFAULT_SIGNIN_TTL_SECONDS,
            max_throttle_delay_seconds: DEFAULT_MAX_THROTTLE_DELAY_SECONDS,
            revocation_cache_capacity: DEFAULT_REVOCATION_CACHE_CAPACITY,
            cookie_domain,
            cookie_secure: true,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_signin_ttl_seconds(mut self, seconds: i64) -> Self {
        self.signin_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_max_throttle_delay_seconds(mut self, seconds: u64) -> Self {
        self.max_throttle_delay_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_revocation_cache_capacity(mut self, capacity: usize) -> Self {
        self.revocation_cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn signin_ttl_seconds(&self) -> i64 {
        self.signin_ttl_seconds
    }

    #[must_use]
    pub fn max_throttle_delay(&self) -> Duration {
        Duration::from_secs(self.max_throttle_delay_seconds)
    }

    #[must_use]
    pub fn revocation_cache_capacity(&self) -> usize {
        self.revocation_cache_capacity
    }

    #[must_use]
    pub fn cookie_domain(&self) -> &str {
        &self.cookie_domain
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    /// Revocation entries need never outlive an access token.
    fn revocation_ttl(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.access_ttl_seconds).unwrap_or(0))
    }
}

pub struct AuthState {
    config: AuthConfig,
    codec: TokenCodec,
    store: Arc<dyn AuthStore>,
    sender: Arc<dyn SignInSender>,
    revoked_tokens: RevocationCache<String>,
    deactivated_accounts: RevocationCache<Uuid>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        codec: TokenCodec,
        store: Arc<dyn AuthStore>,
        sender: Arc<dyn SignInSender>,
    ) -> Self {
        let ttl = config.revocation_ttl();
        let capacity = config.revocation_cache_capacity();
        Self {
            config,
            codec,
            store,
            sender,
            revoked_tokens: RevocationCache::new(ttl, capacity),
            deactivated_accounts: RevocationCache::new(ttl, capacity),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub(crate) fn store(&self) -> &dyn AuthStore {
        self.store.as_ref()
    }

    pub(crate) fn sender(&self) -> &dyn SignInSender {
        self.sender.as_ref()
    }

    pub(crate) fn revoked_tokens(&self) -> &RevocationCache<String> {
        &self.revoked_tokens
    }

    pub(crate) fn deactivated_accounts(&self) -> &RevocationCache<Uuid> {
        &self.deactivated_accounts
    }
}
