//! Shared fixtures for the auth test suites: an in-memory store, a recording
//! dispatch sender, and a fully wired `AuthState`.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::issuer;
use super::state::{AuthConfig, AuthState};
use super::storage::AuthStore;
use super::storage::memory::MemoryAuthStore;
use super::tokens::TokenCodec;
use crate::api::email::{SignInMessage, SignInSender};

/// Captures every dispatched sign-in token for assertions.
#[derive(Default)]
pub(crate) struct RecordingSender {
    sent: Mutex<Vec<SignInMessage>>,
}

impl RecordingSender {
    pub(crate) fn sent(&self) -> Vec<SignInMessage> {
        self.sent.lock().expect("sender lock").clone()
    }
}

#[async_trait]
impl SignInSender for RecordingSender {
    async fn send(&self, message: &SignInMessage) -> Result<()> {
        self.sent.lock().expect("sender lock").push(message.clone());
        Ok(())
    }
}

/// Simulates a dispatch outage.
pub(crate) struct FailingSender;

#[async_trait]
impl SignInSender for FailingSender {
    async fn send(&self, _message: &SignInMessage) -> Result<()> {
        Err(anyhow!("smtp relay unreachable"))
    }
}

pub(crate) struct TestHarness {
    pub(crate) state: Arc<AuthState>,
    pub(crate) store: Arc<MemoryAuthStore>,
    pub(crate) sender: Arc<RecordingSender>,
}

impl TestHarness {
    pub(crate) fn new() -> Self {
        Self::build(None)
    }

    pub(crate) fn with_sender(sender: Arc<dyn SignInSender>) -> Self {
        Self::build(Some(sender))
    }

    fn build(override_sender: Option<Arc<dyn SignInSender>>) -> Self {
        let store = Arc::new(MemoryAuthStore::new());
        let recording = Arc::new(RecordingSender::default());
        let sender: Arc<dyn SignInSender> = match override_sender {
            Some(sender) => sender,
            None => Arc::clone(&recording) as Arc<dyn SignInSender>,
        };
        let config = AuthConfig::new("sounds.example".to_string());
        let codec = TokenCodec::new(&SecretString::from(
            "a-long-enough-test-secret-for-hmac".to_string(),
        ));
        let state = Arc::new(AuthState::new(
            config,
            codec,
            Arc::clone(&store) as Arc<dyn AuthStore>,
            sender,
        ));
        Self {
            state,
            store,
            sender: recording,
        }
    }

    pub(crate) async fn account_id(&self, email: &str) -> Uuid {
        self.store
            .find_account_by_email(email)
            .await
            .expect("lookup")
            .expect("account exists")
            .id
    }

    /// Sign up a fresh account and return the created session id together with
    /// the dispatched (unredeemed) refresh token.
    pub(crate) async fn signed_up_session(&self, email: &str) -> (Uuid, String) {
        issuer::initiate(&self.state, email, Some("Tester"), "signup")
            .await
            .expect("signup");
        let message = self.sender.sent().pop().expect("token dispatched");
        let claims = self
            .state
            .codec()
            .verify_refresh(&message.token)
            .expect("dispatched token verifies");
        (claims.sid, message.token)
    }
}
