//! The credential issuer: issue, exchange, sign-out, revoke-all.
//!
//! Each session moves through three states: created (ordinal 0, short sign-in
//! TTL, unredeemed), active (redeemed at least once, refresh TTL), revoked
//! (expiry forced to now, terminal). Every refresh token is single-use:
//! presenting one whose sequence number lags the stored ordinal means the
//! lineage may be compromised, so the whole lineage is revoked, not just the
//! offending token. A lost CAS race is handled identically, because two
//! concurrent redemptions of the same sequence number are indistinguishable
//! from an attack from here.

use anyhow::Context;
use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::state::AuthState;
use super::storage::AdvanceOutcome;
use super::throttle;
use super::utils::{normalize_email, valid_email};
use crate::api::email::SignInMessage;

/// Pattern-matchable failures for issuer operations. `Internal` carries
/// infrastructure errors (database, dispatch); everything else is a policy
/// rejection with no side effects beyond what the variant documents.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad signature, malformed token, natural expiry, or unknown id.
    #[error("credentials are invalid or expired")]
    Invalid,
    /// Stale sequence number or lost rotation race; the lineage was revoked.
    #[error("refresh token reuse detected")]
    Reuse,
    /// The account is inside its sign-in backoff window.
    #[error("too many sign-in attempts")]
    Throttled,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// A freshly rotated credential pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub account_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub access_expires_in: i64,
}

/// Start a sign-in (or sign-up, when `new_display_name` is given).
///
/// Unknown emails succeed without creating anything so callers cannot probe
/// which addresses are registered. Known accounts are throttled first; a
/// throttled rejection does not itself count as an attempt.
///
/// # Errors
/// `Throttled` inside the backoff window; `Internal` on storage or dispatch
/// failure. A dispatch failure leaves the created session row in place.
pub async fn initiate(
    state: &AuthState,
    email: &str,
    new_display_name: Option<&str>,
    descriptor: &str,
) -> Result<(), AuthError> {
    let email = normalize_email(email);
    if !valid_email(&email) {
        // Same outward behavior as an unknown address.
        return Ok(());
    }

    let existing = state.store().find_account_by_email(&email).await?;
    let account = match (existing, new_display_name) {
        (Some(account), _) => {
            if throttle::is_blocked(
                account.incomplete_signin_attempts,
                account.last_signin_attempt_at,
                state.config().max_throttle_delay(),
                Utc::now(),
            ) {
                return Err(AuthError::Throttled);
            }
            state.store().record_signin_attempt(account.id).await?;
            account
        }
        (None, Some(display_name)) => {
            state.store().create_account(&email, display_name).await?
        }
        (None, None) => {
            debug!("sign-in for unknown email, returning silently");
            return Ok(());
        }
    };

    let ttl = state.config().signin_ttl_seconds();
    let expires_at = Utc::now() + Duration::seconds(ttl);
    let session = state
        .store()
        .create_session(account.id, descriptor, expires_at)
        .await?;
    let token = state
        .codec()
        .sign_refresh(session.id, session.created_at.timestamp(), ttl, session.ordinal)?;

    state
        .sender()
        .send(&SignInMessage {
            to_email: email,
            token,
        })
        .await
        .context("sign-in token dispatch failed")?;
    Ok(())
}

/// Redeem a refresh token: advance the session and return a fresh pair.
///
/// # Errors
/// `Invalid` for bad/expired tokens and unknown or naturally expired sessions;
/// `Reuse` for a stale sequence number or a lost rotation race, after revoking
/// the owner's entire lineage.
pub async fn exchange(
    state: &AuthState,
    refresh_token: &str,
    descriptor: &str,
) -> Result<TokenPair, AuthError> {
    let Some(claims) = state.codec().verify_refresh(refresh_token) else {
        return Err(AuthError::Invalid);
    };
    let Some(session) = state.store().load_session(claims.sid).await? else {
        return Err(AuthError::Invalid);
    };
    let now = Utc::now();
    if session.expires_at <= now {
        return Err(AuthError::Invalid);
    }

    if claims.seq != session.ordinal {
        let revoked = state
            .store()
            .revoke_sessions_for_account(session.account_id)
            .await?;
        warn!(
            account_id = %session.account_id,
            session_id = %session.id,
            presented_seq = claims.seq,
            stored_seq = session.ordinal,
            revoked,
            "refresh token reuse detected, lineage revoked"
        );
        return Err(AuthError::Reuse);
    }

    let refresh_ttl = state.config().refresh_ttl_seconds();
    let new_expires_at = now + Duration::seconds(refresh_ttl);
    let session = match state
        .store()
        .advance_session(session.id, session.version, new_expires_at, descriptor)
        .await?
    {
        AdvanceOutcome::Advanced(session) => session,
        AdvanceOutcome::VersionConflict => {
            // Fail closed: a concurrent redemption of the same sequence
            // number gets the same treatment as a replay.
            let revoked = state
                .store()
                .revoke_sessions_for_account(session.account_id)
                .await?;
            warn!(
                account_id = %session.account_id,
                session_id = %session.id,
                revoked,
                "concurrent redemption lost the rotation race, lineage revoked"
            );
            return Err(AuthError::Reuse);
        }
    };

    let refresh_token = state.codec().sign_refresh(
        session.id,
        now.timestamp(),
        refresh_ttl,
        session.ordinal,
    )?;
    let access_expires_in = state.config().access_ttl_seconds();
    let access_token = state
        .codec()
        .sign_access(session.account_id, access_expires_in)?;

    state
        .store()
        .reset_signin_attempts(session.account_id)
        .await?;

    Ok(TokenPair {
        account_id: session.account_id,
        access_token,
        refresh_token,
        access_expires_in,
    })
}

/// Terminate one session and immediately revoke its access token.
///
/// Deliberately not idempotent for the access token: resubmitting it after
/// sign-out hits the revocation cache until its natural expiry.
///
/// # Errors
/// `Invalid` if the refresh token does not verify.
pub async fn sign_out(
    state: &AuthState,
    refresh_token: &str,
    access_token: &str,
) -> Result<(), AuthError> {
    let Some(claims) = state.codec().verify_refresh(refresh_token) else {
        return Err(AuthError::Invalid);
    };
    state.store().delete_session(claims.sid).await?;
    state.revoked_tokens().insert(access_token.to_string()).await;
    Ok(())
}

/// React to an account tombstone: kill every lineage and poison the cache so
/// already-issued access tokens die before their natural expiry.
///
/// # Errors
/// `Internal` on storage failure.
pub async fn on_account_deactivated(state: &AuthState, account_id: Uuid) -> Result<(), AuthError> {
    state
        .store()
        .revoke_sessions_for_account(account_id)
        .await?;
    state.deactivated_accounts().insert(account_id).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::storage::AuthStore;
    use super::super::test_support::{FailingSender, RecordingSender, TestHarness};
    use super::super::verifier;
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn signup_creates_account_and_dispatches_token() {
        let harness = TestHarness::new();
        initiate(&harness.state, "Alice@Example.com ", Some("Alice"), "signup")
            .await
            .expect("signup");

        let account = harness
            .store
            .find_account_by_email("alice@example.com")
            .await
            .expect("lookup")
            .expect("account exists");
        assert_eq!(account.display_name, "Alice");
        assert_eq!(harness.sender.sent().len(), 1);
        assert_eq!(harness.sender.sent()[0].to_email, "alice@example.com");
        assert_eq!(harness.store.session_count(), 1);
    }

    #[tokio::test]
    async fn signup_for_registered_email_still_succeeds_and_redispatches() {
        let harness = TestHarness::new();
        initiate(&harness.state, "bob@example.com", Some("Bob"), "signup")
            .await
            .expect("first signup");
        initiate(&harness.state, "bob@example.com", Some("Bob"), "signup")
            .await
            .expect("repeat signup");

        // Indistinguishable success, one fresh token per call.
        assert_eq!(harness.sender.sent().len(), 2);
        assert_eq!(harness.store.session_count(), 2);
    }

    #[tokio::test]
    async fn signin_for_unknown_email_is_a_silent_success() {
        let harness = TestHarness::new();
        initiate(&harness.state, "ghost@example.com", None, "signin")
            .await
            .expect("silent success");
        assert!(harness.sender.sent().is_empty());
        assert_eq!(harness.store.session_count(), 0);
    }

    #[tokio::test]
    async fn throttled_account_is_rejected_without_counting_an_attempt() {
        let harness = TestHarness::new();
        initiate(&harness.state, "carol@example.com", Some("Carol"), "signup")
            .await
            .expect("signup");
        let account_id = harness.account_id("carol@example.com").await;

        // Several recorded attempts put the account deep inside its window.
        for _ in 0..6 {
            harness
                .store
                .record_signin_attempt(account_id)
                .await
                .expect("bump attempts");
        }
        let attempts_before = harness
            .store
            .account(account_id)
            .expect("account")
            .incomplete_signin_attempts;

        let err = initiate(&harness.state, "carol@example.com", None, "signin")
            .await
            .expect_err("inside backoff window");
        assert!(matches!(err, AuthError::Throttled));
        let attempts_after = harness
            .store
            .account(account_id)
            .expect("account")
            .incomplete_signin_attempts;
        assert_eq!(attempts_before, attempts_after);
    }

    #[tokio::test]
    async fn sequence_equals_number_of_exchanges() {
        let harness = TestHarness::new();
        let (session_id, mut refresh) = harness.signed_up_session("dave@example.com").await;

        for expected in 1..=5 {
            let pair = exchange(&harness.state, &refresh, "web")
                .await
                .expect("exchange");
            refresh = pair.refresh_token;
            let session = harness.store.session(session_id).expect("session");
            assert_eq!(session.ordinal, expected);
        }
    }

    #[tokio::test]
    async fn first_exchange_promotes_session_to_refresh_ttl() {
        let harness = TestHarness::new();
        let (session_id, refresh) = harness.signed_up_session("erin@example.com").await;
        let before = harness.store.session(session_id).expect("session");

        exchange(&harness.state, &refresh, "web")
            .await
            .expect("exchange");
        let after = harness.store.session(session_id).expect("session");
        assert!(after.expires_at > before.expires_at);
    }

    #[tokio::test]
    async fn replayed_refresh_token_kills_the_whole_lineage() {
        let harness = TestHarness::new();
        let (_, refresh) = harness.signed_up_session("frank@example.com").await;

        let pair = exchange(&harness.state, &refresh, "web")
            .await
            .expect("first redemption");

        // Second presentation of the already-spent token.
        let err = exchange(&harness.state, &refresh, "web")
            .await
            .expect_err("replay");
        assert!(matches!(err, AuthError::Reuse));

        // The token issued on first redemption is dead too.
        let err = exchange(&harness.state, &pair.refresh_token, "web")
            .await
            .expect_err("lineage revoked");
        assert!(matches!(err, AuthError::Invalid));
    }

    #[tokio::test]
    async fn concurrent_redemptions_have_exactly_one_winner() {
        let harness = TestHarness::new();
        let (_, refresh) = harness.signed_up_session("grace@example.com").await;

        let state = Arc::clone(&harness.state);
        let token = refresh.clone();
        let racer = tokio::spawn(async move { exchange(&state, &token, "tab-a").await });
        let local = exchange(&harness.state, &refresh, "tab-b").await;
        let raced = racer.await.expect("task");

        let wins = usize::from(local.is_ok()) + usize::from(raced.is_ok());
        assert_eq!(wins, 1, "exactly one redemption may win");
        for outcome in [local, raced] {
            if let Err(err) = outcome {
                assert!(matches!(err, AuthError::Reuse));
            }
        }
    }

    #[tokio::test]
    async fn successful_exchange_resets_throttle_counters() {
        let harness = TestHarness::new();
        let (_, refresh) = harness.signed_up_session("heidi@example.com").await;
        let account_id = harness.account_id("heidi@example.com").await;
        harness
            .store
            .record_signin_attempt(account_id)
            .await
            .expect("bump attempts");

        exchange(&harness.state, &refresh, "web")
            .await
            .expect("exchange");
        let account = harness.store.account(account_id).expect("account");
        assert_eq!(account.incomplete_signin_attempts, 0);
        assert!(account.last_signin_attempt_at.is_none());
    }

    #[tokio::test]
    async fn garbage_refresh_token_is_invalid_without_side_effects() {
        let harness = TestHarness::new();
        let err = exchange(&harness.state, "not-a-token", "web")
            .await
            .expect_err("garbage");
        assert!(matches!(err, AuthError::Invalid));

        // Structurally valid token for a session that does not exist.
        let orphan = harness
            .state
            .codec()
            .sign_refresh(Uuid::new_v4(), Utc::now().timestamp(), 600, 0)
            .expect("sign");
        let err = exchange(&harness.state, &orphan, "web")
            .await
            .expect_err("unknown session");
        assert!(matches!(err, AuthError::Invalid));
    }

    #[tokio::test]
    async fn sign_out_revokes_access_immediately_and_deletes_the_session() {
        let harness = TestHarness::new();
        let (session_id, refresh) = harness.signed_up_session("ivan@example.com").await;
        let pair = exchange(&harness.state, &refresh, "web")
            .await
            .expect("exchange");

        assert!(
            verifier::verify_access(&harness.state, &pair.access_token)
                .await
                .is_some()
        );
        sign_out(&harness.state, &pair.refresh_token, &pair.access_token)
            .await
            .expect("sign out");

        assert!(
            verifier::verify_access(&harness.state, &pair.access_token)
                .await
                .is_none()
        );
        assert!(harness.store.session(session_id).is_none());
    }

    #[tokio::test]
    async fn deactivation_rejects_cryptographically_valid_tokens() {
        let harness = TestHarness::new();
        let (_, refresh) = harness.signed_up_session("judy@example.com").await;
        let pair = exchange(&harness.state, &refresh, "web")
            .await
            .expect("exchange");

        on_account_deactivated(&harness.state, pair.account_id)
            .await
            .expect("deactivate");

        // Signature and expiry still check out, the cache rejects it anyway.
        assert!(harness.state.codec().verify_access(&pair.access_token).is_some());
        assert!(
            verifier::verify_access(&harness.state, &pair.access_token)
                .await
                .is_none()
        );
        // And the lineage is dead.
        let err = exchange(&harness.state, &pair.refresh_token, "web")
            .await
            .expect_err("revoked lineage");
        assert!(matches!(err, AuthError::Invalid));
    }

    #[tokio::test]
    async fn dispatch_failure_surfaces_but_keeps_the_session_row() {
        let harness = TestHarness::with_sender(Arc::new(FailingSender));
        let err = initiate(&harness.state, "kate@example.com", Some("Kate"), "signup")
            .await
            .expect_err("dispatch down");
        assert!(matches!(err, AuthError::Internal(_)));
        // Left for the GC job, not rolled back.
        assert_eq!(harness.store.session_count(), 1);
    }

    #[tokio::test]
    async fn recording_sender_sees_a_decodable_refresh_token() {
        let harness = TestHarness::new();
        initiate(&harness.state, "leo@example.com", Some("Leo"), "signup")
            .await
            .expect("signup");
        let sent = harness.sender.sent();
        let claims = harness
            .state
            .codec()
            .verify_refresh(&sent[0].token)
            .expect("dispatched token verifies");
        assert_eq!(claims.seq, 0);
    }

    // Keep the helper type exercised even if other suites change.
    #[tokio::test]
    async fn recording_sender_is_empty_by_default() {
        let sender = RecordingSender::default();
        assert!(sender.sent().is_empty());
    }
}
