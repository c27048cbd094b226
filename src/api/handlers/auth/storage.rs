//! Account and session persistence.
//!
//! One session row represents one continuous login lineage: rotation advances
//! the row in place via a compare-and-swap on the `version` column and never
//! spawns a new row. Accounts are soft-deleted; every account query carries the
//! `deactivated_at IS NULL` predicate so tombstoned rows are invisible to the
//! whole auth surface.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

/// Account row as seen by the credential core.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub incomplete_signin_attempts: i32,
    pub last_signin_attempt_at: Option<DateTime<Utc>>,
}

/// Session row: one login lineage, advanced in place.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub account_id: Uuid,
    pub client_descriptor: String,
    pub ordinal: i64,
    pub version: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of the rotation CAS.
#[derive(Debug)]
pub enum AdvanceOutcome {
    Advanced(Session),
    VersionConflict,
}

/// Storage seam for the credential issuer and the filters.
///
/// The Postgres implementation is the production one; tests run the same state
/// machine against an in-memory implementation.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>>;
    async fn create_account(&self, email: &str, display_name: &str) -> Result<Account>;
    async fn record_signin_attempt(&self, account_id: Uuid) -> Result<()>;
    async fn reset_signin_attempts(&self, account_id: Uuid) -> Result<()>;
    async fn create_session(
        &self,
        account_id: Uuid,
        descriptor: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session>;
    async fn load_session(&self, id: Uuid) -> Result<Option<Session>>;

    /// Atomically advance a session: ordinal +1, version +1, new expiry, new
    /// descriptor, but only while the row's version still equals
    /// `expected_version`. This is the sole mutation used during rotation.
    async fn advance_session(
        &self,
        id: Uuid,
        expected_version: i64,
        new_expires_at: DateTime<Utc>,
        descriptor: &str,
    ) -> Result<AdvanceOutcome>;

    /// Force-expire every live session owned by the account in one statement.
    /// Returns the number of sessions revoked.
    async fn revoke_sessions_for_account(&self, account_id: Uuid) -> Result<u64>;
    async fn delete_session(&self, id: Uuid) -> Result<()>;
    async fn deactivate_account(&self, account_id: Uuid) -> Result<()>;
}

pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn session_from_row(row: &sqlx::postgres::PgRow) -> Session {
    Session {
        id: row.get("id"),
        account_id: row.get("account_id"),
        client_descriptor: row.get("client_descriptor"),
        ordinal: row.get("ordinal"),
        version: row.get("version"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> Account {
    Account {
        id: row.get("id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        incomplete_signin_attempts: row.get("incomplete_signin_attempts"),
        last_signin_attempt_at: row.get("last_signin_attempt_at"),
    }
}

#[async_trait]
impl AuthStore for PgAuthStore {
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let query = r"
            SELECT id, email, display_name, incomplete_signin_attempts, last_signin_attempt_at
            FROM accounts
            WHERE email = $1
              AND deactivated_at IS NULL
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by email")?;
        Ok(row.as_ref().map(account_from_row))
    }

    async fn create_account(&self, email: &str, display_name: &str) -> Result<Account> {
        let query = r"
            INSERT INTO accounts (email, display_name)
            VALUES ($1, $2)
            RETURNING id, email, display_name, incomplete_signin_attempts, last_signin_attempt_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .bind(display_name)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert account")?;
        Ok(account_from_row(&row))
    }

    async fn record_signin_attempt(&self, account_id: Uuid) -> Result<()> {
        let query = r"
            UPDATE accounts
            SET incomplete_signin_attempts = incomplete_signin_attempts + 1,
                last_signin_attempt_at = NOW(),
                last_active_at = NOW()
            WHERE id = $1
              AND deactivated_at IS NULL
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to record sign-in attempt")?;
        Ok(())
    }

    async fn reset_signin_attempts(&self, account_id: Uuid) -> Result<()> {
        let query = r"
            UPDATE accounts
            SET incomplete_signin_attempts = 0,
                last_signin_attempt_at = NULL,
                last_active_at = NOW()
            WHERE id = $1
              AND deactivated_at IS NULL
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to reset sign-in attempts")?;
        Ok(())
    }

    async fn create_session(
        &self,
        account_id: Uuid,
        descriptor: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session> {
        let query = r"
            INSERT INTO sessions (account_id, client_descriptor, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, account_id, client_descriptor, ordinal, version, expires_at, created_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(account_id)
            .bind(descriptor)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert session")?;
        Ok(session_from_row(&row))
    }

    async fn load_session(&self, id: Uuid) -> Result<Option<Session>> {
        let query = r"
            SELECT id, account_id, client_descriptor, ordinal, version, expires_at, created_at
            FROM sessions
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load session")?;
        Ok(row.as_ref().map(session_from_row))
    }

    async fn advance_session(
        &self,
        id: Uuid,
        expected_version: i64,
        new_expires_at: DateTime<Utc>,
        descriptor: &str,
    ) -> Result<AdvanceOutcome> {
        // Optimistic lock: the WHERE clause on version makes this a single
        // atomic read-modify-write. Zero rows means a concurrent redemption
        // advanced the row first.
        let query = r"
            UPDATE sessions
            SET ordinal = ordinal + 1,
                version = version + 1,
                expires_at = $3,
                client_descriptor = $4
            WHERE id = $1
              AND version = $2
            RETURNING id, account_id, client_descriptor, ordinal, version, expires_at, created_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(expected_version)
            .bind(new_expires_at)
            .bind(descriptor)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to advance session")?;
        Ok(row.as_ref().map_or(AdvanceOutcome::VersionConflict, |row| {
            AdvanceOutcome::Advanced(session_from_row(row))
        }))
    }

    async fn revoke_sessions_for_account(&self, account_id: Uuid) -> Result<u64> {
        // Single bulk statement so revocation cannot land partially.
        let query = r"
            UPDATE sessions
            SET expires_at = NOW(),
                version = version + 1
            WHERE account_id = $1
              AND expires_at > NOW()
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(account_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to revoke sessions for account")?;
        Ok(result.rows_affected())
    }

    async fn delete_session(&self, id: Uuid) -> Result<()> {
        // Sign-out is idempotent at this layer; zero deleted rows is fine.
        let query = "DELETE FROM sessions WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn deactivate_account(&self, account_id: Uuid) -> Result<()> {
        let query = r"
            UPDATE accounts
            SET deactivated_at = NOW(),
                last_active_at = NOW()
            WHERE id = $1
              AND deactivated_at IS NULL
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to deactivate account")?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryAuthStore;
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn cas_advances_exactly_once_per_version() -> Result<()> {
        let store = MemoryAuthStore::new();
        let account = store.create_account("a@example.com", "A").await?;
        let session = store
            .create_session(account.id, "signin", Utc::now() + Duration::minutes(15))
            .await?;

        let first = store
            .advance_session(session.id, 0, Utc::now() + Duration::days(30), "web")
            .await?;
        let AdvanceOutcome::Advanced(advanced) = first else {
            panic!("first advance must win");
        };
        assert_eq!(advanced.ordinal, 1);
        assert_eq!(advanced.version, 1);

        // Replaying the same expected version loses the race.
        let second = store
            .advance_session(session.id, 0, Utc::now() + Duration::days(30), "web")
            .await?;
        assert!(matches!(second, AdvanceOutcome::VersionConflict));
        Ok(())
    }

    #[tokio::test]
    async fn bulk_revocation_expires_all_live_sessions() -> Result<()> {
        let store = MemoryAuthStore::new();
        let account = store.create_account("b@example.com", "B").await?;
        for _ in 0..3 {
            store
                .create_session(account.id, "web", Utc::now() + Duration::days(1))
                .await?;
        }

        let revoked = store.revoke_sessions_for_account(account.id).await?;
        assert_eq!(revoked, 3);
        // Second pass finds nothing live.
        assert_eq!(store.revoke_sessions_for_account(account.id).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn deactivated_account_is_invisible_to_email_lookup() -> Result<()> {
        let store = MemoryAuthStore::new();
        let account = store.create_account("c@example.com", "C").await?;
        assert!(store.find_account_by_email("c@example.com").await?.is_some());

        store.deactivate_account(account.id).await?;
        assert!(store.find_account_by_email("c@example.com").await?.is_none());
        Ok(())
    }
}
