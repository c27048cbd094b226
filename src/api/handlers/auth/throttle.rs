//! Sign-in throttling based on per-account attempt counters.
//!
//! The counters live on the account row and go through the same storage layer
//! as everything else, so they are consistent across server instances. The
//! functions here are pure: callers pass the current time.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Backoff window for a given number of incomplete sign-in attempts.
///
/// Doubles per attempt starting at one second, capped at `max_delay`. Zero
/// attempts never produce a window.
#[must_use]
pub fn backoff_window(attempts: i32, max_delay: Duration) -> Duration {
    if attempts <= 0 {
        return Duration::ZERO;
    }
    let exponent = u32::try_from(attempts - 1).unwrap_or(u32::MAX).min(31);
    Duration::from_secs(1u64 << exponent).min(max_delay)
}

/// Whether a new sign-in attempt is still inside the backoff window.
#[must_use]
pub fn is_blocked(
    attempts: i32,
    last_attempt_at: Option<DateTime<Utc>>,
    max_delay: Duration,
    now: DateTime<Utc>,
) -> bool {
    let Some(last_attempt_at) = last_attempt_at else {
        return false;
    };
    let window = backoff_window(attempts, max_delay);
    if window.is_zero() {
        return false;
    }
    let Ok(window) = chrono::Duration::from_std(window) else {
        return false;
    };
    now.signed_duration_since(last_attempt_at) < window
}
