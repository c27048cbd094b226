//! Small helpers shared across the auth surface.

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic shape check on already-normalized input. Real validation happens when
/// the sign-in token is delivered to the mailbox.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    let Some((local, domain)) = email_normalized.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !email_normalized.contains(char::is_whitespace)
}
