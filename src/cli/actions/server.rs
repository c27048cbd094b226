use crate::api;
use anyhow::Result;
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: SecretString,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub signin_ttl_seconds: i64,
    pub max_throttle_delay_seconds: u64,
    pub revocation_cache_capacity: usize,
    pub cookie_domain: String,
    pub cookie_insecure: bool,
    pub smtp_url: Option<String>,
    pub email_from: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the SMTP transport cannot be built or the server fails
/// to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("server args: {args:?}");

    let auth_config = api::AuthConfig::new(args.cookie_domain)
        .with_access_ttl_seconds(args.access_token_ttl_seconds)
        .with_refresh_ttl_seconds(args.refresh_token_ttl_seconds)
        .with_signin_ttl_seconds(args.signin_ttl_seconds)
        .with_max_throttle_delay_seconds(args.max_throttle_delay_seconds)
        .with_revocation_cache_capacity(args.revocation_cache_capacity)
        .with_cookie_secure(!args.cookie_insecure);

    let codec = api::TokenCodec::new(&args.token_secret);
    let sender = api::select_sender(args.smtp_url.as_deref(), args.email_from.as_deref())?;

    api::new(args.port, args.dsn, auth_config, codec, sender).await
}
