//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let token_secret = matches
        .get_one::<String>("token-secret")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --token-secret")?;

    let smtp_url = matches.get_one::<String>("smtp-url").cloned();
    let email_from = matches.get_one::<String>("email-from").cloned();
    if smtp_url.is_some() && email_from.is_none() {
        anyhow::bail!("missing required argument: --email-from (required with --smtp-url)");
    }

    Ok(Action::Server(Args {
        port,
        dsn,
        token_secret,
        access_token_ttl_seconds: matches
            .get_one::<i64>("access-token-ttl-seconds")
            .copied()
            .unwrap_or(600),
        refresh_token_ttl_seconds: matches
            .get_one::<i64>("refresh-token-ttl-seconds")
            .copied()
            .unwrap_or(2_592_000),
        signin_ttl_seconds: matches
            .get_one::<i64>("signin-ttl-seconds")
            .copied()
            .unwrap_or(900),
        max_throttle_delay_seconds: matches
            .get_one::<u64>("max-throttle-delay-seconds")
            .copied()
            .unwrap_or(900),
        revocation_cache_capacity: matches
            .get_one::<usize>("revocation-cache-capacity")
            .copied()
            .unwrap_or(10_000),
        cookie_domain: matches
            .get_one::<String>("cookie-domain")
            .cloned()
            .unwrap_or_else(|| "blare.dev".to_string()),
        cookie_insecure: matches.get_flag("cookie-insecure"),
        smtp_url,
        email_from,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    fn base_args() -> Vec<&'static str> {
        vec![
            "blare",
            "--dsn",
            "postgres://user@localhost:5432/blare",
            "--token-secret",
            "a-long-enough-secret-for-hmac",
        ]
    }

    #[test]
    fn server_action_carries_defaults() {
        let matches = commands::new().get_matches_from(base_args());
        let Action::Server(args) = handler(&matches).expect("dispatch");
        assert_eq!(args.port, 8080);
        assert_eq!(args.access_token_ttl_seconds, 600);
        assert_eq!(args.refresh_token_ttl_seconds, 2_592_000);
        assert_eq!(args.signin_ttl_seconds, 900);
        assert_eq!(args.max_throttle_delay_seconds, 900);
        assert_eq!(args.revocation_cache_capacity, 10_000);
        assert_eq!(args.cookie_domain, "blare.dev");
        assert!(!args.cookie_insecure);
        assert!(args.smtp_url.is_none());
    }

    #[test]
    fn smtp_url_requires_a_from_mailbox() {
        let mut argv = base_args();
        argv.extend(["--smtp-url", "smtp://u:p@mail.example:2525"]);
        let matches = commands::new().get_matches_from(argv);
        let result = handler(&matches);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("--email-from"));
        }
    }

    #[test]
    fn overrides_reach_the_server_args() {
        let mut argv = base_args();
        argv.extend([
            "--port",
            "9090",
            "--cookie-domain",
            "sounds.example",
            "--cookie-insecure",
            "--max-throttle-delay-seconds",
            "60",
        ]);
        let matches = commands::new().get_matches_from(argv);
        let Action::Server(args) = handler(&matches).expect("dispatch");
        assert_eq!(args.port, 9090);
        assert_eq!(args.cookie_domain, "sounds.example");
        assert!(args.cookie_insecure);
        assert_eq!(args.max_throttle_delay_seconds, 60);
    }
}
