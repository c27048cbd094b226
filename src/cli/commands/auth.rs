use clap::{Arg, ArgAction, Command};

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_throttle_args(command);
    with_cookie_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("token-secret")
                .long("token-secret")
                .help("HMAC secret for signing access and refresh tokens")
                .env("BLARE_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("access-token-ttl-seconds")
                .long("access-token-ttl-seconds")
                .help("Access token TTL in seconds")
                .env("BLARE_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-token-ttl-seconds")
                .long("refresh-token-ttl-seconds")
                .help("Refresh token TTL in seconds, also the active session lifetime")
                .env("BLARE_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("signin-ttl-seconds")
                .long("signin-ttl-seconds")
                .help("Lifetime of a pending sign-in before its first token exchange")
                .env("BLARE_SIGNIN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_throttle_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("max-throttle-delay-seconds")
                .long("max-throttle-delay-seconds")
                .help("Upper bound on the sign-in backoff window")
                .env("BLARE_MAX_THROTTLE_DELAY_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("revocation-cache-capacity")
                .long("revocation-cache-capacity")
                .help("Max entries held by each in-memory revocation cache")
                .env("BLARE_REVOCATION_CACHE_CAPACITY")
                .default_value("10000")
                .value_parser(clap::value_parser!(usize)),
        )
}

fn with_cookie_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("cookie-domain")
                .long("cookie-domain")
                .help("Domain attribute for the session cookies")
                .env("BLARE_COOKIE_DOMAIN")
                .default_value("blare.dev"),
        )
        .arg(
            Arg::new("cookie-insecure")
                .long("cookie-insecure")
                .help("Drop the Secure cookie attribute for plain-HTTP local development")
                .env("BLARE_COOKIE_INSECURE")
                .action(ArgAction::SetTrue),
        )
}
