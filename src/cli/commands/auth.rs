use anyhow::{Context, Result};
use clap::{Arg, Command};

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_ACCESS_TOKEN_TTL: &str = "access-token-ttl";
pub const ARG_REFRESH_TOKEN_TTL: &str = "refresh-token-ttl";
pub const ARG_EMAIL_TOKEN_TTL: &str = "email-token-ttl";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign access, refresh, and email-link tokens")
                .env("AUTHORS_HEAVEN_JWT_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL)
                .long(ARG_ACCESS_TOKEN_TTL)
                .help("Access token lifetime in seconds")
                .default_value("86400")
                .env("AUTHORS_HEAVEN_ACCESS_TOKEN_TTL")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL)
                .long(ARG_REFRESH_TOKEN_TTL)
                .help("Refresh token lifetime in seconds")
                .default_value("1209600")
                .env("AUTHORS_HEAVEN_REFRESH_TOKEN_TTL")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_EMAIL_TOKEN_TTL)
                .long(ARG_EMAIL_TOKEN_TTL)
                .help("Verification and password-reset link lifetime in seconds")
                .default_value("86400")
                .env("AUTHORS_HEAVEN_EMAIL_TOKEN_TTL")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Base URL of the frontend, used to build email links")
                .env("AUTHORS_HEAVEN_FRONTEND_BASE_URL")
                .required(true),
        )
}

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub email_token_ttl_seconds: i64,
    pub frontend_base_url: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            jwt_secret: matches
                .get_one::<String>(ARG_JWT_SECRET)
                .cloned()
                .context("missing required argument: --jwt-secret")?,
            access_token_ttl_seconds: matches
                .get_one::<i64>(ARG_ACCESS_TOKEN_TTL)
                .copied()
                .unwrap_or(86_400),
            refresh_token_ttl_seconds: matches
                .get_one::<i64>(ARG_REFRESH_TOKEN_TTL)
                .copied()
                .unwrap_or(1_209_600),
            email_token_ttl_seconds: matches
                .get_one::<i64>(ARG_EMAIL_TOKEN_TTL)
                .copied()
                .unwrap_or(86_400),
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .context("missing required argument: --frontend-base-url")?,
        })
    }
}
