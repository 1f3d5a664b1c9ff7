//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, email, social};
use anyhow::{Context, Result};

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

    // Validate argument combinations relative to one another
    crate::cli::commands::validate(matches).map_err(|e| anyhow::anyhow!(e))?;

    let auth_opts = auth::Options::parse(matches)?;
    let social_opts = social::Options::parse(matches)?;
    let email_opts = email::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret: auth_opts.jwt_secret,
        access_token_ttl_seconds: auth_opts.access_token_ttl_seconds,
        refresh_token_ttl_seconds: auth_opts.refresh_token_ttl_seconds,
        email_token_ttl_seconds: auth_opts.email_token_ttl_seconds,
        frontend_base_url: auth_opts.frontend_base_url,
        google_client_id: social_opts.google_client_id,
        google_tokeninfo_url: social_opts.google_tokeninfo_url,
        facebook_graph_url: social_opts.facebook_graph_url,
        twitter_api_key: social_opts.twitter_api_key,
        twitter_api_secret: social_opts.twitter_api_secret,
        twitter_verify_url: social_opts.twitter_verify_url,
        email_from: email_opts.from_address,
        email_outbox_poll_seconds: email_opts.poll_seconds,
        email_outbox_batch_size: email_opts.batch_size,
        email_outbox_max_attempts: email_opts.max_attempts,
        email_outbox_backoff_base_seconds: email_opts.backoff_base_seconds,
        email_outbox_backoff_max_seconds: email_opts.backoff_max_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_secret_required() {
        temp_env::with_vars(
            [
                ("AUTHORS_HEAVEN_JWT_SECRET", None::<&str>),
                (
                    "AUTHORS_HEAVEN_DSN",
                    Some("postgres://user@localhost:5432/authors_heaven"),
                ),
                (
                    "AUTHORS_HEAVEN_FRONTEND_BASE_URL",
                    Some("https://authorsheaven.dev"),
                ),
            ],
            || {
                let command = crate::cli::commands::new();
                let result = command.try_get_matches_from(vec!["authors-heaven"]);
                assert!(result.is_err(), "clap should reject a missing jwt secret");
            },
        );
    }

    #[test]
    fn dispatch_builds_server_action() {
        temp_env::with_vars([("AUTHORS_HEAVEN_PORT", None::<&str>)], || {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec![
                "authors-heaven",
                "--dsn",
                "postgres://user@localhost:5432/authors_heaven",
                "--jwt-secret",
                "super-secret",
                "--frontend-base-url",
                "https://authorsheaven.dev",
                "--google-client-id",
                "client-id.apps.googleusercontent.com",
            ]);
            let action = handler(&matches).expect("dispatch should succeed");
            let Action::Server(args) = action;
            assert_eq!(args.port, 8080);
            assert_eq!(args.frontend_base_url, "https://authorsheaven.dev");
            assert_eq!(
                args.google_client_id.as_deref(),
                Some("client-id.apps.googleusercontent.com")
            );
            assert_eq!(args.email_outbox_batch_size, 10);
        });
    }
}
