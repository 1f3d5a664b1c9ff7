use crate::{
    api,
    api::{email::OutboxConfig, handlers::auth::providers::SocialProviders},
    cli::globals::GlobalArgs,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub email_token_ttl_seconds: i64,
    pub frontend_base_url: String,
    pub google_client_id: Option<String>,
    pub google_tokeninfo_url: String,
    pub facebook_graph_url: String,
    pub twitter_api_key: Option<String>,
    pub twitter_api_secret: Option<String>,
    pub twitter_verify_url: String,
    pub email_from: String,
    pub email_outbox_poll_seconds: u64,
    pub email_outbox_batch_size: usize,
    pub email_outbox_max_attempts: u32,
    pub email_outbox_backoff_base_seconds: u64,
    pub email_outbox_backoff_max_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    // Reject a malformed DSN before the pool ever dials it.
    Url::parse(&args.dsn).context("Invalid database DSN")?;

    let mut globals = GlobalArgs::new(
        SecretString::from(args.jwt_secret),
        args.frontend_base_url.trim_end_matches('/').to_string(),
    );
    globals.access_token_ttl_seconds = args.access_token_ttl_seconds;
    globals.refresh_token_ttl_seconds = args.refresh_token_ttl_seconds;
    globals.email_token_ttl_seconds = args.email_token_ttl_seconds;
    globals.email_from = args.email_from;

    let providers = Arc::new(
        SocialProviders::new(
            args.google_client_id,
            args.google_tokeninfo_url,
            args.facebook_graph_url,
            args.twitter_api_key.map(SecretString::from),
            args.twitter_api_secret.map(SecretString::from),
            args.twitter_verify_url,
        )
        .context("Failed to build social provider clients")?,
    );

    let email_config = OutboxConfig::new()
        .with_poll_interval_seconds(args.email_outbox_poll_seconds)
        .with_batch_size(args.email_outbox_batch_size)
        .with_max_attempts(args.email_outbox_max_attempts)
        .with_backoff_base_seconds(args.email_outbox_backoff_base_seconds)
        .with_backoff_max_seconds(args.email_outbox_backoff_max_seconds);

    api::new(args.port, args.dsn, &globals, providers, email_config).await
}
