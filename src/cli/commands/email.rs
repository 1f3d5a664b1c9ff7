use anyhow::Result;
use clap::{Arg, Command};

pub const ARG_EMAIL_FROM: &str = "email-from";
pub const ARG_OUTBOX_POLL_SECONDS: &str = "email-outbox-poll-seconds";
pub const ARG_OUTBOX_BATCH_SIZE: &str = "email-outbox-batch-size";
pub const ARG_OUTBOX_MAX_ATTEMPTS: &str = "email-outbox-max-attempts";
pub const ARG_OUTBOX_BACKOFF_BASE_SECONDS: &str = "email-outbox-backoff-base-seconds";
pub const ARG_OUTBOX_BACKOFF_MAX_SECONDS: &str = "email-outbox-backoff-max-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_EMAIL_FROM)
                .long(ARG_EMAIL_FROM)
                .help("From address for outbound email")
                .default_value("no-reply@authorsheaven.dev")
                .env("AUTHORS_HEAVEN_EMAIL_FROM"),
        )
        .arg(
            Arg::new(ARG_OUTBOX_POLL_SECONDS)
                .long(ARG_OUTBOX_POLL_SECONDS)
                .help("Seconds between email outbox polls")
                .default_value("5")
                .env("AUTHORS_HEAVEN_EMAIL_OUTBOX_POLL_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_OUTBOX_BATCH_SIZE)
                .long(ARG_OUTBOX_BATCH_SIZE)
                .help("Maximum outbox rows processed per poll")
                .default_value("10")
                .env("AUTHORS_HEAVEN_EMAIL_OUTBOX_BATCH_SIZE")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_OUTBOX_MAX_ATTEMPTS)
                .long(ARG_OUTBOX_MAX_ATTEMPTS)
                .help("Delivery attempts before an outbox row is marked failed")
                .default_value("5")
                .env("AUTHORS_HEAVEN_EMAIL_OUTBOX_MAX_ATTEMPTS")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_OUTBOX_BACKOFF_BASE_SECONDS)
                .long(ARG_OUTBOX_BACKOFF_BASE_SECONDS)
                .help("Base delay for delivery retry backoff")
                .default_value("5")
                .env("AUTHORS_HEAVEN_EMAIL_OUTBOX_BACKOFF_BASE_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_OUTBOX_BACKOFF_MAX_SECONDS)
                .long(ARG_OUTBOX_BACKOFF_MAX_SECONDS)
                .help("Maximum delay for delivery retry backoff")
                .default_value("300")
                .env("AUTHORS_HEAVEN_EMAIL_OUTBOX_BACKOFF_MAX_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub from_address: String,
    pub poll_seconds: u64,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_base_seconds: u64,
    pub backoff_max_seconds: u64,
}

impl Options {
    /// # Errors
    /// Currently infallible; kept fallible for symmetry with the other option groups.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            from_address: matches
                .get_one::<String>(ARG_EMAIL_FROM)
                .cloned()
                .unwrap_or_else(|| "no-reply@authorsheaven.dev".to_string()),
            poll_seconds: matches
                .get_one::<u64>(ARG_OUTBOX_POLL_SECONDS)
                .copied()
                .unwrap_or(5),
            batch_size: matches
                .get_one::<usize>(ARG_OUTBOX_BATCH_SIZE)
                .copied()
                .unwrap_or(10),
            max_attempts: matches
                .get_one::<u32>(ARG_OUTBOX_MAX_ATTEMPTS)
                .copied()
                .unwrap_or(5),
            backoff_base_seconds: matches
                .get_one::<u64>(ARG_OUTBOX_BACKOFF_BASE_SECONDS)
                .copied()
                .unwrap_or(5),
            backoff_max_seconds: matches
                .get_one::<u64>(ARG_OUTBOX_BACKOFF_MAX_SECONDS)
                .copied()
                .unwrap_or(300),
        })
    }
}
