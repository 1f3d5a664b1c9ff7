use anyhow::Result;
use clap::{Arg, Command};

pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";
pub const ARG_GOOGLE_TOKENINFO_URL: &str = "google-tokeninfo-url";
pub const ARG_FACEBOOK_GRAPH_URL: &str = "facebook-graph-url";
pub const ARG_TWITTER_API_KEY: &str = "twitter-api-key";
pub const ARG_TWITTER_API_SECRET: &str = "twitter-api-secret";
pub const ARG_TWITTER_VERIFY_URL: &str = "twitter-verify-url";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_ID)
                .long(ARG_GOOGLE_CLIENT_ID)
                .help("OAuth client id expected in the audience of Google ID tokens")
                .env("AUTHORS_HEAVEN_GOOGLE_CLIENT_ID"),
        )
        .arg(
            Arg::new(ARG_GOOGLE_TOKENINFO_URL)
                .long(ARG_GOOGLE_TOKENINFO_URL)
                .help("Google tokeninfo endpoint")
                .default_value("https://oauth2.googleapis.com/tokeninfo")
                .env("AUTHORS_HEAVEN_GOOGLE_TOKENINFO_URL"),
        )
        .arg(
            Arg::new(ARG_FACEBOOK_GRAPH_URL)
                .long(ARG_FACEBOOK_GRAPH_URL)
                .help("Facebook Graph API base URL")
                .default_value("https://graph.facebook.com/v11.0")
                .env("AUTHORS_HEAVEN_FACEBOOK_GRAPH_URL"),
        )
        .arg(
            Arg::new(ARG_TWITTER_API_KEY)
                .long(ARG_TWITTER_API_KEY)
                .help("Twitter consumer key used to sign verification requests")
                .env("AUTHORS_HEAVEN_TWITTER_API_KEY"),
        )
        .arg(
            Arg::new(ARG_TWITTER_API_SECRET)
                .long(ARG_TWITTER_API_SECRET)
                .help("Twitter consumer secret used to sign verification requests")
                .env("AUTHORS_HEAVEN_TWITTER_API_SECRET"),
        )
        .arg(
            Arg::new(ARG_TWITTER_VERIFY_URL)
                .long(ARG_TWITTER_VERIFY_URL)
                .help("Twitter credentials verification endpoint")
                .default_value("https://api.twitter.com/1.1/account/verify_credentials.json")
                .env("AUTHORS_HEAVEN_TWITTER_VERIFY_URL"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub google_client_id: Option<String>,
    pub google_tokeninfo_url: String,
    pub facebook_graph_url: String,
    pub twitter_api_key: Option<String>,
    pub twitter_api_secret: Option<String>,
    pub twitter_verify_url: String,
}

impl Options {
    /// # Errors
    /// Currently infallible; kept fallible for symmetry with the other option groups.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            google_client_id: matches.get_one::<String>(ARG_GOOGLE_CLIENT_ID).cloned(),
            google_tokeninfo_url: matches
                .get_one::<String>(ARG_GOOGLE_TOKENINFO_URL)
                .cloned()
                .unwrap_or_else(|| "https://oauth2.googleapis.com/tokeninfo".to_string()),
            facebook_graph_url: matches
                .get_one::<String>(ARG_FACEBOOK_GRAPH_URL)
                .cloned()
                .unwrap_or_else(|| "https://graph.facebook.com/v11.0".to_string()),
            twitter_api_key: matches.get_one::<String>(ARG_TWITTER_API_KEY).cloned(),
            twitter_api_secret: matches.get_one::<String>(ARG_TWITTER_API_SECRET).cloned(),
            twitter_verify_url: matches
                .get_one::<String>(ARG_TWITTER_VERIFY_URL)
                .cloned()
                .unwrap_or_else(|| {
                    "https://api.twitter.com/1.1/account/verify_credentials.json".to_string()
                }),
        })
    }
}
