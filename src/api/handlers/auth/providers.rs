//! Social identity providers.
//!
//! Each provider validates the client-supplied credential against the
//! provider's own API and returns the subset of the profile the platform
//! needs to link or create an account. Google ID tokens go through the
//! tokeninfo endpoint, Facebook access tokens through the Graph API, and
//! Twitter access token pairs through `verify_credentials` with an OAuth1
//! HMAC-SHA1 signed request.

use anyhow::{Context, Result};
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha1::Sha1;
use std::time::{Duration, SystemTime};
use tracing::error;

use crate::APP_USER_AGENT;

/// Profile fields a provider hands back after validating a credential.
#[derive(Debug, Clone)]
pub struct SocialProfile {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug)]
pub enum SocialError {
    /// The deployment has no credentials for this provider.
    NotConfigured(&'static str),
    /// The provider rejected the credential.
    InvalidToken,
    /// The token verified but was issued for a different OAuth client.
    InvalidClientId,
    /// The provider could not be reached.
    Http(reqwest::Error),
}

#[derive(Debug)]
pub struct SocialProviders {
    http: Client,
    google_client_id: Option<String>,
    google_tokeninfo_url: String,
    facebook_graph_url: String,
    twitter_api_key: Option<SecretString>,
    twitter_api_secret: Option<SecretString>,
    twitter_verify_url: String,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    iss: Option<String>,
    aud: Option<String>,
    email: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookProfile {
    first_name: Option<String>,
    last_name: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwitterProfile {
    name: Option<String>,
    email: Option<String>,
}

impl SocialProviders {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        google_client_id: Option<String>,
        google_tokeninfo_url: String,
        facebook_graph_url: String,
        twitter_api_key: Option<SecretString>,
        twitter_api_secret: Option<SecretString>,
        twitter_verify_url: String,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build social provider HTTP client")?;
        Ok(Self {
            http,
            google_client_id,
            google_tokeninfo_url,
            facebook_graph_url: facebook_graph_url.trim_end_matches('/').to_string(),
            twitter_api_key,
            twitter_api_secret,
            twitter_verify_url,
        })
    }

    /// Validate a Google ID token and return the holder's profile.
    ///
    /// # Errors
    /// `InvalidToken` when Google rejects the token or the issuer is wrong,
    /// `InvalidClientId` when the audience does not match the configured
    /// client id.
    pub async fn validate_google(&self, auth_token: &str) -> Result<SocialProfile, SocialError> {
        let Some(client_id) = self.google_client_id.as_deref() else {
            return Err(SocialError::NotConfigured("Google"));
        };

        let response = self
            .http
            .get(&self.google_tokeninfo_url)
            .query(&[("id_token", auth_token)])
            .send()
            .await
            .map_err(SocialError::Http)?;

        if !response.status().is_success() {
            return Err(SocialError::InvalidToken);
        }

        let claims: GoogleClaims = response.json().await.map_err(SocialError::Http)?;
        check_google_claims(&claims, client_id)?;

        Ok(SocialProfile {
            email: claims.email,
            first_name: claims.given_name,
            last_name: claims.family_name,
            name: claims.name,
        })
    }

    /// Validate a Facebook Graph access token and return the holder's profile.
    ///
    /// # Errors
    /// `InvalidToken` when the Graph API rejects the token.
    pub async fn validate_facebook(&self, auth_token: &str) -> Result<SocialProfile, SocialError> {
        let url = format!("{}/me", self.facebook_graph_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("fields", "first_name,last_name,middle_name,name,email"),
                ("access_token", auth_token),
            ])
            .send()
            .await
            .map_err(SocialError::Http)?;

        if !response.status().is_success() {
            return Err(SocialError::InvalidToken);
        }

        let profile: FacebookProfile = response.json().await.map_err(SocialError::Http)?;
        Ok(SocialProfile {
            email: profile.email,
            first_name: profile.first_name,
            last_name: profile.last_name,
            name: profile.name,
        })
    }

    /// Validate a Twitter access token pair and return the holder's profile.
    ///
    /// # Errors
    /// `InvalidToken` when Twitter rejects the signed request.
    pub async fn validate_twitter(
        &self,
        access_token_key: &str,
        access_token_secret: &str,
    ) -> Result<SocialProfile, SocialError> {
        let (Some(consumer_key), Some(consumer_secret)) =
            (self.twitter_api_key.as_ref(), self.twitter_api_secret.as_ref())
        else {
            return Err(SocialError::NotConfigured("Twitter"));
        };

        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let query = [("include_email", "true")];
        let authorization = oauth1_authorization_header(
            "GET",
            &self.twitter_verify_url,
            &query,
            consumer_key.expose_secret(),
            consumer_secret.expose_secret(),
            access_token_key,
            access_token_secret,
            &nonce,
            timestamp,
        );

        let response = self
            .http
            .get(&self.twitter_verify_url)
            .query(&query)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(SocialError::Http)?;

        if !response.status().is_success() {
            error!("Twitter credential verification failed: {}", response.status());
            return Err(SocialError::InvalidToken);
        }

        let profile: TwitterProfile = response.json().await.map_err(SocialError::Http)?;
        Ok(SocialProfile {
            email: profile.email,
            first_name: None,
            last_name: None,
            name: profile.name,
        })
    }
}

fn check_google_claims(claims: &GoogleClaims, client_id: &str) -> Result<(), SocialError> {
    let issuer_ok = claims
        .iss
        .as_deref()
        .is_some_and(|iss| iss.contains("accounts.google.com"));
    if !issuer_ok {
        return Err(SocialError::InvalidToken);
    }
    if claims.aud.as_deref() != Some(client_id) {
        return Err(SocialError::InvalidClientId);
    }
    Ok(())
}

/// RFC 3986 percent-encoding as OAuth1 requires for every signature input.
fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// HMAC-SHA1 signature over the OAuth1 signature base string.
fn oauth1_signature(
    method: &str,
    base_url: &str,
    params: &[(&str, &str)],
    consumer_secret: &str,
    token_secret: &str,
) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| (percent_encode(key), percent_encode(value)))
        .collect();
    encoded.sort();
    let param_string = encoded
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(base_url),
        percent_encode(&param_string)
    );
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );

    let mut mac =
        Hmac::<Sha1>::new_from_slice(key.as_bytes()).expect("HMAC-SHA1 accepts keys of any size");
    mac.update(base.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Build the `Authorization: OAuth ...` header for a signed request.
#[allow(clippy::too_many_arguments)]
fn oauth1_authorization_header(
    method: &str,
    base_url: &str,
    query: &[(&str, &str)],
    consumer_key: &str,
    consumer_secret: &str,
    token: &str,
    token_secret: &str,
    nonce: &str,
    timestamp: u64,
) -> String {
    let timestamp = timestamp.to_string();
    let mut params: Vec<(&str, &str)> = vec![
        ("oauth_consumer_key", consumer_key),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", &timestamp),
        ("oauth_token", token),
        ("oauth_version", "1.0"),
    ];
    params.extend(query.iter().copied());

    let signature = oauth1_signature(method, base_url, &params, consumer_secret, token_secret);

    let header_params: Vec<(&str, String)> = vec![
        ("oauth_consumer_key", percent_encode(consumer_key)),
        ("oauth_nonce", percent_encode(nonce)),
        ("oauth_signature", percent_encode(&signature)),
        ("oauth_signature_method", "HMAC-SHA1".to_string()),
        ("oauth_timestamp", percent_encode(&timestamp)),
        ("oauth_token", percent_encode(token)),
        ("oauth_version", "1.0".to_string()),
    ];
    let rendered = header_params
        .iter()
        .map(|(key, value)| format!(r#"{key}="{value}""#))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {rendered}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn providers() -> SocialProviders {
        SocialProviders::new(
            Some("client-id.apps.googleusercontent.com".to_string()),
            "https://oauth2.googleapis.com/tokeninfo".to_string(),
            "https://graph.facebook.com/v11.0".to_string(),
            None,
            None,
            "https://api.twitter.com/1.1/account/verify_credentials.json".to_string(),
        )
        .expect("providers")
    }

    #[test]
    fn google_claims_require_google_issuer() {
        let claims = GoogleClaims {
            iss: Some("https://evil.example.com".to_string()),
            aud: Some("client-id.apps.googleusercontent.com".to_string()),
            email: None,
            given_name: None,
            family_name: None,
            name: None,
        };
        assert!(matches!(
            check_google_claims(&claims, "client-id.apps.googleusercontent.com"),
            Err(SocialError::InvalidToken)
        ));
    }

    #[test]
    fn google_claims_require_matching_audience() {
        let claims = GoogleClaims {
            iss: Some("https://accounts.google.com".to_string()),
            aud: Some("someone-else.apps.googleusercontent.com".to_string()),
            email: None,
            given_name: None,
            family_name: None,
            name: None,
        };
        assert!(matches!(
            check_google_claims(&claims, "client-id.apps.googleusercontent.com"),
            Err(SocialError::InvalidClientId)
        ));
    }

    #[test]
    fn google_claims_accept_valid_token() {
        let claims = GoogleClaims {
            iss: Some("accounts.google.com".to_string()),
            aud: Some("client-id.apps.googleusercontent.com".to_string()),
            email: Some("reader@example.com".to_string()),
            given_name: Some("Test".to_string()),
            family_name: Some("User".to_string()),
            name: Some("Test User".to_string()),
        };
        assert!(check_google_claims(&claims, "client-id.apps.googleusercontent.com").is_ok());
    }

    #[tokio::test]
    async fn twitter_without_credentials_is_not_configured() {
        let providers = providers();
        let result = providers.validate_twitter("key", "secret").await;
        assert!(matches!(result, Err(SocialError::NotConfigured("Twitter"))));
    }

    // Reference vector from Twitter's "Creating a signature" developer guide.
    #[test]
    fn oauth1_signature_matches_reference_vector() {
        let params: Vec<(&str, &str)> = vec![
            ("oauth_consumer_key", "xvz1evFS4wEEPTGEFPHBog"),
            (
                "oauth_nonce",
                "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
            ),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "1318622958"),
            (
                "oauth_token",
                "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
            ),
            ("oauth_version", "1.0"),
            ("include_entities", "true"),
            (
                "status",
                "Hello Ladies + Gentlemen, a signed OAuth request!",
            ),
        ];
        let signature = oauth1_signature(
            "POST",
            "https://api.twitter.com/1.1/statuses/update.json",
            &params,
            "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw",
            "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
        );
        assert_eq!(signature, "tnnArxj06cWHq44gCs1OSKk/jLY=");
    }

    #[test]
    fn authorization_header_carries_all_oauth_params() {
        let header = oauth1_authorization_header(
            "GET",
            "https://api.twitter.com/1.1/account/verify_credentials.json",
            &[("include_email", "true")],
            "consumer-key",
            "consumer-secret",
            "token-key",
            "token-secret",
            "nonce",
            1_318_622_958,
        );
        assert!(header.starts_with("OAuth "));
        assert!(header.contains(r#"oauth_consumer_key="consumer-key""#));
        assert!(header.contains(r#"oauth_signature_method="HMAC-SHA1""#));
        assert!(header.contains(r#"oauth_timestamp="1318622958""#));
        assert!(header.contains("oauth_signature="));
        // The query parameter is signed but never rendered into the header.
        assert!(!header.contains("include_email"));
    }

    #[test]
    fn percent_encoding_follows_rfc3986() {
        assert_eq!(
            percent_encode("Hello Ladies + Gentlemen, a signed OAuth request!"),
            "Hello%20Ladies%20%2B%20Gentlemen%2C%20a%20signed%20OAuth%20request%21"
        );
        assert_eq!(percent_encode("safe-chars_~."), "safe-chars_~.");
    }
}
