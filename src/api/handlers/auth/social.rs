//! Social login endpoints: Google, Facebook, and Twitter.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, instrument};

use crate::api::error_messages;
use crate::api::handlers::{detail_error, field_error};
use crate::cli::globals::GlobalArgs;

use super::login::token_bundle;
use super::providers::{SocialError, SocialProfile, SocialProviders};
use super::storage::{create_social_user, fetch_user_by_email, update_auth_provider};
use super::types::{SocialAuthRequest, TokenBundle, TwitterAuthRequest};
use super::utils::normalize_email;
use super::{PROVIDER_FACEBOOK, PROVIDER_GOOGLE, PROVIDER_TWITTER};

/// Link a validated social profile to an account, creating one if needed,
/// and sign a token pair.
async fn social_authenticate(
    pool: &PgPool,
    globals: &GlobalArgs,
    profile: SocialProfile,
    provider: &'static str,
) -> Response {
    // Providers may withhold the email (unverified or permission denied);
    // without it there is nothing to link the account by.
    let Some(email) = profile
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|value| !value.is_empty())
    else {
        return field_error(
            StatusCode::BAD_REQUEST,
            "auth_token",
            error_messages::token::INVALID,
        );
    };

    let existing = match fetch_user_by_email(pool, &email).await {
        Ok(existing) => existing,
        Err(err) => {
            error!("Failed to look up social account: {err}");
            return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Social login failed");
        }
    };

    let user = if let Some(mut user) = existing {
        if user.auth_provider != provider {
            if let Err(err) = update_auth_provider(pool, user.id, provider).await {
                error!("Failed to switch auth provider: {err}");
                return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Social login failed");
            }
            user.auth_provider = provider.to_string();
        }
        user
    } else {
        let display_name = profile.name.as_deref().unwrap_or(&email);
        let first_name = profile.first_name.as_deref().unwrap_or(display_name);
        let last_name = profile.last_name.as_deref().unwrap_or(first_name);
        match create_social_user(pool, first_name, last_name, display_name, &email, provider).await
        {
            Ok(user) => user,
            Err(err) => {
                error!("Failed to create social account: {err}");
                return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Social login failed");
            }
        }
    };

    match token_bundle(globals, user) {
        Ok(bundle) => (StatusCode::OK, Json(bundle)).into_response(),
        Err(err) => {
            error!("Failed to sign tokens: {err}");
            detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Social login failed")
        }
    }
}

fn provider_error(err: &SocialError, provider: &str, token_field: &str) -> Response {
    match err {
        SocialError::NotConfigured(_) => detail_error(
            StatusCode::SERVICE_UNAVAILABLE,
            &format!("{provider} login is not configured"),
        ),
        SocialError::InvalidClientId => detail_error(
            StatusCode::UNAUTHORIZED,
            error_messages::social_app_id::INVALID,
        ),
        SocialError::InvalidToken => field_error(
            StatusCode::BAD_REQUEST,
            token_field,
            error_messages::token::INVALID,
        ),
        SocialError::Http(inner) => {
            error!("{provider} validation request failed: {inner}");
            field_error(
                StatusCode::BAD_REQUEST,
                token_field,
                error_messages::token::INVALID,
            )
        }
    }
}

/// Pull the `auth_token` field or build the error response naming it.
fn require_auth_token(payload: Option<Json<SocialAuthRequest>>) -> Result<String, Response> {
    let request = match payload {
        Some(Json(payload)) => payload,
        None => {
            return Err((StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response());
        }
    };
    match request.auth_token {
        None => Err(field_error(
            StatusCode::BAD_REQUEST,
            "auth_token",
            error_messages::auth_token::REQUIRED,
        )),
        Some(token) if token.trim().is_empty() => Err(field_error(
            StatusCode::BAD_REQUEST,
            "auth_token",
            error_messages::auth_token::BLANK,
        )),
        Some(token) => Ok(token),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users/auth/google",
    request_body = SocialAuthRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenBundle),
        (status = 400, description = "Missing or invalid ID token"),
        (status = 401, description = "Token issued for an unknown OAuth client"),
        (status = 503, description = "Google login is not configured"),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn google_auth(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    social: Extension<Arc<SocialProviders>>,
    payload: Option<Json<SocialAuthRequest>>,
) -> Response {
    let auth_token = match require_auth_token(payload) {
        Ok(token) => token,
        Err(response) => return response,
    };

    match social.validate_google(&auth_token).await {
        Ok(profile) => social_authenticate(&pool, &globals, profile, PROVIDER_GOOGLE).await,
        Err(err) => provider_error(&err, "Google", "auth_token"),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users/auth/facebook",
    request_body = SocialAuthRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenBundle),
        (status = 400, description = "Missing or invalid access token"),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn facebook_auth(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    social: Extension<Arc<SocialProviders>>,
    payload: Option<Json<SocialAuthRequest>>,
) -> Response {
    let auth_token = match require_auth_token(payload) {
        Ok(token) => token,
        Err(response) => return response,
    };

    match social.validate_facebook(&auth_token).await {
        Ok(profile) => social_authenticate(&pool, &globals, profile, PROVIDER_FACEBOOK).await,
        Err(err) => provider_error(&err, "Facebook", "auth_token"),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users/auth/twitter",
    request_body = TwitterAuthRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenBundle),
        (status = 400, description = "Missing or invalid access token pair"),
        (status = 503, description = "Twitter login is not configured"),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn twitter_auth(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    social: Extension<Arc<SocialProviders>>,
    payload: Option<Json<TwitterAuthRequest>>,
) -> Response {
    let request: TwitterAuthRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
        }
    };

    let Some(access_token_key) = request.access_token_key.filter(|value| !value.trim().is_empty())
    else {
        return field_error(
            StatusCode::BAD_REQUEST,
            "access_token_key",
            error_messages::field::REQUIRED,
        );
    };
    let Some(access_token_secret) = request
        .access_token_secret
        .filter(|value| !value.trim().is_empty())
    else {
        return field_error(
            StatusCode::BAD_REQUEST,
            "access_token_secret",
            error_messages::field::REQUIRED,
        );
    };

    let profile = match social
        .validate_twitter(&access_token_key, &access_token_secret)
        .await
    {
        Ok(profile) => profile,
        Err(SocialError::NotConfigured(_)) => {
            return detail_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "Twitter login is not configured",
            );
        }
        Err(SocialError::Http(err)) => {
            error!("Twitter validation request failed: {err}");
            return field_error(
                StatusCode::BAD_REQUEST,
                "access_tokens",
                error_messages::access_tokens::INVALID,
            );
        }
        Err(_) => {
            return field_error(
                StatusCode::BAD_REQUEST,
                "access_tokens",
                error_messages::access_tokens::INVALID,
            );
        }
    };

    // Twitter only exposes a display name; split it into name parts.
    let name = profile.name.clone().unwrap_or_default();
    let mut names = name.split_whitespace();
    let first_name = names.next().unwrap_or_default().to_string();
    let last_name = names.next().unwrap_or(&first_name).to_string();
    let profile = SocialProfile {
        email: profile.email,
        first_name: Some(first_name),
        last_name: Some(last_name),
        name: profile.name,
    };

    social_authenticate(&pool, &globals, profile, PROVIDER_TWITTER).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn globals() -> GlobalArgs {
        GlobalArgs::new(
            SecretString::from("unit-test-secret"),
            "https://authorsheaven.dev".to_string(),
        )
    }

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .expect("lazy pool")
    }

    fn providers() -> Arc<SocialProviders> {
        Arc::new(
            SocialProviders::new(
                None,
                "https://oauth2.googleapis.com/tokeninfo".to_string(),
                "https://graph.facebook.com/v11.0".to_string(),
                None,
                None,
                "https://api.twitter.com/1.1/account/verify_credentials.json".to_string(),
            )
            .expect("providers"),
        )
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn google_auth_without_token_fails() {
        let response = google_auth(
            Extension(lazy_pool()),
            Extension(globals()),
            Extension(providers()),
            Some(Json(SocialAuthRequest { auth_token: None })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["auth_token"][0], error_messages::auth_token::REQUIRED);
    }

    #[tokio::test]
    async fn google_auth_unconfigured_returns_503() {
        let response = google_auth(
            Extension(lazy_pool()),
            Extension(globals()),
            Extension(providers()),
            Some(Json(SocialAuthRequest {
                auth_token: Some("auth_token".to_string()),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["detail"], "Google login is not configured");
    }

    #[tokio::test]
    async fn twitter_auth_without_secret_fails() {
        let response = twitter_auth(
            Extension(lazy_pool()),
            Extension(globals()),
            Extension(providers()),
            Some(Json(TwitterAuthRequest {
                access_token_key: Some("key".to_string()),
                access_token_secret: None,
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(
            body["access_token_secret"][0],
            error_messages::field::REQUIRED
        );
    }

    #[tokio::test]
    async fn twitter_auth_unconfigured_returns_503() {
        let response = twitter_auth(
            Extension(lazy_pool()),
            Extension(globals()),
            Extension(providers()),
            Some(Json(TwitterAuthRequest {
                access_token_key: Some("key".to_string()),
                access_token_secret: Some("secret".to_string()),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["detail"], "Twitter login is not configured");
    }
}
