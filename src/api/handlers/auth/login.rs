use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use tracing::{error, instrument};

use crate::api::error_messages;
use crate::api::handlers::{detail_error, field_error};
use crate::cli::globals::GlobalArgs;

use super::storage::{fetch_user_for_login, UserRecord};
use super::tokens::{self, TokenKind};
use super::types::{LoginRequest, TokenBundle};
use super::utils::{normalize_email, verify_password};
use super::PROVIDER_EMAIL;

/// Sign an access/refresh pair for an authenticated user.
pub(crate) fn token_bundle(globals: &GlobalArgs, user: UserRecord) -> anyhow::Result<TokenBundle> {
    let access_token = tokens::issue(globals, user.id, &user.email, TokenKind::Access)?;
    let refresh_token = tokens::issue(globals, user.id, &user.email, TokenKind::Refresh)?;
    Ok(TokenBundle {
        access_token,
        refresh_token,
        user: user.into_body(),
    })
}

#[utoipa::path(
    post,
    path = "/v1/users/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenBundle),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unknown account, wrong password, wrong provider, or inactive account"),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
        }
    };

    let email = request
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|value| !value.is_empty());
    let username = request
        .username
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    if email.is_none() && username.is_none() {
        return field_error(
            StatusCode::BAD_REQUEST,
            "username",
            error_messages::account::REQUIRED,
        );
    }

    let Some(password) = request.password.filter(|value| !value.is_empty()) else {
        return field_error(
            StatusCode::BAD_REQUEST,
            "password",
            error_messages::password::REQUIRED,
        );
    };

    let user = match fetch_user_for_login(&pool, email.as_deref(), username.as_deref()).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return detail_error(
                StatusCode::UNAUTHORIZED,
                error_messages::account::NO_ACCOUNT,
            );
        }
        Err(err) => {
            error!("Failed to fetch user for login: {err}");
            return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Login failed");
        }
    };

    // Accounts created through a social provider have no local password.
    if user.auth_provider != PROVIDER_EMAIL {
        return detail_error(
            StatusCode::UNAUTHORIZED,
            &error_messages::account::provider(&user.auth_provider),
        );
    }

    let password_matches = match user.password_hash.as_deref() {
        Some(hash) => match verify_password(&password, hash) {
            Ok(matches) => matches,
            Err(err) => {
                error!("Failed to verify password: {err}");
                return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Login failed");
            }
        },
        None => false,
    };
    if !password_matches {
        return detail_error(
            StatusCode::UNAUTHORIZED,
            error_messages::account::NO_ACCOUNT,
        );
    }

    if !user.is_active {
        return detail_error(StatusCode::UNAUTHORIZED, error_messages::account::DISABLED);
    }

    match token_bundle(&globals, user) {
        Ok(bundle) => (StatusCode::OK, Json(bundle)).into_response(),
        Err(err) => {
            error!("Failed to sign tokens: {err}");
            detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Login failed")
        }
    }
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

    #[tokio::test]
    async fn login_missing_payload() {
        let response = login(Extension(lazy_pool()), Extension(globals()), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_without_identifier_fails() {
        let response = login(
            Extension(lazy_pool()),
            Extension(globals()),
            Some(Json(LoginRequest {
                email: None,
                username: None,
                password: Some("Password@1234".to_string()),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["username"][0], error_messages::account::REQUIRED);
    }

    #[tokio::test]
    async fn login_without_password_fails() {
        let response = login(
            Extension(lazy_pool()),
            Extension(globals()),
            Some(Json(LoginRequest {
                email: Some("test.user@app.com".to_string()),
                username: None,
                password: None,
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["password"][0], error_messages::password::REQUIRED);
    }

    #[test]
    fn token_bundle_contains_both_tokens() {
        let globals = globals();
        let user = UserRecord {
            id: uuid::Uuid::new_v4(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            middle_name: None,
            username: "test1".to_string(),
            email: "test.user@app.com".to_string(),
            auth_provider: "email".to_string(),
            password_hash: None,
            is_admin: false,
            is_active: true,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        };
        let bundle = token_bundle(&globals, user).expect("bundle");
        assert!(!bundle.access_token.is_empty());
        assert!(!bundle.refresh_token.is_empty());
        assert_ne!(bundle.access_token, bundle.refresh_token);
        assert_eq!(bundle.user.username, "test1");
    }
}
