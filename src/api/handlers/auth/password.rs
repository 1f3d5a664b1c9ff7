//! Forgot-password and reset-password endpoints.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use tracing::{error, instrument};

use crate::api::error_messages;
use crate::api::handlers::{detail_error, field_error};
use crate::cli::globals::GlobalArgs;

use super::storage::{consume_email_token, fetch_user_by_email, queue_email_link, update_password};
use super::tokens::{self, TokenError, TokenKind};
use super::types::{ForgotPasswordRequest, ResetPasswordRequest, TokenParams};
use super::utils::{
    check_password_strength, hash_email_token, hash_password, normalize_email, valid_email,
};

#[utoipa::path(
    post,
    path = "/v1/users/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Password reset link queued"),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "No account with that email"),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn forgot_password(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Response {
    let request: ForgotPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
        }
    };

    let email = match request.email {
        None => {
            return field_error(
                StatusCode::BAD_REQUEST,
                "email",
                error_messages::email::REQUIRED,
            );
        }
        Some(value) if value.trim().is_empty() => {
            return field_error(
                StatusCode::BAD_REQUEST,
                "email",
                error_messages::email::BLANK,
            );
        }
        Some(value) => normalize_email(&value),
    };
    if !valid_email(&email) {
        return field_error(
            StatusCode::BAD_REQUEST,
            "email",
            error_messages::email::INVALID,
        );
    }

    let user = match fetch_user_by_email(&pool, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return detail_error(
                StatusCode::NOT_FOUND,
                &format!("User with email '{email}' not found"),
            );
        }
        Err(err) => {
            error!("Failed to fetch user for password reset: {err}");
            return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
        }
    };

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            error!("Failed to start reset transaction: {err}");
            return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
        }
    };
    if let Err(err) = queue_email_link(&mut tx, &globals, user.id, &user.email, TokenKind::Reset).await
    {
        error!("Failed to queue reset email: {err}");
        let _ = tx.rollback().await;
        return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
    }
    if let Err(err) = tx.commit().await {
        error!("Failed to commit reset transaction: {err}");
        return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "detail": "Password reset link successfully sent. Please check your email to continue"
        })),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/v1/users/auth/reset-password",
    request_body = ResetPasswordRequest,
    params(
        ("token" = String, Query, description = "Signed reset token from the email link")
    ),
    responses(
        (status = 200, description = "Password reset"),
        (status = 400, description = "Validation failed or invalid/expired token"),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    params: Query<TokenParams>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Response {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
        }
    };

    let password = match request.password {
        None => {
            return field_error(
                StatusCode::BAD_REQUEST,
                "password",
                error_messages::password::REQUIRED,
            );
        }
        Some(value) if value.is_empty() => {
            return field_error(
                StatusCode::BAD_REQUEST,
                "password",
                error_messages::password::BLANK,
            );
        }
        Some(value) => value,
    };
    if let Err(message) = check_password_strength(&password) {
        return field_error(StatusCode::BAD_REQUEST, "password", message);
    }

    let confirm_password = match request.confirm_password {
        None => {
            return field_error(
                StatusCode::BAD_REQUEST,
                "confirm_password",
                error_messages::confirm_password::REQUIRED,
            );
        }
        Some(value) if value.is_empty() => {
            return field_error(
                StatusCode::BAD_REQUEST,
                "confirm_password",
                error_messages::confirm_password::BLANK,
            );
        }
        Some(value) => value,
    };
    if password != confirm_password {
        return field_error(
            StatusCode::BAD_REQUEST,
            "passwords",
            error_messages::confirm_password::INVALID,
        );
    }

    // Body validation happens first; only then is the token inspected.
    let Some(token) = params
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        return field_error(
            StatusCode::BAD_REQUEST,
            "token",
            error_messages::token::INVALID,
        );
    };

    match tokens::verify(&globals, token, TokenKind::Reset) {
        Ok(_) => {}
        Err(TokenError::Expired) => {
            return field_error(
                StatusCode::BAD_REQUEST,
                "token",
                error_messages::token::EXPIRED,
            );
        }
        Err(TokenError::Invalid) => {
            return field_error(
                StatusCode::BAD_REQUEST,
                "token",
                error_messages::token::INVALID,
            );
        }
    }

    let password_hash = match hash_password(&password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
        }
    };

    let token_hash = hash_email_token(token);
    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            error!("Failed to start reset transaction: {err}");
            return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
        }
    };

    let user_id = match consume_email_token(&mut tx, &token_hash, TokenKind::Reset).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => {
            let _ = tx.rollback().await;
            return field_error(
                StatusCode::BAD_REQUEST,
                "token",
                error_messages::token::INVALID,
            );
        }
        Err(err) => {
            error!("Failed to consume reset token: {err}");
            let _ = tx.rollback().await;
            return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
        }
    };

    if let Err(err) = update_password(&mut tx, user_id, &password_hash).await {
        error!("Failed to update password: {err}");
        let _ = tx.rollback().await;
        return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
    }
    if let Err(err) = tx.commit().await {
        error!("Failed to commit reset transaction: {err}");
        return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({ "detail": "Password reset successfully" })),
    )
        .into_response()
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

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn forgot_password_without_email_fails() {
        let response = forgot_password(
            Extension(lazy_pool()),
            Extension(globals()),
            Some(Json(ForgotPasswordRequest { email: None })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["email"][0], error_messages::email::REQUIRED);
    }

    #[tokio::test]
    async fn forgot_password_with_invalid_email_fails() {
        let response = forgot_password(
            Extension(lazy_pool()),
            Extension(globals()),
            Some(Json(ForgotPasswordRequest {
                email: Some("email".to_string()),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["email"][0], error_messages::email::INVALID);
    }

    #[tokio::test]
    async fn reset_password_with_unmatched_passwords_fails() {
        let response = reset_password(
            Extension(lazy_pool()),
            Extension(globals()),
            Query(TokenParams {
                token: Some("token".to_string()),
            }),
            Some(Json(ResetPasswordRequest {
                password: Some("Password@12345".to_string()),
                confirm_password: Some("Password@1234".to_string()),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(
            body["passwords"][0],
            error_messages::confirm_password::INVALID
        );
    }

    #[tokio::test]
    async fn reset_password_with_weak_password_fails() {
        let response = reset_password(
            Extension(lazy_pool()),
            Extension(globals()),
            Query(TokenParams {
                token: Some("token".to_string()),
            }),
            Some(Json(ResetPasswordRequest {
                password: Some("password".to_string()),
                confirm_password: Some("password".to_string()),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["password"][0], error_messages::password::WEAK);
    }

    #[tokio::test]
    async fn reset_password_with_garbage_token_fails() {
        let response = reset_password(
            Extension(lazy_pool()),
            Extension(globals()),
            Query(TokenParams {
                token: Some("token".to_string()),
            }),
            Some(Json(ResetPasswordRequest {
                password: Some("Password@1234".to_string()),
                confirm_password: Some("Password@1234".to_string()),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["token"][0], error_messages::token::INVALID);
    }

    #[tokio::test]
    async fn reset_password_with_expired_token_fails() {
        let globals = globals();
        let token = tokens::issue_with_ttl(
            &globals,
            uuid::Uuid::new_v4(),
            "test.user@app.com",
            TokenKind::Reset,
            -30,
        )
        .expect("token");
        let response = reset_password(
            Extension(lazy_pool()),
            Extension(globals),
            Query(TokenParams { token: Some(token) }),
            Some(Json(ResetPasswordRequest {
                password: Some("Password@1234".to_string()),
                confirm_password: Some("Password@1234".to_string()),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["token"][0], error_messages::token::EXPIRED);
    }
}
