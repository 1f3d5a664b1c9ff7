//! Email verification endpoint.

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

use super::storage::{activate_user, consume_email_token};
use super::tokens::{self, TokenError, TokenKind};
use super::types::{TokenParams, UserBody};
use super::utils::hash_email_token;

#[utoipa::path(
    get,
    path = "/v1/users/auth/verify",
    params(
        ("token" = String, Query, description = "Signed verification token from the email link")
    ),
    responses(
        (status = 200, description = "Email verified, account activated", body = UserBody),
        (status = 400, description = "Invalid or expired token"),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn verify(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    params: Query<TokenParams>,
) -> Response {
    let Some(token) = params.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
        return field_error(
            StatusCode::BAD_REQUEST,
            "token",
            error_messages::token::INVALID,
        );
    };

    // The signature check runs before any database work.
    let claims = match tokens::verify(&globals, token, TokenKind::Verify) {
        Ok(claims) => claims,
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
    };

    let token_hash = hash_email_token(token);
    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            error!("Failed to start verification transaction: {err}");
            return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Verification failed");
        }
    };

    // A token is good for exactly one activation; replays fall through here.
    let user_id = match consume_email_token(&mut tx, &token_hash, TokenKind::Verify).await {
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
            error!("Failed to consume verification token: {err}");
            let _ = tx.rollback().await;
            return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Verification failed");
        }
    };

    if user_id != claims.sub {
        let _ = tx.rollback().await;
        return field_error(
            StatusCode::BAD_REQUEST,
            "token",
            error_messages::token::INVALID,
        );
    }

    match activate_user(&mut tx, user_id).await {
        Ok(Some(record)) => {
            if let Err(err) = tx.commit().await {
                error!("Failed to commit verification transaction: {err}");
                return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Verification failed");
            }
            (StatusCode::OK, Json(record.into_body())).into_response()
        }
        Ok(None) => {
            let _ = tx.rollback().await;
            field_error(
                StatusCode::BAD_REQUEST,
                "token",
                error_messages::token::INVALID,
            )
        }
        Err(err) => {
            error!("Failed to activate user: {err}");
            let _ = tx.rollback().await;
            detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Verification failed")
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

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn verify_without_token_fails() {
        let response = verify(
            Extension(lazy_pool()),
            Extension(globals()),
            Query(TokenParams { token: None }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["token"][0], error_messages::token::INVALID);
    }

    #[tokio::test]
    async fn verify_with_garbage_token_fails() {
        let response = verify(
            Extension(lazy_pool()),
            Extension(globals()),
            Query(TokenParams {
                token: Some("token".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["token"][0], error_messages::token::INVALID);
    }

    #[tokio::test]
    async fn verify_with_expired_token_fails() {
        let globals = globals();
        let token = tokens::issue_with_ttl(
            &globals,
            uuid::Uuid::new_v4(),
            "test.user@app.com",
            TokenKind::Verify,
            -30,
        )
        .expect("token");
        let response = verify(
            Extension(lazy_pool()),
            Extension(globals),
            Query(TokenParams { token: Some(token) }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["token"][0], error_messages::token::EXPIRED);
    }

    #[tokio::test]
    async fn verify_with_wrong_purpose_token_fails() {
        let globals = globals();
        let token = tokens::issue(
            &globals,
            uuid::Uuid::new_v4(),
            "test.user@app.com",
            TokenKind::Access,
        )
        .expect("token");
        let response = verify(
            Extension(lazy_pool()),
            Extension(globals),
            Query(TokenParams { token: Some(token) }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["token"][0], error_messages::token::INVALID);
    }
}
