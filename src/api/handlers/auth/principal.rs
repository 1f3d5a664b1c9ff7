//! Bearer-token authentication shared by the protected endpoints.

use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::Response,
};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::api::error_messages;
use crate::api::handlers::detail_error;
use crate::cli::globals::GlobalArgs;

use super::storage::fetch_user_by_id;
use super::tokens::{self, TokenError, TokenKind};

/// The authenticated caller, resolved from a Bearer access token.
#[derive(Debug, Clone)]
pub(crate) struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

/// Resolve the `Authorization: Bearer` header into a `Principal`.
///
/// # Errors
/// Returns the ready-to-send error response for missing credentials, bad or
/// expired tokens, unknown users, and inactive accounts.
pub(crate) async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    globals: &GlobalArgs,
) -> Result<Principal, Response> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(detail_error(
            StatusCode::UNAUTHORIZED,
            error_messages::permission::NOT_AUTHENTICATED,
        ));
    };

    let claims = match tokens::verify(globals, &token, TokenKind::Access) {
        Ok(claims) => claims,
        Err(TokenError::Expired) => {
            return Err(detail_error(
                StatusCode::UNAUTHORIZED,
                error_messages::token::EXPIRED,
            ));
        }
        Err(TokenError::Invalid) => {
            return Err(detail_error(
                StatusCode::UNAUTHORIZED,
                error_messages::token::INVALID,
            ));
        }
    };

    let user = match fetch_user_by_id(pool, claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return Err(detail_error(
                StatusCode::UNAUTHORIZED,
                error_messages::account::NO_ACCOUNT,
            ));
        }
        Err(err) => {
            error!("Failed to resolve principal: {err}");
            return Err(detail_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication failed",
            ));
        }
    };

    if !user.is_active {
        return Err(detail_error(
            StatusCode::UNAUTHORIZED,
            error_messages::account::DISABLED,
        ));
    }

    Ok(Principal {
        user_id: user.id,
        username: user.username,
        email: user.email,
        is_admin: user.is_admin,
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
