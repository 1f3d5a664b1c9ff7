//! Admin-only user directory endpoints.
//!
//! Flow Overview:
//! 1) Authenticate the request via Bearer access token.
//! 2) Require the admin flag for /v1/users reads.
//! 3) List or retrieve users, optionally filtered by a search term.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use sqlx::{PgPool, Row};
use tracing::{error, Instrument};
use uuid::Uuid;

use crate::api::error_messages;
use crate::api::handlers::detail_error;
use crate::cli::globals::GlobalArgs;

use super::auth::principal::{require_auth, Principal};
use super::auth::types::UserBody;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
}

fn require_admin(principal: &Principal) -> Result<(), Response> {
    if principal.is_admin {
        Ok(())
    } else {
        Err(detail_error(
            StatusCode::FORBIDDEN,
            error_messages::permission::DENIED,
        ))
    }
}

#[utoipa::path(
    get,
    path = "/v1/users",
    params(
        ("search" = Option<String>, Query, description = "Match name parts, username, email, or profile location")
    ),
    responses(
        (status = 200, description = "List users, newest first", body = [UserBody]),
        (status = 401, description = "Missing or invalid access token"),
        (status = 403, description = "Caller is not an admin"),
    ),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    params: Query<SearchParams>,
) -> Response {
    let principal = match require_auth(&headers, &pool, &globals).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    if let Err(response) = require_admin(&principal) {
        return response;
    }

    let search = params
        .0
        .search
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    match fetch_users(&pool, search.as_deref()).await {
        Ok(users) => (StatusCode::OK, Json(users)).into_response(),
        Err(err) => {
            error!("Failed to list users: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(
        ("id" = String, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User detail", body = UserBody),
        (status = 401, description = "Missing or invalid access token"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found"),
    ),
    tag = "users"
)]
pub async fn get_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
) -> Response {
    let principal = match require_auth(&headers, &pool, &globals).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    if let Err(response) = require_admin(&principal) {
        return response;
    }

    let Ok(user_id) = Uuid::parse_str(id.trim()) else {
        return detail_error(StatusCode::NOT_FOUND, "Not found.");
    };

    match super::auth::storage::fetch_user_by_id(&pool, user_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record.into_body())).into_response(),
        Ok(None) => detail_error(StatusCode::NOT_FOUND, "Not found."),
        Err(err) => {
            error!("Failed to fetch user: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn fetch_users(pool: &PgPool, search: Option<&str>) -> anyhow::Result<Vec<UserBody>> {
    let query = r#"
        SELECT
            u.id,
            u.first_name,
            u.last_name,
            u.middle_name,
            u.username,
            u.email,
            u.auth_provider,
            u.is_active,
            to_char(u.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM users u
        LEFT JOIN profiles p ON p.user_id = u.id
        WHERE ($1::text IS NULL
            OR u.first_name ILIKE '%' || $1 || '%'
            OR u.last_name ILIKE '%' || $1 || '%'
            OR COALESCE(u.middle_name, '') ILIKE '%' || $1 || '%'
            OR u.username ILIKE '%' || $1 || '%'
            OR u.email ILIKE '%' || $1 || '%'
            OR COALESCE(p.phone_number, '') ILIKE '%' || $1 || '%'
            OR COALESCE(p.country, '') ILIKE '%' || $1 || '%'
            OR COALESCE(p.city, '') ILIKE '%' || $1 || '%')
        ORDER BY u.created_at DESC
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(search)
        .fetch_all(pool)
        .instrument(span)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| UserBody {
            id: row.get::<Uuid, _>("id").to_string(),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            middle_name: row.get("middle_name"),
            username: row.get("username"),
            email: row.get("email"),
            auth_provider: row.get("auth_provider"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
        })
        .collect())
}
