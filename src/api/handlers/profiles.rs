//! Profile endpoints: own profile read/update and public profile views.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{error, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error_messages;
use crate::api::handlers::{detail_error, field_error};
use crate::cli::globals::GlobalArgs;

use super::auth::principal::require_auth;

const GENDERS: [&str; 3] = ["Male", "Female", "Other"];

/// Combined user + profile view returned from `/profile/me`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileBody {
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub email: String,
    pub username: String,
    pub phone_number: Option<String>,
    pub about_me: Option<String>,
    pub avatar_url: Option<String>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub created_at: String,
}

/// What other authenticated users see of a profile.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicProfileBody {
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub about_me: Option<String>,
    pub avatar_url: Option<String>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EditProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub phone_number: Option<String>,
    pub about_me: Option<String>,
    pub avatar_url: Option<String>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/users/profile/me",
    responses(
        (status = 200, description = "The caller's profile", body = ProfileBody),
        (status = 401, description = "Missing or invalid access token"),
    ),
    tag = "profiles"
)]
pub async fn get_my_profile(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
) -> Response {
    let principal = match require_auth(&headers, &pool, &globals).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match fetch_profile(&pool, principal.user_id).await {
        Ok(Some(profile)) => (StatusCode::OK, Json(profile)).into_response(),
        Ok(None) => detail_error(StatusCode::NOT_FOUND, "Not found."),
        Err(err) => {
            error!("Failed to fetch profile: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Pull a required, non-blank field or build the field-keyed error response.
fn require_field(value: Option<&String>, field: &str) -> Result<String, Response> {
    match value {
        None => Err(field_error(
            StatusCode::BAD_REQUEST,
            field,
            error_messages::field::REQUIRED,
        )),
        Some(value) if value.trim().is_empty() => Err(field_error(
            StatusCode::BAD_REQUEST,
            field,
            error_messages::field::BLANK,
        )),
        Some(value) => Ok(value.trim().to_string()),
    }
}

fn valid_phone_number(value: &str) -> bool {
    let digits = value.chars().filter(char::is_ascii_digit).count();
    digits >= 7
        && value.len() <= 30
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
}

#[utoipa::path(
    put,
    path = "/v1/users/profile/me",
    request_body = EditProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileBody),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Missing or invalid access token"),
    ),
    tag = "profiles"
)]
pub async fn update_my_profile(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    payload: Option<Json<EditProfileRequest>>,
) -> Response {
    let principal = match require_auth(&headers, &pool, &globals).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let request: EditProfileRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
        }
    };

    let first_name = match require_field(request.first_name.as_ref(), "first_name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let last_name = match require_field(request.last_name.as_ref(), "last_name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let phone_number = match require_field(request.phone_number.as_ref(), "phone_number") {
        Ok(value) => value,
        Err(response) => return response,
    };
    if !valid_phone_number(&phone_number) {
        return field_error(
            StatusCode::BAD_REQUEST,
            "phone_number",
            "The phone number entered is not valid.",
        );
    }
    let about_me = match require_field(request.about_me.as_ref(), "about_me") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let gender = match require_field(request.gender.as_ref(), "gender") {
        Ok(value) => value,
        Err(response) => return response,
    };
    if !GENDERS.contains(&gender.as_str()) {
        return field_error(
            StatusCode::BAD_REQUEST,
            "gender",
            &format!("\"{gender}\" is not a valid choice."),
        );
    }
    let country = match require_field(request.country.as_ref(), "country") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let city = match require_field(request.city.as_ref(), "city") {
        Ok(value) => value,
        Err(response) => return response,
    };

    // PUT semantics: absent optionals clear the stored value.
    let middle_name = request
        .middle_name
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let avatar_url = request
        .avatar_url
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let update = ProfileUpdate {
        first_name,
        last_name,
        middle_name,
        phone_number,
        about_me,
        avatar_url,
        gender,
        country,
        city,
    };

    match apply_profile_update(&pool, principal.user_id, update).await {
        Ok(()) => {}
        Err(err) => {
            error!("Failed to update profile: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match fetch_profile(&pool, principal.user_id).await {
        Ok(Some(profile)) => (StatusCode::OK, Json(profile)).into_response(),
        Ok(None) => detail_error(StatusCode::NOT_FOUND, "Not found."),
        Err(err) => {
            error!("Failed to fetch updated profile: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}/profile",
    params(
        ("id" = String, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "Another user's public profile", body = PublicProfileBody),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "User not found"),
    ),
    tag = "profiles"
)]
pub async fn get_user_profile(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
) -> Response {
    if let Err(response) = require_auth(&headers, &pool, &globals).await {
        return response;
    }

    let Ok(user_id) = Uuid::parse_str(id.trim()) else {
        return detail_error(StatusCode::NOT_FOUND, "Not found.");
    };

    match fetch_public_profile(&pool, user_id).await {
        Ok(Some(profile)) => (StatusCode::OK, Json(profile)).into_response(),
        Ok(None) => detail_error(StatusCode::NOT_FOUND, "Not found."),
        Err(err) => {
            error!("Failed to fetch public profile: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

struct ProfileUpdate {
    first_name: String,
    last_name: String,
    middle_name: Option<String>,
    phone_number: String,
    about_me: String,
    avatar_url: Option<String>,
    gender: String,
    country: String,
    city: String,
}

async fn fetch_profile(pool: &PgPool, user_id: Uuid) -> anyhow::Result<Option<ProfileBody>> {
    let query = r#"
        SELECT
            u.first_name,
            u.last_name,
            u.middle_name,
            u.email,
            u.username,
            p.phone_number,
            p.about_me,
            p.avatar_url,
            p.gender,
            p.country,
            p.city,
            to_char(p.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM profiles p
        JOIN users u ON u.id = p.user_id
        WHERE p.user_id = $1
        LIMIT 1
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.map(|row| ProfileBody {
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        middle_name: row.get("middle_name"),
        email: row.get("email"),
        username: row.get("username"),
        phone_number: row.get("phone_number"),
        about_me: row.get("about_me"),
        avatar_url: row.get("avatar_url"),
        gender: row.get("gender"),
        country: row.get("country"),
        city: row.get("city"),
        created_at: row.get("created_at"),
    }))
}

async fn apply_profile_update(
    pool: &PgPool,
    user_id: Uuid,
    update: ProfileUpdate,
) -> anyhow::Result<()> {
    // Name fields live on users, the rest on profiles; keep both writes atomic.
    let mut tx = pool.begin().await?;

    let query = r"
        UPDATE users
        SET first_name = $2,
            last_name = $3,
            middle_name = $4,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.middle_name)
        .execute(&mut *tx)
        .instrument(span)
        .await?;

    let query = r"
        UPDATE profiles
        SET phone_number = $2,
            about_me = $3,
            avatar_url = $4,
            gender = $5,
            country = $6,
            city = $7,
            updated_at = NOW()
        WHERE user_id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(&update.phone_number)
        .bind(&update.about_me)
        .bind(&update.avatar_url)
        .bind(&update.gender)
        .bind(&update.country)
        .bind(&update.city)
        .execute(&mut *tx)
        .instrument(span)
        .await?;

    tx.commit().await?;
    Ok(())
}

async fn fetch_public_profile(
    pool: &PgPool,
    user_id: Uuid,
) -> anyhow::Result<Option<PublicProfileBody>> {
    let query = r"
        SELECT
            u.first_name,
            u.last_name,
            u.middle_name,
            p.about_me,
            p.avatar_url,
            p.gender,
            p.country,
            p.city
        FROM profiles p
        JOIN users u ON u.id = p.user_id
        WHERE p.user_id = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.map(|row| PublicProfileBody {
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        middle_name: row.get("middle_name"),
        about_me: row.get("about_me"),
        avatar_url: row.get("avatar_url"),
        gender: row.get("gender"),
        country: row.get("country"),
        city: row.get("city"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_validation_accepts_common_formats() {
        assert!(valid_phone_number("+250 788 123 456"));
        assert!(valid_phone_number("(555) 123-4567"));
        assert!(!valid_phone_number("not-a-phone"));
        assert!(!valid_phone_number("12345"));
    }

    #[test]
    fn gender_choices_are_closed() {
        assert!(GENDERS.contains(&"Male"));
        assert!(GENDERS.contains(&"Female"));
        assert!(GENDERS.contains(&"Other"));
        assert!(!GENDERS.contains(&"male"));
    }
}
