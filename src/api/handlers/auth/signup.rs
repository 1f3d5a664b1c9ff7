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

use super::storage::{create_local_user, email_exists, username_exists, CreateOutcome, NewLocalUser};
use super::types::{SignupRequest, UserBody};
use super::utils::{check_password_strength, hash_password, normalize_email, valid_email};

/// Pull a required, non-blank field out of the payload or build the error
/// response naming it.
fn require_field(
    value: Option<&String>,
    field: &str,
    required: &'static str,
    blank: &'static str,
) -> Result<String, Response> {
    match value {
        None => Err(field_error(StatusCode::BAD_REQUEST, field, required)),
        Some(value) if value.trim().is_empty() => {
            Err(field_error(StatusCode::BAD_REQUEST, field, blank))
        }
        Some(value) => Ok(value.clone()),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Registration successful, verification email queued", body = UserBody),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "The email address or username already exists"),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn signup(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    payload: Option<Json<SignupRequest>>,
) -> Response {
    let request: SignupRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
        }
    };

    let first_name = match require_field(
        request.first_name.as_ref(),
        "first_name",
        error_messages::first_name::REQUIRED,
        error_messages::first_name::BLANK,
    ) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let last_name = match require_field(
        request.last_name.as_ref(),
        "last_name",
        error_messages::last_name::REQUIRED,
        error_messages::last_name::BLANK,
    ) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let username = match require_field(
        request.username.as_ref(),
        "username",
        error_messages::username::REQUIRED,
        error_messages::username::BLANK,
    ) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let email = match require_field(
        request.email.as_ref(),
        "email",
        error_messages::email::REQUIRED,
        error_messages::email::BLANK,
    ) {
        Ok(value) => normalize_email(&value),
        Err(response) => return response,
    };
    if !valid_email(&email) {
        return field_error(
            StatusCode::BAD_REQUEST,
            "email",
            error_messages::email::INVALID,
        );
    }
    let password = match require_field(
        request.password.as_ref(),
        "password",
        error_messages::password::REQUIRED,
        error_messages::password::BLANK,
    ) {
        Ok(value) => value,
        Err(response) => return response,
    };
    if let Err(message) = check_password_strength(&password) {
        return field_error(StatusCode::BAD_REQUEST, "password", message);
    }

    // Pre-check both unique fields so the response can name the right one.
    match email_exists(&pool, &email).await {
        Ok(true) => {
            return detail_error(StatusCode::CONFLICT, error_messages::email::UNIQUE);
        }
        Ok(false) => {}
        Err(err) => {
            error!("Failed to check email uniqueness: {err}");
            return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed");
        }
    }
    match username_exists(&pool, &username).await {
        Ok(true) => {
            return detail_error(StatusCode::CONFLICT, error_messages::username::UNIQUE);
        }
        Ok(false) => {}
        Err(err) => {
            error!("Failed to check username uniqueness: {err}");
            return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed");
        }
    }

    let password_hash = match hash_password(&password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed");
        }
    };

    let middle_name = request
        .middle_name
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let new_user = NewLocalUser {
        first_name,
        last_name,
        middle_name,
        username,
        email,
        password_hash,
    };

    match create_local_user(&pool, &globals, new_user).await {
        Ok(CreateOutcome::Created(record)) => {
            (StatusCode::CREATED, Json(record.into_body())).into_response()
        }
        // Lost the race between the uniqueness pre-check and the insert.
        Ok(CreateOutcome::Conflict) => {
            detail_error(StatusCode::CONFLICT, error_messages::email::UNIQUE)
        }
        Err(err) => {
            error!("Failed to create user: {err}");
            detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed")
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

    fn request() -> SignupRequest {
        SignupRequest {
            first_name: Some("Test".to_string()),
            last_name: Some("User".to_string()),
            middle_name: None,
            username: Some("test1".to_string()),
            email: Some("test.user@app.com".to_string()),
            password: Some("Password@1234".to_string()),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn signup_missing_payload() {
        let response = signup(Extension(lazy_pool()), Extension(globals()), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signup_without_first_name_fails() {
        let mut payload = request();
        payload.first_name = None;
        let response = signup(
            Extension(lazy_pool()),
            Extension(globals()),
            Some(Json(payload)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["first_name"][0], error_messages::first_name::REQUIRED);
    }

    #[tokio::test]
    async fn signup_with_blank_last_name_fails() {
        let mut payload = request();
        payload.last_name = Some(" ".to_string());
        let response = signup(
            Extension(lazy_pool()),
            Extension(globals()),
            Some(Json(payload)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["last_name"][0], error_messages::last_name::BLANK);
    }

    #[tokio::test]
    async fn signup_with_invalid_email_fails() {
        let mut payload = request();
        payload.email = Some("not-an-email".to_string());
        let response = signup(
            Extension(lazy_pool()),
            Extension(globals()),
            Some(Json(payload)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["email"][0], error_messages::email::INVALID);
    }

    #[tokio::test]
    async fn signup_with_weak_password_fails() {
        let mut payload = request();
        payload.password = Some("password1234".to_string());
        let response = signup(
            Extension(lazy_pool()),
            Extension(globals()),
            Some(Json(payload)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["password"][0], error_messages::password::WEAK);
    }

    #[tokio::test]
    async fn signup_with_short_password_fails() {
        let mut payload = request();
        payload.password = Some("Ab1#".to_string());
        let response = signup(
            Extension(lazy_pool()),
            Extension(globals()),
            Some(Json(payload)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["password"][0], error_messages::password::MIN_LENGTH);
    }
}
