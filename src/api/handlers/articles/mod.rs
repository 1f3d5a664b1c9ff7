//! Article publishing endpoints.
//!
//! Flow Overview:
//! 1) Authenticate the request via Bearer access token.
//! 2) Scope every read and write: admins see all articles, authors their own.
//! 3) Create with a title-derived unique slug, list/retrieve/patch by slug.

pub(crate) mod slug;
pub(crate) mod storage;

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgPool;
use tracing::{error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error_messages;
use crate::api::handlers::{detail_error, field_error};
use crate::cli::globals::GlobalArgs;

use super::auth::principal::{require_auth, Principal};
use super::users::SearchParams;

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorBody {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ArticleBody {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub tags: Vec<String>,
    pub author: AuthorBody,
    pub created_at: String,
    pub updated_at: String,
}

/// Distinguishes an absent field from an explicit `null` so validation can
/// report the right message for each.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NewArticleRequest {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub body: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PatchArticleRequest {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub body: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

/// Resolve a required text field, mapping absent/null/blank to their messages.
fn required_text(value: &Option<Option<String>>) -> Result<String, &'static str> {
    match value {
        None => Err(error_messages::field::REQUIRED),
        Some(None) => Err(error_messages::field::NULL),
        Some(Some(text)) if text.trim().is_empty() => Err(error_messages::field::BLANK),
        Some(Some(text)) => Ok(text.clone()),
    }
}

/// Resolve an optional text field for PATCH, where absence means "keep".
fn optional_text(value: &Option<Option<String>>) -> Result<Option<String>, &'static str> {
    match value {
        None => Ok(None),
        Some(None) => Err(error_messages::field::NULL),
        Some(Some(text)) if text.trim().is_empty() => Err(error_messages::field::BLANK),
        Some(Some(text)) => Ok(Some(text.clone())),
    }
}

/// Admins see every article; everyone else only their own.
fn author_filter(principal: &Principal) -> Option<Uuid> {
    if principal.is_admin {
        None
    } else {
        Some(principal.user_id)
    }
}

#[utoipa::path(
    post,
    path = "/v1/articles",
    request_body = NewArticleRequest,
    responses(
        (status = 201, description = "Article created", body = ArticleBody),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Missing or invalid access token"),
    ),
    tag = "articles"
)]
#[instrument(skip_all)]
pub async fn create_article(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    payload: Option<Json<NewArticleRequest>>,
) -> Response {
    let principal = match require_auth(&headers, &pool, &globals).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let request: NewArticleRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
        }
    };

    let title = match required_text(&request.title) {
        Ok(title) => title,
        Err(message) => return field_error(StatusCode::BAD_REQUEST, "title", message),
    };
    let body = match required_text(&request.body) {
        Ok(body) => body,
        Err(message) => return field_error(StatusCode::BAD_REQUEST, "body", message),
    };
    let tags = request.tags.unwrap_or_default();

    let slug = match storage::generate_unique_slug(&pool, &title).await {
        Ok(slug) => slug,
        Err(err) => {
            error!("Failed to generate slug: {err}");
            return detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Article creation failed");
        }
    };

    match storage::insert_article(&pool, principal.user_id, &title, &slug, &body, &tags).await {
        Ok(article) => (StatusCode::CREATED, Json(article)).into_response(),
        Err(err) => {
            error!("Failed to insert article: {err}");
            detail_error(StatusCode::INTERNAL_SERVER_ERROR, "Article creation failed")
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/articles",
    params(
        ("search" = Option<String>, Query, description = "Match title, body, tags, or author name")
    ),
    responses(
        (status = 200, description = "Visible articles, newest first", body = [ArticleBody]),
        (status = 401, description = "Missing or invalid access token"),
    ),
    tag = "articles"
)]
pub async fn list_articles(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    params: Query<SearchParams>,
) -> Response {
    let principal = match require_auth(&headers, &pool, &globals).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let search = params
        .0
        .search
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    match storage::list_articles(&pool, author_filter(&principal), search.as_deref()).await {
        Ok(articles) => (StatusCode::OK, Json(articles)).into_response(),
        Err(err) => {
            error!("Failed to list articles: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/articles/{slug}",
    params(
        ("slug" = String, Path, description = "Article slug")
    ),
    responses(
        (status = 200, description = "Article detail", body = ArticleBody),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Article not found or not visible"),
    ),
    tag = "articles"
)]
pub async fn get_article(
    Path(slug): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
) -> Response {
    let principal = match require_auth(&headers, &pool, &globals).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match storage::fetch_article(&pool, slug.trim(), author_filter(&principal)).await {
        Ok(Some(article)) => (StatusCode::OK, Json(article)).into_response(),
        Ok(None) => detail_error(StatusCode::NOT_FOUND, "Not found."),
        Err(err) => {
            error!("Failed to fetch article: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    patch,
    path = "/v1/articles/{slug}",
    request_body = PatchArticleRequest,
    params(
        ("slug" = String, Path, description = "Article slug")
    ),
    responses(
        (status = 200, description = "Article updated", body = ArticleBody),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Article not found or not visible"),
    ),
    tag = "articles"
)]
#[instrument(skip_all)]
pub async fn patch_article(
    Path(slug): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    payload: Option<Json<PatchArticleRequest>>,
) -> Response {
    let principal = match require_auth(&headers, &pool, &globals).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let request: PatchArticleRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
        }
    };

    let title = match optional_text(&request.title) {
        Ok(title) => title,
        Err(message) => return field_error(StatusCode::BAD_REQUEST, "title", message),
    };
    let body = match optional_text(&request.body) {
        Ok(body) => body,
        Err(message) => return field_error(StatusCode::BAD_REQUEST, "body", message),
    };

    match storage::update_article(
        &pool,
        slug.trim(),
        author_filter(&principal),
        title.as_deref(),
        body.as_deref(),
        request.tags.as_deref(),
    )
    .await
    {
        Ok(Some(article)) => (StatusCode::OK, Json(article)).into_response(),
        Ok(None) => detail_error(StatusCode::NOT_FOUND, "Not found."),
        Err(err) => {
            error!("Failed to update article: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_maps_absent_null_blank() {
        assert_eq!(required_text(&None), Err(error_messages::field::REQUIRED));
        assert_eq!(
            required_text(&Some(None)),
            Err(error_messages::field::NULL)
        );
        assert_eq!(
            required_text(&Some(Some(" ".to_string()))),
            Err(error_messages::field::BLANK)
        );
        assert_eq!(
            required_text(&Some(Some("article 1".to_string()))),
            Ok("article 1".to_string())
        );
    }

    #[test]
    fn optional_text_keeps_absent_fields() {
        assert_eq!(optional_text(&None), Ok(None));
        assert_eq!(
            optional_text(&Some(None)),
            Err(error_messages::field::NULL)
        );
        assert_eq!(
            optional_text(&Some(Some("updated".to_string()))),
            Ok(Some("updated".to_string()))
        );
    }

    #[test]
    fn missing_and_null_deserialize_differently() {
        let missing: NewArticleRequest = serde_json::from_str(r#"{"body": "text"}"#).expect("json");
        assert_eq!(missing.title, None);

        let null: NewArticleRequest =
            serde_json::from_str(r#"{"title": null, "body": "text"}"#).expect("json");
        assert_eq!(null.title, Some(None));
    }

    #[test]
    fn admin_filter_is_unscoped() {
        let admin = Principal {
            user_id: Uuid::new_v4(),
            username: "admin".to_string(),
            email: "admin@app.com".to_string(),
            is_admin: true,
        };
        assert_eq!(author_filter(&admin), None);

        let author = Principal {
            user_id: Uuid::new_v4(),
            username: "test1".to_string(),
            email: "test.user@app.com".to_string(),
            is_admin: false,
        };
        assert_eq!(author_filter(&author), Some(author.user_id));
    }
}
