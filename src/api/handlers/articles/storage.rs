//! Database helpers for articles.
//!
//! Visibility is enforced at the query level: every statement takes an
//! optional author filter that is `None` for admins and the caller's id for
//! everyone else, so a non-admin can neither list nor address another
//! author's article.

use anyhow::{Context, Result};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::slug::{normalize_slug, random_suffix, with_suffix};
use super::{ArticleBody, AuthorBody};

const ARTICLE_SELECT: &str = r#"
    SELECT
        a.id,
        a.title,
        a.slug,
        a.body,
        a.tags,
        to_char(a.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
        to_char(a.updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at,
        u.id AS author_id,
        u.first_name,
        u.last_name,
        u.middle_name,
        p.avatar_url
    FROM articles a
    JOIN users u ON u.id = a.author_id
    LEFT JOIN profiles p ON p.user_id = u.id
"#;

fn article_from_row(row: &PgRow) -> ArticleBody {
    ArticleBody {
        id: row.get::<Uuid, _>("id").to_string(),
        title: row.get("title"),
        slug: row.get("slug"),
        body: row.get("body"),
        tags: row.get("tags"),
        author: AuthorBody {
            id: row.get::<Uuid, _>("author_id").to_string(),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            middle_name: row.get("middle_name"),
            avatar_url: row.get("avatar_url"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn slug_exists(pool: &PgPool, slug: &str) -> Result<bool> {
    let query = "SELECT EXISTS(SELECT 1 FROM articles WHERE slug = $1) AS exists";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(slug)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to check slug uniqueness")?;
    Ok(row.get("exists"))
}

/// Derive a slug from the title, retrying with a random suffix while taken.
pub(crate) async fn generate_unique_slug(pool: &PgPool, title: &str) -> Result<String> {
    let base = normalize_slug(title);
    let mut candidate = base.clone();

    while slug_exists(pool, &candidate).await? {
        candidate = with_suffix(&base, &random_suffix());
    }

    Ok(candidate)
}

pub(crate) async fn insert_article(
    pool: &PgPool,
    author_id: Uuid,
    title: &str,
    slug: &str,
    body: &str,
    tags: &[String],
) -> Result<ArticleBody> {
    let query = r"
        INSERT INTO articles (title, slug, body, tags, author_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(title)
        .bind(slug)
        .bind(body)
        .bind(tags)
        .bind(author_id)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert article")?;

    let article_id: Uuid = row.get("id");
    fetch_article_by_id(pool, article_id)
        .await?
        .context("inserted article vanished")
}

async fn fetch_article_by_id(pool: &PgPool, article_id: Uuid) -> Result<Option<ArticleBody>> {
    let query = format!("{ARTICLE_SELECT} WHERE a.id = $1 LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(article_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch article")?;
    Ok(row.map(|row| article_from_row(&row)))
}

/// List visible articles newest-first, optionally filtered by a search term.
pub(crate) async fn list_articles(
    pool: &PgPool,
    author_filter: Option<Uuid>,
    search: Option<&str>,
) -> Result<Vec<ArticleBody>> {
    let query = format!(
        r"{ARTICLE_SELECT}
        WHERE ($1::uuid IS NULL OR a.author_id = $1)
          AND ($2::text IS NULL
            OR a.title ILIKE '%' || $2 || '%'
            OR a.body ILIKE '%' || $2 || '%'
            OR u.first_name ILIKE '%' || $2 || '%'
            OR u.last_name ILIKE '%' || $2 || '%'
            OR COALESCE(u.middle_name, '') ILIKE '%' || $2 || '%'
            OR EXISTS (
                SELECT 1 FROM unnest(a.tags) AS tag
                WHERE tag ILIKE '%' || $2 || '%'
            ))
        ORDER BY a.created_at DESC
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .bind(author_filter)
        .bind(search)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list articles")?;
    Ok(rows.iter().map(article_from_row).collect())
}

pub(crate) async fn fetch_article(
    pool: &PgPool,
    slug: &str,
    author_filter: Option<Uuid>,
) -> Result<Option<ArticleBody>> {
    let query = format!(
        r"{ARTICLE_SELECT}
        WHERE a.slug = $1
          AND ($2::uuid IS NULL OR a.author_id = $2)
        LIMIT 1
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(slug)
        .bind(author_filter)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch article")?;
    Ok(row.map(|row| article_from_row(&row)))
}

/// Apply a partial update; the slug stays stable across title edits.
pub(crate) async fn update_article(
    pool: &PgPool,
    slug: &str,
    author_filter: Option<Uuid>,
    title: Option<&str>,
    body: Option<&str>,
    tags: Option<&[String]>,
) -> Result<Option<ArticleBody>> {
    let query = r"
        UPDATE articles
        SET title = COALESCE($3, title),
            body = COALESCE($4, body),
            tags = COALESCE($5, tags),
            updated_at = NOW()
        WHERE slug = $1
          AND ($2::uuid IS NULL OR author_id = $2)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(slug)
        .bind(author_filter)
        .bind(title)
        .bind(body)
        .bind(tags)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update article")?;

    match row {
        Some(row) => fetch_article_by_id(pool, row.get("id")).await,
        None => Ok(None),
    }
}
