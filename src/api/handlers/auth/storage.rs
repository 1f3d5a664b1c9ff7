//! Database helpers for accounts, email tokens, and the outbox.

use anyhow::{anyhow, Context, Result};
use rand::Rng;
use serde_json::json;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::email::{TEMPLATE_RESET_PASSWORD, TEMPLATE_VERIFY_EMAIL};
use crate::cli::globals::GlobalArgs;

use super::tokens::{self, TokenKind};
use super::types::UserBody;
use super::utils::{build_reset_url, build_verify_url, hash_email_token, is_unique_violation};

/// Columns every user query selects; `created_at` is rendered server-side.
const USER_COLUMNS: &str = r#"
    id,
    first_name,
    last_name,
    middle_name,
    username,
    email,
    auth_provider,
    password_hash,
    is_admin,
    is_active,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
"#;

#[derive(Debug, Clone)]
pub(crate) struct UserRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub username: String,
    pub email: String,
    pub auth_provider: String,
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: String,
}

impl UserRecord {
    pub(crate) fn into_body(self) -> UserBody {
        UserBody {
            id: self.id.to_string(),
            first_name: self.first_name,
            last_name: self.last_name,
            middle_name: self.middle_name,
            username: self.username,
            email: self.email,
            auth_provider: self.auth_provider,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

fn user_from_row(row: &PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        middle_name: row.get("middle_name"),
        username: row.get("username"),
        email: row.get("email"),
        auth_provider: row.get("auth_provider"),
        password_hash: row.get("password_hash"),
        is_admin: row.get("is_admin"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

pub(crate) async fn email_exists(pool: &PgPool, email: &str) -> Result<bool> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1) AS exists";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to check email uniqueness")?;
    Ok(row.get("exists"))
}

pub(crate) async fn username_exists(pool: &PgPool, username: &str) -> Result<bool> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1) AS exists";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to check username uniqueness")?;
    Ok(row.get("exists"))
}

#[derive(Debug)]
pub(crate) struct NewLocalUser {
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Outcome when attempting to create a new user row.
#[derive(Debug)]
pub(crate) enum CreateOutcome {
    Created(UserRecord),
    Conflict,
}

/// Insert a local (email/password) user, their empty profile, and the
/// verification token + outbox row, all in one transaction.
pub(crate) async fn create_local_user(
    pool: &PgPool,
    globals: &GlobalArgs,
    new_user: NewLocalUser,
) -> Result<CreateOutcome> {
    let mut tx = pool.begin().await.context("begin signup transaction")?;

    let query = format!(
        r"
        INSERT INTO users
            (first_name, last_name, middle_name, username, email, password_hash,
             auth_provider, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, 'email', FALSE)
        RETURNING {USER_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.middle_name)
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await;

    let record = match row {
        Ok(row) => user_from_row(&row),
        Err(err) => {
            if is_unique_violation(&err) {
                let _ = tx.rollback().await;
                return Ok(CreateOutcome::Conflict);
            }
            return Err(err).context("failed to insert user");
        }
    };

    insert_profile(&mut tx, record.id).await?;
    queue_email_link(&mut tx, globals, record.id, &record.email, TokenKind::Verify).await?;

    tx.commit().await.context("commit signup transaction")?;

    Ok(CreateOutcome::Created(record))
}

async fn insert_profile(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, user_id: Uuid) -> Result<()> {
    let query = "INSERT INTO profiles (user_id) VALUES ($1)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert profile")?;
    Ok(())
}

/// Issue a signed email-link token, store its hash, and enqueue the email.
///
/// The raw token only travels inside the outbox payload; the database keeps a
/// SHA-256 hash so a leaked dump cannot be replayed.
pub(crate) async fn queue_email_link(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    globals: &GlobalArgs,
    user_id: Uuid,
    email: &str,
    kind: TokenKind,
) -> Result<()> {
    let token = tokens::issue(globals, user_id, email, kind)?;
    let token_hash = hash_email_token(&token);

    let query = r"
        INSERT INTO email_tokens
            (user_id, token_hash, purpose, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(token_hash)
        .bind(kind.as_str())
        .bind(globals.email_token_ttl_seconds)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert email token")?;

    let (template, payload_json) = match kind {
        TokenKind::Verify => (
            TEMPLATE_VERIFY_EMAIL,
            json!({
                "email": email,
                "verify_url": build_verify_url(&globals.frontend_base_url, &token),
            }),
        ),
        TokenKind::Reset => (
            TEMPLATE_RESET_PASSWORD,
            json!({
                "email": email,
                "reset_url": build_reset_url(&globals.frontend_base_url, &token),
            }),
        ),
        TokenKind::Access | TokenKind::Refresh => {
            return Err(anyhow!("{} tokens are not delivered by email", kind.as_str()));
        }
    };
    let payload_text =
        serde_json::to_string(&payload_json).context("failed to serialize email payload")?;

    let query = r"
        INSERT INTO email_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3::jsonb)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(template)
        .bind(payload_text)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert email outbox row")?;

    Ok(())
}

/// Mark a stored email token consumed if it is still valid for the purpose.
pub(crate) async fn consume_email_token(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    token_hash: &[u8],
    kind: TokenKind,
) -> Result<Option<Uuid>> {
    let query = r"
        UPDATE email_tokens
        SET consumed_at = NOW()
        WHERE token_hash = $1
          AND purpose = $2
          AND consumed_at IS NULL
          AND expires_at > NOW()
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(kind.as_str())
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to consume email token")?;
    Ok(row.map(|row| row.get("user_id")))
}

pub(crate) async fn activate_user(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
) -> Result<Option<UserRecord>> {
    let query = format!(
        r"
        UPDATE users
        SET is_active = TRUE,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to activate user")?;
    Ok(row.map(|row| user_from_row(&row)))
}

pub(crate) async fn fetch_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRecord>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch user by id")?;
    Ok(row.map(|row| user_from_row(&row)))
}

pub(crate) async fn fetch_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch user by email")?;
    Ok(row.map(|row| user_from_row(&row)))
}

/// Look up the account for login by email or username, whichever was sent.
pub(crate) async fn fetch_user_for_login(
    pool: &PgPool,
    email: Option<&str>,
    username: Option<&str>,
) -> Result<Option<UserRecord>> {
    let query = format!(
        r"
        SELECT {USER_COLUMNS}
        FROM users
        WHERE ($1::text IS NOT NULL AND email = $1)
           OR ($2::text IS NOT NULL AND username = $2)
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
        .bind(email)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch user for login")?;
    Ok(row.map(|row| user_from_row(&row)))
}

pub(crate) async fn update_password(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
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
        .bind(password_hash)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to update password")?;
    Ok(())
}

pub(crate) async fn update_auth_provider(
    pool: &PgPool,
    user_id: Uuid,
    provider: &str,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET auth_provider = $2,
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
        .bind(provider)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update auth provider")?;
    Ok(())
}

/// Create an active account for a social login with a generated username.
///
/// Social users carry no local password; the provider check during local
/// login rejects them before the password comparison would run.
pub(crate) async fn create_social_user(
    pool: &PgPool,
    first_name: &str,
    last_name: &str,
    display_name: &str,
    email: &str,
    provider: &str,
) -> Result<UserRecord> {
    // A collision between the pre-check and the insert is possible; retry with
    // a fresh username rather than surfacing the race to the caller.
    for _ in 0..3 {
        let username = generate_username(pool, display_name).await?;

        let mut tx = pool.begin().await.context("begin social signup transaction")?;
        let query = format!(
            r"
            INSERT INTO users
                (first_name, last_name, username, email, auth_provider, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING {USER_COLUMNS}
        "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(first_name)
            .bind(last_name)
            .bind(&username)
            .bind(email)
            .bind(provider)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await;

        match row {
            Ok(row) => {
                let record = user_from_row(&row);
                insert_profile(&mut tx, record.id).await?;
                tx.commit().await.context("commit social signup transaction")?;
                return Ok(record);
            }
            Err(err) if is_unique_violation(&err) => {
                let _ = tx.rollback().await;
            }
            Err(err) => return Err(err).context("failed to insert social user"),
        }
    }

    Err(anyhow!("failed to generate unique username"))
}

/// Derive a username from a display name, retrying with a numeric suffix
/// while the candidate is taken.
pub(crate) async fn generate_username(pool: &PgPool, display_name: &str) -> Result<String> {
    let base: String = display_name
        .split_whitespace()
        .collect::<String>()
        .to_lowercase();
    let mut candidate = if base.is_empty() {
        "author".to_string()
    } else {
        base
    };

    while username_exists(pool, &candidate).await? {
        let suffix = rand::thread_rng().gen_range(0..=1000);
        candidate = format!("{candidate}{suffix}");
    }

    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::{CreateOutcome, NewLocalUser, UserRecord};
    use uuid::Uuid;

    #[test]
    fn create_outcome_debug_names() {
        assert_eq!(format!("{:?}", CreateOutcome::Conflict), "Conflict");
    }

    #[test]
    fn user_record_body_drops_password_hash() {
        let record = UserRecord {
            id: Uuid::nil(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            middle_name: None,
            username: "test1".to_string(),
            email: "test.user@app.com".to_string(),
            auth_provider: "email".to_string(),
            password_hash: Some("$argon2id$...".to_string()),
            is_admin: false,
            is_active: false,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        };
        let body = record.into_body();
        let value = serde_json::to_value(&body).expect("serialize");
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["is_active"], false);
    }

    #[test]
    fn new_local_user_holds_values() {
        let new_user = NewLocalUser {
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            middle_name: None,
            username: "test1".to_string(),
            email: "test.user@app.com".to_string(),
            password_hash: "$argon2id$...".to_string(),
        };
        assert_eq!(new_user.username, "test1");
        assert_eq!(new_user.email, "test.user@app.com");
    }
}
