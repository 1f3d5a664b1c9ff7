//! JWT issuance and verification.
//!
//! Login hands out an access/refresh pair; email verification and password
//! reset links carry single-purpose tokens. Every token is HS256-signed with
//! the configured secret and carries its purpose in `token_type`, so a token
//! minted for one flow never validates in another.

use crate::cli::globals::GlobalArgs;
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Verify,
    Reset,
}

impl TokenKind {
    /// Stable name used for the `purpose` column of stored email tokens.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::Verify => "verify",
            Self::Reset => "reset",
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub token_type: TokenKind,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    Invalid,
}

fn ttl_seconds(globals: &GlobalArgs, kind: TokenKind) -> i64 {
    match kind {
        TokenKind::Access => globals.access_token_ttl_seconds,
        TokenKind::Refresh => globals.refresh_token_ttl_seconds,
        TokenKind::Verify | TokenKind::Reset => globals.email_token_ttl_seconds,
    }
}

/// Sign a token of the given kind for a user.
///
/// # Errors
/// Returns an error if JWT encoding fails.
pub fn issue(globals: &GlobalArgs, user_id: Uuid, email: &str, kind: TokenKind) -> Result<String> {
    issue_with_ttl(globals, user_id, email, kind, ttl_seconds(globals, kind))
}

pub(crate) fn issue_with_ttl(
    globals: &GlobalArgs,
    user_id: Uuid,
    email: &str,
    kind: TokenKind,
    ttl_seconds: i64,
) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        token_type: kind,
        jti: Ulid::new().to_string(),
        iat: now,
        exp: now + ttl_seconds,
    };
    encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &EncodingKey::from_secret(globals.jwt_secret.expose_secret().as_bytes()),
    )
    .context("failed to sign token")
}

/// Verify a token and check it was minted for the expected purpose.
///
/// # Errors
/// `Expired` when the signature is valid but the token is past its `exp`;
/// `Invalid` for every other failure, including a purpose mismatch.
pub fn verify(globals: &GlobalArgs, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(globals.jwt_secret.expose_secret().as_bytes()),
        &validation,
    )
    .map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })?;

    if data.claims.token_type != expected {
        return Err(TokenError::Invalid);
    }

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn globals() -> GlobalArgs {
        GlobalArgs::new(
            SecretString::from("unit-test-secret"),
            "https://authorsheaven.dev".to_string(),
        )
    }

    #[test]
    fn access_token_round_trips() {
        let globals = globals();
        let user_id = Uuid::new_v4();
        let token = issue(&globals, user_id, "reader@example.com", TokenKind::Access)
            .expect("token should sign");
        let claims = verify(&globals, &token, TokenKind::Access).expect("token should verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "reader@example.com");
        assert_eq!(claims.token_type, TokenKind::Access);
    }

    #[test]
    fn purpose_mismatch_is_invalid() {
        let globals = globals();
        let token = issue(&globals, Uuid::new_v4(), "reader@example.com", TokenKind::Verify)
            .expect("token should sign");
        assert_eq!(
            verify(&globals, &token, TokenKind::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let globals = globals();
        let token = issue_with_ttl(
            &globals,
            Uuid::new_v4(),
            "reader@example.com",
            TokenKind::Verify,
            -30,
        )
        .expect("token should sign");
        assert_eq!(
            verify(&globals, &token, TokenKind::Verify),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn garbage_token_is_invalid() {
        let globals = globals();
        assert_eq!(
            verify(&globals, "token", TokenKind::Verify),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let globals = globals();
        let token = issue(&globals, Uuid::new_v4(), "reader@example.com", TokenKind::Access)
            .expect("token should sign");
        let other = GlobalArgs::new(
            SecretString::from("another-secret"),
            "https://authorsheaven.dev".to_string(),
        );
        assert_eq!(
            verify(&other, &token, TokenKind::Access),
            Err(TokenError::Invalid)
        );
    }
}
