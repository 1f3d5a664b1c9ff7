//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct UserBody {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub username: String,
    pub email: String,
    pub auth_provider: String,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserBody,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct TokenParams {
    pub token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SocialAuthRequest {
    pub auth_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TwitterAuthRequest {
    pub access_token_key: Option<String>,
    pub access_token_secret: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn signup_request_round_trips() -> Result<()> {
        let request = SignupRequest {
            first_name: Some("Test".to_string()),
            last_name: Some("User".to_string()),
            middle_name: None,
            username: Some("test1".to_string()),
            email: Some("test.user@app.com".to_string()),
            password: Some("Password@1234".to_string()),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "test.user@app.com");
        let decoded: SignupRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.username.as_deref(), Some("test1"));
        Ok(())
    }

    #[test]
    fn login_request_allows_missing_identifiers() -> Result<()> {
        let decoded: LoginRequest = serde_json::from_str(r#"{"password": "Password@1234"}"#)?;
        assert!(decoded.email.is_none());
        assert!(decoded.username.is_none());
        assert_eq!(decoded.password.as_deref(), Some("Password@1234"));
        Ok(())
    }

    #[test]
    fn token_bundle_serializes_expected_keys() -> Result<()> {
        let bundle = TokenBundle {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            user: UserBody {
                id: "4be544e2-8a4f-46f4-a8a3-6a4a3f9c29b4".to_string(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                middle_name: None,
                username: "test1".to_string(),
                email: "test.user@app.com".to_string(),
                auth_provider: "email".to_string(),
                is_active: true,
                created_at: "2024-01-01T00:00:00Z".to_string(),
            },
        };
        let value = serde_json::to_value(&bundle)?;
        assert!(value.get("access_token").is_some());
        assert!(value.get("refresh_token").is_some());
        assert_eq!(value["user"]["username"], "test1");
        Ok(())
    }
}
