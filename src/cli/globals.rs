use secrecy::SecretString;

/// Shared configuration handed to handlers through an axum `Extension`.
#[derive(Clone)]
pub struct GlobalArgs {
    pub jwt_secret: SecretString,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub email_token_ttl_seconds: i64,
    pub frontend_base_url: String,
    pub email_from: String,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(jwt_secret: SecretString, frontend_base_url: String) -> Self {
        Self {
            jwt_secret,
            access_token_ttl_seconds: 60 * 60 * 24,
            refresh_token_ttl_seconds: 60 * 60 * 24 * 14,
            email_token_ttl_seconds: 60 * 60 * 24,
            frontend_base_url,
            email_from: String::from("no-reply@authorsheaven.dev"),
        }
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("jwt_secret", &"***")
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_seconds", &self.refresh_token_ttl_seconds)
            .field("email_token_ttl_seconds", &self.email_token_ttl_seconds)
            .field("frontend_base_url", &self.frontend_base_url)
            .field("email_from", &self.email_from)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            SecretString::from("secret"),
            "https://authorsheaven.dev".to_string(),
        );
        assert_eq!(args.jwt_secret.expose_secret(), "secret");
        assert_eq!(args.frontend_base_url, "https://authorsheaven.dev");
        assert_eq!(args.access_token_ttl_seconds, 86_400);
        assert_eq!(args.refresh_token_ttl_seconds, 1_209_600);
    }

    #[test]
    fn debug_redacts_jwt_secret() {
        let args = GlobalArgs::new(
            SecretString::from("secret"),
            "https://authorsheaven.dev".to_string(),
        );
        let rendered = format!("{args:?}");
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("***"));
    }
}
