//! User-facing error message catalog.
//!
//! Handlers reference these constants instead of inlining strings so the API
//! wording stays consistent between validation paths and their tests.

pub mod email {
    pub const REQUIRED: &str = "The email address is required";
    pub const INVALID: &str = "The email address is invalid";
    pub const BLANK: &str = "The email address can't be blank";
    pub const UNIQUE: &str = "The email address already exists";
}

pub mod username {
    pub const REQUIRED: &str = "The username is required";
    pub const BLANK: &str = "The username can't be blank";
    pub const UNIQUE: &str = "The username already exists";
}

pub mod first_name {
    pub const REQUIRED: &str = "The first name is required";
    pub const BLANK: &str = "The first name can't be blank";
}

pub mod last_name {
    pub const REQUIRED: &str = "The last name is required";
    pub const BLANK: &str = "The last name can't be blank";
}

pub mod password {
    pub const REQUIRED: &str = "The password is required";
    pub const BLANK: &str = "The password can't be blank";
    pub const MIN_LENGTH: &str = "The password must have at least 8 characters";
    pub const MAX_LENGTH: &str = "The password must have at most 100 characters";
    pub const WEAK: &str =
        "The password must contain at least 1 uppercase, 1 lowercase and 1 special character";
}

pub mod confirm_password {
    pub const REQUIRED: &str = "The confirm password field is required";
    pub const BLANK: &str = "The confirm password field can't be blank";
    pub const INVALID: &str = "The confirm password field doesn't match password field";
}

pub mod token {
    pub const EXPIRED: &str = "The token is expired";
    pub const INVALID: &str = "The token is invalid";
}

pub mod account {
    pub const REQUIRED: &str = "The username or email is required";
    pub const DISABLED: &str = "The account is not activated. Please check your email";
    pub const NO_ACCOUNT: &str = "No account with the provided credentials";

    #[must_use]
    pub fn provider(provider: &str) -> String {
        format!("Please continue your login with {provider}")
    }
}

pub mod auth_token {
    pub const REQUIRED: &str = "The auth_token is required";
    pub const BLANK: &str = "The auth_token can't be blank";
}

pub mod social_app_id {
    pub const INVALID: &str = "The Client ID provided is not recognisable";
}

pub mod access_tokens {
    pub const INVALID: &str = "The access_token_key and access_token_secret are invalid";
}

pub mod field {
    pub const REQUIRED: &str = "This field is required.";
    pub const BLANK: &str = "This field may not be blank.";
    pub const NULL: &str = "This field may not be null.";
}

pub mod permission {
    pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
    pub const DENIED: &str = "You do not have permission to perform this action.";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_message_names_the_provider() {
        assert_eq!(
            account::provider("google"),
            "Please continue your login with google"
        );
    }
}
