use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::extract::trimmed;

/// Request body for signup.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 3, max = 50, message = "username must be 3 to 50 characters"))]
    pub username: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(email(message = "invalid email"), length(max = 100))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "password must be 6 to 128 characters"))]
    pub password: String,
}

/// Form-encoded login credentials.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer",
        }
    }
}

/// Body of `request_email` and `forgot_password`.
#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(email(message = "invalid email"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordForm {
    #[validate(length(min = 6, max = 128, message = "password must be 6 to 128 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(username: &str) -> SignupRequest {
        serde_json::from_value(serde_json::json!({
            "username": username,
            "email": "  ann@example.com ",
            "password": "secret1"
        }))
        .unwrap()
    }

    #[test]
    fn padded_username_is_measured_trimmed() {
        let req = signup("  ab  ");
        assert_eq!(req.username, "ab");
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));
    }

    #[test]
    fn password_length_bounds() {
        for (password, ok) in [("12345", false), ("123456", true)] {
            let mut req = signup("ann");
            req.password = password.into();
            assert_eq!(req.validate().is_ok(), ok, "{password}");
        }
        let mut req = signup("ann");
        req.password = "p".repeat(128);
        assert!(req.validate().is_ok());
        req.password = "p".repeat(129);
        assert!(req.validate().is_err());
    }

    #[test]
    fn email_padding_is_stripped_before_validation() {
        let req = signup("ann");
        assert_eq!(req.email, "ann@example.com");
        assert!(req.validate().is_ok());
    }
}
