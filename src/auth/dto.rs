use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, FieldErrors};

const MSG_REQUIRED: &str = "This field is required.";
const MSG_BLANK: &str = "This field may not be blank.";
const MSG_INVALID_EMAIL: &str = "Enter a valid email address.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Validated email/password pair, email normalized to trimmed lowercase.
#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

// Fields deserialize as Option so missing keys reach the validator and come
// back as field errors instead of an extractor rejection.
fn validate_credentials(
    email: Option<String>,
    password: Option<String>,
) -> Result<Credentials, ApiError> {
    let mut errors = FieldErrors::default();

    let email = match email {
        None => {
            errors.add("email", MSG_REQUIRED);
            None
        }
        Some(raw) => {
            let normalized = raw.trim().to_lowercase();
            if normalized.is_empty() {
                errors.add("email", MSG_BLANK);
                None
            } else if !is_valid_email(&normalized) {
                errors.add("email", MSG_INVALID_EMAIL);
                None
            } else {
                Some(normalized)
            }
        }
    };

    let password = match password {
        None => {
            errors.add("password", MSG_REQUIRED);
            None
        }
        Some(p) if p.is_empty() => {
            errors.add("password", MSG_BLANK);
            None
        }
        Some(p) => Some(p),
    };

    if let (Some(email), Some(password)) = (email, password) {
        Ok(Credentials { email, password })
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl RegisterRequest {
    pub fn validate(self) -> Result<Credentials, ApiError> {
        validate_credentials(self.email, self.password)
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn validate(self) -> Result<Credentials, ApiError> {
        validate_credentials(self.email, self.password)
    }
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: Option<String>,
}

impl RefreshRequest {
    pub fn validate(self) -> Result<String, ApiError> {
        match self.refresh {
            Some(token) if !token.is_empty() => Ok(token),
            Some(_) => {
                let mut errors = FieldErrors::default();
                errors.add("refresh", MSG_BLANK);
                Err(ApiError::Validation(errors))
            }
            None => {
                let mut errors = FieldErrors::default();
                errors.add("refresh", MSG_REQUIRED);
                Err(ApiError::Validation(errors))
            }
        }
    }
}

/// Response returned after registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user_id: Uuid,
}

/// Token pair returned after login or refresh.
#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub refresh: String,
    pub access: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_messages(err: ApiError, field: &str) -> Vec<String> {
        match err {
            ApiError::Validation(errors) => {
                let json = serde_json::to_value(&errors).unwrap();
                json[field]
                    .as_array()
                    .map(|msgs| {
                        msgs.iter()
                            .map(|m| m.as_str().unwrap().to_string())
                            .collect()
                    })
                    .unwrap_or_default()
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_and_normalizes_valid_credentials() {
        let req = RegisterRequest {
            email: Some("  A@X.Com ".into()),
            password: Some("secret1".into()),
        };
        let creds = req.validate().expect("should validate");
        assert_eq!(creds.email, "a@x.com");
        assert_eq!(creds.password, "secret1");
    }

    #[test]
    fn rejects_malformed_email() {
        let req = LoginRequest {
            email: Some("not-an-email".into()),
            password: Some("secret1".into()),
        };
        let msgs = field_messages(req.validate().unwrap_err(), "email");
        assert_eq!(msgs, vec![MSG_INVALID_EMAIL.to_string()]);
    }

    #[test]
    fn rejects_missing_fields_with_one_error_each() {
        let req = RegisterRequest {
            email: None,
            password: None,
        };
        let err = req.validate().unwrap_err();
        let json = match &err {
            ApiError::Validation(errors) => serde_json::to_value(errors).unwrap(),
            other => panic!("expected validation error, got {other:?}"),
        };
        assert_eq!(json["email"][0], MSG_REQUIRED);
        assert_eq!(json["password"][0], MSG_REQUIRED);
    }

    #[test]
    fn rejects_blank_password() {
        let req = LoginRequest {
            email: Some("a@x.com".into()),
            password: Some("".into()),
        };
        let msgs = field_messages(req.validate().unwrap_err(), "password");
        assert_eq!(msgs, vec![MSG_BLANK.to_string()]);
    }

    #[test]
    fn refresh_token_is_required() {
        let err = RefreshRequest { refresh: None }.validate().unwrap_err();
        let msgs = field_messages(err, "refresh");
        assert_eq!(msgs, vec![MSG_REQUIRED.to_string()]);
    }

    #[test]
    fn email_regex_requires_domain_dot() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("@x.com"));
    }
}
