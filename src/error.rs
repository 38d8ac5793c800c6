use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::auth::repo::StoreError;

/// Per-field validation messages, keyed by request field name.
#[derive(Debug, Default, Serialize)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<&'static str>>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: &'static str) {
        self.0.entry(field).or_default().push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] so every failure class maps to one status and
/// JSON body. Unknown email and wrong password both surface as
/// `InvalidCredentials` and stay indistinguishable on the wire.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("user already exists")]
    UserExists,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("credential store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => ApiError::UserExists,
            StoreError::Database(e) => ApiError::Unavailable(e),
            StoreError::Hash(e) => ApiError::Internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(errors)).into_response()
            }
            ApiError::UserExists => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "User already exists" })),
            )
                .into_response(),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid credentials" })),
            )
                .into_response(),
            ApiError::Unavailable(err) => {
                error!(error = %err, "credential store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": "Service unavailable" })),
                )
                    .into_response()
            }
            ApiError::Internal(err) => {
                error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
