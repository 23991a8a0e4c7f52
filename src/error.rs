//! Error taxonomy shared by the import and run-status components.

use thiserror::Error;

/// Errors surfaced by lead import, mapping and run-status operations.
///
/// `NotFound` is returned both when an entity is missing and when it belongs
/// to another user; callers cannot tell the two apart.
#[derive(Debug, Error)]
pub enum LeadError {
    /// No identity could be resolved for the request.
    #[error("authentication required")]
    Unauthorized,

    /// Entity is missing or not owned by the requesting user.
    #[error("not found")]
    NotFound,

    /// Malformed or missing request fields.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Declared file extension is outside the accepted set.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat { extension: String },

    /// Content could not be decoded as the declared format.
    #[error("failed to parse spreadsheet: {0}")]
    ParseFailure(String),

    /// Unexpected collaborator failure (storage, transport).
    #[error("internal failure: {0}")]
    Internal(String),
}

impl From<std::io::Error> for LeadError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for LeadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type for lead operations.
pub type Result<T> = std::result::Result<T, LeadError>;

#[cfg(feature = "web")]
mod response {
    use super::LeadError;
    use axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    };

    impl LeadError {
        pub fn status_code(&self) -> StatusCode {
            match self {
                LeadError::Unauthorized => StatusCode::UNAUTHORIZED,
                LeadError::NotFound => StatusCode::NOT_FOUND,
                LeadError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                LeadError::UnsupportedFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                LeadError::ParseFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
                LeadError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl IntoResponse for LeadError {
        fn into_response(self) -> Response {
            let message = match &self {
                LeadError::Internal(detail) => {
                    log::error!("internal failure: {detail}");
                    "internal error".to_string()
                }
                other => other.to_string(),
            };
            (
                self.status_code(),
                Json(serde_json::json!({ "error": message })),
            )
                .into_response()
        }
    }
}
