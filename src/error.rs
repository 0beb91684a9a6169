use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Reasons a payment link is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("Payment link is malformed")]
    MalformedToken,
    #[error("Payment link is invalid or has expired")]
    ExpiredOrInvalid,
    #[error("Payment link has already been used")]
    AlreadyUsed,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Could not generate a unique code after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("Missing configuration: {0}")]
    ConfigurationMissing(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::GenerationExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Verification(VerificationError::MalformedToken) => StatusCode::BAD_REQUEST,
            AppError::Verification(VerificationError::ExpiredOrInvalid) => StatusCode::NOT_FOUND,
            AppError::Verification(VerificationError::AlreadyUsed) => StatusCode::CONFLICT,
            AppError::ConfigurationMissing(_)
            | AppError::InvalidConfiguration(_)
            | AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_label(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "Not found",
            AppError::BadRequest(_) => "Bad request",
            AppError::Conflict(_) => "Conflict",
            AppError::GenerationExhausted { .. } => "Code generation exhausted",
            AppError::Verification(VerificationError::MalformedToken) => "Malformed payment link",
            AppError::Verification(VerificationError::ExpiredOrInvalid) => {
                "Payment link invalid or expired"
            }
            AppError::Verification(VerificationError::AlreadyUsed) => "Payment link already used",
            _ => "Internal server error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Infrastructure failures are logged in full but surfaced generically.
        let details = if status.is_server_error() && !matches!(self, AppError::GenerationExhausted { .. }) {
            tracing::error!("{}", self);
            None
        } else {
            match &self {
                AppError::NotFound(msg) | AppError::BadRequest(msg) | AppError::Conflict(msg) => {
                    Some(msg.clone())
                }
                AppError::GenerationExhausted { .. } => {
                    tracing::warn!("{}", self);
                    Some(self.to_string())
                }
                AppError::Verification(e) => Some(e.to_string()),
                _ => None,
            }
        };

        let body = ErrorBody {
            error: self.public_label(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
