use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mindful_core::CoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Core(e) => e.kind(),
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::InvalidBody(_) => "validation_error",
        }
    }

    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::Core(e) => match e {
                CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                CoreError::PublicationPrecondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CoreError::ImmutableResource { .. }
                | CoreError::DuplicateWeek { .. }
                | CoreError::DuplicateMoment { .. }
                | CoreError::DuplicateResponse
                | CoreError::DuplicateDiaryEntry
                | CoreError::AlreadyEnrolled
                | CoreError::AlreadyInAnotherProgram { .. }
                | CoreError::InvalidState(_) => StatusCode::CONFLICT,
                CoreError::Storage(_) | CoreError::Serialization(_) | CoreError::Io(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();

        let body = match &self {
            Self::Core(e) if e.is_internal() => {
                tracing::error!(error = %e, "request failed");
                ErrorBody {
                    error: self.kind().to_string(),
                    message: "internal server error".to_string(),
                    details: None,
                }
            }
            Self::Core(CoreError::PublicationPrecondition(blocker)) => ErrorBody {
                error: self.kind().to_string(),
                message: self.to_string(),
                details: serde_json::to_value(blocker).ok(),
            },
            _ => ErrorBody {
                error: self.kind().to_string(),
                message: self.to_string(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}
