use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use prosperity_core::PipelineError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Missing or invalid API key")]
    Unauthorized,

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::InvalidParam(param) => {
                tracing::warn!(param = %param, error_code = "INVALID_PARAM", "Invalid parameter");
                (StatusCode::BAD_REQUEST, "INVALID_PARAM")
            }
            AppError::UnknownAction(action) => {
                tracing::warn!(action = %action, error_code = "UNKNOWN_ACTION", "Unknown action");
                (StatusCode::BAD_REQUEST, "UNKNOWN_ACTION")
            }
            AppError::Unauthorized => {
                tracing::warn!(error_code = "UNAUTHORIZED", "Rejected unauthenticated request");
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, error_code = "INTERNAL_ERROR", "Internal error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            AppError::Pipeline(e) => match e {
                PipelineError::InsufficientProxyData { .. } | PipelineError::UnknownModel(_) => {
                    tracing::info!(error = %e, error_code = "UNPROCESSABLE", "Pipeline declined request");
                    (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE")
                }
                PipelineError::MissingPrerequisite(_) => {
                    tracing::warn!(error = %e, error_code = "MISSING_PREREQUISITE", "Missing prerequisite");
                    (StatusCode::BAD_REQUEST, "MISSING_PREREQUISITE")
                }
                PipelineError::SourceUnavailable { .. } | PipelineError::Timeout { .. } => {
                    tracing::error!(error = %e, error_code = "SOURCE_UNAVAILABLE", "Upstream source unavailable");
                    (StatusCode::BAD_GATEWAY, "SOURCE_UNAVAILABLE")
                }
                _ => {
                    tracing::error!(error = %e, error_code = "PIPELINE_ERROR", "Pipeline error occurred");
                    (StatusCode::INTERNAL_SERVER_ERROR, "PIPELINE_ERROR")
                }
            },
        };

        tracing::debug!(
            status_code = %status.as_u16(),
            error_code = %code,
            error_message = %self.to_string(),
            "Returning error response"
        );

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
