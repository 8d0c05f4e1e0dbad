//! Wire envelope and the mapping from domain errors to HTTP statuses.

use domains::AppError;
use serde::{Deserialize, Serialize};

pub const SUCCESS: &str = "Success";
pub const FAILED: &str = "Failed";
pub const ALREADY_SAVED: &str = "Already saved";

/// `{"data": ..., "message": "Success"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            data,
            message: SUCCESS.to_string(),
        }
    }
}

/// `{"error": <text>, "code": <reason>, "message": "Failed"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        ErrorBody {
            error: err.to_string(),
            code: err.code().to_string(),
            message: FAILED.to_string(),
        }
    }
}

pub fn status_code(err: &AppError) -> u16 {
    match err {
        AppError::ValidationError(_) => 400,
        AppError::Unauthenticated => 401,
        AppError::AuthorizationError(_) => 403,
        AppError::NotFound(..) => 404,
        AppError::Conflict(_) => 409,
        AppError::ProvenanceError(_) => 422,
        AppError::Unavailable(_) => 503,
        AppError::Internal(_) => 500,
    }
}

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

#[cfg(feature = "web-axum")]
impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = StatusCode::from_u16(status_code(&self.0))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }
        (status, axum::Json(ErrorBody::from(&self.0))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{ProvenanceReason, ValidationReason};

    #[test]
    fn statuses_keep_validation_and_authorization_apart() {
        assert_eq!(status_code(&ValidationReason::MissingSourceUrl.into()), 400);
        assert_eq!(status_code(&AppError::AuthorizationError("default box".into())), 403);
        assert_eq!(
            status_code(&AppError::ProvenanceError(ProvenanceReason::SourceUnavailable)),
            422
        );
        assert_eq!(status_code(&AppError::Unavailable("timeout".into())), 503);
    }

    #[test]
    fn error_body_carries_reason_code() {
        let body = ErrorBody::from(&AppError::from(ValidationReason::ExtraneousSourceFields));
        insta::assert_json_snapshot!(body, @r#"
        {
          "error": "validation error: extraneous_source_fields",
          "code": "extraneous_source_fields",
          "message": "Failed"
        }
        "#);
    }
}
