use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::shortener::ServiceError;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors returned to HTTP clients. Internal causes are logged, never sent.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound(&'static str),
    Internal,
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(message) => ApiError::Validation(message),
            ServiceError::NotFound => ApiError::NotFound("URL not found"),
            ServiceError::CodeSpaceExhausted(attempts) => {
                error!(attempts, "short code generation exhausted its retry budget");
                ApiError::Internal
            }
            ServiceError::Storage(err) => {
                error!(error = ?err, "storage failure");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message.to_string()),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServiceError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ServiceError::NotFound, StatusCode::NOT_FOUND),
            (ServiceError::CodeSpaceExhausted(10), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ServiceError::Storage(anyhow::anyhow!("disk I/O error at /var/db")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response =
            ApiError::from(ServiceError::Storage(anyhow::anyhow!("disk I/O error at /var/db")))
                .into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(!text.contains("/var/db"));
        assert!(text.contains("Internal server error"));
    }
}
