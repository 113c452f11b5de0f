use axum::{response::IntoResponse, Json};
use serde::Serialize;

/// Failure taxonomy shared by every service. Each variant carries the
/// human-readable message returned to the caller; storage-layer detail
/// stays in the server log.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    DuplicateEnrollment(String),
    #[error("{0}")]
    Upload(String),
    #[error("{0}")]
    PaymentRejected(String),
    #[error("{0}")]
    Database(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::Validation(msg) | Self::DuplicateEnrollment(msg) | Self::PaymentRejected(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Upload(msg) | Self::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            Self::Database(detail) => {
                log::error!("database failure: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (
            status,
            Json(serde_json::json!({ "success": false, "message": message })),
        )
            .into_response()
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(e: diesel::result::Error) -> Self {
        ApiError::Database(e.to_string())
    }
}

impl From<diesel::r2d2::PoolError> for ApiError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        ApiError::Database(format!("connection pool: {}", e))
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;
    use axum::http::StatusCode;

    #[test]
    fn test_status_mapping() {
        test_util::setup();
        let cases = [
            (
                ApiError::Validation("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::DuplicateEnrollment("dup".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::PaymentRejected("sig".into()),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (
                ApiError::Upload("fail".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Database("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_database_detail_not_leaked() {
        test_util::setup();
        let response =
            ApiError::Database("password authentication failed for user".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
