use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Error returned by HTTP handlers.
///
/// `Internal` carries a fixed public message; the cause is only logged.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{public}: {cause}")]
    Internal { public: String, cause: String },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn too_large(msg: impl Into<String>) -> Self {
        ApiError::PayloadTooLarge(msg.into())
    }

    /// Wrap an internal failure under a public message.
    pub fn internal(public: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        ApiError::Internal {
            public: public.into(),
            cause: cause.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            ApiError::Internal { public, cause } => {
                tracing::error!(error = %cause, "{public}");
                (StatusCode::INTERNAL_SERVER_ERROR, public)
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let r = ApiError::bad_request("Image is required").into_response();
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
        let r = ApiError::internal("Summarization failed", "boom").into_response();
        assert_eq!(r.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let r = ApiError::too_large("Upload too large").into_response();
        assert_eq!(r.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_display_keeps_cause() {
        let e = ApiError::internal("Face analysis failed", "timeout");
        assert_eq!(e.to_string(), "Face analysis failed: timeout");
    }
}
