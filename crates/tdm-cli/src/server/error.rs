//! Maps core errors onto HTTP responses with a `{"error": "..."}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tdm_core::TdmError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<TdmError> for ApiError {
    fn from(err: TdmError) -> Self {
        match err {
            TdmError::Validation(message) => Self::bad_request(message),
            TdmError::NotFound(what) => {
                tracing::debug!("not found: {}", what);
                Self {
                    status: StatusCode::NOT_FOUND,
                    message: "file not found".to_string(),
                }
            }
            other => {
                tracing::error!("request failed: {}", other);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "internal error".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        let v: ApiError = TdmError::Validation("magnet link is required".into()).into();
        assert_eq!(v.status(), StatusCode::BAD_REQUEST);
        let n: ApiError = TdmError::NotFound("file x".into()).into();
        assert_eq!(n.status(), StatusCode::NOT_FOUND);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let s: ApiError = TdmError::storage("x", io).into();
        assert_eq!(s.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
