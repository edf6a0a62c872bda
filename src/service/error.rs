//! HTTP error responses.
//!
//! Every rejection renders as `{"code": ..., "message": ...}` with a status
//! matching the code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced at the HTTP boundary.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    /// The identity function found no user on the request.
    #[error("authentication required")]
    Unauthorized,

    /// The client cannot receive a Server-Sent Events stream.
    #[error("streaming unsupported: client must accept text/event-stream")]
    StreamingUnsupported,
}

impl ApiError {
    pub fn status(self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::StreamingUnsupported => StatusCode::NOT_ACCEPTABLE,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::StreamingUnsupported => "streaming_unsupported",
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
