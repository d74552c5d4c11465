//! API error handling.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dispatcher::DispatchError;

/// Message returned for an unparseable or out-of-range limit.
pub const INVALID_LIMIT_MESSAGE: &str = "Invalid limit N. N must be an integer greater than 1.";

/// Message returned for any failure after the limit was accepted.
pub const SERVER_ERROR_MESSAGE: &str = "Failed to generate primes due to a server error.";

/// API error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: String,
}

/// API error type that converts to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// Constructs an `ApiError` representing a 400 Bad Request.
    ///
    /// # Examples
    ///
    /// ```
    /// use primes_api::server::error::ApiError;
    ///
    /// let err = ApiError::bad_request("invalid input");
    /// assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    /// assert_eq!(err.message, "invalid input");
    /// ```
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Constructs an `ApiError` representing a 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    /// The 400 response for a bad limit.
    pub fn invalid_limit() -> Self {
        Self::bad_request(INVALID_LIMIT_MESSAGE)
    }

    /// The generic 500 response for a failed computation.
    pub fn computation_failed() -> Self {
        Self::internal(SERVER_ERROR_MESSAGE)
    }
}

impl IntoResponse for ApiError {
    /// Convert the `ApiError` into an HTTP response with a `{"error": ...}` body.
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<DispatchError> for ApiError {
    /// Map a dispatch failure to its public response.
    ///
    /// Only invalid input is the caller's fault; everything else becomes the
    /// same generic 500 with no internal detail.
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidInput { .. } => ApiError::invalid_limit(),
            DispatchError::ComputationRuntimeError { .. }
            | DispatchError::WorkerAbnormalExit { .. }
            | DispatchError::SpawnFailed { .. } => ApiError::computation_failed(),
        }
    }
}
