// src/error.rs
// Defines the error type of the HTTP layer and its
// conversion into JSON error responses.

use crate::pipeline::UpscaleError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    // The super-resolution model failed to load at startup
    ModelUnavailable,

    // Errors related to request processing
    MissingInput(String),
    BadRequest(String),
    PayloadTooLarge(String),
    InvalidImage(String),

    // Upscaling, encoding, or anything unexpected while processing
    ProcessingFailed(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_code_str) = match self {
            ApiError::ModelUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server Error: Model missing".to_string(),
                "MODEL_UNAVAILABLE",
            ),
            ApiError::MissingInput(s) => (StatusCode::BAD_REQUEST, s, "MISSING_INPUT"),
            ApiError::BadRequest(s) => (StatusCode::BAD_REQUEST, s, "BAD_REQUEST"),
            ApiError::PayloadTooLarge(s) => {
                (StatusCode::PAYLOAD_TOO_LARGE, s, "PAYLOAD_TOO_LARGE")
            }
            ApiError::InvalidImage(s) => {
                tracing::debug!("Rejecting undecodable upload: {}", s);
                (
                    StatusCode::BAD_REQUEST,
                    "Invalid image".to_string(),
                    "INVALID_IMAGE",
                )
            }
            ApiError::ProcessingFailed(s) => {
                tracing::error!("Upscale processing failed: {}", s);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Processing Failed".to_string(),
                    "PROCESSING_FAILED",
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": error_code_str,
        }));
        (status, body).into_response()
    }
}

impl From<UpscaleError> for ApiError {
    fn from(err: UpscaleError) -> Self {
        match err {
            UpscaleError::InvalidImage(s) => ApiError::InvalidImage(s),
            UpscaleError::ProcessingFailed(s) => ApiError::ProcessingFailed(s),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(format!("Upload too large: {}", err.body_text()))
        } else {
            ApiError::BadRequest(format!("Invalid multipart request: {}", err.body_text()))
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::ProcessingFailed(format!("upscale task aborted: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_model_unavailable_is_500() {
        let (status, body) = render(ApiError::ModelUnavailable).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Server Error: Model missing");
        assert_eq!(body["code"], "MODEL_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_input_errors_are_400() {
        let (status, body) = render(ApiError::MissingInput("No file uploaded".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file uploaded");

        let (status, body) = render(UpscaleError::InvalidImage("bad magic".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid image");
    }

    #[tokio::test]
    async fn test_processing_failure_hides_detail() {
        let (status, body) =
            render(UpscaleError::ProcessingFailed("segfault-ish detail".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Processing Failed");
        assert_eq!(body["code"], "PROCESSING_FAILED");
    }
}
