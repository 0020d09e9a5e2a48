use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Failure of a single forward to the document store
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// The request never produced a response (connect, DNS, reset, ...)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The store answered with a status >= 400
    #[error("store rejected the record with status {status}")]
    Rejected { status: u16 },
    /// The forward task panicked or was aborted before completing
    #[error("forward task did not complete: {0}")]
    Interrupted(#[from] tokio::task::JoinError),
}

/// Handler-level errors, one per failure path of the request pipeline
#[derive(Debug)]
pub enum AppError {
    /// Request body could not be read (over the size limit, client hung up)
    ReadBody(BytesRejection),
    /// Request body is not a JSON object
    InvalidLogFormat(serde_json::Error),
    /// Enriched record could not be re-encoded
    MarshalLog(serde_json::Error),
    /// Document store unreachable or rejecting
    Forward(ForwardError),
    /// Health payload could not be encoded
    EncodeHealth(serde_json::Error),
}

impl AppError {
    /// Message attached to the request span as `exception.message`
    pub fn span_message(&self) -> &'static str {
        match self {
            Self::ReadBody(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                "Log record too large"
            }
            Self::ReadBody(_) | Self::InvalidLogFormat(_) => "Invalid log format",
            Self::MarshalLog(_) => "Failed to marshal log data",
            Self::Forward(_) => "Failed to send log to OpenSearch",
            Self::EncodeHealth(_) => "Failed to encode health response",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::ReadBody(rejection) => rejection.status(),
            Self::InvalidLogFormat(_) => StatusCode::BAD_REQUEST,
            Self::MarshalLog(_) | Self::Forward(_) | Self::EncodeHealth(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Fixed message returned to the caller
    fn public_message(&self) -> &'static str {
        match self {
            Self::ReadBody(_) | Self::InvalidLogFormat(_) => self.span_message(),
            Self::MarshalLog(_) | Self::EncodeHealth(_) => "Internal server error",
            Self::Forward(_) => "Failed to send log to OpenSearch",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadBody(err) => write!(f, "Failed to read request body: {}", err),
            Self::InvalidLogFormat(err) => write!(f, "Invalid log format: {}", err),
            Self::MarshalLog(err) => write!(f, "Failed to marshal log data: {}", err),
            Self::Forward(err) => write!(f, "Failed to send log to OpenSearch: {}", err),
            Self::EncodeHealth(err) => write!(f, "Failed to encode health response: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadBody(err) => Some(err),
            Self::InvalidLogFormat(err) | Self::MarshalLog(err) | Self::EncodeHealth(err) => {
                Some(err)
            }
            Self::Forward(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}

impl From<ForwardError> for AppError {
    fn from(err: ForwardError) -> Self {
        Self::Forward(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_error() -> serde_json::Error {
        serde_json::from_str::<serde_json::Value>("{not json").unwrap_err()
    }

    #[test]
    fn test_error_display() {
        let error = AppError::Forward(ForwardError::Rejected { status: 503 });
        assert_eq!(
            error.to_string(),
            "Failed to send log to OpenSearch: store rejected the record with status 503"
        );
    }

    #[test]
    fn test_span_messages() {
        assert_eq!(AppError::InvalidLogFormat(json_error()).span_message(), "Invalid log format");
        assert_eq!(AppError::MarshalLog(json_error()).span_message(), "Failed to marshal log data");
        assert_eq!(
            AppError::EncodeHealth(json_error()).span_message(),
            "Failed to encode health response"
        );
    }

    #[tokio::test]
    async fn test_error_response() {
        let response = AppError::InvalidLogFormat(json_error()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "error": "Invalid log format" }));
    }

    #[tokio::test]
    async fn test_marshal_and_forward_errors_are_500() {
        let response = AppError::MarshalLog(json_error()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "error": "Internal server error" }));

        let response = AppError::Forward(ForwardError::Rejected { status: 400 }).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "error": "Failed to send log to OpenSearch" }));
    }
}
