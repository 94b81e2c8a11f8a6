//! Error types for the RAG backend

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG backend errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed client request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// File parsing error
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Hosted service refused the call because of a rate limit or quota
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Rate-limit retries ran out
    #[error("Giving up after {attempts} rate-limited attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Vector database error
    #[error("Vector database error: {0}")]
    VectorDb(String),

    /// LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the retry loop should back off and try again
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited(_))
    }

    /// Classify a failed hosted-API response.
    ///
    /// 429s and quota/rate-limit bodies become [`Error::RateLimited`]; anything
    /// else is handed to `otherwise`.
    pub fn from_status(
        status: reqwest::StatusCode,
        body: &str,
        otherwise: impl FnOnce(String) -> Error,
    ) -> Error {
        let message = format!("HTTP {} - {}", status, body);
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || mentions_rate_limit(body) {
            Error::RateLimited(message)
        } else {
            otherwise(message)
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) | Error::UnsupportedFileType(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn mentions_rate_limit(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("resource_exhausted") || lower.contains("quota") || lower.contains("rate limit")
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        let err = Error::from_status(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "slow down",
            Error::embedding,
        );
        assert!(err.is_rate_limited());

        let err = Error::from_status(
            reqwest::StatusCode::FORBIDDEN,
            r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#,
            Error::embedding,
        );
        assert!(err.is_rate_limited());

        let err = Error::from_status(
            reqwest::StatusCode::BAD_REQUEST,
            "invalid input",
            Error::embedding,
        );
        assert!(!err.is_rate_limited());
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_error_response_shape() {
        let response = Error::BadRequest("missing file".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = Error::llm("model unavailable").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["detail"], "LLM error: model unavailable");
    }
}
