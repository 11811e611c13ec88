//! Error Handling Module
//!
//! A single error type flows through every model call and through the retry
//! machinery. The retry loop only consumes three predicates from it:
//! [`LlmError::is_retryable`], [`LlmError::is_user_cancellation`] and
//! [`LlmError::response_headers`]. Everything else is carried through untouched.
//!
//! # Example
//!
//! ```rust,ignore
//! use siumai_fallback::LlmError;
//!
//! let error = LlmError::api_error(503, "Service Unavailable");
//! assert!(error.is_retryable());
//! assert!(!error.is_user_cancellation());
//! ```

use std::fmt;

use thiserror::Error;

use crate::types::{FinishReason, ModelKey, ResponseHeaders};

/// Errors produced by models and by the retry machinery.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// Provider API error with status code and optional response metadata.
    #[error("API error {code}: {message}")]
    ApiError {
        code: u16,
        message: String,
        details: Option<serde_json::Value>,
        headers: Option<ResponseHeaders>,
    },

    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Transport-level failure (connection reset, DNS, TLS).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The attempt ran out of time. Retryable.
    #[error("Request timed out: {0}")]
    TimeoutError(String),

    /// The caller cancelled the request. Never retried.
    #[error("Request aborted: {0}")]
    Aborted(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    /// Every applicable strategy was exhausted after more than one attempt.
    #[error(transparent)]
    RetryError(RetryError),
}

impl LlmError {
    /// Create an API error from a status code and message.
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: None,
            headers: None,
        }
    }

    /// Create an API error that carries structured details (usually the decoded body).
    pub fn api_error_with_details(
        code: u16,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: Some(details),
            headers: None,
        }
    }

    /// Create an API error that carries the response headers.
    pub fn api_error_with_headers(
        code: u16,
        message: impl Into<String>,
        headers: ResponseHeaders,
    ) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: None,
            headers: Some(headers),
        }
    }

    /// HTTP status code, if the error came from an HTTP response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            Self::RateLimitError(_) => Some(429),
            _ => None,
        }
    }

    /// Response headers attached to the error, if any.
    pub fn response_headers(&self) -> Option<&ResponseHeaders> {
        match self {
            Self::ApiError { headers, .. } => headers.as_ref(),
            _ => None,
        }
    }

    /// Structured details attached to an API error.
    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            Self::ApiError { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Whether the provider considers the failure transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ApiError { code, .. } => matches!(code, 408 | 409 | 429) || *code >= 500,
            Self::RateLimitError(_)
            | Self::HttpError(_)
            | Self::TimeoutError(_)
            | Self::StreamError(_) => true,
            Self::RetryError(inner) => inner.last_error().is_some_and(LlmError::is_retryable),
            _ => false,
        }
    }

    /// Whether the caller cancelled the request (as opposed to a timeout).
    pub fn is_user_cancellation(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

/// One entry of a [`RetryError`] history.
#[derive(Debug, Clone)]
pub enum AttemptFailure {
    /// The attempt failed with an error.
    Error { model: ModelKey, error: LlmError },
    /// The attempt produced a result that a strategy rejected.
    Result {
        model: ModelKey,
        finish_reason: FinishReason,
    },
}

impl AttemptFailure {
    pub fn model(&self) -> &ModelKey {
        match self {
            Self::Error { model, .. } | Self::Result { model, .. } => model,
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error { model, error } => write!(f, "{model}: {error}"),
            Self::Result {
                model,
                finish_reason,
            } => write!(f, "{model}: result rejected (finish reason {finish_reason})"),
        }
    }
}

/// Composite error raised when retries are exhausted after several attempts.
#[derive(Debug, Clone, Error)]
#[error("Failed after {attempts} attempts. Last error: {message}")]
pub struct RetryError {
    /// Total number of attempts made.
    pub attempts: usize,
    /// Message of the final underlying error.
    pub message: String,
    /// Every attempt in execution order.
    pub errors: Vec<AttemptFailure>,
}

impl RetryError {
    /// The final underlying error, if the last attempt was an error.
    pub fn last_error(&self) -> Option<&LlmError> {
        self.errors.iter().rev().find_map(|failure| match failure {
            AttemptFailure::Error { error, .. } => Some(error),
            AttemptFailure::Result { .. } => None,
        })
    }
}
