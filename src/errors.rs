use crate::api::ApiResponse;
use axum::{http::StatusCode, response::Json};
use tracing::{error, info, warn};

/// Classified failure of a single upstream text-generation call.
///
/// Only `RateLimited` and `ServerFault` are transient; everything else is permanent and must
/// surface after exactly one attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("rate limited by upstream: {0}")]
    RateLimited(String),

    #[error("upstream server fault: {0}")]
    ServerFault(String),

    #[error("requested model is invalid or unavailable: {0}")]
    ModelUnavailable(String),

    #[error("upstream rejected the request: {0}")]
    Rejected(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("upstream response was blocked or empty")]
    EmptyResponse,

    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    #[error("text generation is offline")]
    Offline,
}

impl GenerationError {
    /// Whether the retry controller may try the same call again after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited(_) | GenerationError::ServerFault(_)
        )
    }

    /// Whether the error says the configured model identity cannot serve requests.
    pub fn is_model_unavailable(&self) -> bool {
        matches!(
            self,
            GenerationError::ModelUnavailable(_) | GenerationError::Offline
        )
    }

    /// Map an upstream HTTP status and body onto the taxonomy.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = format!("HTTP {}: {}", status.as_u16(), body);
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            GenerationError::RateLimited(detail)
        } else if status.is_server_error() || status == reqwest::StatusCode::REQUEST_TIMEOUT {
            GenerationError::ServerFault(detail)
        } else if status == reqwest::StatusCode::NOT_FOUND
            || (status == reqwest::StatusCode::BAD_REQUEST
                && body.to_lowercase().contains("model"))
        {
            GenerationError::ModelUnavailable(detail)
        } else {
            GenerationError::Rejected(detail)
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::ServerFault(format!("request timed out: {}", err))
        } else if let Some(status) = err.status() {
            GenerationError::from_status(status, &err.to_string())
        } else if err.is_decode() {
            GenerationError::MalformedOutput(err.to_string())
        } else {
            GenerationError::Transport(err.to_string())
        }
    }
}

/// Terminal failures of a whole-document generation request.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no text could be extracted from the document")]
    EmptyDocument,

    #[error("AI failed to generate a syllabus")]
    EmptySyllabus,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] anyhow::Error),

    #[error("LLM service error: {0}")]
    LLMError(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Storage(e) => ApiError::DatabaseError(e),
            other => ApiError::GenerationFailed(other.to_string()),
        }
    }
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_id: Option<String>,
    pub resource_type: String,
    pub user_friendly_message: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_id: None,
            resource_type: resource_type.to_string(),
            user_friendly_message: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn with_user_message(mut self, message: &str) -> Self {
        self.user_friendly_message = Some(message.to_string());
        self
    }
}

impl ApiError {
    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(
        self,
        context: ErrorContext,
    ) -> (StatusCode, Json<ApiResponse<()>>) {
        match &self {
            ApiError::NotFound(_) => {
                info!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Resource not found"
                );
                (
                    StatusCode::NOT_FOUND,
                    Json(ApiResponse::error(
                        context
                            .user_friendly_message
                            .unwrap_or_else(|| format!("{} not found", context.resource_type)),
                    )),
                )
            }
            ApiError::ValidationError(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Validation error"
                );
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error(self.to_string())),
                )
            }
            ApiError::GenerationFailed(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Generation request failed"
                );
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ApiResponse::error(
                        context
                            .user_friendly_message
                            .unwrap_or_else(|| self.to_string()),
                    )),
                )
            }
            ApiError::LLMError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "LLM service error"
                );
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ApiResponse::error(
                        "AI service temporarily unavailable. Please try again.".to_string(),
                    )),
                )
            }
            ApiError::DatabaseError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Database error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error(
                        "Database operation failed. Please try again.".to_string(),
                    )),
                )
            }
        }
    }

    pub fn to_response(self) -> (StatusCode, Json<ApiResponse<()>>) {
        let context = ErrorContext::new("unknown", "resource");
        self.to_response_with_context(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_creation() {
        let context = ErrorContext::new("review_flashcard", "flashcard")
            .with_id("123")
            .with_user_message("Custom message");

        assert_eq!(context.operation, "review_flashcard");
        assert_eq!(context.resource_type, "flashcard");
        assert_eq!(context.resource_id, Some("123".to_string()));
        assert_eq!(
            context.user_friendly_message,
            Some("Custom message".to_string())
        );
    }

    #[test]
    fn test_status_classification() {
        use reqwest::StatusCode as S;

        assert!(matches!(
            GenerationError::from_status(S::TOO_MANY_REQUESTS, "quota exceeded"),
            GenerationError::RateLimited(_)
        ));
        assert!(matches!(
            GenerationError::from_status(S::INTERNAL_SERVER_ERROR, "internal"),
            GenerationError::ServerFault(_)
        ));
        assert!(matches!(
            GenerationError::from_status(S::SERVICE_UNAVAILABLE, "overloaded"),
            GenerationError::ServerFault(_)
        ));
        assert!(matches!(
            GenerationError::from_status(S::NOT_FOUND, "models/foo is not found"),
            GenerationError::ModelUnavailable(_)
        ));
        assert!(matches!(
            GenerationError::from_status(S::BAD_REQUEST, "The model `x` does not exist"),
            GenerationError::ModelUnavailable(_)
        ));
        assert!(matches!(
            GenerationError::from_status(S::UNAUTHORIZED, "bad key"),
            GenerationError::Rejected(_)
        ));
    }

    #[test]
    fn test_only_rate_limit_and_server_fault_are_transient() {
        assert!(GenerationError::RateLimited("429".into()).is_transient());
        assert!(GenerationError::ServerFault("500".into()).is_transient());
        assert!(!GenerationError::Rejected("401".into()).is_transient());
        assert!(!GenerationError::ModelUnavailable("404".into()).is_transient());
        assert!(!GenerationError::MalformedOutput("eof".into()).is_transient());
        assert!(!GenerationError::EmptyResponse.is_transient());
        assert!(!GenerationError::Offline.is_transient());
        assert!(GenerationError::Offline.is_model_unavailable());
    }

    #[test]
    fn test_api_error_responses() {
        let error = ApiError::NotFound("Flashcard not found".to_string());
        let context = ErrorContext::new("get_flashcard", "flashcard").with_id("123");
        let (status, _response) = error.to_response_with_context(context);
        assert_eq!(status, StatusCode::NOT_FOUND);

        let error = ApiError::ValidationError("Invalid data".to_string());
        let (status, _) = error.to_response();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let error = ApiError::LLMError("down".to_string());
        let (status, _) = error.to_response();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let error: ApiError = PipelineError::EmptySyllabus.into();
        let (status, _) = error.to_response();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
