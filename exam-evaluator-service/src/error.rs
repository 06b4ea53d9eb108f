use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Message returned alongside every failed evaluation.
pub const EVALUATION_FAILED_MESSAGE: &str =
    "Failed to process document. Please check the URL and try again.";

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Document analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Text generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Document Intelligence client errors, one per stage of the analysis job
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to download PDF from {url}")]
    DownloadRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to download PDF: {status}")]
    Download { status: u16 },

    #[error("Submit request to {url} failed")]
    SubmitRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Submit failed: {status} - {message}")]
    Submit { status: u16, message: String },

    #[error("No operation-location header found")]
    MissingOperationLocation,

    #[error("Polling {url} failed")]
    PollRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Poll failed: {status} - {message}")]
    Poll { status: u16, message: String },

    #[error("Analysis failed{}", suffix(": ", .message))]
    JobFailed { message: Option<String> },

    #[error("Analysis timed out after {attempts} polls ({elapsed_secs}s)")]
    TimedOut { attempts: u32, elapsed_secs: u64 },

    #[error("Invalid response from Document Intelligence")]
    InvalidResponse {
        #[source]
        source: reqwest::Error,
    },

    #[error("Document Intelligence is not configured: missing {setting}")]
    NotConfigured { setting: &'static str },
}

/// Gemini client errors
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Connection failed to {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Generation failed (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from Gemini")]
    InvalidResponse {
        #[source]
        source: reqwest::Error,
    },

    #[error("Model returned no text{}", suffix(" - blocked: ", .block_reason))]
    EmptyCompletion { block_reason: Option<String> },

    #[error("Gemini is not configured: missing {setting}")]
    NotConfigured { setting: &'static str },
}

fn suffix(separator: &str, detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!("{separator}{d}"))
        .unwrap_or_default()
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Analysis(
                AnalysisError::DownloadRequest { .. } | AnalysisError::Download { .. },
            ) => "download_failed",
            ServiceError::Analysis(
                AnalysisError::SubmitRequest { .. }
                | AnalysisError::Submit { .. }
                | AnalysisError::MissingOperationLocation,
            ) => "submit_failed",
            ServiceError::Analysis(
                AnalysisError::PollRequest { .. } | AnalysisError::Poll { .. },
            ) => "poll_failed",
            ServiceError::Analysis(AnalysisError::JobFailed { .. }) => "analysis_failed",
            ServiceError::Analysis(AnalysisError::TimedOut { .. }) => "analysis_timed_out",
            ServiceError::Analysis(AnalysisError::InvalidResponse { .. }) => {
                "analysis_invalid_response"
            }
            ServiceError::Analysis(AnalysisError::NotConfigured { .. })
            | ServiceError::Generation(GenerationError::NotConfigured { .. }) => "config_error",
            ServiceError::Generation(_) => "generation_failed",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Config { .. } => "config_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            ServiceError::InvalidRequest { .. } => "Request validation failed.".to_string(),
            _ => EVALUATION_FAILED_MESSAGE.to_string(),
        };

        let response = ErrorResponse {
            error: format_error_chain(&self),
            message,
        };

        (status, Json(response)).into_response()
    }
}

/// Render an error and its `source()` chain as one line.
pub fn format_error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        let text = source.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        current = source.source();
    }
    rendered
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_errors_are_wrapped_with_stage_prefix() {
        let err = ServiceError::from(AnalysisError::Download { status: 404 });
        assert_eq!(
            err.to_string(),
            "Document analysis failed: Failed to download PDF: 404"
        );
        assert_eq!(err.error_code(), "download_failed");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_job_failed_message() {
        let bare = AnalysisError::JobFailed { message: None };
        assert_eq!(bare.to_string(), "Analysis failed");

        let detailed = AnalysisError::JobFailed {
            message: Some("Invalid PDF".to_string()),
        };
        assert_eq!(detailed.to_string(), "Analysis failed: Invalid PDF");
    }

    #[test]
    fn test_timed_out_has_distinct_code() {
        let err = ServiceError::from(AnalysisError::TimedOut {
            attempts: 3,
            elapsed_secs: 4,
        });
        assert_eq!(err.error_code(), "analysis_timed_out");
        assert!(err.to_string().contains("3 polls"));
    }

    #[test]
    fn test_invalid_request_is_unprocessable() {
        let err = ServiceError::InvalidRequest {
            message: "bad url".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_format_error_chain_appends_sources() {
        #[derive(Debug, Error)]
        #[error("inner cause")]
        struct Inner;

        #[derive(Debug, Error)]
        #[error("outer")]
        struct Outer(#[source] Inner);

        assert_eq!(format_error_chain(&Outer(Inner)), "outer: inner cause");
    }
}
