//! Request-boundary error taxonomy.
//!
//! Collaborators return `anyhow::Result`; handlers convert those into an
//! [`ApiError`], which renders as the standard JSON envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing caller input; no I/O has been attempted
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// The stored record itself is malformed
    #[error("{0}")]
    InvalidState(String),

    /// A store or translation service call failed
    #[error("{message}")]
    Dependency {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn dependency(message: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Dependency {
            message: message.into(),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidState(_) | Self::Dependency { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body of the error envelope
    pub fn body(&self) -> serde_json::Value {
        match self {
            Self::Dependency { message, source } => json!({
                "message": message,
                "error": format!("{:#}", source),
            }),
            other => json!({ "message": other.to_string() }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}: {:?}", status, self);
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Conflict("x".to_string()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::InvalidState("x".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::dependency("x", anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_caller_error_body_has_only_message() {
        let body = ApiError::bad_request("Missing query parameter: language").body();
        assert_eq!(body["message"], "Missing query parameter: language");
        assert!(body.get("error").is_none());
    }

    #[test]
    fn test_dependency_body_includes_error_chain() {
        let source = anyhow::anyhow!("connection refused").context("Failed to load case study 7");
        let body = ApiError::dependency("Store read failed", source).body();

        assert_eq!(body["message"], "Store read failed");
        let detail = body["error"].as_str().expect("error detail");
        assert!(detail.contains("Failed to load case study 7"));
        assert!(detail.contains("connection refused"));
    }

    #[test]
    fn test_into_response_sets_json_content_type() {
        let response = ApiError::not_found("CaseStudy 999 not found").into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
    }
}
