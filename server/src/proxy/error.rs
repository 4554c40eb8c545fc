use axum::{
    response::{IntoResponse, Response},
    Json,
};
use reqwest::StatusCode;
use serde_json::json;
use thiserror::Error;

use crate::controller::BaseError;
use crate::schema::enum_def::ProviderType;

/// Everything the dispatch path can surface to a client. Errors that occur
/// after the first byte has been flushed never reach this type; they only
/// terminate the stream and land in the chat log's error column.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0}")]
    BadRequest(String),
    #[error("not found model {0}")]
    ModelNotFound(String),
    #[error("no provider for model {0}")]
    NoMappings(String),
    #[error("no {style} provider found for {model}")]
    NoProvidersForStyle { style: ProviderType, model: String },
    #[error("no provider with required capabilities found for model {0}")]
    NoEligibleMapping(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("provider configuration error: {0}")]
    AdapterConfig(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("all upstream candidates exhausted")]
    Exhausted,
    #[error("maximum retry attempts reached")]
    MaxRetriesReached,
    #[error("retry timed out")]
    RetryTimeout,
}

impl From<BaseError> for ProxyError {
    fn from(err: BaseError) -> Self {
        ProxyError::Database(format!("{:?}", err))
    }
}

impl ProxyError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ProxyError::BadRequest(_)
            | ProxyError::ModelNotFound(_)
            | ProxyError::NoMappings(_)
            | ProxyError::NoProvidersForStyle { .. }
            | ProxyError::NoEligibleMapping(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            ProxyError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "authentication_error"),
            ProxyError::AdapterConfig(_) | ProxyError::Database(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "api_error")
            }
            ProxyError::Exhausted | ProxyError::MaxRetriesReached => {
                (StatusCode::BAD_GATEWAY, "upstream_error")
            }
            ProxyError::RetryTimeout => (StatusCode::GATEWAY_TIMEOUT, "timeout_error"),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        let message = match &self {
            // Internal detail stays in the logs, not in the client body.
            ProxyError::AdapterConfig(_) | ProxyError::Database(_) => {
                "internal server error".to_string()
            }
            ProxyError::Exhausted | ProxyError::MaxRetriesReached => {
                "upstream exhausted".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        }));
        (status, body).into_response()
    }
}
