use axum::{
    response::{IntoResponse, Response},
    Json,
};
use reqwest::StatusCode;
use serde_json::json;

#[derive(Debug)]
pub enum BaseError {
    ParamInvalid(Option<String>),
    DatabaseFatal(Option<String>),
    NotFound(Option<String>),
    Unauthorized(Option<String>),
}

impl IntoResponse for BaseError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message) = match self {
            BaseError::ParamInvalid(msg) => (
                StatusCode::BAD_REQUEST,
                1001,
                msg.unwrap_or("request params invalid".to_string()),
            ),
            BaseError::DatabaseFatal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                1100,
                msg.unwrap_or("database unknown error".to_string()),
            ),
            BaseError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                1002,
                msg.unwrap_or("data not found".to_string()),
            ),
            BaseError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                1003,
                msg.unwrap_or("Unauthorized".to_string()),
            ),
        };
        let body = Json(json!({
            "code": error_code,
            "msg": error_message,
        }));
        (status, body).into_response()
    }
}
