use axum::{http, middleware, response::IntoResponse, Router};

use crate::utils::auth::admin_auth_middleware;
use chat_log::create_chat_log_router;
use model::create_model_router;
use model_provider::create_model_provider_router;
use provider::create_provider_router;

mod chat_log;
mod error;
mod model;
mod model_provider;
mod provider;

pub use error::BaseError;

/// The admin CRUD surface over providers, models, mappings and chat logs,
/// mounted under `/api` behind the process token.
pub fn create_manager_router() -> Router {
    Router::new().nest(
        "/api",
        Router::new()
            .merge(create_provider_router())
            .merge(create_model_router())
            .merge(create_model_provider_router())
            .merge(create_chat_log_router())
            .layer(middleware::from_fn(admin_auth_middleware)),
    )
}

pub async fn handle_404() -> impl IntoResponse {
    (http::StatusCode::NOT_FOUND, "not found")
}
