use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::auth::{anthropic_auth_middleware, openai_auth_middleware};
use super::handlers::{handle_anthropic_messages, handle_list_models, handle_openai_chat};

/// The client-facing surface, mounted under `/v1`. Each dialect carries its
/// own auth scheme.
pub fn create_proxy_router() -> Router {
    let openai_router = Router::new()
        .route("/chat/completions", post(handle_openai_chat))
        .route("/models", get(handle_list_models))
        .layer(middleware::from_fn(openai_auth_middleware));

    let anthropic_router = Router::new()
        .route("/messages", post(handle_anthropic_messages))
        .layer(middleware::from_fn(anthropic_auth_middleware));

    Router::new().merge(openai_router).merge(anthropic_router)
}
