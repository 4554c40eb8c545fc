use axum::{extract::Request, http::header::AUTHORIZATION, middleware::Next, response::Response};
use tracing::{debug, warn};

use super::error::ProxyError;
use crate::config::CONFIG;

// An empty configured token disables authentication on the client surface.

/// OpenAI-style auth: `Authorization: Bearer <token>`.
pub(super) async fn openai_auth_middleware(
    request: Request,
    next: Next,
) -> Result<Response, ProxyError> {
    let token = &CONFIG.token;
    if token.is_empty() {
        debug!("auth skipped, no token configured");
        return Ok(next.run(request).await);
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!("auth failed: missing authorization header");
            ProxyError::Unauthorized("Authorization header is missing".to_string())
        })?;

    let bearer = header.strip_prefix("Bearer ").ok_or_else(|| {
        warn!("auth failed: invalid authorization header");
        ProxyError::Unauthorized("Invalid authorization header".to_string())
    })?;

    if bearer != token {
        warn!("auth failed: invalid token");
        return Err(ProxyError::Unauthorized("Invalid token".to_string()));
    }

    Ok(next.run(request).await)
}

/// Anthropic-style auth: `x-api-key: <token>`.
pub(super) async fn anthropic_auth_middleware(
    request: Request,
    next: Next,
) -> Result<Response, ProxyError> {
    let token = &CONFIG.token;
    if token.is_empty() {
        debug!("anthropic auth skipped, no token configured");
        return Ok(next.run(request).await);
    }

    let key = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!("anthropic auth failed: missing x-api-key header");
            ProxyError::Unauthorized("x-api-key header is missing".to_string())
        })?;

    if key != token {
        warn!("anthropic auth failed: invalid token");
        return Err(ProxyError::Unauthorized("Invalid token".to_string()));
    }

    Ok(next.run(request).await)
}
