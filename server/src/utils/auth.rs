use axum::{extract::Request, http::header::AUTHORIZATION, middleware::Next, response::Response};
use tracing::{debug, warn};

use crate::config::CONFIG;
use crate::controller::BaseError;

/// Gates the admin API with the process token. An empty configured token
/// disables the check entirely.
pub async fn admin_auth_middleware(request: Request, next: Next) -> Result<Response, BaseError> {
    let token = &CONFIG.token;
    if token.is_empty() {
        debug!("admin auth skipped, no token configured");
        return Ok(next.run(request).await);
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!("admin auth failed: missing authorization header");
            BaseError::Unauthorized(Some("Authorization header is missing".to_string()))
        })?;

    let bearer = header.strip_prefix("Bearer ").ok_or_else(|| {
        warn!("admin auth failed: invalid authorization header");
        BaseError::Unauthorized(Some("Invalid authorization header".to_string()))
    })?;

    if bearer != token {
        warn!("admin auth failed: invalid token");
        return Err(BaseError::Unauthorized(Some("Invalid token".to_string())));
    }

    Ok(next.run(request).await)
}
