use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub mod auth;
pub mod sse;

#[derive(Debug, Serialize)]
pub struct HttpResult<T> {
    pub code: usize,
    pub data: T,
}

impl<T> HttpResult<T> {
    pub fn new(data: T) -> HttpResult<T> {
        HttpResult { code: 0, data }
    }
}

impl<T> IntoResponse for HttpResult<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Truncates an upstream error body to something safe to store and log.
pub fn body_snippet(body: &[u8]) -> String {
    const MAX_SNIPPET: usize = 1024;
    let text = String::from_utf8_lossy(body);
    if text.len() <= MAX_SNIPPET {
        text.into_owned()
    } else {
        let mut end = MAX_SNIPPET;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_passes_short_bodies_through() {
        assert_eq!(body_snippet(b"rate limited"), "rate limited");
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        let long = "é".repeat(2000);
        let snippet = body_snippet(long.as_bytes());
        assert!(snippet.len() <= 1024 + 3);
        assert!(snippet.ends_with("..."));
    }
}
