use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use super::{AdapterConfig, AdapterError, Usage};

#[derive(Debug)]
pub struct OpenaiAdapter {
    config: AdapterConfig,
}

impl OpenaiAdapter {
    pub fn new(config: AdapterConfig) -> Self {
        Self { config }
    }

    // Base URLs are accepted with or without the `/v1` suffix.
    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    fn prepare_body(&self, upstream_model: &str, raw: &[u8]) -> Result<String, AdapterError> {
        let mut value: Value =
            serde_json::from_slice(raw).map_err(|e| AdapterError::Body(e.to_string()))?;
        value["model"] = Value::String(upstream_model.to_string());
        ensure_stream_usage(&mut value);
        serde_json::to_string(&value).map_err(|e| AdapterError::Body(e.to_string()))
    }

    pub(super) async fn chat(
        &self,
        client: &reqwest::Client,
        upstream_model: &str,
        raw: &[u8],
    ) -> Result<reqwest::Response, AdapterError> {
        let body = self.prepare_body(upstream_model, raw)?;
        let response = client
            .post(self.endpoint())
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(&self.config.api_key)
            .body(body)
            .send()
            .await?;
        Ok(response)
    }

    pub(super) fn usage_from_json(&self, value: &Value) -> Option<Usage> {
        let usage = value.get("usage")?;
        if usage.is_null() {
            return None;
        }
        Some(Usage {
            prompt_tokens: usage
                .get("prompt_tokens")
                .and_then(Value::as_i64)
                .unwrap_or(0) as i32,
            completion_tokens: usage
                .get("completion_tokens")
                .and_then(Value::as_i64)
                .unwrap_or(0) as i32,
            total_tokens: usage
                .get("total_tokens")
                .and_then(Value::as_i64)
                .unwrap_or(0) as i32,
        })
    }
}

/// Streaming requests only carry usage in the final chunk when asked for
/// it, so the flag is forced on before the body goes upstream.
fn ensure_stream_usage(data: &mut Value) {
    let is_stream = data
        .get("stream")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !is_stream {
        return;
    }
    match data.get_mut("stream_options") {
        Some(options) => {
            options["include_usage"] = Value::Bool(true);
        }
        None => {
            data["stream_options"] = serde_json::json!({"include_usage": true});
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(base_url: &str) -> OpenaiAdapter {
        OpenaiAdapter::new(AdapterConfig {
            base_url: base_url.to_string(),
            api_key: "sk-test".to_string(),
            version: None,
        })
    }

    #[test]
    fn endpoint_appends_v1_when_missing() {
        assert_eq!(
            adapter("https://api.example.com").endpoint(),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            adapter("https://api.example.com/").endpoint(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn endpoint_keeps_existing_v1() {
        assert_eq!(
            adapter("https://api.example.com/v1").endpoint(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn prepare_body_substitutes_model() {
        let body = adapter("https://x")
            .prepare_body("gpt-4o-mini", br#"{"model":"logical","messages":[]}"#)
            .unwrap();
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert!(value.get("stream_options").is_none());
    }

    #[test]
    fn prepare_body_forces_usage_on_streams() {
        let body = adapter("https://x")
            .prepare_body("m", br#"{"model":"logical","stream":true,"messages":[]}"#)
            .unwrap();
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["stream_options"]["include_usage"], true);
    }

    #[test]
    fn prepare_body_respects_existing_stream_options() {
        let body = adapter("https://x")
            .prepare_body(
                "m",
                br#"{"model":"l","stream":true,"stream_options":{"include_usage":false,"other":1}}"#,
            )
            .unwrap();
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["stream_options"]["include_usage"], true);
        assert_eq!(value["stream_options"]["other"], 1);
    }

    #[test]
    fn usage_null_is_ignored() {
        let adapter = adapter("https://x");
        let value: Value = serde_json::from_str(r#"{"usage":null}"#).unwrap();
        assert!(adapter.usage_from_json(&value).is_none());
    }

    #[test]
    fn usage_fields_default_to_zero() {
        let adapter = adapter("https://x");
        let value: Value = serde_json::from_str(r#"{"usage":{"prompt_tokens":7}}"#).unwrap();
        let usage = adapter.usage_from_json(&value).unwrap();
        assert_eq!(usage.prompt_tokens, 7);
        assert_eq!(usage.completion_tokens, 0);
    }
}
