use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use super::{AdapterConfig, AdapterError, Usage};

const DEFAULT_API_VERSION: &str = "2023-06-01";

#[derive(Debug)]
pub struct AnthropicAdapter {
    config: AdapterConfig,
}

impl AnthropicAdapter {
    pub fn new(config: AdapterConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/messages", base)
        } else {
            format!("{}/v1/messages", base)
        }
    }

    fn api_version(&self) -> &str {
        self.config.version.as_deref().unwrap_or(DEFAULT_API_VERSION)
    }

    fn prepare_body(&self, upstream_model: &str, raw: &[u8]) -> Result<String, AdapterError> {
        let mut value: Value =
            serde_json::from_slice(raw).map_err(|e| AdapterError::Body(e.to_string()))?;
        value["model"] = Value::String(upstream_model.to_string());
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
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", self.api_version())
            .body(body)
            .send()
            .await?;
        Ok(response)
    }

    // Input tokens arrive on `message_start` (under `message.usage`),
    // output tokens accumulate on `message_delta` (top-level `usage`);
    // non-stream bodies carry both at the top level.
    pub(super) fn usage_from_json(&self, value: &Value) -> Option<Usage> {
        let node = value
            .get("usage")
            .filter(|u| !u.is_null())
            .or_else(|| value.pointer("/message/usage").filter(|u| !u.is_null()))?;
        let prompt_tokens = node
            .get("input_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0) as i32;
        let completion_tokens = node
            .get("output_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0) as i32;
        if prompt_tokens == 0 && completion_tokens == 0 {
            return None;
        }
        Some(Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(base_url: &str, version: Option<&str>) -> AnthropicAdapter {
        AnthropicAdapter::new(AdapterConfig {
            base_url: base_url.to_string(),
            api_key: "sk-test".to_string(),
            version: version.map(str::to_string),
        })
    }

    #[test]
    fn endpoint_appends_v1_when_missing() {
        assert_eq!(
            adapter("https://api.anthropic.com", None).endpoint(),
            "https://api.anthropic.com/v1/messages"
        );
        assert_eq!(
            adapter("https://api.anthropic.com/v1", None).endpoint(),
            "https://api.anthropic.com/v1/messages"
        );
    }

    #[test]
    fn api_version_defaults() {
        assert_eq!(adapter("https://x", None).api_version(), "2023-06-01");
        assert_eq!(
            adapter("https://x", Some("2024-10-22")).api_version(),
            "2024-10-22"
        );
    }

    #[test]
    fn prepare_body_substitutes_model() {
        let body = adapter("https://x", None)
            .prepare_body(
                "claude-3-5-haiku-latest",
                br#"{"model":"logical","max_tokens":64,"messages":[]}"#,
            )
            .unwrap();
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["model"], "claude-3-5-haiku-latest");
        assert_eq!(value["max_tokens"], 64);
    }

    #[test]
    fn usage_from_message_start_event() {
        let adapter = adapter("https://x", None);
        let value: Value = serde_json::from_str(
            r#"{"type":"message_start","message":{"usage":{"input_tokens":25,"output_tokens":1}}}"#,
        )
        .unwrap();
        let usage = adapter.usage_from_json(&value).unwrap();
        assert_eq!(usage.prompt_tokens, 25);
        assert_eq!(usage.completion_tokens, 1);
    }

    #[test]
    fn usage_from_non_stream_body() {
        let adapter = adapter("https://x", None);
        let value: Value =
            serde_json::from_str(r#"{"content":[],"usage":{"input_tokens":10,"output_tokens":20}}"#)
                .unwrap();
        let usage = adapter.usage_from_json(&value).unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 20);
    }

    #[test]
    fn content_delta_events_have_no_usage() {
        let adapter = adapter("https://x", None);
        let value: Value = serde_json::from_str(
            r#"{"type":"content_block_delta","delta":{"type":"text_delta","text":"hi"}}"#,
        )
        .unwrap();
        assert!(adapter.usage_from_json(&value).is_none());
    }
}
