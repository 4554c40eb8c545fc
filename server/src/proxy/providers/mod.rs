use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::schema::enum_def::ProviderType;
use crate::utils::sse::SseDataScanner;

mod anthropic;
mod openai;

pub use anthropic::AnthropicAdapter;
pub use openai::OpenaiAdapter;

// The accounting side stops buffering a non-stream body past this point;
// usage fields of real responses live well under it.
const MAX_ACCOUNT_BUFFER: usize = 4 * 1024 * 1024;

/// Connection details for one provider, deserialized from the opaque
/// `config` column. Only the adapter matching the provider's type ever
/// interprets it.
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid provider config: {0}")]
    Config(String),
    #[error("invalid request body: {0}")]
    Body(String),
    #[error("upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Token counts pulled from a response, best effort. Missing or malformed
/// usage data leaves fields at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Usage {
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub total_tokens: i32,
}

impl Usage {
    /// Folds a later observation in; non-zero fields win. SSE dialects
    /// report usage across several events (and OpenAI's final chunk
    /// supersedes earlier nulls), so later chunks overwrite.
    fn merge(&mut self, other: Usage) {
        if other.prompt_tokens != 0 {
            self.prompt_tokens = other.prompt_tokens;
        }
        if other.completion_tokens != 0 {
            self.completion_tokens = other.completion_tokens;
        }
        if other.total_tokens != 0 {
            self.total_tokens = other.total_tokens;
        }
    }

    fn finalize(mut self) -> Self {
        if self.total_tokens == 0 {
            self.total_tokens = self.prompt_tokens + self.completion_tokens;
        }
        self
    }
}

/// Dialect-specific upstream client. Instantiated per attempt from the
/// selected provider's type and config blob; the registry is this enum.
#[derive(Debug)]
pub enum Adapter {
    Openai(OpenaiAdapter),
    Anthropic(AnthropicAdapter),
}

impl Adapter {
    pub fn from_config(style: ProviderType, config: &str) -> Result<Adapter, AdapterError> {
        let config: AdapterConfig =
            serde_json::from_str(config).map_err(|e| AdapterError::Config(e.to_string()))?;
        Ok(match style {
            ProviderType::Openai => Adapter::Openai(OpenaiAdapter::new(config)),
            ProviderType::Anthropic => Adapter::Anthropic(AnthropicAdapter::new(config)),
        })
    }

    /// Rewrites the model field in the raw client body, attaches dialect
    /// auth headers and fires the upstream call. The response body is left
    /// unconsumed; non-2xx statuses are the caller's to classify.
    pub async fn chat(
        &self,
        client: &reqwest::Client,
        upstream_model: &str,
        raw: &[u8],
    ) -> Result<reqwest::Response, AdapterError> {
        match self {
            Adapter::Openai(a) => a.chat(client, upstream_model, raw).await,
            Adapter::Anthropic(a) => a.chat(client, upstream_model, raw).await,
        }
    }

    fn usage_from_json(&self, value: &Value) -> Option<Usage> {
        match self {
            Adapter::Openai(a) => a.usage_from_json(value),
            Adapter::Anthropic(a) => a.usage_from_json(value),
        }
    }

    /// Consumes the accounting side of the response tee and extracts token
    /// counts: incrementally over SSE events for streams, from the buffered
    /// body for JSON responses. Malformed data never fails the call; it
    /// just yields zero counts.
    pub async fn parse_usage(&self, tee: &mut mpsc::Receiver<Bytes>, was_stream: bool) -> Usage {
        if was_stream {
            let mut scanner = SseDataScanner::new();
            let mut usage = Usage::default();
            while let Some(chunk) = tee.recv().await {
                for payload in scanner.feed(&chunk) {
                    if payload.trim() == "[DONE]" {
                        continue;
                    }
                    if let Ok(value) = serde_json::from_str::<Value>(&payload) {
                        if let Some(observed) = self.usage_from_json(&value) {
                            usage.merge(observed);
                        }
                    }
                }
            }
            usage.finalize()
        } else {
            let mut body = Vec::new();
            while let Some(chunk) = tee.recv().await {
                if body.len() < MAX_ACCOUNT_BUFFER {
                    body.extend_from_slice(&chunk);
                }
            }
            serde_json::from_slice::<Value>(&body)
                .ok()
                .and_then(|value| self.usage_from_json(&value))
                .map(Usage::finalize)
                .unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::enum_def::ProviderType;

    fn openai_adapter() -> Adapter {
        Adapter::from_config(
            ProviderType::Openai,
            r#"{"base_url":"https://api.example.com","api_key":"sk-test"}"#,
        )
        .unwrap()
    }

    fn anthropic_adapter() -> Adapter {
        Adapter::from_config(
            ProviderType::Anthropic,
            r#"{"base_url":"https://api.example.com","api_key":"sk-test","version":"2023-06-01"}"#,
        )
        .unwrap()
    }

    #[test]
    fn registry_rejects_malformed_config() {
        let err = Adapter::from_config(ProviderType::Openai, "not json").unwrap_err();
        assert!(matches!(err, AdapterError::Config(_)));
    }

    #[test]
    fn usage_merge_keeps_latest_nonzero() {
        let mut usage = Usage {
            prompt_tokens: 25,
            completion_tokens: 1,
            total_tokens: 0,
        };
        usage.merge(Usage {
            prompt_tokens: 0,
            completion_tokens: 90,
            total_tokens: 0,
        });
        assert_eq!(usage.finalize(), Usage {
            prompt_tokens: 25,
            completion_tokens: 90,
            total_tokens: 115,
        });
    }

    #[tokio::test]
    async fn stream_usage_comes_from_final_chunk() {
        let adapter = openai_adapter();
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(Bytes::from(
            "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}],\"usage\":null}\n\n",
        ))
        .await
        .unwrap();
        tx.send(Bytes::from(
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":5,\"total_tokens\":8}}\n\n",
        ))
        .await
        .unwrap();
        tx.send(Bytes::from("data: [DONE]\n\n")).await.unwrap();
        drop(tx);

        let usage = adapter.parse_usage(&mut rx, true).await;
        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.completion_tokens, 5);
        assert_eq!(usage.total_tokens, 8);
    }

    #[tokio::test]
    async fn stream_usage_tolerates_malformed_trailing_data() {
        let adapter = openai_adapter();
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(Bytes::from(
            "data: {\"usage\":{\"prompt_tokens\":2,\"completion_tokens\":4,\"total_tokens\":6}}\n\n",
        ))
        .await
        .unwrap();
        tx.send(Bytes::from("data: {garbled\n\n")).await.unwrap();
        drop(tx);

        let usage = adapter.parse_usage(&mut rx, true).await;
        assert_eq!(usage.total_tokens, 6);
    }

    #[tokio::test]
    async fn json_usage_parsed_from_buffered_body() {
        let adapter = openai_adapter();
        let (tx, mut rx) = mpsc::channel(8);
        // Split across chunks like a real network read.
        tx.send(Bytes::from("{\"choices\":[],\"usage\":{\"prompt_tokens\":3,"))
            .await
            .unwrap();
        tx.send(Bytes::from("\"completion_tokens\":5,\"total_tokens\":8}}"))
            .await
            .unwrap();
        drop(tx);

        let usage = adapter.parse_usage(&mut rx, false).await;
        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.completion_tokens, 5);
        assert_eq!(usage.total_tokens, 8);
    }

    #[tokio::test]
    async fn anthropic_stream_merges_start_and_delta_events() {
        let adapter = anthropic_adapter();
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(Bytes::from(
            "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":25,\"output_tokens\":1}}}\n\n",
        ))
        .await
        .unwrap();
        tx.send(Bytes::from(
            "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":90}}\n\n",
        ))
        .await
        .unwrap();
        drop(tx);

        let usage = adapter.parse_usage(&mut rx, true).await;
        assert_eq!(usage.prompt_tokens, 25);
        assert_eq!(usage.completion_tokens, 90);
        assert_eq!(usage.total_tokens, 115);
    }

    #[tokio::test]
    async fn empty_body_yields_zero_usage() {
        let adapter = openai_adapter();
        let (tx, mut rx) = mpsc::channel::<Bytes>(1);
        drop(tx);
        let usage = adapter.parse_usage(&mut rx, false).await;
        assert_eq!(usage, Usage::default());
    }
}
