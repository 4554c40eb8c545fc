use axum::body::Bytes;
use serde_json::Value;

use super::error::ProxyError;

/// What the dispatch engine needs to know about an incoming request, parsed
/// lazily out of the raw bytes. The bytes themselves travel through
/// untouched; only the adapter rewrites the model field just before the
/// upstream call.
#[derive(Debug, Clone)]
pub struct RequestProfile {
    pub model: String,
    pub stream: bool,
    pub tool_call: bool,
    pub structured_output: bool,
    pub image: bool,
    pub raw: Bytes,
}

pub fn inspect_openai(raw: Bytes) -> Result<RequestProfile, ProxyError> {
    let value = parse_json(&raw)?;
    let model = extract_model(&value)?;
    Ok(RequestProfile {
        model,
        stream: value.get("stream").and_then(Value::as_bool).unwrap_or(false),
        tool_call: has_tools(&value),
        structured_output: wants_json_schema(&value),
        image: has_content_part(&value, &["image_url", "input_image"]),
        raw,
    })
}

pub fn inspect_anthropic(raw: Bytes) -> Result<RequestProfile, ProxyError> {
    let value = parse_json(&raw)?;
    let model = extract_model(&value)?;
    Ok(RequestProfile {
        model,
        stream: value.get("stream").and_then(Value::as_bool).unwrap_or(false),
        tool_call: has_tools(&value),
        structured_output: wants_json_schema(&value),
        image: has_content_part(&value, &["image"]),
        raw,
    })
}

fn parse_json(raw: &[u8]) -> Result<Value, ProxyError> {
    serde_json::from_slice(raw)
        .map_err(|e| ProxyError::BadRequest(format!("failed to parse JSON body: {}", e)))
}

fn extract_model(value: &Value) -> Result<String, ProxyError> {
    value
        .get("model")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProxyError::BadRequest("'model' field must be a string".to_string()))
}

fn has_tools(value: &Value) -> bool {
    value
        .get("tools")
        .and_then(Value::as_array)
        .is_some_and(|tools| !tools.is_empty())
}

fn wants_json_schema(value: &Value) -> bool {
    value
        .pointer("/response_format/type")
        .and_then(Value::as_str)
        == Some("json_schema")
}

// String content is plain text; only array content can carry media parts.
fn has_content_part(value: &Value, kinds: &[&str]) -> bool {
    let Some(messages) = value.get("messages").and_then(Value::as_array) else {
        return false;
    };
    messages.iter().any(|message| {
        message
            .get("content")
            .and_then(Value::as_array)
            .is_some_and(|parts| {
                parts.iter().any(|part| {
                    part.get("type")
                        .and_then(Value::as_str)
                        .is_some_and(|t| kinds.contains(&t))
                })
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn openai_minimal_request() {
        let raw = bytes(r#"{"model":"m","messages":[{"role":"user","content":"hi"}]}"#);
        let profile = inspect_openai(raw.clone()).unwrap();
        assert_eq!(profile.model, "m");
        assert!(!profile.stream);
        assert!(!profile.tool_call);
        assert!(!profile.structured_output);
        assert!(!profile.image);
        assert_eq!(profile.raw, raw);
    }

    #[test]
    fn openai_flags_detected() {
        let raw = bytes(
            r#"{
                "model": "m",
                "stream": true,
                "tools": [{"type": "function", "function": {"name": "f"}}],
                "response_format": {"type": "json_schema", "json_schema": {}},
                "messages": [
                    {"role": "user", "content": [
                        {"type": "text", "text": "what is this"},
                        {"type": "image_url", "image_url": {"url": "https://x/y.png"}}
                    ]}
                ]
            }"#,
        );
        let profile = inspect_openai(raw).unwrap();
        assert!(profile.stream);
        assert!(profile.tool_call);
        assert!(profile.structured_output);
        assert!(profile.image);
    }

    #[test]
    fn openai_empty_tools_is_not_tool_call() {
        let raw = bytes(r#"{"model":"m","tools":[],"messages":[]}"#);
        let profile = inspect_openai(raw).unwrap();
        assert!(!profile.tool_call);
    }

    #[test]
    fn openai_text_response_format_is_not_structured() {
        let raw = bytes(r#"{"model":"m","response_format":{"type":"text"},"messages":[]}"#);
        let profile = inspect_openai(raw).unwrap();
        assert!(!profile.structured_output);
    }

    #[test]
    fn anthropic_image_block_detected() {
        let raw = bytes(
            r#"{
                "model": "m",
                "max_tokens": 100,
                "messages": [
                    {"role": "user", "content": [
                        {"type": "image", "source": {"type": "base64", "data": "..."}},
                        {"type": "text", "text": "describe"}
                    ]}
                ]
            }"#,
        );
        let profile = inspect_anthropic(raw).unwrap();
        assert!(profile.image);
        assert!(!profile.tool_call);
    }

    #[test]
    fn anthropic_string_content_has_no_image() {
        let raw = bytes(r#"{"model":"m","messages":[{"role":"user","content":"plain"}]}"#);
        let profile = inspect_anthropic(raw).unwrap();
        assert!(!profile.image);
    }

    #[test]
    fn invalid_json_is_bad_request() {
        let err = inspect_openai(bytes("{not json")).unwrap_err();
        assert!(matches!(err, ProxyError::BadRequest(_)));
    }

    #[test]
    fn missing_model_is_bad_request() {
        let err = inspect_openai(bytes(r#"{"messages":[]}"#)).unwrap_err();
        assert!(matches!(err, ProxyError::BadRequest(_)));
    }
}
