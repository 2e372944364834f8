//! Gemini generateContent adapter — the schema-enforcing backend family.
//!
//! Wire differences from the OpenAI shape: `contents` with `parts` instead of
//! `messages`, roles `user`/`model` with system text hoisted into
//! `system_instruction`, parameters under `generationConfig`, and the API key
//! as a `?key=` query parameter. A compiled output schema with a container
//! root is enforced natively via `responseSchema`.

use super::parse::{parse_content, schema_root_is_container};
use super::{
    classify_http_status, classify_transport, retry_after_secs, AttemptFailure, AttemptResult,
    ProviderAdapter, ProviderCall,
};
use crate::config;
use crate::transport::HttpTransport;
use crate::types::{
    ContentBlock, Message, MessageContent, MessageRole, OutputFormat, PromptTurn, ResponsePayload,
    UsageInfo,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub struct GeminiAdapter {
    base_url: String,
    api_key: Option<String>,
    transport: Arc<HttpTransport>,
}

impl GeminiAdapter {
    pub fn new(transport: Arc<HttpTransport>) -> Self {
        Self {
            base_url: config::resolve_base_url("gemini", config::GEMINI_DEFAULT_BASE_URL),
            api_key: config::resolve_api_key("gemini"),
            transport,
        }
    }

    /// Hoist system text into `system_instruction`, map the rest to
    /// `contents` entries.
    fn split_turns(turns: &[PromptTurn]) -> (Option<Value>, Vec<Value>) {
        let mut system_parts: Vec<String> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();

        for turn in turns {
            match turn {
                PromptTurn::Message(Message {
                    role: MessageRole::System,
                    content: MessageContent::Text(s),
                }) => system_parts.push(s.clone()),
                PromptTurn::Message(m) => {
                    let role = match m.role {
                        MessageRole::Assistant => "model",
                        _ => "user",
                    };
                    contents.push(json!({
                        "role": role,
                        "parts": Self::content_to_parts(&m.content),
                    }));
                }
                PromptTurn::Verbatim(v) => contents.push(v.clone()),
            }
        }

        let system_instruction = if system_parts.is_empty() {
            None
        } else {
            Some(json!({
                "parts": [{ "text": system_parts.join("\n\n") }]
            }))
        };

        (system_instruction, contents)
    }

    fn content_to_parts(content: &MessageContent) -> Value {
        match content {
            MessageContent::Text(s) => json!([{ "text": s }]),
            MessageContent::Blocks(blocks) => Value::Array(
                blocks
                    .iter()
                    .map(|b| match b {
                        ContentBlock::Text { text } => json!({ "text": text }),
                        ContentBlock::Image { source } => json!({
                            "inline_data": {
                                "mime_type": source.media_type.as_deref().unwrap_or("image/png"),
                                "data": source.data,
                            }
                        }),
                    })
                    .collect(),
            ),
        }
    }

    /// Retry hint from a 429 body: Google reports a `RetryInfo` detail with a
    /// `retryDelay` like `"30s"`.
    fn retry_hint_from_body(body: &str) -> Option<u64> {
        let v: Value = serde_json::from_str(body).ok()?;
        let details = v.pointer("/error/details")?.as_array()?;
        details.iter().find_map(|d| {
            d.get("retryDelay")?
                .as_str()?
                .trim_end_matches('s')
                .parse::<u64>()
                .ok()
        })
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn id(&self) -> &str {
        "gemini"
    }

    fn supports_schema(&self) -> bool {
        true
    }

    fn default_model(&self) -> &str {
        "gemini-2.0-flash"
    }

    async fn invoke(&self, call: &ProviderCall<'_>) -> AttemptResult {
        let (system_instruction, contents) = Self::split_turns(&call.prompt.turns);

        let mut generation_config = json!({ "temperature": call.temperature });
        if call.output_format == OutputFormat::JsonObject {
            generation_config["responseMimeType"] = json!("application/json");
            if let Some(schema) = call.output.schema() {
                if schema_root_is_container(schema) {
                    generation_config["responseSchema"] = schema.clone();
                }
            }
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(sys) = system_instruction {
            body["system_instruction"] = sys;
        }

        let url = format!("{}/models/{}:generateContent", self.base_url, call.model);
        debug!(provider = "gemini", model = call.model, "dispatching generateContent request");

        let query: Vec<(&str, &str)> = match self.api_key.as_deref() {
            Some(key) => vec![("key", key)],
            None => Vec::new(),
        };
        let resp = self
            .transport
            .post_json(&url, &body, None, Some(&query))
            .await
            .map_err(|e| match e {
                crate::Error::Transport(ref re) => classify_transport(re),
                other => AttemptFailure::fatal(other.to_string()),
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let header_hint = retry_after_secs(resp.headers());
            let text = resp.text().await.unwrap_or_default();
            let hint = header_hint.or_else(|| Self::retry_hint_from_body(&text));
            return Err(classify_http_status(status, hint, &text));
        }

        let envelope: Value = resp
            .json()
            .await
            .map_err(|e| AttemptFailure::fatal(format!("unreadable response envelope: {}", e)))?;

        let content = envelope
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AttemptFailure::fatal("response carried no candidate text"))?;

        let parsed = parse_content(content, call.output_format)?;
        let mut payload = ResponsePayload {
            content: parsed,
            raw_message: None,
            usage: None,
            model: Some(call.model.to_string()),
        };

        if call.prompt.wants_raw {
            payload.raw_message = envelope.pointer("/candidates/0/content").cloned();
        }
        if call.include_metadata {
            payload.usage = envelope.get("usageMetadata").map(|u| UsageInfo {
                prompt_tokens: u["promptTokenCount"].as_u64().unwrap_or(0),
                completion_tokens: u["candidatesTokenCount"].as_u64().unwrap_or(0),
                total_tokens: u["totalTokenCount"].as_u64().unwrap_or(0),
            });
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_text_is_hoisted() {
        let turns = vec![
            PromptTurn::Message(Message::system("be terse")),
            PromptTurn::Message(Message::user("hello")),
        ];
        let (sys, contents) = GeminiAdapter::split_turns(&turns);
        assert_eq!(sys.unwrap()["parts"][0]["text"], "be terse");
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
    }

    #[test]
    fn assistant_role_maps_to_model() {
        let turns = vec![PromptTurn::Message(Message::assistant("prior reply"))];
        let (_, contents) = GeminiAdapter::split_turns(&turns);
        assert_eq!(contents[0]["role"], "model");
    }

    #[test]
    fn image_blocks_become_inline_data() {
        let content = MessageContent::Blocks(vec![ContentBlock::image_base64(
            "aGk=".into(),
            Some("image/webp".into()),
        )]);
        let parts = GeminiAdapter::content_to_parts(&content);
        assert_eq!(parts[0]["inline_data"]["mime_type"], "image/webp");
        assert_eq!(parts[0]["inline_data"]["data"], "aGk=");
    }

    #[test]
    fn retry_hint_parses_google_retry_info() {
        let body = r#"{"error": {"code": 429, "details": [
            {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "41s"}
        ]}}"#;
        assert_eq!(GeminiAdapter::retry_hint_from_body(body), Some(41));
        assert_eq!(GeminiAdapter::retry_hint_from_body("{}"), None);
    }
}
