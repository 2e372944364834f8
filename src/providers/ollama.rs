//! Local/offline adapter speaking the Ollama chat protocol.
//!
//! No credential, no native schema enforcement; JSON mode uses the `format`
//! field and the contract travels as prompt guidance. Token accounting maps
//! from `prompt_eval_count` / `eval_count`.

use super::parse::{parse_content, JSON_GUIDANCE};
use super::{
    classify_http_status, classify_transport, retry_after_secs, AttemptFailure, AttemptResult,
    ProviderAdapter, ProviderCall,
};
use crate::config;
use crate::prompt::BuiltPrompt;
use crate::transport::HttpTransport;
use crate::types::{
    ContentBlock, Message, MessageContent, MessageRole, OutputFormat, PromptTurn, ResponsePayload,
    UsageInfo,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub struct OllamaAdapter {
    base_url: String,
    transport: Arc<HttpTransport>,
}

impl OllamaAdapter {
    pub fn new(transport: Arc<HttpTransport>) -> Self {
        Self {
            base_url: config::resolve_base_url("ollama", config::OLLAMA_DEFAULT_BASE_URL),
            transport,
        }
    }

    fn convert_turns(prompt: &BuiltPrompt, json_mode: bool) -> Vec<Value> {
        let mut messages: Vec<Value> = prompt
            .turns
            .iter()
            .map(|turn| match turn {
                PromptTurn::Message(m) => message_to_wire(m),
                PromptTurn::Verbatim(v) => v.clone(),
            })
            .collect();
        if json_mode {
            messages.push(json!({"role": "system", "content": JSON_GUIDANCE}));
        }
        messages
    }
}

/// Ollama takes text in `content` and base64 images in a sibling `images`
/// array rather than as content blocks.
fn message_to_wire(m: &Message) -> Value {
    let role = match m.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    };
    match &m.content {
        MessageContent::Text(s) => json!({"role": role, "content": s}),
        MessageContent::Blocks(blocks) => {
            let mut text_parts: Vec<&str> = Vec::new();
            let mut images: Vec<&str> = Vec::new();
            for b in blocks {
                match b {
                    ContentBlock::Text { text } => text_parts.push(text),
                    ContentBlock::Image { source } => images.push(&source.data),
                }
            }
            let mut msg = json!({"role": role, "content": text_parts.join("\n\n")});
            if !images.is_empty() {
                msg["images"] = json!(images);
            }
            msg
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn id(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        "llama3.1"
    }

    async fn invoke(&self, call: &ProviderCall<'_>) -> AttemptResult {
        let json_mode = call.output_format == OutputFormat::JsonObject;
        let mut body = json!({
            "model": call.model,
            "messages": Self::convert_turns(call.prompt, json_mode),
            "stream": false,
            "options": { "temperature": call.temperature },
        });
        if json_mode {
            body["format"] = json!("json");
        }

        let url = format!("{}/api/chat", self.base_url);
        debug!(provider = "ollama", model = call.model, "dispatching local chat request");

        let resp = self
            .transport
            .post_json(&url, &body, None, None)
            .await
            .map_err(|e| match e {
                crate::Error::Transport(ref re) => classify_transport(re),
                other => AttemptFailure::fatal(other.to_string()),
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let retry_after = retry_after_secs(resp.headers());
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_http_status(status, retry_after, &text));
        }

        let envelope: Value = resp
            .json()
            .await
            .map_err(|e| AttemptFailure::fatal(format!("unreadable response envelope: {}", e)))?;

        let content = envelope
            .pointer("/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AttemptFailure::fatal("response carried no message content"))?;

        let parsed = parse_content(content, call.output_format)?;
        let mut payload = ResponsePayload {
            content: parsed,
            raw_message: None,
            usage: None,
            model: Some(call.model.to_string()),
        };

        if call.prompt.wants_raw {
            payload.raw_message = envelope.get("message").cloned();
        }
        if call.include_metadata {
            let prompt_tokens = envelope["prompt_eval_count"].as_u64().unwrap_or(0);
            let completion_tokens = envelope["eval_count"].as_u64().unwrap_or(0);
            payload.usage = Some(UsageInfo {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            });
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_move_to_sibling_array() {
        let m = Message::with_content(
            MessageRole::User,
            MessageContent::Blocks(vec![
                ContentBlock::text("what is this"),
                ContentBlock::image_base64("aGk=".into(), Some("image/png".into())),
            ]),
        );
        let wire = message_to_wire(&m);
        assert_eq!(wire["content"], "what is this");
        assert_eq!(wire["images"][0], "aGk=");
    }
}
