//! OpenAI-compatible chat-completions adapter.
//!
//! Covers the OpenAI API itself and, via base-URL/key substitution, any
//! compatible vendor — including the OpenRouter aggregator, which is just
//! this adapter pointed at a different endpoint. No native schema
//! enforcement: JSON mode is requested with `response_format` and the
//! contract travels as prompt guidance.

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

pub struct OpenAiCompatibleAdapter {
    id: String,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    transport: Arc<HttpTransport>,
}

impl OpenAiCompatibleAdapter {
    pub fn openai(transport: Arc<HttpTransport>) -> Self {
        Self::with_endpoint(
            "openai",
            config::resolve_base_url("openai", config::OPENAI_DEFAULT_BASE_URL),
            config::resolve_api_key("openai"),
            "gpt-4o-mini",
            transport,
        )
    }

    /// The aggregator is the same wire protocol with a different endpoint and
    /// credential.
    pub fn openrouter(transport: Arc<HttpTransport>) -> Self {
        Self::with_endpoint(
            "openrouter",
            config::resolve_base_url("openrouter", config::OPENROUTER_DEFAULT_BASE_URL),
            config::resolve_api_key("openrouter"),
            "openrouter/auto",
            transport,
        )
    }

    pub fn with_endpoint(
        id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_model: impl Into<String>,
        transport: Arc<HttpTransport>,
    ) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            api_key,
            default_model: default_model.into(),
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

fn message_to_wire(m: &Message) -> Value {
    let role = match m.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    };
    let content = match &m.content {
        MessageContent::Text(s) => Value::String(s.clone()),
        MessageContent::Blocks(blocks) => Value::Array(
            blocks
                .iter()
                .map(|b| match b {
                    ContentBlock::Text { text } => json!({"type": "text", "text": text}),
                    ContentBlock::Image { source } => {
                        let mime = source.media_type.as_deref().unwrap_or("image/png");
                        json!({
                            "type": "image_url",
                            "image_url": {
                                "url": format!("data:{};base64,{}", mime, source.data)
                            }
                        })
                    }
                })
                .collect(),
        ),
    };
    json!({"role": role, "content": content})
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn invoke(&self, call: &ProviderCall<'_>) -> AttemptResult {
        let json_mode = call.output_format == OutputFormat::JsonObject;
        let mut body = json!({
            "model": call.model,
            "messages": Self::convert_turns(call.prompt, json_mode),
            "temperature": call.temperature,
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let url = format!("{}/chat/completions", self.base_url);
        debug!(provider = self.id.as_str(), model = call.model, "dispatching chat request");

        let resp = self
            .transport
            .post_json(&url, &body, self.api_key.as_deref(), None)
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
            .pointer("/choices/0/message/content")
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
            payload.raw_message = envelope.pointer("/choices/0/message").cloned();
        }
        if call.include_metadata {
            payload.usage = envelope.get("usage").map(|u| UsageInfo {
                prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
                completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
                total_tokens: u["total_tokens"].as_u64().unwrap_or(0),
            });
        }

        Ok(payload)
    }
}
