//! Response payload: the orchestrator's output and the cache's value type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parsed structured value or raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PayloadContent {
    Json(Value),
    Text(String),
}

/// Token usage reported by the serving backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// A successful model response.
///
/// Serde-serializable because it is also the value type of the response cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub content: PayloadContent,
    /// Backend-native assistant message object, populated only for the
    /// raw-message escape hatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_message: Option<Value>,
    /// Usage metadata, populated when the request asked for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageInfo>,
    /// Model id that produced this payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ResponsePayload {
    pub fn json(value: Value) -> Self {
        Self {
            content: PayloadContent::Json(value),
            raw_message: None,
            usage: None,
            model: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: PayloadContent::Text(text.into()),
            raw_message: None,
            usage: None,
            model: None,
        }
    }

    pub fn with_usage(mut self, usage: UsageInfo) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_raw_message(mut self, raw: Value) -> Self {
        self.raw_message = Some(raw);
        self
    }

    /// The parsed JSON value, if this is a structured payload.
    pub fn as_json(&self) -> Option<&Value> {
        match &self.content {
            PayloadContent::Json(v) => Some(v),
            PayloadContent::Text(_) => None,
        }
    }

    /// The raw text, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            PayloadContent::Text(s) => Some(s),
            PayloadContent::Json(_) => None,
        }
    }
}
