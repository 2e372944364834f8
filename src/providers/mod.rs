//! Provider adapter abstraction.
//!
//! One adapter per backend family, behind an object-safe trait so the
//! fallback controller can walk heterogeneous candidates: the
//! schema-enforcing family ([`GeminiAdapter`]), the OpenAI-compatible chat
//! family ([`OpenAiCompatibleAdapter`], reused for the OpenRouter aggregator
//! via base-URL/key substitution), and the local/offline family
//! ([`OllamaAdapter`]). Each adapter builds its backend's wire payload,
//! applies structured-output enforcement where the backend supports it, and
//! classifies failures into the shared four-kind taxonomy.

pub mod gemini;
pub mod ollama;
pub mod openai;
pub(crate) mod parse;

use crate::prompt::BuiltPrompt;
use crate::transport::HttpTransport;
use crate::types::{OutputFormat, OutputSpec, ResponsePayload};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use gemini::GeminiAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiCompatibleAdapter;

/// Built-in backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Gemini,
    OpenAi,
    OpenRouter,
    Ollama,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::OpenAi => "openai",
            ProviderId::OpenRouter => "openrouter",
            ProviderId::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure taxonomy shared by every adapter and consumed by the fallback
/// controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Explicit throttle signal, with the backend's retry hint in seconds.
    RateLimited { retry_after: Option<u64> },
    /// Backend temporarily unavailable (5xx unavailability, connect/timeout).
    Overloaded,
    /// Structured output failed to parse.
    Malformed,
    /// Anything else; not recoverable by retry or fallback.
    Fatal,
}

/// One classified attempt failure.
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl AttemptFailure {
    pub fn rate_limited(retry_after: Option<u64>, detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::RateLimited { retry_after },
            detail: detail.into(),
        }
    }

    pub fn overloaded(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Overloaded,
            detail: detail.into(),
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Malformed,
            detail: detail.into(),
        }
    }

    pub fn fatal(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Fatal,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            FailureKind::RateLimited { retry_after } => {
                write!(f, "rate limited (retry_after: {:?}): {}", retry_after, self.detail)
            }
            FailureKind::Overloaded => write!(f, "overloaded: {}", self.detail),
            FailureKind::Malformed => write!(f, "malformed output: {}", self.detail),
            FailureKind::Fatal => write!(f, "fatal: {}", self.detail),
        }
    }
}

/// Outcome of a single provider attempt.
pub type AttemptResult = Result<ResponsePayload, AttemptFailure>;

/// Everything an adapter needs for one attempt.
#[derive(Debug, Clone)]
pub struct ProviderCall<'a> {
    pub model: &'a str,
    pub prompt: &'a BuiltPrompt,
    /// Normalized output contract: `Schema` or `Text` by the time it gets here.
    pub output: &'a OutputSpec,
    pub output_format: OutputFormat,
    pub temperature: f64,
    pub include_metadata: bool,
}

/// Capability set of one backend family.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable adapter identity; also feeds the request fingerprint for
    /// custom adapters.
    fn id(&self) -> &str;

    /// Whether the backend natively enforces a JSON Schema constraint.
    fn supports_schema(&self) -> bool {
        false
    }

    /// Model used when the caller pins this provider without naming one.
    fn default_model(&self) -> &str;

    /// Execute one attempt: build the wire payload, invoke the backend,
    /// parse and classify.
    async fn invoke(&self, call: &ProviderCall<'_>) -> AttemptResult;
}

/// Classify an HTTP error status into the failure taxonomy.
///
/// 429 carries the throttle signal; 500/503 signal backend unavailability;
/// everything else is fatal for this candidate.
pub(crate) fn classify_http_status(
    status: u16,
    retry_after: Option<u64>,
    body: &str,
) -> AttemptFailure {
    let detail = format!("HTTP {}: {}", status, truncate(body, 300));
    match status {
        429 => AttemptFailure::rate_limited(retry_after, detail),
        500 | 503 => AttemptFailure::overloaded(detail),
        _ => AttemptFailure::fatal(detail),
    }
}

/// Classify a transport-level failure: connect errors and timeouts look like
/// overload to the retry machinery, anything else is fatal.
pub(crate) fn classify_transport(e: &reqwest::Error) -> AttemptFailure {
    if e.is_timeout() || e.is_connect() {
        AttemptFailure::overloaded(e.to_string())
    } else {
        AttemptFailure::fatal(e.to_string())
    }
}

/// Best-effort `Retry-After: <seconds>` parse; only the plain-seconds form.
pub(crate) fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

/// Adapter lookup table. Standard families are always present; custom
/// adapters register on top by id.
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Build the standard family set over one shared transport.
    pub fn standard(transport: Arc<HttpTransport>) -> Self {
        let mut registry = Self {
            adapters: HashMap::new(),
        };
        registry.register(Arc::new(GeminiAdapter::new(transport.clone())));
        registry.register(Arc::new(OpenAiCompatibleAdapter::openai(transport.clone())));
        registry.register(Arc::new(OpenAiCompatibleAdapter::openrouter(
            transport.clone(),
        )));
        registry.register(Arc::new(OllamaAdapter::new(transport)));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.id().to_string(), adapter);
    }

    pub fn get(&self, id: ProviderId) -> Arc<dyn ProviderAdapter> {
        self.adapters
            .get(id.as_str())
            .cloned()
            .unwrap_or_else(|| unreachable!("standard adapter {} always registered", id))
    }

    pub fn by_id(&self, id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_http_status(429, Some(12), "slow down").kind,
            FailureKind::RateLimited {
                retry_after: Some(12)
            }
        ));
        assert!(matches!(
            classify_http_status(500, None, "").kind,
            FailureKind::Overloaded
        ));
        assert!(matches!(
            classify_http_status(503, None, "").kind,
            FailureKind::Overloaded
        ));
        assert!(matches!(
            classify_http_status(400, None, "bad request").kind,
            FailureKind::Fatal
        ));
        assert!(matches!(
            classify_http_status(401, None, "no key").kind,
            FailureKind::Fatal
        ));
    }
}
