use thiserror::Error;

/// Structured context attached to schema and configuration errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "request.outputs", "cache.path")
    pub field_path: Option<String>,
    /// Additional detail about the error (expected shape, offending value)
    pub details: Option<String>,
    /// Component that raised the error (e.g., "schema_compiler", "fallback")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Unified error type for the orchestrator.
///
/// Recoverable attempt-level failures (rate limit, overload, malformed output)
/// never appear here directly; the fallback controller consumes those. What
/// surfaces is the terminal taxonomy: exhaustion of a retry budget, exhaustion
/// of the candidate queue, or a fatal backend/configuration fault.
#[derive(Debug, Error)]
pub enum Error {
    #[error("rate limit retries exhausted for {provider}/{model} after {attempts} attempts")]
    RateLimitExhausted {
        provider: String,
        model: String,
        attempts: u32,
    },

    #[error("overload retries exhausted for {provider}/{model} after {attempts} attempts")]
    OverloadExhausted {
        provider: String,
        model: String,
        attempts: u32,
    },

    #[error("structured output from {provider}/{model} stayed malformed after {attempts} parse attempts: {detail}")]
    MalformedOutput {
        provider: String,
        model: String,
        attempts: u32,
        detail: String,
    },

    #[error("provider {provider} failed fatally: {detail}")]
    Provider { provider: String, detail: String },

    #[error("all {tried} candidates exhausted without a successful response")]
    ExhaustedCandidates { tried: usize },

    #[error("schema descriptor error: {message}{}", format_context(.context))]
    Schema {
        message: String,
        context: ErrorContext,
    },

    #[error("configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("network transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a schema error with structured context.
    pub fn schema_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Schema {
            message: msg.into(),
            context,
        }
    }

    /// Create a configuration error with structured context.
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract structured context if this error carries one.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Schema { context, .. } | Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}
