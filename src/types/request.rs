//! Request specification: the single inbound surface of the orchestrator.

use crate::providers::ProviderAdapter;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Reserved key in `inputs` holding a list of image attachments
/// (file paths or pre-encoded `{ "data": ..., "media_type": ... }` objects).
pub const IMAGES_KEY: &str = "images";

/// Reserved key in `inputs` holding a pre-built raw message list.
/// When present, the list is forwarded verbatim and the response carries the
/// backend-native assistant message object.
pub const MESSAGES_KEY: &str = "messages";

/// Desired shape of the model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// The backend must produce a single JSON value.
    JsonObject,
    /// Free-form text.
    #[default]
    Text,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::JsonObject => "json_object",
            OutputFormat::Text => "text",
        }
    }
}

/// What the caller expects back, normalized into one tagged variant.
///
/// Callers usually supply a `Descriptor` (the field DSL compiled by
/// [`crate::schema`]); the dispatcher normalizes it into `Schema` exactly once
/// at the boundary, so everything downstream only ever sees `Schema` or
/// `Text`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputSpec {
    /// A descriptor object in the field DSL, not yet compiled.
    Descriptor(Value),
    /// A compiled JSON Schema document.
    Schema(Value),
    /// No structured contract; the payload is raw text.
    #[default]
    Text,
}

impl OutputSpec {
    pub fn is_structured(&self) -> bool {
        !matches!(self, OutputSpec::Text)
    }

    /// The schema document, if already compiled.
    pub fn schema(&self) -> Option<&Value> {
        match self {
            OutputSpec::Schema(s) => Some(s),
            _ => None,
        }
    }
}

/// Model selection: nothing, one pinned id, or an ordered fallback list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelChoice {
    #[default]
    Unspecified,
    Single(String),
    Ordered(Vec<String>),
}

impl From<&str> for ModelChoice {
    fn from(s: &str) -> Self {
        ModelChoice::Single(s.to_string())
    }
}

impl From<String> for ModelChoice {
    fn from(s: String) -> Self {
        ModelChoice::Single(s)
    }
}

impl From<Vec<String>> for ModelChoice {
    fn from(v: Vec<String>) -> Self {
        ModelChoice::Ordered(v)
    }
}

/// Provider selection, as a tagged variant instead of runtime type-sniffing.
///
/// `Custom` carries a caller-supplied adapter; its stable `id()` (never the
/// pointer) participates in the request fingerprint.
#[derive(Clone, Default)]
pub enum ProviderSelector {
    #[default]
    Default,
    Explicit(crate::providers::ProviderId),
    Custom(Arc<dyn ProviderAdapter>),
}

impl ProviderSelector {
    /// Stable identity used for fingerprinting.
    pub fn fingerprint_id(&self) -> String {
        match self {
            ProviderSelector::Default => "default".to_string(),
            ProviderSelector::Explicit(id) => id.as_str().to_string(),
            ProviderSelector::Custom(a) => format!("custom:{}", a.id()),
        }
    }
}

impl std::fmt::Debug for ProviderSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderSelector::Default => write!(f, "Default"),
            ProviderSelector::Explicit(id) => write!(f, "Explicit({})", id.as_str()),
            ProviderSelector::Custom(a) => write!(f, "Custom({})", a.id()),
        }
    }
}

/// A structured model request. Constructed per call via [`RequestSpec::builder`]
/// and discarded after use.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// Optional system role / persona text.
    pub role: Option<String>,
    /// The task statement. Always present.
    pub task: String,
    /// Named inputs serialized into the prompt. May carry the reserved
    /// [`IMAGES_KEY`] and [`MESSAGES_KEY`] entries.
    pub inputs: Map<String, Value>,
    pub outputs: OutputSpec,
    pub output_format: OutputFormat,
    pub provider: ProviderSelector,
    pub model: ModelChoice,
    pub temperature: f64,
    /// Route to the local/offline adapter only.
    pub local_only: bool,
    /// Start the default candidate walk at the premium tier.
    pub best_model: bool,
    /// Attach usage/telemetry fields to the payload.
    pub include_metadata: bool,
}

impl RequestSpec {
    pub fn builder(task: impl Into<String>) -> RequestSpecBuilder {
        RequestSpecBuilder::new(task)
    }

    /// Inputs with the reserved entries removed, i.e. what actually gets
    /// serialized into the prompt's input block.
    pub fn plain_inputs(&self) -> Map<String, Value> {
        self.inputs
            .iter()
            .filter(|(k, _)| k.as_str() != IMAGES_KEY && k.as_str() != MESSAGES_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn image_inputs(&self) -> Option<&Vec<Value>> {
        self.inputs.get(IMAGES_KEY).and_then(|v| v.as_array())
    }

    pub fn raw_messages(&self) -> Option<&Vec<Value>> {
        self.inputs.get(MESSAGES_KEY).and_then(|v| v.as_array())
    }
}

/// Builder for [`RequestSpec`].
#[derive(Debug, Clone)]
pub struct RequestSpecBuilder {
    spec: RequestSpec,
    format_explicit: bool,
}

impl RequestSpecBuilder {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            spec: RequestSpec {
                role: None,
                task: task.into(),
                inputs: Map::new(),
                outputs: OutputSpec::Text,
                output_format: OutputFormat::Text,
                provider: ProviderSelector::Default,
                model: ModelChoice::Unspecified,
                temperature: 0.0,
                local_only: false,
                best_model: false,
                include_metadata: false,
            },
            format_explicit: false,
        }
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.spec.role = Some(role.into());
        self
    }

    pub fn input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.spec.inputs.insert(key.into(), value);
        self
    }

    pub fn inputs(mut self, inputs: Map<String, Value>) -> Self {
        self.spec.inputs = inputs;
        self
    }

    /// Attach a descriptor-DSL output contract. Implies JSON output unless the
    /// format was set explicitly.
    pub fn outputs(mut self, descriptor: Value) -> Self {
        self.spec.outputs = OutputSpec::Descriptor(descriptor);
        self
    }

    /// Attach an already-compiled JSON Schema output contract.
    pub fn output_schema(mut self, schema: Value) -> Self {
        self.spec.outputs = OutputSpec::Schema(schema);
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.spec.output_format = format;
        self.format_explicit = true;
        self
    }

    pub fn model(mut self, model: impl Into<ModelChoice>) -> Self {
        self.spec.model = model.into();
        self
    }

    pub fn models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.model = ModelChoice::Ordered(models.into_iter().map(Into::into).collect());
        self
    }

    pub fn provider(mut self, id: crate::providers::ProviderId) -> Self {
        self.spec.provider = ProviderSelector::Explicit(id);
        self
    }

    pub fn custom_provider(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.spec.provider = ProviderSelector::Custom(adapter);
        self
    }

    pub fn temperature(mut self, t: f64) -> Self {
        self.spec.temperature = t;
        self
    }

    pub fn local_only(mut self) -> Self {
        self.spec.local_only = true;
        self
    }

    pub fn best_model(mut self) -> Self {
        self.spec.best_model = true;
        self
    }

    pub fn include_metadata(mut self) -> Self {
        self.spec.include_metadata = true;
        self
    }

    pub fn build(mut self) -> RequestSpec {
        // A structured output contract implies JSON unless explicitly overridden.
        if !self.format_explicit && self.spec.outputs.is_structured() {
            self.spec.output_format = OutputFormat::JsonObject;
        }
        self.spec
    }
}
