//! # llm-relay
//!
//! A unified multi-backend request orchestrator for large-language-model
//! calls. One structured request goes in; llm-relay normalizes it,
//! deduplicates it against a durable content-addressed cache, walks a
//! prioritized queue of (provider, model) candidates, and recovers from
//! provider-specific failure modes (rate limiting, transient overload,
//! malformed structured output) with bounded retries and candidate
//! advancement.
//!
//! ## Key properties
//!
//! - **One contract over heterogeneous backends**: schema-enforcing,
//!   OpenAI-compatible (including the OpenRouter aggregator), and
//!   local/offline families behind a single [`ProviderAdapter`] trait.
//! - **Idempotent caching**: responses are keyed by a canonical fingerprint
//!   of the request; equal requests never hit a backend twice.
//! - **Strictly sequential fallback**: candidates are tried front-to-back,
//!   never fanned out, never reordered.
//! - **Structured output**: a lightweight descriptor DSL compiles to JSON
//!   Schema, enforced natively where the backend supports it and by prompt
//!   guidance everywhere else.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use llm_relay::{Dispatcher, RequestSpec};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> llm_relay::Result<()> {
//!     let dispatcher = Dispatcher::builder()
//!         .with_cache_path("responses.json")
//!         .build()?;
//!
//!     let spec = RequestSpec::builder("Add the two numbers.")
//!         .input("a", json!(2))
//!         .input("b", json!(3))
//!         .outputs(json!({ "result": "Number | the sum" }))
//!         .model("gemini-2.0-flash")
//!         .build();
//!
//!     if let Some(payload) = dispatcher.complete(spec).await {
//!         println!("{:?}", payload.as_json());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dispatch`] | Entry point: normalize, fingerprint, cache, delegate |
//! | [`fallback`] | Candidate queue construction and the retry/advance walk |
//! | [`providers`] | Backend adapters and the failure taxonomy |
//! | [`prompt`] | Message builder (fenced blocks, images, raw passthrough) |
//! | [`schema`] | Descriptor DSL to JSON Schema compilation |
//! | [`cache`] | Durable content-addressed response store |
//! | [`fingerprint`] | Canonical request digests |
//! | [`media`] | Image attachment seam |
//! | [`types`] | Request specs, messages, payloads |

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod fallback;
pub mod fingerprint;
pub mod media;
pub mod prompt;
pub mod providers;
pub mod schema;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use dispatch::{Dispatcher, DispatcherBuilder};
pub use fallback::RetryPolicy;
pub use media::{EncodedImage, ImageEncoder, InlineImageEncoder};
pub use providers::{
    AttemptFailure, AttemptResult, FailureKind, ProviderAdapter, ProviderCall, ProviderId,
};
pub use types::{
    ModelChoice, OutputFormat, OutputSpec, PayloadContent, ProviderSelector, RequestSpec,
    RequestSpecBuilder, ResponsePayload, UsageInfo,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
