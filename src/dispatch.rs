//! Dispatcher: the single entry point.
//!
//! Normalizes the request at the boundary (descriptor compilation happens
//! exactly once here), fingerprints it, serves cache hits without contacting
//! any backend, delegates misses to the fallback controller, and writes
//! successes back through a flush.

use crate::cache::{CacheBackend, CacheManager, CacheStats, FileCache, MemoryCache};
use crate::fallback::{FallbackController, RetryPolicy};
use crate::fingerprint::fingerprint;
use crate::media::{ImageEncoder, InlineImageEncoder};
use crate::prompt::build_prompt;
use crate::providers::{ProviderAdapter, ProviderRegistry};
use crate::transport::HttpTransport;
use crate::types::{OutputSpec, RequestSpec, ResponsePayload};
use crate::Result;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Unified request orchestrator. Cheap to clone; clones share the cache, the
/// adapter registry, and the rate-limit cursor.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    cache: Arc<CacheManager>,
    cursor: Arc<AtomicUsize>,
    policy: RetryPolicy,
    encoder: Arc<dyn ImageEncoder>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Execute a request, collapsing every terminal failure to `None`.
    ///
    /// This is the lenient contract: diagnostics go to the log, the caller
    /// only ever sees a payload or nothing. Use [`Self::try_complete`] for
    /// the discriminated result.
    pub async fn complete(&self, spec: RequestSpec) -> Option<ResponsePayload> {
        match self.try_complete(spec).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(error = %e, "request resolved without a response");
                None
            }
        }
    }

    /// Execute a request, surfacing the terminal error taxonomy.
    pub async fn try_complete(&self, spec: RequestSpec) -> Result<ResponsePayload> {
        let spec = self.normalize(spec)?;
        let key = fingerprint(&spec);

        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        let prompt = build_prompt(&spec, self.encoder.as_ref())?;
        let controller = FallbackController::new(&self.registry, &self.policy, &self.cursor);
        let payload = controller.run(&spec, &prompt).await?;

        self.cache.put(&key, &payload).await;
        self.cache.flush().await;
        debug!(fingerprint = key.as_str(), "response cached");

        Ok(payload)
    }

    /// Boundary normalization: compile a descriptor contract into its schema
    /// so everything downstream sees only `Schema` or `Text`.
    fn normalize(&self, mut spec: RequestSpec) -> Result<RequestSpec> {
        if let OutputSpec::Descriptor(descriptor) = &spec.outputs {
            let schema = crate::schema::compile(descriptor)?;
            spec.outputs = OutputSpec::Schema(schema);
        }
        Ok(spec)
    }

    /// Execute independent requests concurrently with a bounded fan-out.
    ///
    /// Each request is its own sequential chain; only the cache and the
    /// rate-limit cursor are shared. Results preserve input order.
    pub async fn complete_batch(
        &self,
        specs: Vec<RequestSpec>,
        concurrency_limit: Option<usize>,
    ) -> Vec<Option<ResponsePayload>> {
        use futures::StreamExt;

        let n = specs.len();
        if n == 0 {
            return Vec::new();
        }

        let limit = concurrency_limit.unwrap_or(8).max(1);
        let results: Vec<(usize, Option<ResponsePayload>)> =
            futures::stream::iter(specs.into_iter().enumerate())
                .map(|(idx, spec)| async move { (idx, self.complete(spec).await) })
                .buffer_unordered(limit)
                .collect()
                .await;

        let mut out: Vec<Option<ResponsePayload>> = (0..n).map(|_| None).collect();
        for (idx, result) in results {
            out[idx] = result;
        }
        out
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    cache_path: Option<PathBuf>,
    cache_backend: Option<Box<dyn CacheBackend>>,
    policy: RetryPolicy,
    encoder: Option<Arc<dyn ImageEncoder>>,
    extra_adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            cache_path: None,
            cache_backend: None,
            policy: RetryPolicy::default(),
            encoder: None,
            extra_adapters: Vec::new(),
        }
    }

    /// Durable response cache at this path (JSON snapshot). Without a path
    /// the cache is in-memory only.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Supply a custom cache backend instead of the built-in ones.
    pub fn with_cache_backend(mut self, backend: Box<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.policy.attempt_timeout = timeout;
        self
    }

    pub fn with_image_encoder(mut self, encoder: Arc<dyn ImageEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Register an adapter on top of the standard families. Registering one
    /// with a standard id replaces that family.
    pub fn register_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.extra_adapters.push(adapter);
        self
    }

    pub fn build(self) -> Result<Dispatcher> {
        let transport = Arc::new(HttpTransport::new()?);
        let mut registry = ProviderRegistry::standard(transport);
        for adapter in self.extra_adapters {
            registry.register(adapter);
        }

        let backend: Box<dyn CacheBackend> = match (self.cache_backend, self.cache_path) {
            (Some(backend), _) => backend,
            (None, Some(path)) => Box::new(FileCache::open(path)?),
            (None, None) => Box::new(MemoryCache::new()),
        };

        Ok(Dispatcher {
            registry: Arc::new(registry),
            cache: Arc::new(CacheManager::new(backend)),
            cursor: Arc::new(AtomicUsize::new(0)),
            policy: self.policy,
            encoder: self
                .encoder
                .unwrap_or_else(|| Arc::new(InlineImageEncoder)),
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
