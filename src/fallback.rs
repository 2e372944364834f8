//! Fallback controller: candidate queue construction and the bounded
//! retry/advance walk.
//!
//! Candidates are tried strictly front-to-back, never in parallel, never
//! reordered. Recovery policy per failure kind:
//! - rate limited, pinned candidate: sleep `max(retry_after, floor)` plus a
//!   fixed jitter and retry the same candidate, up to the policy cap;
//! - rate limited while walking: advance, persisting the index in the
//!   process-wide cursor when the walk is the implicit default list;
//! - overloaded: linear backoff on the same candidate up to the policy cap;
//! - malformed output: immediate retry on the same candidate, four parse
//!   attempts total, then the whole call fails;
//! - fatal: the whole call fails at once.

use crate::error::Error;
use crate::prompt::BuiltPrompt;
use crate::providers::{
    FailureKind, ProviderAdapter, ProviderCall, ProviderId, ProviderRegistry,
};
use crate::types::{ModelChoice, ProviderSelector, RequestSpec, ResponsePayload};
use crate::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Built-in candidate walk when the caller names neither model nor provider.
/// Cheapest/fastest first.
const DEFAULT_PRIORITY: &[(ProviderId, &str)] = &[
    (ProviderId::Gemini, "gemini-2.0-flash"),
    (ProviderId::Gemini, "gemini-2.5-flash"),
    (ProviderId::Gemini, "gemini-2.5-pro"),
    (ProviderId::OpenRouter, "anthropic/claude-sonnet-4"),
];

/// Index into [`DEFAULT_PRIORITY`] where the premium tier begins; the
/// `best_model` flag starts the walk here.
const PREMIUM_TIER_START: usize = 2;

/// Retry budget and backoff shape for one dispatcher.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Minimum wait on a pinned rate limit, regardless of the backend hint.
    pub rate_limit_floor: Duration,
    /// Fixed jitter added to every rate-limit wait.
    pub rate_limit_jitter: Duration,
    pub max_rate_limit_attempts: u32,
    /// Overload backoff is `attempt x overload_base_delay`.
    pub overload_base_delay: Duration,
    pub max_overload_attempts: u32,
    /// Total parse attempts per candidate before the call fails.
    pub max_parse_attempts: u32,
    /// Per-attempt deadline; an expiry classifies as overload.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_floor: Duration::from_secs(30),
            rate_limit_jitter: Duration::from_millis(250),
            max_rate_limit_attempts: 8,
            overload_base_delay: Duration::from_secs(2),
            max_overload_attempts: 5,
            max_parse_attempts: 4,
            attempt_timeout: Some(Duration::from_secs(120)),
        }
    }
}

/// One (provider, model) pair eligible for attempts.
struct Candidate {
    adapter: Arc<dyn ProviderAdapter>,
    model: String,
    /// Position in the implicit default list, when this walk is one.
    default_index: Option<usize>,
}

pub(crate) struct FallbackController<'a> {
    registry: &'a ProviderRegistry,
    policy: &'a RetryPolicy,
    cursor: &'a AtomicUsize,
}

impl<'a> FallbackController<'a> {
    pub fn new(
        registry: &'a ProviderRegistry,
        policy: &'a RetryPolicy,
        cursor: &'a AtomicUsize,
    ) -> Self {
        Self {
            registry,
            policy,
            cursor,
        }
    }

    /// The `/` separator wins over every other hint; after that the explicit
    /// selector; after that a prefix inference between the families.
    fn resolve_adapter(
        &self,
        model: &str,
        selector: &ProviderSelector,
    ) -> Arc<dyn ProviderAdapter> {
        if model.contains('/') {
            return self.registry.get(ProviderId::OpenRouter);
        }
        match selector {
            ProviderSelector::Custom(a) => a.clone(),
            ProviderSelector::Explicit(p) => self.registry.get(*p),
            ProviderSelector::Default => {
                if model.starts_with("gemini") {
                    self.registry.get(ProviderId::Gemini)
                } else {
                    self.registry.get(ProviderId::OpenAi)
                }
            }
        }
    }

    /// Derive the queue. Returns (queue, pinned, uses_cursor): `pinned` means
    /// rate limits retry in place instead of advancing, `uses_cursor` means
    /// this is the implicit default list and consults the process-wide cursor.
    fn build_queue(&self, spec: &RequestSpec) -> (Vec<Candidate>, bool, bool) {
        if spec.local_only {
            let adapter = self.registry.get(ProviderId::Ollama);
            let model = adapter.default_model().to_string();
            return (
                vec![Candidate {
                    adapter,
                    model,
                    default_index: None,
                }],
                true,
                false,
            );
        }

        match &spec.model {
            ModelChoice::Ordered(ids) => {
                let queue = ids
                    .iter()
                    .map(|id| Candidate {
                        adapter: self.resolve_adapter(id, &spec.provider),
                        model: id.clone(),
                        default_index: None,
                    })
                    .collect();
                (queue, false, false)
            }
            ModelChoice::Single(id) => {
                let queue = vec![Candidate {
                    adapter: self.resolve_adapter(id, &spec.provider),
                    model: id.clone(),
                    default_index: None,
                }];
                (queue, true, false)
            }
            ModelChoice::Unspecified => match &spec.provider {
                ProviderSelector::Custom(a) => {
                    let model = a.default_model().to_string();
                    (
                        vec![Candidate {
                            adapter: a.clone(),
                            model,
                            default_index: None,
                        }],
                        true,
                        false,
                    )
                }
                ProviderSelector::Explicit(p) => {
                    let adapter = self.registry.get(*p);
                    let model = adapter.default_model().to_string();
                    (
                        vec![Candidate {
                            adapter,
                            model,
                            default_index: None,
                        }],
                        true,
                        false,
                    )
                }
                ProviderSelector::Default => {
                    let queue = DEFAULT_PRIORITY
                        .iter()
                        .enumerate()
                        .map(|(i, (p, m))| Candidate {
                            adapter: self.registry.get(*p),
                            model: (*m).to_string(),
                            default_index: Some(i),
                        })
                        .collect();
                    (queue, false, true)
                }
            },
        }
    }

    pub async fn run(
        &self,
        spec: &RequestSpec,
        prompt: &BuiltPrompt,
    ) -> Result<ResponsePayload> {
        let (queue, pinned, uses_cursor) = self.build_queue(spec);

        let mut idx = if uses_cursor {
            let persisted = self.cursor.load(Ordering::Relaxed).min(queue.len() - 1);
            if spec.best_model {
                persisted.max(PREMIUM_TIER_START.min(queue.len() - 1))
            } else {
                persisted
            }
        } else {
            0
        };

        let mut tried = 0usize;
        while idx < queue.len() {
            let candidate = &queue[idx];
            tried += 1;

            let call = ProviderCall {
                model: &candidate.model,
                prompt,
                output: &spec.outputs,
                output_format: spec.output_format,
                temperature: spec.temperature,
                include_metadata: spec.include_metadata,
            };

            let mut rate_limit_attempts = 0u32;
            let mut overload_attempts = 0u32;
            let mut parse_attempts = 0u32;

            loop {
                match self.attempt(&candidate.adapter, &call).await {
                    Ok(payload) => {
                        info!(
                            provider = candidate.adapter.id(),
                            model = candidate.model.as_str(),
                            "candidate succeeded"
                        );
                        return Ok(payload);
                    }
                    Err(failure) => {
                        warn!(
                            provider = candidate.adapter.id(),
                            model = candidate.model.as_str(),
                            error = %failure,
                            "attempt failed"
                        );
                        match failure.kind {
                            FailureKind::RateLimited { retry_after } => {
                                if pinned {
                                    rate_limit_attempts += 1;
                                    if rate_limit_attempts >= self.policy.max_rate_limit_attempts {
                                        return Err(Error::RateLimitExhausted {
                                            provider: candidate.adapter.id().to_string(),
                                            model: candidate.model.clone(),
                                            attempts: rate_limit_attempts,
                                        });
                                    }
                                    let floor = self.policy.rate_limit_floor.as_secs();
                                    let wait =
                                        Duration::from_secs(retry_after.unwrap_or(0).max(floor))
                                            + self.policy.rate_limit_jitter;
                                    tokio::time::sleep(wait).await;
                                    continue;
                                }
                                if candidate.default_index.is_some() {
                                    self.cursor.fetch_max(idx + 1, Ordering::Relaxed);
                                }
                                break;
                            }
                            FailureKind::Overloaded => {
                                overload_attempts += 1;
                                if overload_attempts >= self.policy.max_overload_attempts {
                                    if pinned {
                                        return Err(Error::OverloadExhausted {
                                            provider: candidate.adapter.id().to_string(),
                                            model: candidate.model.clone(),
                                            attempts: overload_attempts,
                                        });
                                    }
                                    break;
                                }
                                tokio::time::sleep(
                                    self.policy.overload_base_delay * overload_attempts,
                                )
                                .await;
                                continue;
                            }
                            FailureKind::Malformed => {
                                parse_attempts += 1;
                                if parse_attempts >= self.policy.max_parse_attempts {
                                    return Err(Error::MalformedOutput {
                                        provider: candidate.adapter.id().to_string(),
                                        model: candidate.model.clone(),
                                        attempts: parse_attempts,
                                        detail: failure.detail,
                                    });
                                }
                                continue;
                            }
                            FailureKind::Fatal => {
                                return Err(Error::Provider {
                                    provider: candidate.adapter.id().to_string(),
                                    detail: failure.detail,
                                });
                            }
                        }
                    }
                }
            }

            idx += 1;
        }

        Err(Error::ExhaustedCandidates { tried })
    }

    async fn attempt(
        &self,
        adapter: &Arc<dyn ProviderAdapter>,
        call: &ProviderCall<'_>,
    ) -> crate::providers::AttemptResult {
        match self.policy.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, adapter.invoke(call)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(crate::providers::AttemptFailure::overloaded(format!(
                    "attempt exceeded {:?} deadline",
                    limit
                ))),
            },
            None => adapter.invoke(call).await,
        }
    }
}
