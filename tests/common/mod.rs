//! Scripted stub adapter shared by the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use llm_relay::{
    AttemptFailure, AttemptResult, ProviderAdapter, ProviderCall, ResponsePayload, UsageInfo,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Route test logs through the harness capture. Safe to call repeatedly.
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One scripted attempt outcome.
#[derive(Debug, Clone)]
pub enum StubOutcome {
    Ok(Value),
    RateLimited(Option<u64>),
    Overloaded,
    Malformed,
    Fatal,
}

/// What the stub observed about one invocation.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub model: String,
    pub had_schema: bool,
    pub wants_raw: bool,
}

/// Adapter whose behavior is scripted per model id. When a model's script
/// has more than one entry, entries are consumed in order; the last entry
/// repeats forever.
pub struct StubAdapter {
    id: String,
    scripts: Mutex<HashMap<String, VecDeque<StubOutcome>>>,
    calls: Mutex<Vec<CallRecord>>,
}

impl StubAdapter {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script(self, model: impl Into<String>, outcomes: Vec<StubOutcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(model.into(), outcomes.into());
        self
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }

    pub fn models_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model).collect()
    }

    fn next_outcome(&self, model: &str) -> StubOutcome {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts
            .entry(model.to_string())
            .or_insert_with(|| vec![StubOutcome::Fatal].into());
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap_or(StubOutcome::Fatal)
        }
    }
}

#[async_trait]
impl ProviderAdapter for StubAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn default_model(&self) -> &str {
        "stub-default"
    }

    async fn invoke(&self, call: &ProviderCall<'_>) -> AttemptResult {
        self.calls.lock().unwrap().push(CallRecord {
            model: call.model.to_string(),
            had_schema: call.output.schema().is_some(),
            wants_raw: call.prompt.wants_raw,
        });

        match self.next_outcome(call.model) {
            StubOutcome::Ok(value) => {
                let mut payload = ResponsePayload::json(value).with_model(call.model);
                if call.include_metadata {
                    payload = payload.with_usage(UsageInfo {
                        prompt_tokens: 10,
                        completion_tokens: 5,
                        total_tokens: 15,
                    });
                }
                if call.prompt.wants_raw {
                    payload = payload
                        .with_raw_message(json!({"role": "assistant", "content": "native"}));
                }
                Ok(payload)
            }
            StubOutcome::RateLimited(retry_after) => {
                Err(AttemptFailure::rate_limited(retry_after, "scripted throttle"))
            }
            StubOutcome::Overloaded => Err(AttemptFailure::overloaded("scripted overload")),
            StubOutcome::Malformed => Err(AttemptFailure::malformed("scripted parse failure")),
            StubOutcome::Fatal => Err(AttemptFailure::fatal("scripted fatal")),
        }
    }
}
