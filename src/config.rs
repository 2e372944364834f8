//! Process configuration: credential resolution and backend endpoints.
//!
//! API keys resolve keyring-first (service `llm-relay`, account = provider
//! id), then from `{PROVIDER}_API_KEY` in the environment. Base URLs have
//! built-in defaults overridable via `{PROVIDER}_BASE_URL`.

use std::env;

pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENROUTER_DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OLLAMA_DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Resolve the API key for a provider id.
pub fn resolve_api_key(provider_id: &str) -> Option<String> {
    // 1. Keyring
    if let Ok(entry) = keyring::Entry::new("llm-relay", provider_id) {
        if let Ok(key) = entry.get_password() {
            return Some(key);
        }
    }

    // 2. Environment variable ({PROVIDER}_API_KEY)
    let env_var = format!("{}_API_KEY", provider_id.to_uppercase().replace('-', "_"));
    env::var(env_var).ok()
}

/// Resolve the base URL for a provider id, env override first.
pub fn resolve_base_url(provider_id: &str, default: &str) -> String {
    let env_var = format!("{}_BASE_URL", provider_id.to_uppercase().replace('-', "_"));
    env::var(env_var).unwrap_or_else(|_| default.to_string())
}

/// HTTP client timeout, env-overridable.
pub fn http_timeout_secs() -> u64 {
    env::var("LLM_RELAY_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(60)
}
