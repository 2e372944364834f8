//! Shared response-content parsing for adapters.

use super::AttemptFailure;
use crate::types::{OutputFormat, PayloadContent};

/// Parse backend content text according to the requested output format.
///
/// For JSON output, a failed parse gets one second chance: if the text is
/// JSON wrapped in a fenced code block, the wrapper is stripped and the parse
/// retried before the attempt is declared malformed.
pub(crate) fn parse_content(
    text: &str,
    format: OutputFormat,
) -> Result<PayloadContent, AttemptFailure> {
    match format {
        OutputFormat::Text => Ok(PayloadContent::Text(text.to_string())),
        OutputFormat::JsonObject => match serde_json::from_str(text) {
            Ok(value) => Ok(PayloadContent::Json(value)),
            Err(first_err) => {
                if let Some(inner) = strip_code_fence(text) {
                    if let Ok(value) = serde_json::from_str(&inner) {
                        return Ok(PayloadContent::Json(value));
                    }
                }
                Err(AttemptFailure::malformed(format!(
                    "not valid JSON: {}",
                    first_err
                )))
            }
        },
    }
}

/// Strip a known markdown fence wrapper (```json ... ``` or ``` ... ```).
fn strip_code_fence(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix("```")?;
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let inner = rest.strip_suffix("```")?;
    Some(inner.trim().to_string())
}

/// Instruction appended by adapters whose backend cannot enforce a schema
/// natively. The schema itself already travels in the prompt's
/// expected_output block.
pub(crate) const JSON_GUIDANCE: &str = "Respond with a single JSON value that matches the \
expected_output contract exactly. Output raw JSON only, with no prose and no markdown fences.";

/// True when a compiled schema's root is a container type, i.e. eligible for
/// backend-native enforcement.
pub(crate) fn schema_root_is_container(schema: &serde_json::Value) -> bool {
    match schema.get("type") {
        Some(serde_json::Value::String(t)) => t == "object" || t == "array",
        Some(serde_json::Value::Array(ts)) => ts
            .iter()
            .any(|t| t.as_str() == Some("object") || t.as_str() == Some("array")),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::FailureKind;
    use serde_json::json;

    #[test]
    fn plain_json_parses() {
        let content = parse_content(r#"{"result": 3}"#, OutputFormat::JsonObject).unwrap();
        assert_eq!(content, PayloadContent::Json(json!({"result": 3})));
    }

    #[test]
    fn fenced_json_parses_on_retry() {
        let fenced = "```json\n{\"result\": 3}\n```";
        let content = parse_content(fenced, OutputFormat::JsonObject).unwrap();
        assert_eq!(content, PayloadContent::Json(json!({"result": 3})));

        let bare_fence = "```\n[1, 2]\n```";
        let content = parse_content(bare_fence, OutputFormat::JsonObject).unwrap();
        assert_eq!(content, PayloadContent::Json(json!([1, 2])));
    }

    #[test]
    fn unparsable_text_is_malformed() {
        let err = parse_content("certainly! here you go", OutputFormat::JsonObject).unwrap_err();
        assert!(matches!(err.kind, FailureKind::Malformed));
    }

    #[test]
    fn text_format_never_parses() {
        let content = parse_content("anything at all", OutputFormat::Text).unwrap();
        assert_eq!(content, PayloadContent::Text("anything at all".into()));
    }

    #[test]
    fn container_root_detection() {
        assert!(schema_root_is_container(&json!({"type": "object"})));
        assert!(schema_root_is_container(&json!({"type": "array"})));
        assert!(schema_root_is_container(&json!({"type": ["object", "null"]})));
        assert!(!schema_root_is_container(&json!({"type": "string"})));
        assert!(!schema_root_is_container(&json!({"enum": [1, 2]})));
    }
}
