//! Message builder: pure transform from a request spec to an ordered turn list.
//!
//! Three shapes come out of here:
//! - the common case, one synthesized user turn of fenced blocks (task,
//!   expected output, input payload, in that fixed order);
//! - the raw-message passthrough, when the caller supplied a pre-built turn
//!   list under the reserved `"messages"` input;
//! - either of the above with image blocks attached to the final user turn.

use crate::error::{Error, ErrorContext};
use crate::media::{EncodedImage, ImageEncoder};
use crate::types::{
    ContentBlock, Message, MessageContent, OutputSpec, PromptTurn, RequestSpec,
};
use crate::Result;
use serde_json::Value;
use std::path::Path;

/// The built prompt plus the flags the adapter needs to interpret it.
#[derive(Debug, Clone)]
pub struct BuiltPrompt {
    pub turns: Vec<PromptTurn>,
    /// Set for the raw-message passthrough: the caller wants the adapter's
    /// backend-native message object back, not only the parsed content.
    pub wants_raw: bool,
}

/// Build the ordered turn list for a normalized request.
pub fn build_prompt(spec: &RequestSpec, encoder: &dyn ImageEncoder) -> Result<BuiltPrompt> {
    let mut turns: Vec<PromptTurn> = Vec::new();

    if let Some(role) = spec.role.as_deref() {
        if !role.trim().is_empty() {
            turns.push(PromptTurn::Message(Message::system(role)));
        }
    }

    let images = encode_images(spec, encoder)?;

    if let Some(raw) = spec.raw_messages() {
        for entry in raw {
            match entry {
                Value::String(s) => turns.push(PromptTurn::Message(Message::user(s.clone()))),
                other => turns.push(PromptTurn::Verbatim(other.clone())),
            }
        }
        if !images.is_empty() {
            turns.push(PromptTurn::Message(Message::with_content(
                crate::types::MessageRole::User,
                MessageContent::Blocks(image_blocks(images)),
            )));
        }
        return Ok(BuiltPrompt {
            turns,
            wants_raw: true,
        });
    }

    let text = synthesized_user_text(spec)?;
    let content = if images.is_empty() {
        MessageContent::Text(text)
    } else {
        let mut blocks = vec![ContentBlock::text(text)];
        blocks.extend(image_blocks(images));
        MessageContent::Blocks(blocks)
    };
    turns.push(PromptTurn::Message(Message::with_content(
        crate::types::MessageRole::User,
        content,
    )));

    Ok(BuiltPrompt {
        turns,
        wants_raw: false,
    })
}

/// Assemble the synthesized user turn: up to three fenced blocks in fixed
/// order, empty blocks omitted entirely.
fn synthesized_user_text(spec: &RequestSpec) -> Result<String> {
    let mut blocks: Vec<String> = Vec::new();

    if !spec.task.trim().is_empty() {
        blocks.push(fence("task", spec.task.trim()));
    }

    let expected = match &spec.outputs {
        OutputSpec::Schema(s) => serde_json::to_string_pretty(s)?,
        OutputSpec::Descriptor(d) => serde_json::to_string_pretty(d)?,
        OutputSpec::Text => String::new(),
    };
    if !expected.is_empty() {
        blocks.push(fence("expected_output", &expected));
    }

    let plain = spec.plain_inputs();
    if !plain.is_empty() {
        let serialized = serde_json::to_string_pretty(&Value::Object(plain))?;
        blocks.push(fence("input", &serialized));
    }

    Ok(blocks.join("\n\n"))
}

fn fence(label: &str, body: &str) -> String {
    format!("```{}\n{}\n```", label, body)
}

fn image_blocks(images: Vec<EncodedImage>) -> Vec<ContentBlock> {
    images
        .into_iter()
        .map(|img| ContentBlock::image_base64(img.data, img.media_type))
        .collect()
}

/// Resolve the reserved image list: string entries are paths handed to the
/// encoder, object entries carry pre-encoded data.
fn encode_images(spec: &RequestSpec, encoder: &dyn ImageEncoder) -> Result<Vec<EncodedImage>> {
    let Some(entries) = spec.image_inputs() else {
        return Ok(Vec::new());
    };

    let mut images = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        match entry {
            Value::String(path) => images.push(encoder.encode_path(Path::new(path))?),
            Value::Object(obj) => {
                let data = obj.get("data").and_then(|v| v.as_str()).ok_or_else(|| {
                    Error::configuration_with_context(
                        "pre-encoded image entry needs a 'data' field",
                        ErrorContext::new()
                            .with_field_path(format!("inputs.images[{}]", i))
                            .with_source("prompt_builder"),
                    )
                })?;
                images.push(EncodedImage {
                    data: data.to_string(),
                    media_type: obj
                        .get("media_type")
                        .and_then(|v| v.as_str())
                        .map(String::from),
                });
            }
            other => {
                return Err(Error::configuration_with_context(
                    "image entries must be paths or pre-encoded objects",
                    ErrorContext::new()
                        .with_field_path(format!("inputs.images[{}]", i))
                        .with_details(format!("got: {}", other))
                        .with_source("prompt_builder"),
                ))
            }
        }
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::InlineImageEncoder;
    use crate::types::{MessageRole, IMAGES_KEY, MESSAGES_KEY};
    use serde_json::json;

    fn text_of(turn: &PromptTurn) -> &str {
        match turn {
            PromptTurn::Message(Message {
                content: MessageContent::Text(s),
                ..
            }) => s,
            _ => panic!("expected a text message turn"),
        }
    }

    #[test]
    fn fenced_blocks_in_fixed_order() {
        let spec = RequestSpec::builder("sum the numbers")
            .input("a", json!(1))
            .input("b", json!(2))
            .output_schema(json!({"type": "object"}))
            .build();
        let prompt = build_prompt(&spec, &InlineImageEncoder).unwrap();

        assert_eq!(prompt.turns.len(), 1);
        let text = text_of(&prompt.turns[0]);
        let task_at = text.find("```task").unwrap();
        let expected_at = text.find("```expected_output").unwrap();
        let input_at = text.find("```input").unwrap();
        assert!(task_at < expected_at && expected_at < input_at);
        assert!(text.contains("sum the numbers"));
    }

    #[test]
    fn empty_blocks_are_omitted_not_emitted_empty() {
        let spec = RequestSpec::builder("just answer").build();
        let prompt = build_prompt(&spec, &InlineImageEncoder).unwrap();

        let text = text_of(&prompt.turns[0]);
        assert!(text.contains("```task"));
        assert!(!text.contains("```expected_output"));
        assert!(!text.contains("```input"));
    }

    #[test]
    fn role_becomes_leading_system_turn() {
        let spec = RequestSpec::builder("t").role("You are terse.").build();
        let prompt = build_prompt(&spec, &InlineImageEncoder).unwrap();

        assert_eq!(prompt.turns.len(), 2);
        match &prompt.turns[0] {
            PromptTurn::Message(m) => assert_eq!(m.role, MessageRole::System),
            _ => panic!("expected system turn"),
        }
    }

    #[test]
    fn raw_messages_pass_through_verbatim() {
        let spec = RequestSpec::builder("ignored")
            .input(
                MESSAGES_KEY,
                json!([
                    "plain user line",
                    {"role": "assistant", "content": "native shape", "vendor_field": 1},
                ]),
            )
            .build();
        let prompt = build_prompt(&spec, &InlineImageEncoder).unwrap();

        assert!(prompt.wants_raw);
        assert_eq!(prompt.turns.len(), 2);
        match &prompt.turns[0] {
            PromptTurn::Message(m) => assert_eq!(m.role, MessageRole::User),
            _ => panic!("string entry should become a user turn"),
        }
        match &prompt.turns[1] {
            PromptTurn::Verbatim(v) => assert_eq!(v["vendor_field"], 1),
            _ => panic!("object entry should pass through unchanged"),
        }
    }

    #[test]
    fn pre_encoded_images_attach_to_final_user_turn() {
        let spec = RequestSpec::builder("describe")
            .input(
                IMAGES_KEY,
                json!([{"data": "aGk=", "media_type": "image/png"}]),
            )
            .build();
        let prompt = build_prompt(&spec, &InlineImageEncoder).unwrap();

        assert_eq!(prompt.turns.len(), 1);
        match &prompt.turns[0] {
            PromptTurn::Message(m) => assert!(m.contains_image()),
            _ => panic!("expected message turn"),
        }
    }
}
