//! Core type definitions: request specs, conversation messages, response payloads.

pub mod message;
pub mod request;
pub mod response;

pub use message::{ContentBlock, ImageSource, Message, MessageContent, MessageRole, PromptTurn};
pub use request::{
    ModelChoice, OutputFormat, OutputSpec, ProviderSelector, RequestSpec, RequestSpecBuilder,
    IMAGES_KEY, MESSAGES_KEY,
};
pub use response::{PayloadContent, ResponsePayload, UsageInfo};
