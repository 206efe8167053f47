//! LLM-backed order extraction: a chat-model client seam (`llm`) and the
//! defensive message-to-items extractor built on top of it (`extractor`).

pub mod extractor;
pub mod llm;

pub use extractor::LlmOrderExtractor;
pub use llm::{ChatModel, LlmError, OpenAiChatModel};
