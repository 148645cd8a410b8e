pub mod agents;
pub mod client;
pub mod error;
pub mod prompt;
pub mod retry;

pub use client::{ChatMessage, ChatRole, ContentGenerator, GenerationRequest, LlmClient, LlmEvent};
pub use error::LlmError;
