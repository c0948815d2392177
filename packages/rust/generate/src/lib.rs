//! Prompt construction and answer generation components.

mod client;
mod generator;
mod prompt;

pub use client::{ApiChatModel, ChatModel};
pub use generator::Generator;
pub use prompt::{DEFAULT_TEMPLATE, PromptBuilder};
