pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::{ToolCall, Turn};

/// Tool declaration sent to the model: name, description, and a JSON-schema
/// object describing the arguments.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// What the model produced for one generation round: either a final
/// natural-language reply or a batch of tool invocations to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        tools: &[ToolSchema],
    ) -> anyhow::Result<ModelReply>;
}
