use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{LlmProvider, ModelReply, ToolSchema};
use crate::models::{Role, ToolCall, Turn};

pub struct OllamaProvider {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(url: String, model: String) -> Self {
        Self {
            url,
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        tools: &[ToolSchema],
    ) -> anyhow::Result<ModelReply> {
        let mut body = json!({
            "model": self.model,
            "messages": build_messages(system_prompt, turns),
            "stream": false,
        });

        if !tools.is_empty() {
            body["tools"] = serde_json::Value::Array(
                tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect(),
            );
        }

        let resp = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&body)
            .send()
            .await
            .context("failed to call Ollama API")?;

        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Ollama response")?;

        parse_response(&data)
    }
}

fn build_messages(system_prompt: &str, turns: &[Turn]) -> Vec<serde_json::Value> {
    let mut messages = vec![json!({
        "role": "system",
        "content": system_prompt,
    })];

    for turn in turns {
        match turn.role {
            Role::Assistant if !turn.tool_calls.is_empty() => {
                let calls: Vec<serde_json::Value> = turn
                    .tool_calls
                    .iter()
                    .map(|c| {
                        json!({
                            "function": {
                                "name": c.name,
                                "arguments": c.arguments,
                            }
                        })
                    })
                    .collect();
                messages.push(json!({
                    "role": "assistant",
                    "content": "",
                    "tool_calls": calls,
                }));
            }
            _ => {
                messages.push(json!({
                    "role": turn.role.as_str(),
                    "content": turn.content,
                }));
            }
        }
    }

    messages
}

fn parse_response(data: &serde_json::Value) -> anyhow::Result<ModelReply> {
    let message = &data["message"];

    if let Some(raw_calls) = message["tool_calls"].as_array().filter(|c| !c.is_empty()) {
        let mut calls = Vec::with_capacity(raw_calls.len());
        for raw in raw_calls {
            let name = raw["function"]["name"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("tool call without a function name"))?
                .to_string();
            // Ollama does not assign call ids; mint one so results can be
            // matched back to their originating call
            let id = format!("call-{}", uuid::Uuid::new_v4());
            calls.push(ToolCall {
                id,
                name,
                arguments: raw["function"]["arguments"].clone(),
            });
        }
        return Ok(ModelReply::ToolCalls(calls));
    }

    message["content"]
        .as_str()
        .map(|s| ModelReply::Text(s.to_string()))
        .ok_or_else(|| anyhow::anyhow!("missing content in Ollama response"))
}
