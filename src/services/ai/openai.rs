use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{LlmProvider, ModelReply, ToolSchema};
use crate::models::{Role, ToolCall, Turn};

pub struct OpenAiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        tools: &[ToolSchema],
    ) -> anyhow::Result<ModelReply> {
        let mut body = json!({
            "model": self.model,
            "messages": build_messages(system_prompt, turns),
            "temperature": 0.7,
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
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call OpenAI API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse OpenAI response")?;

        if !status.is_success() {
            anyhow::bail!("OpenAI API error ({}): {}", status, data);
        }

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
                            "id": c.id,
                            "type": "function",
                            "function": {
                                "name": c.name,
                                // the wire carries arguments as an encoded string
                                "arguments": c.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
                messages.push(json!({
                    "role": "assistant",
                    "content": serde_json::Value::Null,
                    "tool_calls": calls,
                }));
            }
            Role::Tool => {
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": turn.tool_call_id,
                    "content": turn.content,
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
    let message = &data["choices"][0]["message"];

    if let Some(raw_calls) = message["tool_calls"].as_array().filter(|c| !c.is_empty()) {
        let mut calls = Vec::with_capacity(raw_calls.len());
        for (index, raw) in raw_calls.iter().enumerate() {
            let name = raw["function"]["name"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("tool call without a function name"))?
                .to_string();
            let id = raw["id"]
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("call-{index}"));
            // malformed argument JSON is kept verbatim so schema validation
            // can reject it and the model can retry
            let arguments = match raw["function"]["arguments"].as_str() {
                Some(s) => serde_json::from_str(s)
                    .unwrap_or_else(|_| serde_json::Value::String(s.to_string())),
                None => raw["function"]["arguments"].clone(),
            };
            calls.push(ToolCall { id, name, arguments });
        }
        return Ok(ModelReply::ToolCalls(calls));
    }

    message["content"]
        .as_str()
        .map(|s| ModelReply::Text(s.to_string()))
        .ok_or_else(|| anyhow::anyhow!("missing content in OpenAI response"))
}
