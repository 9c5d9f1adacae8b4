// OpenAI chat completions adapter, including function-calling support.
// API reference: https://platform.openai.com/docs/api-reference/chat

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::provider::{ChatMessage, ChatModel, ChatOutcome, ToolInvocation, ToolSpec};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiChat {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionSpec<'a>,
}

#[derive(Serialize)]
struct WireFunctionSpec<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

impl OpenAiChat {
    pub fn new(api_key: &str, model: &str, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
            base_url: OPENAI_API_BASE.to_string(),
        }
    }

    /// Point the adapter at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn to_wire(messages: &[ChatMessage]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| match m {
                ChatMessage::System(text) => WireMessage {
                    role: "system",
                    content: Some(text.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                ChatMessage::User(text) => WireMessage {
                    role: "user",
                    content: Some(text.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                ChatMessage::Assistant(text) => WireMessage {
                    role: "assistant",
                    content: Some(text.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                ChatMessage::AssistantToolCalls(calls) => WireMessage {
                    role: "assistant",
                    content: None,
                    tool_calls: Some(
                        calls
                            .iter()
                            .map(|c| WireToolCall {
                                id: c.id.clone(),
                                kind: "function".to_string(),
                                function: WireFunctionCall {
                                    name: c.name.clone(),
                                    arguments: c.arguments.clone(),
                                },
                            })
                            .collect(),
                    ),
                    tool_call_id: None,
                },
                ChatMessage::ToolResult { call_id, content } => WireMessage {
                    role: "tool",
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: Some(call_id.clone()),
                },
            })
            .collect()
    }

    async fn request(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
    ) -> AppResult<WireResponseMessage> {
        let body = WireRequest {
            model: &self.model,
            messages: Self::to_wire(messages),
            temperature: self.temperature,
            tools: tools.map(|specs| {
                specs
                    .iter()
                    .map(|t| WireTool {
                        kind: "function",
                        function: WireFunctionSpec {
                            name: &t.name,
                            description: &t.description,
                            parameters: &t.parameters,
                        },
                    })
                    .collect()
            }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LlmApi(format!("openai request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LlmApi(format!("openai returned {status}: {text}")));
        }

        let mut parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| AppError::LlmApi(format!("openai response decode failed: {e}")))?;
        if parsed.choices.is_empty() {
            return Err(AppError::LlmApi("openai returned no choices".to_string()));
        }
        Ok(parsed.choices.remove(0).message)
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> AppResult<String> {
        let message = self.request(messages, None).await?;
        Ok(message.content.unwrap_or_default())
    }

    async fn complete_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> AppResult<ChatOutcome> {
        let message = self.request(messages, Some(tools)).await?;
        if let Some(calls) = message.tool_calls.filter(|c| !c.is_empty()) {
            let invocations = calls
                .into_iter()
                .map(|c| ToolInvocation {
                    id: c.id,
                    name: c.function.name,
                    arguments: c.function.arguments,
                })
                .collect();
            return Ok(ChatOutcome::ToolCalls(invocations));
        }
        Ok(ChatOutcome::Final(message.content.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(server: &mockito::ServerGuard) -> OpenAiChat {
        OpenAiChat::new("test-key", "gpt-4o-mini", 0.3).with_base_url(&server.url())
    }

    #[tokio::test]
    async fn plain_completion_returns_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"hello there"}}]}"#)
            .create_async()
            .await;

        let result = chat(&server)
            .complete(&[ChatMessage::User("hi".into())])
            .await
            .unwrap();
        assert_eq!(result, "hello there");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn tool_calls_are_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"content":null,"tool_calls":[
                    {"id":"call_1","type":"function",
                     "function":{"name":"semantic_search","arguments":"{\"term\":\"x\"}"}}
                ]}}]}"#,
            )
            .create_async()
            .await;

        let spec = ToolSpec {
            name: "semantic_search".into(),
            description: "search".into(),
            parameters: serde_json::json!({"type": "object"}),
        };
        let outcome = chat(&server)
            .complete_with_tools(&[ChatMessage::User("hi".into())], &[spec])
            .await
            .unwrap();
        match outcome {
            ChatOutcome::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "semantic_search");
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn api_errors_become_llm_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let err = chat(&server)
            .complete(&[ChatMessage::User("hi".into())])
            .await
            .unwrap_err();
        assert!(matches!(err, crate::types::AppError::LlmApi(_)));
    }
}
