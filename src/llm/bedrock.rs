// Amazon Bedrock Converse adapter (bearer-token API keys).
// API reference: https://docs.aws.amazon.com/bedrock/latest/APIReference/API_runtime_Converse.html
//
// Converse requires strictly alternating user/assistant messages; the
// transcript is folded accordingly and system entries are lifted into the
// dedicated `system` field.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::provider::{ChatMessage, ChatModel};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;

pub struct BedrockChat {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
}

#[derive(Serialize)]
struct ConverseRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<TextBlock>,
    messages: Vec<ConverseMessage>,
    #[serde(rename = "inferenceConfig")]
    inference_config: InferenceConfig,
}

#[derive(Serialize)]
struct InferenceConfig {
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct TextBlock {
    text: String,
}

#[derive(Serialize, Deserialize)]
struct ConverseMessage {
    role: String,
    content: Vec<TextBlock>,
}

#[derive(Deserialize)]
struct ConverseResponse {
    output: ConverseOutput,
}

#[derive(Deserialize)]
struct ConverseOutput {
    message: ConverseMessage,
}

impl BedrockChat {
    pub fn new(api_key: &str, region: &str, model: &str, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
            base_url: format!("https://bedrock-runtime.{region}.amazonaws.com"),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn fold_transcript(messages: &[ChatMessage]) -> (Vec<TextBlock>, Vec<ConverseMessage>) {
        let mut system = Vec::new();
        let mut folded: Vec<ConverseMessage> = Vec::new();
        for message in messages {
            let (role, text) = match message {
                ChatMessage::System(text) => {
                    system.push(TextBlock { text: text.clone() });
                    continue;
                }
                ChatMessage::User(text) => ("user", text.clone()),
                ChatMessage::Assistant(text) => ("assistant", text.clone()),
                // This backend never binds tools.
                ChatMessage::AssistantToolCalls(_) => continue,
                ChatMessage::ToolResult { content, .. } => ("user", content.clone()),
            };
            match folded.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push(TextBlock { text });
                }
                _ => folded.push(ConverseMessage {
                    role: role.to_string(),
                    content: vec![TextBlock { text }],
                }),
            }
        }
        // Converse rejects transcripts that open with an assistant turn.
        if folded.first().map(|m| m.role == "assistant").unwrap_or(false) {
            folded.insert(
                0,
                ConverseMessage {
                    role: "user".to_string(),
                    content: vec![TextBlock { text: "(conversation resumes)".to_string() }],
                },
            );
        }
        (system, folded)
    }
}

#[async_trait]
impl ChatModel for BedrockChat {
    async fn complete(&self, messages: &[ChatMessage]) -> AppResult<String> {
        let (system, folded) = Self::fold_transcript(messages);
        let body = ConverseRequest {
            system,
            messages: folded,
            inference_config: InferenceConfig { temperature: self.temperature },
        };

        let response = self
            .client
            .post(format!("{}/model/{}/converse", self.base_url, self.model))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LlmApi(format!("bedrock request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LlmApi(format!("bedrock returned {status}: {text}")));
        }

        let parsed: ConverseResponse = response
            .json()
            .await
            .map_err(|e| AppError::LlmApi(format!("bedrock response decode failed: {e}")))?;
        Ok(parsed
            .output
            .message
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_folding_merges_adjacent_roles() {
        let messages = vec![
            ChatMessage::System("be brief".into()),
            ChatMessage::User("a".into()),
            ChatMessage::User("b".into()),
            ChatMessage::Assistant("c".into()),
        ];
        let (system, folded) = BedrockChat::fold_transcript(&messages);
        assert_eq!(system.len(), 1);
        assert_eq!(folded.len(), 2);
        assert_eq!(folded[0].role, "user");
        assert_eq!(folded[0].content.len(), 2);
    }

    #[tokio::test]
    async fn converse_round_trip() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock(
                "POST",
                "/model/meta.llama3-1-70b-instruct-v1:0/converse",
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"output":{"message":{"role":"assistant","content":[{"text":"answer"}]}}}"#,
            )
            .create_async()
            .await;

        let chat = BedrockChat::new(
            "key",
            "us-west-2",
            "meta.llama3-1-70b-instruct-v1:0",
            0.0,
        )
        .with_base_url(&server.url());
        let result = chat.complete(&[ChatMessage::User("q".into())]).await.unwrap();
        assert_eq!(result, "answer");
    }
}
