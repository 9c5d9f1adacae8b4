//! The seam between agents and hosted LLM APIs.

use async_trait::async_trait;

use crate::types::{AppResult, ChatTurn, TurnRole};

/// Backend-neutral chat transcript entry.
#[derive(Debug, Clone)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant(String),
    /// The model asked for tools; kept in the transcript so the next round
    /// can see its own request.
    AssistantToolCalls(Vec<ToolInvocation>),
    ToolResult { call_id: String, content: String },
}

impl From<&ChatTurn> for ChatMessage {
    fn from(turn: &ChatTurn) -> Self {
        match turn.role {
            TurnRole::Human => ChatMessage::User(turn.content.clone()),
            TurnRole::Assistant => ChatMessage::Assistant(turn.content.clone()),
        }
    }
}

/// A callable capability advertised to the model.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// One tool call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments string as emitted by the model.
    pub arguments: String,
}

#[derive(Debug, Clone)]
pub enum ChatOutcome {
    Final(String),
    ToolCalls(Vec<ToolInvocation>),
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Plain completion over the transcript.
    async fn complete(&self, messages: &[ChatMessage]) -> AppResult<String>;

    /// Completion with tools bound. Backends without native tool support
    /// answer directly.
    async fn complete_with_tools(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSpec],
    ) -> AppResult<ChatOutcome> {
        Ok(ChatOutcome::Final(self.complete(messages).await?))
    }
}
