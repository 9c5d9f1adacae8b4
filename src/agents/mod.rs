//! Agent selection and construction.
//!
//! The active model identifier decides which agent answers a question:
//! identifiers on the tool-calling allow-list get the tool loop, identifiers
//! on the pipeline allow-list get the fixed retrieval pipeline. Anything
//! else is a configuration error surfaced to the caller, not a silent
//! fallback.

pub mod fixed_pipeline;
pub mod prompt;
pub mod tool_calling;

pub use fixed_pipeline::FixedPipelineAgent;
pub use tool_calling::ToolCallingAgent;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AgentConfig;
use crate::llm::{BedrockChat, OpenAiChat};
use crate::models::AppState;
use crate::tools::{SemanticSearchTool, Tool};
use crate::types::{AppError, AppResult, ChatTurn};

/// Answer of last resort when the model cannot or will not answer.
pub const FALLBACK_ANSWER: &str = "Sorry. I don't know.";

/// A question-answering strategy over one conversation turn.
///
/// `answer` is infallible: transient model failures degrade to the fallback
/// answer so one bad upstream call never turns into a 500 for the user. The
/// second element is the context trace that gets persisted with the query.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn answer(&self, query: &str, history: &[ChatTurn]) -> (String, String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    ToolCalling,
    FixedPipeline,
}

/// Map a model identifier onto an agent kind via the configured allow-lists.
pub fn select_kind(model_id: &str, config: &AgentConfig) -> AppResult<AgentKind> {
    if config.tool_models.iter().any(|m| m == model_id) {
        Ok(AgentKind::ToolCalling)
    } else if config.pipeline_models.iter().any(|m| m == model_id) {
        Ok(AgentKind::FixedPipeline)
    } else {
        Err(AppError::Config(format!(
            "model {model_id} is not on any allow-list"
        )))
    }
}

/// Build the agent for the current deployment configuration.
///
/// The stored prompt configuration wins over the environment for the model
/// choice, matching how operators switch models at runtime. `extra_tools`
/// lets callers bind request-scoped tools alongside knowledge-base search.
pub async fn build_agent(
    state: &AppState,
    extra_tools: Vec<Arc<dyn Tool>>,
) -> AppResult<Box<dyn Agent>> {
    let prompt_config = state.store.latest_prompt().await?;
    let model_id = prompt_config
        .as_ref()
        .and_then(|p| p.llm_model.clone())
        .filter(|m| !m.is_empty())
        .or_else(|| state.config.llm.model.clone())
        .ok_or_else(|| AppError::Config("no language model configured".to_string()))?;

    let kind = select_kind(&model_id, &state.config.agent)?;
    let llm = &state.config.llm;
    let collection = &state.config.vectorstore.collection;

    match kind {
        AgentKind::ToolCalling => {
            let model = Arc::new(OpenAiChat::new(
                &llm.openai_api_key,
                &model_id,
                llm.temperature,
            ));
            let mut tools: Vec<Arc<dyn Tool>> = vec![Arc::new(SemanticSearchTool::new(
                state.store.clone(),
                state.vectors.clone(),
                collection,
            ))];
            tools.extend(extra_tools);
            Ok(Box::new(ToolCallingAgent::new(
                model,
                tools,
                prompt::system_prompt(prompt_config.as_ref()),
                state.config.agent.max_tool_rounds,
            )))
        }
        AgentKind::FixedPipeline => {
            let model = Arc::new(BedrockChat::new(
                &llm.bedrock_api_key,
                &llm.bedrock_region,
                &model_id,
                llm.temperature,
            ));
            Ok(Box::new(FixedPipelineAgent::new(
                model,
                state.vectors.clone(),
                collection,
                prompt::system_prompt(prompt_config.as_ref()),
                prompt::reformulation_prompt(prompt_config.as_ref()),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AgentConfig {
        AgentConfig {
            tool_models: vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()],
            pipeline_models: vec!["meta.llama3-1-70b-instruct-v1:0".to_string()],
            max_tool_rounds: 10,
            request_timeout_secs: 60,
        }
    }

    #[test]
    fn allow_lists_route_to_the_right_agent_kind() {
        assert_eq!(select_kind("gpt-4o", &config()).unwrap(), AgentKind::ToolCalling);
        assert_eq!(
            select_kind("meta.llama3-1-70b-instruct-v1:0", &config()).unwrap(),
            AgentKind::FixedPipeline
        );
    }

    #[test]
    fn unlisted_model_is_a_config_error() {
        let err = select_kind("some-other-model", &config()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
