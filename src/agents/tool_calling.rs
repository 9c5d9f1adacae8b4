//! Tool-calling agent.
//!
//! The model decides when to call tools; the loop executes them, feeds the
//! results back, and stops at the first final answer. Rounds are bounded so
//! a model stuck requesting tools can never spin forever.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::agents::{Agent, FALLBACK_ANSWER};
use crate::llm::provider::{ChatMessage, ChatModel, ChatOutcome};
use crate::tools::Tool;
use crate::types::ChatTurn;

pub struct ToolCallingAgent {
    model: Arc<dyn ChatModel>,
    tools: Vec<Arc<dyn Tool>>,
    system_prompt: String,
    max_rounds: u32,
}

impl ToolCallingAgent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: Vec<Arc<dyn Tool>>,
        system_prompt: String,
        max_rounds: u32,
    ) -> Self {
        Self { model, tools, system_prompt, max_rounds }
    }

    fn tool_by_name(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }
}

#[async_trait]
impl Agent for ToolCallingAgent {
    async fn answer(&self, query: &str, history: &[ChatTurn]) -> (String, String) {
        let specs: Vec<_> = self.tools.iter().map(|t| t.spec()).collect();

        let mut transcript = Vec::with_capacity(history.len() + 2);
        transcript.push(ChatMessage::System(self.system_prompt.clone()));
        transcript.extend(history.iter().map(ChatMessage::from));
        transcript.push(ChatMessage::User(query.to_string()));

        // Tool outputs, in invocation order; joined into the context trace.
        let mut trace: Vec<String> = Vec::new();

        for round in 0..self.max_rounds {
            let outcome = match self.model.complete_with_tools(&transcript, &specs).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, round, "completion failed");
                    return (FALLBACK_ANSWER.to_string(), trace.join(";"));
                }
            };

            match outcome {
                ChatOutcome::Final(text) => {
                    info!(round, tool_calls = trace.len(), "agent finished");
                    return (text, trace.join(";"));
                }
                ChatOutcome::ToolCalls(invocations) => {
                    transcript.push(ChatMessage::AssistantToolCalls(invocations.clone()));
                    for invocation in invocations {
                        let output = match self.tool_by_name(&invocation.name) {
                            Some(tool) => match tool.call(&invocation.arguments).await {
                                Ok(output) => output,
                                Err(e) => {
                                    warn!(tool = %invocation.name, error = %e, "tool failed");
                                    format!("The {} tool failed: {e}", invocation.name)
                                }
                            },
                            None => {
                                warn!(tool = %invocation.name, "model requested unknown tool");
                                format!("There is no tool named {}", invocation.name)
                            }
                        };
                        trace.push(output.clone());
                        transcript.push(ChatMessage::ToolResult {
                            call_id: invocation.id,
                            content: output,
                        });
                    }
                }
            }
        }

        warn!(max_rounds = self.max_rounds, "agent exceeded its round budget");
        (FALLBACK_ANSWER.to_string(), trace.join(";"))
    }
}
