//! Capabilities the tool-calling agent can invoke.
//!
//! Tools receive the raw JSON arguments string the model produced and return
//! plain text for the transcript. Anything a tool must know about the caller
//! (the patient in scope, for instance) is bound at construction, never read
//! from model-controlled arguments.

pub mod patient_records;
pub mod semantic_search;

pub use patient_records::PatientRecordsTool;
pub use semantic_search::SemanticSearchTool;

use async_trait::async_trait;

use crate::llm::provider::ToolSpec;
use crate::types::AppResult;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the arguments object.
    fn parameters(&self) -> serde_json::Value;

    async fn call(&self, arguments: &str) -> AppResult<String>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}
