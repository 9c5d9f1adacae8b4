pub mod bedrock;
pub mod openai;
pub mod provider;

pub use bedrock::BedrockChat;
pub use openai::OpenAiChat;
pub use provider::{ChatMessage, ChatModel, ChatOutcome, ToolInvocation, ToolSpec};
