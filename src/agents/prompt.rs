//! System prompt assembly from the stored prompt configuration.

use crate::models::PromptConfig;

const DEFAULT_PERSONA: &str = "knowledgeable assistant";

/// System prompt for answer generation. Unset fields fall back to neutral
/// wording so a fresh deployment still behaves sensibly.
pub fn system_prompt(config: Option<&PromptConfig>) -> String {
    let persona = field(config, |c| &c.persona, DEFAULT_PERSONA);
    let tone = field(config, |c| &c.tone, "professional");
    let response_length = field(config, |c| &c.response_length, "concise");
    let glossary = field(config, |c| &c.glossary, "");
    let content = field(config, |c| &c.content, "");

    format!(
        "You are a {persona} and your job is to answer the user's questions.\n\
         You can only answer questions using data provided as context.\n\
         Keep the length of the response {response_length}.\n\
         The tone of the response should be {tone}.\n\
         Here is the glossary: {glossary}\n\
         Here are some extra instructions:\n\
         {content}\n\
         \n\
         Provide a reference for every claim that you make.\n\
         If you cannot answer the question, just say \"Sorry. I don't know.\"\n\
         If the user provides specific instructions about response format, follow them."
    )
}

/// Prompt that turns the latest user message plus history into a single
/// standalone retrieval query.
pub fn reformulation_prompt(config: Option<&PromptConfig>) -> String {
    let glossary = field(config, |c| &c.glossary, "");
    format!(
        "You are a part of a vector store retriever. \
         A vector store retriever calculates the cosine distance between the embeddings \
         of the input text and the stored embeddings, and it returns the closest embeddings. \
         Given a user's prompt and chat history, formulate a single query that will be used \
         to fetch relevant information. \
         Return only the query and nothing else. Do not provide any explanation.\n\
         You can use the following glossary to interpret the user's question:\n{glossary}"
    )
}

fn field<'a>(
    config: Option<&'a PromptConfig>,
    get: impl Fn(&'a PromptConfig) -> &'a Option<String>,
    default: &'a str,
) -> &'a str {
    config
        .and_then(|c| get(c).as_deref())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}
