use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("build LLM: {0}")]
    Build(String),
    #[error("chat: {0}")]
    Chat(String),
    #[error("LLM returned empty text")]
    EmptyResponse,
    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
    #[error("unusable LLM output: {0}")]
    Parse(String),
}
