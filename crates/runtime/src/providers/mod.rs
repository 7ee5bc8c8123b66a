//! LLM provider adapters.
//!
//! Each provider implements the backend trait for its specific API.

mod bedrock;

pub use bedrock::{
    BedrockBackend, BedrockBackendBuilder, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_REGION,
    DEFAULT_TEMPERATURE,
};
