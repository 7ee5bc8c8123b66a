//! Ferry runtime: tool-augmented conversations over MCP and Bedrock.
//!
//! This crate bridges an MCP tool host with the Bedrock Converse API so the
//! model can call external tools in the middle of answering a query.
//!
//! # Overview
//!
//! - **Schema translation**: [`translate`] turns tool-host descriptors into
//!   provider tool specs.
//! - **Backend**: a trait for one inference call; [`BedrockBackend`] speaks
//!   the Converse API.
//! - **Tool host**: a trait for the tool session; [`McpToolHost`] is backed
//!   by rmcp.
//! - **Orchestrator**: runs a query turn, dispatching requested tools and
//!   feeding results back until the model answers.
//! - **Conversation**: an owned transcript for multi-turn memory.
//!
//! # Example
//!
//! ```ignore
//! use runtime::{BedrockBackend, McpToolHost, Orchestrator, ToolHost};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = BedrockBackend::builder("bedrock-api-key", runtime::DEFAULT_MODEL).build()?;
//! let host = McpToolHost::connect("http://localhost:8080/mcp").await?;
//! let orchestrator = Orchestrator::new(backend);
//!
//! let answer = orchestrator.process_query("list files in /tmp", &host).await?;
//! println!("{answer}");
//! host.close().await?;
//! # Ok(())
//! # }
//! ```

mod conversation;
mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;
mod orchestrator;
pub mod providers;
pub mod schema;
pub mod tools;

// Conversation core types (provider-agnostic)
pub use model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, StopReason, ToolCall,
    ToolOutcome, ToolResult, Usage,
};

// Provider backends
pub use providers::{BedrockBackend, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_REGION};

// Schema translation
pub use schema::{ProviderToolSpec, SchemaError, translate};

// Tool hosts
pub use tools::{McpToolHost, ToolDescriptor, ToolError, ToolHost, dispatch};

// Error types
pub use error::{Error, Result};

// Turn orchestration
pub use conversation::Conversation;
pub use orchestrator::{Annotation, DEFAULT_MAX_TOOL_ROUNDS, Orchestrator, TurnReport};
