//! Tool hosts and tool dispatch.

mod dispatcher;
pub mod errors;
mod host;
mod mcp_client;
mod mcp_host;
mod types;

pub use dispatcher::dispatch;
pub use errors::ToolError;
pub use host::ToolHost;
pub use mcp_client::{McpClient, McpError};
pub use mcp_host::McpToolHost;
pub use types::{ToolArguments, ToolDescriptor};
