//! Tool host trait.

use crate::tools::{ToolDescriptor, ToolError};
use serde_json::Value;
use std::future::Future;

/// Trait for tool execution hosts.
///
/// A host is one long-lived session with an external tool provider. It is
/// the boundary between the conversation loop and side effects.
pub trait ToolHost: Send + Sync {
    /// Fetch the current tool descriptors.
    fn list_tools(&self) -> impl Future<Output = Result<Vec<ToolDescriptor>, ToolError>> + Send;

    /// Invoke a tool. The returned payload is opaque to the caller.
    fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> impl Future<Output = Result<Value, ToolError>> + Send;

    /// Release the session and close its transport.
    fn close(self) -> impl Future<Output = Result<(), ToolError>> + Send
    where
        Self: Sized;
}
