//! MCP-backed tool host.

use super::{McpClient, ToolArguments, ToolDescriptor, ToolError, ToolHost};
use rmcp::model::{CallToolResult, Content};
use serde_json::Value;

/// Tool host backed by an MCP session.
///
/// Descriptors are fetched from the server on every [`ToolHost::list_tools`]
/// call, never cached.
pub struct McpToolHost {
    client: McpClient,
}

impl McpToolHost {
    /// Connect to the tool host at `address`.
    pub async fn connect(address: &str) -> Result<Self, ToolError> {
        let client = McpClient::connect(address)
            .await
            .map_err(|e| ToolError::Connect(format!("{address}: {e}")))?;
        Ok(Self { client })
    }
}

impl ToolHost for McpToolHost {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let tools = self
            .client
            .list_tools()
            .await
            .map_err(|e| ToolError::Protocol(e.to_string()))?;
        Ok(tools.into_iter().map(ToolDescriptor::from).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let arguments = ToolArguments::try_from(arguments)?;
        let result = self
            .client
            .call_tool(name, arguments.0)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        result_payload(result)
    }

    async fn close(self) -> Result<(), ToolError> {
        self.client
            .shutdown()
            .await
            .map_err(|e| ToolError::Protocol(format!("close: {e}")))
    }
}

/// Reduce an MCP call result to the payload handed back to the model.
///
/// Structured content wins. All-text content collapses to one string.
fn result_payload(result: CallToolResult) -> Result<Value, ToolError> {
    if result.is_error.unwrap_or(false) {
        return Err(ToolError::Execution(content_text(&result.content)));
    }
    if let Some(structured) = result.structured_content {
        return Ok(structured);
    }

    let texts: Option<Vec<&str>> = result
        .content
        .iter()
        .map(|c| c.as_text().map(|t| t.text.as_str()))
        .collect();

    match texts {
        Some(texts) => Ok(Value::String(texts.join("\n"))),
        None => serde_json::to_value(&result.content)
            .map_err(|e| ToolError::Execution(format!("serialize result: {e}"))),
    }
}

fn content_text(content: &[Content]) -> String {
    content
        .iter()
        .map(|c| match c.as_text() {
            Some(t) => t.text.clone(),
            None => "[non-text]".to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_content_collapses_to_string() {
        let result = CallToolResult::success(vec![Content::text("a.txt"), Content::text("b.txt")]);
        assert_eq!(result_payload(result).unwrap(), json!("a.txt\nb.txt"));
    }

    #[test]
    fn structured_content_preferred() {
        let mut result = CallToolResult::success(vec![Content::text("ignored")]);
        result.structured_content = Some(json!(["a.txt"]));
        assert_eq!(result_payload(result).unwrap(), json!(["a.txt"]));
    }

    #[test]
    fn error_flag_becomes_execution_error() {
        let result = CallToolResult::error(vec![Content::text("no such directory")]);
        assert_eq!(
            result_payload(result).unwrap_err(),
            ToolError::Execution("no such directory".into())
        );
    }
}
