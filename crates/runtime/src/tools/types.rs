//! Tool-related types.

use super::ToolError;
use rmcp::model::Tool;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema description of one callable tool, as reported by the tool host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema object with `properties` and optional `required`.
    pub input_schema: Value,
}

impl From<Tool> for ToolDescriptor {
    fn from(tool: Tool) -> Self {
        Self {
            name: tool.name.into_owned(),
            description: tool.description.map(|d| d.into_owned()),
            input_schema: Value::Object((*tool.input_schema).clone()),
        }
    }
}

/// Tool arguments in the shape MCP expects (an optional JSON object).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolArguments(pub Option<Map<String, Value>>);

impl TryFrom<Value> for ToolArguments {
    type Error = ToolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self(None)),
            Value::Object(map) => Ok(Self(Some(map))),
            other => Err(ToolError::InvalidInput(format!(
                "arguments must be a JSON object, got {other}"
            ))),
        }
    }
}
