//! Translation from tool-host descriptors to provider tool specs.
//!
//! The tool host describes each tool with a JSON Schema object. The Converse
//! API wants the same content wrapped in a `toolSpec` envelope:
//!
//! ```json
//! { "toolSpec": { "name": "...", "description": "...",
//!                 "inputSchema": { "json": { "type": "object",
//!                                            "properties": {},
//!                                            "required": [] } } } }
//! ```

use crate::tools::ToolDescriptor;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// A descriptor that cannot be expressed as a provider tool spec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("tool descriptor #{index} has no name")]
    MissingName { index: usize },

    #[error("tool {name} has no input schema properties")]
    MissingProperties { name: String },

    #[error("tool {name} has an invalid required list: {reason}")]
    InvalidRequired { name: String, reason: String },
}

/// A tool definition in the provider envelope.
///
/// Only produced by [`translate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderToolSpec {
    tool_spec: ToolSpecBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSpecBody {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    input_schema: InputSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct InputSchema {
    json: JsonSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct JsonSchema {
    #[serde(rename = "type")]
    schema_type: &'static str,
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ProviderToolSpec {
    pub fn name(&self) -> &str {
        &self.tool_spec.name
    }

    pub fn description(&self) -> Option<&str> {
        self.tool_spec.description.as_deref()
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.tool_spec.input_schema.json.properties
    }

    pub fn required(&self) -> &[String] {
        &self.tool_spec.input_schema.json.required
    }
}

/// Convert tool-host descriptors into provider tool specs.
///
/// Output order matches input order. The first malformed descriptor fails
/// the whole translation.
pub fn translate(descriptors: &[ToolDescriptor]) -> Result<Vec<ProviderToolSpec>, SchemaError> {
    descriptors
        .iter()
        .enumerate()
        .map(|(index, descriptor)| translate_one(index, descriptor))
        .collect()
}

fn translate_one(index: usize, descriptor: &ToolDescriptor) -> Result<ProviderToolSpec, SchemaError> {
    if descriptor.name.trim().is_empty() {
        return Err(SchemaError::MissingName { index });
    }
    let name = descriptor.name.clone();

    let properties = match descriptor.input_schema.get("properties") {
        Some(Value::Object(properties)) => properties.clone(),
        _ => return Err(SchemaError::MissingProperties { name }),
    };

    let required = match descriptor.input_schema.get("required") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| SchemaError::InvalidRequired {
                        name: name.clone(),
                        reason: format!("expected string, got {item}"),
                    })
            })
            .collect::<Result<_, _>>()?,
        Some(other) => {
            return Err(SchemaError::InvalidRequired {
                name,
                reason: format!("expected array, got {other}"),
            });
        }
    };

    Ok(ProviderToolSpec {
        tool_spec: ToolSpecBody {
            name,
            description: descriptor.description.clone(),
            input_schema: InputSchema {
                json: JsonSchema {
                    schema_type: "object",
                    properties,
                    required,
                },
            },
        },
    })
}
