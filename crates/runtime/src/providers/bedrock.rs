//! Amazon Bedrock Converse API backend.

use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, StopReason, ToolCall,
    ToolOutcome, Usage,
};
use crate::schema::ProviderToolSpec;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_MODEL: &str = "anthropic.claude-3-5-sonnet-20240620-v1:0";
pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<Vec<ApiSystemBlock>>,
    inference_config: ApiInferenceConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<ApiToolConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiSystemBlock {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiInferenceConfig {
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ApiToolConfig<'a> {
    tools: &'a [ProviderToolSpec],
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Vec<ApiContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum ApiContentBlock {
    Text(String),
    ToolUse(ApiToolUse),
    ToolResult(ApiToolResult),
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiToolUse {
    tool_use_id: String,
    name: String,
    #[serde(default)]
    input: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiToolResult {
    tool_use_id: String,
    content: Vec<ApiToolResultContent>,
    status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum ApiToolResultContent {
    Json(Value),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    output: Option<ApiOutput>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ApiOutput {
    message: Option<ApiResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Vec<ApiResponseBlock>,
}

/// One response content block. Converse encodes the block kind as the single
/// key present.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
enum ApiResponseBlock {
    Text(String),
    ToolUse(ApiToolUse),
    /// Reasoning, images, documents and anything newer, by kind.
    Unsupported(String),
}

impl TryFrom<Map<String, Value>> for ApiResponseBlock {
    type Error = String;

    fn try_from(mut block: Map<String, Value>) -> Result<Self, Self::Error> {
        if let Some(text) = block.remove("text") {
            return serde_json::from_value(text)
                .map(Self::Text)
                .map_err(|e| format!("text block: {e}"));
        }
        if let Some(tool_use) = block.remove("toolUse") {
            return serde_json::from_value(tool_use)
                .map(Self::ToolUse)
                .map_err(|e| format!("toolUse block: {e}"));
        }
        let kind = block.keys().next().map_or("empty", String::as_str);
        Ok(Self::Unsupported(kind.to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating a Bedrock backend.
#[derive(Debug, Clone)]
pub struct BedrockBackendBuilder {
    bearer_token: String,
    model: String,
    region: String,
    endpoint: Option<String>,
    max_tokens: u32,
    temperature: f32,
    system: Option<String>,
}

impl BedrockBackendBuilder {
    pub fn new(bearer_token: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            bearer_token: bearer_token.into(),
            model: model.into(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            system: None,
        }
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Override the runtime endpoint (defaults to the regional endpoint).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Fails when the endpoint is not a usable base URL.
    pub fn build(self) -> Result<BedrockBackend, ModelError> {
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", self.region));
        let mut url = Url::parse(&endpoint)
            .map_err(|e| ModelError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        // Segments are percent-encoded, so ARN and inference-profile IDs
        // containing `/` stay one segment.
        url.path_segments_mut()
            .map_err(|()| ModelError::InvalidEndpoint(format!("{endpoint}: not a base url")))?
            .pop_if_empty()
            .extend(["model", self.model.as_str(), "converse"]);

        Ok(BedrockBackend {
            client: reqwest::Client::new(),
            bearer_token: self.bearer_token,
            url,
            model: self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: self.system,
        })
    }
}

/// Bedrock Converse backend.
pub struct BedrockBackend {
    client: reqwest::Client,
    bearer_token: String,
    url: Url,
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: Option<String>,
}

impl BedrockBackend {
    pub fn builder(
        bearer_token: impl Into<String>,
        model: impl Into<String>,
    ) -> BedrockBackendBuilder {
        BedrockBackendBuilder::new(bearer_token, model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn role_to_api(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    fn message_to_api(msg: &Message) -> ApiMessage {
        let content = msg
            .parts
            .iter()
            .map(|part| match part {
                Part::Text { text } => ApiContentBlock::Text(text.clone()),
                Part::ToolCall(call) => ApiContentBlock::ToolUse(ApiToolUse {
                    tool_use_id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.input.clone(),
                }),
                Part::ToolResult(result) => {
                    let (content, status) = match &result.outcome {
                        ToolOutcome::Success { output } => (output_to_api(output), "success"),
                        ToolOutcome::Error { message } => {
                            (ApiToolResultContent::Text(message.clone()), "error")
                        }
                    };
                    ApiContentBlock::ToolResult(ApiToolResult {
                        tool_use_id: result.tool_call_id.clone(),
                        content: vec![content],
                        status,
                    })
                }
            })
            .collect();

        ApiMessage {
            role: Self::role_to_api(msg.role),
            content,
        }
    }

    fn request_body<'a>(&self, request: ModelRequest<'a>) -> ApiRequest<'a> {
        ApiRequest {
            messages: request.messages.iter().map(Self::message_to_api).collect(),
            system: self
                .system
                .as_ref()
                .map(|text| vec![ApiSystemBlock { text: text.clone() }]),
            inference_config: ApiInferenceConfig {
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            },
            tool_config: (!request.tools.is_empty()).then_some(ApiToolConfig {
                tools: request.tools,
            }),
        }
    }

    fn response_from_api(response: ApiResponse) -> Result<ModelResponse, ModelError> {
        let stop_reason = response
            .stop_reason
            .ok_or_else(|| ModelError::InvalidResponse("missing stopReason".into()))?;
        let message = response
            .output
            .and_then(|output| output.message)
            .ok_or_else(|| ModelError::InvalidResponse("missing output message".into()))?;

        let parts = message
            .content
            .into_iter()
            .filter_map(|block| match block {
                ApiResponseBlock::Text(text) => Some(Part::Text { text }),
                ApiResponseBlock::ToolUse(tool_use) => Some(Part::ToolCall(ToolCall {
                    id: tool_use.tool_use_id,
                    name: tool_use.name,
                    input: tool_use.input,
                })),
                ApiResponseBlock::Unsupported(kind) => {
                    tracing::warn!(%kind, "skipping unsupported response content block");
                    None
                }
            })
            .collect();

        Ok(ModelResponse {
            stop_reason: stop_reason_from_api(&stop_reason),
            message: Message::from_parts(Role::Assistant, parts),
            usage: Usage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        })
    }
}

fn output_to_api(output: &Value) -> ApiToolResultContent {
    match output {
        Value::String(text) => ApiToolResultContent::Text(text.clone()),
        Value::Object(_) => ApiToolResultContent::Json(output.clone()),
        other => ApiToolResultContent::Text(other.to_string()),
    }
}

fn stop_reason_from_api(reason: &str) -> StopReason {
    match reason {
        "end_turn" => StopReason::EndTurn,
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        "stop_sequence" => StopReason::StopSequence,
        "guardrail_intervened" => StopReason::GuardrailIntervened,
        "content_filtered" => StopReason::ContentFiltered,
        other => StopReason::Other(other.to_string()),
    }
}

impl std::fmt::Display for BedrockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bedrock({})", self.model)
    }
}

impl Backend for BedrockBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let body = self.request_body(request);
        tracing::debug!(
            model = %self.model,
            messages = body.messages.len(),
            tools = request.tools.len(),
            "converse request"
        );

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.bearer_token)
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let response = Self::response_from_api(api_response)?;
        tracing::debug!(
            stop_reason = ?response.stop_reason,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "converse response"
        );
        Ok(response)
    }
}
