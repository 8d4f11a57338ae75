use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::consts::{DEFAULT_MODEL, DEFAULT_OPENAI_BASE_URL};
use crate::history::Turn;
use crate::tools::{ToolCall, ToolSpec};

use super::{Mode, Oracle, OracleError, OracleResponse, Request, TokenUsage};

/// An oracle backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiOracle {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiOracle {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_messages(request: &Request<'_>) -> Vec<ApiMessage> {
        let mut messages = vec![
            ApiMessage::plain("system", request.system),
            ApiMessage::plain("user", request.user),
        ];

        for turn in request.history {
            match turn {
                Turn::Oracle { content, calls, .. } => {
                    messages.push(ApiMessage {
                        role: "assistant".to_string(),
                        content: if content.is_empty() && !calls.is_empty() {
                            None
                        } else {
                            Some(content.clone())
                        },
                        tool_calls: calls.iter().map(ApiToolCall::from_call).collect(),
                        tool_call_id: None,
                    });
                }
                Turn::Observation(result) => {
                    messages.push(ApiMessage {
                        role: "tool".to_string(),
                        content: Some(result.outcome.render()),
                        tool_calls: Vec::new(),
                        tool_call_id: Some(result.call_id.clone()),
                    });
                }
                Turn::Extraction { .. } => {
                    // Ends the run; never fed back.
                }
            }
        }

        messages
    }

    fn build_body<'a>(&'a self, request: &Request<'a>, mode: &'a Mode) -> ApiRequest<'a> {
        let (tools, response_format): (Vec<ApiTool<'a>>, Option<ResponseFormat<'a>>) = match mode {
            Mode::FreeForm => (request.tools.iter().map(ApiTool::from_spec).collect(), None),
            Mode::Constrained(schema) => (
                Vec::new(),
                Some(ResponseFormat {
                    format_type: "json_schema",
                    json_schema: JsonSchemaFormat {
                        name: schema.name,
                        strict: true,
                        schema: &schema.json,
                    },
                }),
            ),
        };

        ApiRequest {
            model: &self.model,
            temperature: 0.0,
            messages: Self::build_messages(request),
            tools,
            response_format,
        }
    }

    fn parse_response(resp: ApiResponse) -> Result<OracleResponse, OracleError> {
        let usage = resp.usage.map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });

        let message = resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(OracleError::Empty)?;

        if let Some(refusal) = message.refusal {
            return Err(OracleError::Other(format!("oracle refused: {}", refusal)));
        }

        let calls: Vec<ToolCall> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter(|c| !c.function.name.trim().is_empty())
            .map(|c| ToolCall {
                args: parse_arguments(&c.function.arguments),
                id: c.id,
                tool: c.function.name,
            })
            .collect();

        let content = message.content.unwrap_or_default();
        if content.trim().is_empty() && calls.is_empty() {
            return Err(OracleError::Empty);
        }

        Ok(OracleResponse {
            content,
            calls,
            usage,
        })
    }
}

/// Tool arguments arrive as a JSON-encoded string. Anything that doesn't
/// decode is passed through as a plain string so the tool can reject it.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[async_trait]
impl Oracle for OpenAiOracle {
    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &Request<'_>, mode: &Mode) -> Result<OracleResponse, OracleError> {
        if self.api_key.is_empty() {
            return Err(OracleError::NotConfigured(
                "no OpenAI credentials found. Set OPENAI_API_KEY.".to_string(),
            ));
        }

        let body = self.build_body(request, mode);
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(OracleError::Api { status, body });
        }

        let text = resp.text().await?;
        let api_resp: ApiResponse = serde_json::from_str(&text)?;

        if let Some(usage) = &api_resp.usage {
            debug!(
                input = usage.prompt_tokens,
                output = usage.completion_tokens,
                "tokens"
            );
        }

        Self::parse_response(api_resp)
    }
}

// --- API types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn plain(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: ApiFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

impl ApiToolCall {
    fn from_call(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            call_type: function_type(),
            function: ApiFunctionCall {
                name: call.tool.clone(),
                arguments: call.args.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Serialize)]
struct ApiTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: ApiFunction<'a>,
}

impl<'a> ApiTool<'a> {
    fn from_spec(spec: &'a ToolSpec) -> Self {
        Self {
            tool_type: "function",
            function: ApiFunction {
                name: &spec.name,
                description: &spec.description,
                parameters: &spec.parameters,
            },
        }
    }
}

#[derive(Serialize)]
struct ApiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a Value,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ApiToolCall>>,
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
