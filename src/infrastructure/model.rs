use crate::domain::schema::{ParamType, ToolSchema};
use crate::domain::types::{ChatMessage, MessageRole};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const GEMINI_API_PATH: &str = "v1beta/models";

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSchema>,
}

/// A single structured tool-call request extracted from a model turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// What a model turn produced: free text, or exactly one tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    ToolCall(ToolCallRequest),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("model provider returned invalid response: {0}")]
    InvalidResponse(String),
    #[error("no API key configured for the model provider")]
    MissingApiKey,
}

impl ModelError {
    pub fn user_message(&self) -> String {
        match self {
            ModelError::Network(err) => {
                if err.is_connect() {
                    "Cannot reach the model service. Check your network connection.".to_string()
                } else if err.is_timeout() {
                    "The model service took too long to answer. Try again shortly.".to_string()
                } else if let Some(status) = err.status() {
                    match status {
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            "The model service rejected the API key. Check GEMINI_API_KEY."
                                .to_string()
                        }
                        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                            "The model service is currently unavailable. Try again later."
                                .to_string()
                        }
                        _ => format!(
                            "The model request failed with status {}. Try again later.",
                            status.as_u16()
                        ),
                    }
                } else {
                    "A network error occurred while contacting the model service.".to_string()
                }
            }
            ModelError::InvalidResponse(_) => {
                "The model returned a response that could not be processed. Try again.".to_string()
            }
            ModelError::MissingApiKey => {
                "No API key is configured. Set GEMINI_API_KEY and restart.".to_string()
            }
        }
    }
}

/// The model invocation boundary: full message history plus the current
/// tool schemas in, free text or one structured call out.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn chat(&self, request: ModelRequest) -> Result<ModelReply, ModelError>;
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        })
    }

    fn build_model_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        format!("{base}/{GEMINI_API_PATH}/{}:generateContent", self.model)
    }

    fn require_api_key(&self) -> Result<&str, ModelError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ModelError::MissingApiKey)
    }
}

#[async_trait]
impl ModelProvider for GeminiClient {
    async fn chat(&self, request: ModelRequest) -> Result<ModelReply, ModelError> {
        let url = self.build_model_url();
        let payload = build_payload(&request);

        info!(
            model = self.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending request to Gemini"
        );

        let api_key = self.require_api_key()?;
        let response: GeminiResponse = self
            .http
            .post(format!("{url}?key={api_key}"))
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("Received response from Gemini");

        parse_reply(response)
    }
}

fn build_payload(request: &ModelRequest) -> Value {
    let (system_text, contents) = to_gemini_format(&request.messages);

    let mut payload = json!({ "contents": contents });
    if !request.tools.is_empty() {
        payload["tools"] = json!([{ "functionDeclarations": function_declarations(&request.tools) }]);
    }
    if let Some(system) = system_text {
        payload["system_instruction"] = json!({ "parts": [{ "text": system }] });
    }
    payload
}

/// Splits system messages into the dedicated instruction slot and maps
/// the rest onto Gemini roles. Tool results travel as user-role text so
/// the strict user/model alternation is preserved.
fn to_gemini_format(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
    let mut system_lines = Vec::new();
    let mut contents = Vec::new();

    for message in messages {
        match message.role {
            MessageRole::System => system_lines.push(message.content.clone()),
            MessageRole::Assistant => contents.push(json!({
                "role": "model",
                "parts": [{ "text": message.content }],
            })),
            MessageRole::User | MessageRole::ToolResult => contents.push(json!({
                "role": "user",
                "parts": [{ "text": message.content }],
            })),
        }
    }

    let system = if system_lines.is_empty() {
        None
    } else {
        Some(system_lines.join("\n"))
    };
    (system, contents)
}

fn function_declarations(tools: &[ToolSchema]) -> Vec<Value> {
    tools
        .iter()
        .map(|schema| {
            let mut declaration = json!({
                "name": schema.name,
                "description": schema.description,
            });
            if !schema.parameters.is_empty() {
                let mut properties = Map::new();
                for param in &schema.parameters {
                    properties.insert(
                        param.name.clone(),
                        json!({ "type": gemini_type(param.kind) }),
                    );
                }
                let required: Vec<&str> = schema
                    .required_parameters()
                    .map(|p| p.name.as_str())
                    .collect();
                declaration["parameters"] = json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                });
            }
            declaration
        })
        .collect()
}

fn gemini_type(kind: ParamType) -> &'static str {
    match kind {
        ParamType::String | ParamType::Unknown => "string",
        ParamType::Number => "number",
        ParamType::Boolean => "boolean",
    }
}

fn parse_reply(response: GeminiResponse) -> Result<ModelReply, ModelError> {
    let parts: Vec<GeminiPart> = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .flat_map(|c| c.content)
        .flat_map(|c| c.parts)
        .collect();

    let mut text = None;
    for part in parts {
        if let Some(call) = part.function_call {
            return Ok(ModelReply::ToolCall(ToolCallRequest {
                name: call.name,
                arguments: call.args,
            }));
        }
        if text.is_none() {
            text = part.text;
        }
    }

    text.map(ModelReply::Text).ok_or_else(|| {
        ModelError::InvalidResponse("response contained neither text nor a function call".into())
    })
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::{ParamDecl, ToolDeclaration, TypeAnnotation};

    fn email_schema() -> ToolSchema {
        ToolSchema::from_declaration(
            &ToolDeclaration::new("email_tool")
                .with_doc("Send an email.")
                .with_param(ParamDecl::new("recipient", TypeAnnotation::Str))
                .with_param(ParamDecl::new("subject", TypeAnnotation::Str).with_default()),
        )
    }

    #[test]
    fn endpoint_joins_paths_correctly() {
        let client = GeminiClient::new(
            "https://generativelanguage.googleapis.com/",
            "gemini-2.5-flash",
            Some("key".into()),
            Duration::from_secs(30),
        )
        .expect("client builds");
        assert_eq!(
            client.build_model_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn payload_maps_roles_and_system_instruction() {
        let request = ModelRequest {
            messages: vec![
                ChatMessage::new(MessageRole::System, "stay terse"),
                ChatMessage::new(MessageRole::User, "hi"),
                ChatMessage::new(MessageRole::Assistant, "hello"),
                ChatMessage::new(MessageRole::ToolResult, "tool ok"),
            ],
            tools: Vec::new(),
        };

        let payload = build_payload(&request);
        assert_eq!(payload["system_instruction"]["parts"][0]["text"], "stay terse");
        let contents = payload["contents"].as_array().expect("array");
        let roles: Vec<&str> = contents
            .iter()
            .map(|c| c["role"].as_str().expect("role"))
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert!(payload.get("tools").is_none());
    }

    #[test]
    fn function_declarations_list_required_parameters() {
        let declarations = function_declarations(&[email_schema()]);
        assert_eq!(declarations.len(), 1);
        let declaration = &declarations[0];
        assert_eq!(declaration["name"], "email_tool");
        assert_eq!(
            declaration["parameters"]["properties"]["recipient"]["type"],
            "string"
        );
        let required = declaration["parameters"]["required"]
            .as_array()
            .expect("required array");
        assert_eq!(required.len(), 1);
        assert_eq!(required[0], "recipient");
    }

    #[test]
    fn zero_parameter_tool_omits_parameters_block() {
        let schema = ToolSchema::from_declaration(
            &ToolDeclaration::new("user_context_tool").with_doc("Get user info."),
        );
        let declarations = function_declarations(&[schema]);
        assert!(declarations[0].get("parameters").is_none());
    }

    #[test]
    fn parses_function_call_before_text() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "calling a tool" },
                        { "functionCall": { "name": "calculator_tool", "args": { "expression": "2+2" } } }
                    ]
                }
            }]
        }))
        .expect("deserializes");

        match parse_reply(response).expect("parses") {
            ModelReply::ToolCall(call) => {
                assert_eq!(call.name, "calculator_tool");
                assert_eq!(call.arguments["expression"], "2+2");
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn parses_plain_text_reply() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "done" }] } }]
        }))
        .expect("deserializes");

        assert_eq!(parse_reply(response).expect("parses"), ModelReply::Text("done".into()));
    }

    #[test]
    fn empty_candidates_is_invalid_response() {
        let response: GeminiResponse =
            serde_json::from_value(json!({ "candidates": [] })).expect("deserializes");
        assert!(matches!(
            parse_reply(response),
            Err(ModelError::InvalidResponse(_))
        ));
    }
}
