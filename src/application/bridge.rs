use crate::application::builtin::FINALIZE_TOOL;
use crate::application::registry::ToolRegistry;
use crate::application::resolver::{ParameterResolver, PromptSource};
use crate::application::session::SessionError;
use crate::domain::artifact::ConfiguredTool;
use crate::domain::schema::ToolSchema;
use crate::domain::types::{ChatMessage, MessageRole};
use crate::infrastructure::model::{ModelError, ModelProvider, ModelReply, ModelRequest};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Hard cap on model round-trips per user turn. Bounds cost and guards
/// against a model that never stops requesting tools.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// The tool execution boundary. The orchestration core never interprets
/// the returned string beyond success versus failure.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn invoke(&self, tool: &str, parameters: &Map<String, Value>)
    -> Result<String, InvokeError>;
}

#[derive(Debug, Error)]
#[error("tool backend failed for `{tool}`: {message}")]
pub struct InvokeError {
    pub tool: String,
    pub message: String,
}

/// Default backend for configuration sessions: tools are recorded rather
/// than executed, and the confirmation text becomes the tool result.
pub struct ConfigurationRecorder;

#[async_trait]
impl ToolBackend for ConfigurationRecorder {
    async fn invoke(
        &self,
        tool: &str,
        _parameters: &Map<String, Value>,
    ) -> Result<String, InvokeError> {
        Ok(format!(
            "Added `{tool}` to the configuration. Ask the user what to do next, or call `{FINALIZE_TOOL}` once they are done."
        ))
    }
}

/// How one bounded exchange ended.
#[derive(Debug)]
pub enum ExchangeOutcome {
    /// The model answered with free text; control returns to the caller.
    Reply(String),
    /// The model requested the terminal tool; assemble the artifact.
    Finalize {
        agent_name: String,
        description: String,
    },
}

/// Owns the message history with the model and drives the per-turn state
/// machine. Every round-trip is synchronous: a new model call is never
/// issued before the previous outcome has been appended to the history.
pub struct ConversationBridge<'a> {
    provider: &'a dyn ModelProvider,
    tools: Vec<ToolSchema>,
    history: Vec<ChatMessage>,
    max_iterations: usize,
}

impl<'a> ConversationBridge<'a> {
    pub fn new(
        provider: &'a dyn ModelProvider,
        tools: Vec<ToolSchema>,
        max_iterations: usize,
    ) -> Self {
        Self {
            provider,
            tools,
            history: Vec::new(),
            max_iterations,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.history.push(ChatMessage::new(MessageRole::System, prompt));
        self
    }

    fn push_user(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::new(MessageRole::User, content));
    }

    fn push_tool_result(&mut self, content: impl Into<String>) {
        self.history
            .push(ChatMessage::new(MessageRole::ToolResult, content));
    }

    /// Submits the full history and appends the model's move to it before
    /// handing the reply back.
    async fn submit(&mut self) -> Result<ModelReply, ModelError> {
        let reply = self
            .provider
            .chat(ModelRequest {
                messages: self.history.clone(),
                tools: self.tools.clone(),
            })
            .await?;

        match &reply {
            ModelReply::Text(text) => {
                self.history
                    .push(ChatMessage::new(MessageRole::Assistant, text.clone()));
            }
            ModelReply::ToolCall(call) => {
                self.history.push(ChatMessage::new(
                    MessageRole::Assistant,
                    json!({ "tool_call": { "name": call.name, "arguments": call.arguments } })
                        .to_string(),
                ));
            }
        }
        Ok(reply)
    }

    /// Focused sub-dialogue for one planned tool: the first call matching
    /// the target ends it with the model-supplied arguments; any other
    /// requested tool is a protocol violation and configures nothing.
    pub async fn run_tool_dialogue(
        &mut self,
        target: &ToolSchema,
        prompts: &dyn PromptSource,
    ) -> Result<Map<String, Value>, SessionError> {
        self.push_user(format!("Let's configure the `{}` tool.", target.name));

        for _ in 0..self.max_iterations {
            match self.submit().await? {
                ModelReply::ToolCall(call) => {
                    if call.name.eq_ignore_ascii_case(&target.name) {
                        debug!(tool = %target.name, "Model supplied arguments for target tool");
                        return Ok(call.arguments);
                    }
                    warn!(
                        expected = %target.name,
                        requested = %call.name,
                        "Wrong tool requested during focused dialogue"
                    );
                    return Err(SessionError::ProtocolViolation {
                        expected: target.name.clone(),
                        requested: call.name,
                    });
                }
                ModelReply::Text(question) => {
                    let answer = prompts.prompt(&question).map_err(SessionError::Prompt)?;
                    self.push_user(answer);
                }
            }
        }

        Err(SessionError::MaxIterations {
            limit: self.max_iterations,
        })
    }

    /// One open-ended exchange: the model chooses tools itself until it
    /// answers with text or requests finalization, within the iteration
    /// cap. Configuration failures are reported back to the model instead
    /// of aborting the session.
    pub async fn exchange(
        &mut self,
        user_input: impl Into<String>,
        registry: &ToolRegistry,
        resolver: &ParameterResolver<'_>,
        backend: &dyn ToolBackend,
        configured: &mut Vec<ConfiguredTool>,
    ) -> Result<ExchangeOutcome, SessionError> {
        self.push_user(user_input);

        for _ in 0..self.max_iterations {
            match self.submit().await? {
                ModelReply::Text(text) => return Ok(ExchangeOutcome::Reply(text)),
                ModelReply::ToolCall(call) if call.name.eq_ignore_ascii_case(FINALIZE_TOOL) => {
                    let agent_name = string_argument(&call.arguments, "agent_name");
                    if agent_name.is_empty() {
                        return Err(SessionError::InvalidModelReply(format!(
                            "`{FINALIZE_TOOL}` call missing agent_name"
                        )));
                    }
                    info!(agent_name = agent_name.as_str(), "Model requested configuration finalization");
                    return Ok(ExchangeOutcome::Finalize {
                        agent_name,
                        description: string_argument(&call.arguments, "description"),
                    });
                }
                ModelReply::ToolCall(call) => {
                    let Some(schema) = registry.get(&call.name).cloned() else {
                        warn!(tool = %call.name, "Unregistered tool requested mid-exchange");
                        self.push_tool_result(format!(
                            "No tool named `{}` is registered. Choose from: {}.",
                            call.name,
                            registry.prompt_listing()
                        ));
                        continue;
                    };

                    match resolver.resolve(&schema, Some(call.arguments)) {
                        Ok(tool) => match backend.invoke(&tool.tool_name, &tool.parameters).await {
                            Ok(result) => {
                                self.push_tool_result(result);
                                configured.push(tool);
                            }
                            Err(error) => {
                                warn!(tool = %schema.name, %error, "Tool backend rejected configuration");
                                self.push_tool_result(format!(
                                    "`{}` was not added: {error}.",
                                    schema.name
                                ));
                            }
                        },
                        Err(error) => {
                            warn!(tool = %schema.name, %error, "Tool configuration failed");
                            self.push_tool_result(format!(
                                "Configuring `{}` failed: {error}. The tool was not added.",
                                schema.name
                            ));
                        }
                    }
                }
            }
        }

        Err(SessionError::MaxIterations {
            limit: self.max_iterations,
        })
    }
}

fn string_argument(arguments: &Map<String, Value>, key: &str) -> String {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}
