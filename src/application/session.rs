use crate::application::bridge::{
    ConfigurationRecorder, ConversationBridge, DEFAULT_MAX_ITERATIONS, ExchangeOutcome,
    ToolBackend,
};
use crate::application::finalizer;
use crate::application::planner::{self, PlanError};
use crate::application::registry::ToolRegistry;
use crate::application::resolver::{ParameterResolver, PromptSource, ResolveError};
use crate::domain::artifact::{ConfigurationArtifact, ConfiguredTool};
use crate::domain::schema::ToolSchema;
use crate::infrastructure::model::{ModelError, ModelProvider};
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("exchange exceeded the limit of {limit} model round-trips")]
    MaxIterations { limit: usize },
    #[error("model called `{requested}` while configuring `{expected}`")]
    ProtocolViolation { expected: String, requested: String },
    #[error("model reply was malformed: {0}")]
    InvalidModelReply(String),
    #[error("plan rejected by the user")]
    PlanRejected,
    #[error("prompt source failed: {0}")]
    Prompt(#[source] io::Error),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Plan(PlanError::UnknownTools { .. }) => {
                "The model proposed tools that do not exist. Rephrase the goal and try again."
                    .to_string()
            }
            SessionError::Plan(PlanError::UnexpectedToolCall) => {
                "Planning failed because the model did not answer in the expected form. Try again."
                    .to_string()
            }
            SessionError::Plan(PlanError::Model(err)) => err.user_message(),
            SessionError::Model(err) => err.user_message(),
            SessionError::Resolve(err) => {
                format!("Configuring a tool failed: {err}.")
            }
            SessionError::MaxIterations { limit } => format!(
                "The conversation exceeded its limit of {limit} model round-trips. Try a simpler request."
            ),
            SessionError::ProtocolViolation { expected, .. } => format!(
                "The model tried to configure a different tool than `{expected}`. Try that step again."
            ),
            SessionError::InvalidModelReply(_) => {
                "The model answered in a form that could not be understood. Try again.".to_string()
            }
            SessionError::PlanRejected => {
                "Plan rejected. Restate the goal and start over.".to_string()
            }
            SessionError::Prompt(_) => "Reading your input failed.".to_string(),
        }
    }

    /// True for failures that end only the current exchange; the caller
    /// may surface them and let the user retry within the same session.
    pub fn is_exchange_scoped(&self) -> bool {
        matches!(
            self,
            SessionError::MaxIterations { .. }
                | SessionError::ProtocolViolation { .. }
                | SessionError::InvalidModelReply(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub max_iterations: usize,
    pub approve_plan: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            approve_plan: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub goal: String,
    pub agent_name: String,
    pub description: String,
}

/// A tool dropped from the plan after its configuration failed.
#[derive(Debug, Clone)]
pub struct SkippedTool {
    pub tool_name: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct BuildReport {
    pub artifact: ConfigurationArtifact,
    pub plan: Vec<String>,
    pub skipped: Vec<SkippedTool>,
}

/// Plan-driven session: plan once, then configure each planned tool in
/// order through a focused sub-dialogue, then finalize. Owns its
/// conversation and configured-tool state; nothing partial survives a
/// failed tool.
pub struct BuilderSession<'a> {
    provider: &'a dyn ModelProvider,
    registry: Arc<ToolRegistry>,
    prompts: &'a dyn PromptSource,
    options: SessionOptions,
    session_id: String,
}

impl<'a> BuilderSession<'a> {
    pub fn new(
        provider: &'a dyn ModelProvider,
        registry: Arc<ToolRegistry>,
        prompts: &'a dyn PromptSource,
    ) -> Self {
        Self {
            provider,
            registry,
            prompts,
            options: SessionOptions::default(),
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn build(&self, request: BuildRequest) -> Result<BuildReport, SessionError> {
        info!(
            session_id = self.session_id.as_str(),
            goal = request.goal.as_str(),
            "Build session started"
        );

        let plan = planner::plan(&request.goal, &self.registry, self.provider).await?;
        if plan.is_empty() {
            info!("No tools needed for this goal");
        } else if self.options.approve_plan {
            self.confirm_plan(&plan)?;
        }

        let resolver = ParameterResolver::new(self.prompts);
        let mut configured = Vec::new();
        let mut skipped = Vec::new();

        for tool_name in &plan {
            let Some(schema) = self.registry.get(tool_name).cloned() else {
                warn!(tool = %tool_name, "Planned tool vanished from the registry");
                continue;
            };

            let result = if schema.parameters.is_empty() {
                resolver.resolve(&schema, None).map_err(SessionError::from)
            } else {
                self.configure_tool(&schema, &resolver).await
            };

            match result {
                Ok(tool) => {
                    info!(tool = %tool.tool_name, "Configured planned tool");
                    configured.push(tool);
                }
                Err(
                    error @ (SessionError::Resolve(_)
                    | SessionError::MaxIterations { .. }
                    | SessionError::ProtocolViolation { .. }),
                ) => {
                    warn!(tool = %tool_name, %error, "Skipping tool after configuration failure");
                    skipped.push(SkippedTool {
                        tool_name: tool_name.clone(),
                        reason: error.to_string(),
                    });
                }
                Err(fatal) => return Err(fatal),
            }
        }

        let artifact = finalizer::finalize(
            &request.goal,
            request.agent_name,
            request.description,
            configured,
            &self.registry,
            self.provider,
        )
        .await?;

        info!(
            session_id = self.session_id.as_str(),
            tools = artifact.tools.len(),
            skipped = skipped.len(),
            "Build session finished"
        );
        Ok(BuildReport {
            artifact,
            plan,
            skipped,
        })
    }

    fn confirm_plan(&self, plan: &[String]) -> Result<(), SessionError> {
        let answer = self
            .prompts
            .prompt(&format!(
                "Planned steps: {}. Does this plan look correct? (yes/no): ",
                plan.join(", ")
            ))
            .map_err(SessionError::Prompt)?;
        let answer = answer.trim();
        if answer.eq_ignore_ascii_case("yes") || answer.eq_ignore_ascii_case("y") {
            Ok(())
        } else {
            Err(SessionError::PlanRejected)
        }
    }

    async fn configure_tool(
        &self,
        schema: &ToolSchema,
        resolver: &ParameterResolver<'_>,
    ) -> Result<ConfiguredTool, SessionError> {
        let system_prompt = format!(
            "Your current and only task is to configure the `{name}` tool. \
             Gather every parameter you are missing by asking the user a clear, direct question; \
             do not invent placeholder values. Once you have the parameters, call the `{name}` function.",
            name = schema.name
        );

        let mut bridge = ConversationBridge::new(
            self.provider,
            vec![schema.clone()],
            self.options.max_iterations,
        )
        .with_system_prompt(system_prompt);

        let arguments = bridge.run_tool_dialogue(schema, self.prompts).await?;
        Ok(resolver.resolve(schema, Some(arguments))?)
    }
}

/// Outcome of one open-ended user turn.
#[derive(Debug)]
pub enum TurnOutcome {
    Reply(String),
    Finalized(ConfigurationArtifact),
}

/// Open-ended session: the model chooses tools itself mid-conversation
/// and ends the session by requesting the terminal finalize tool. The
/// first user message doubles as the goal for topic synthesis.
pub struct OpenSession<'a> {
    provider: &'a dyn ModelProvider,
    registry: Arc<ToolRegistry>,
    bridge: ConversationBridge<'a>,
    resolver: ParameterResolver<'a>,
    backend: Box<dyn ToolBackend>,
    configured: Vec<ConfiguredTool>,
    goal: Option<String>,
    session_id: String,
}

impl<'a> OpenSession<'a> {
    pub fn new(
        provider: &'a dyn ModelProvider,
        registry: Arc<ToolRegistry>,
        prompts: &'a dyn PromptSource,
        max_iterations: usize,
    ) -> Self {
        let bridge = ConversationBridge::new(provider, registry.schemas().to_vec(), max_iterations)
            .with_system_prompt(open_system_prompt());
        Self {
            provider,
            registry,
            bridge,
            resolver: ParameterResolver::new(prompts),
            backend: Box::new(ConfigurationRecorder),
            configured: Vec::new(),
            goal: None,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_backend(mut self, backend: Box<dyn ToolBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn configured(&self) -> &[ConfiguredTool] {
        &self.configured
    }

    pub async fn turn(&mut self, user_input: &str) -> Result<TurnOutcome, SessionError> {
        if self.goal.is_none() {
            self.goal = Some(user_input.to_string());
        }
        info!(session_id = self.session_id.as_str(), "Processing user turn");

        let outcome = self
            .bridge
            .exchange(
                user_input,
                &self.registry,
                &self.resolver,
                self.backend.as_ref(),
                &mut self.configured,
            )
            .await?;

        match outcome {
            ExchangeOutcome::Reply(text) => Ok(TurnOutcome::Reply(text)),
            ExchangeOutcome::Finalize {
                agent_name,
                description,
            } => {
                let goal = self.goal.clone().unwrap_or_default();
                let tools = std::mem::take(&mut self.configured);
                let artifact = finalizer::finalize(
                    &goal,
                    agent_name,
                    description,
                    tools,
                    &self.registry,
                    self.provider,
                )
                .await?;
                Ok(TurnOutcome::Finalized(artifact))
            }
        }
    }
}

fn open_system_prompt() -> String {
    [
        "You are an agent-builder assistant helping the user assemble a configuration for a new agent by asking questions.",
        "Analyze each request to identify which available tool is needed.",
        "When you have all the necessary parameters for a tool, call its function; the system intercepts the call and adds the tool to the configuration.",
        "If parameter information is missing, ask the user a clear, direct question. Do not invent placeholder values.",
        "For the `document_tool`, only the `file_name` parameter is needed; the system obtains the actual file content from the user.",
        "After a tool is added, confirm with the user and ask what to do next.",
        "When the user is finished adding tools, call `finalize_configuration` with a name and description for the agent.",
    ]
    .join(" ")
}
