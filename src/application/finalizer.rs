use crate::application::registry::ToolRegistry;
use crate::application::session::SessionError;
use crate::domain::artifact::{ConfigurationArtifact, ConfiguredTool};
use crate::domain::types::{ChatMessage, MessageRole};
use crate::infrastructure::model::{ModelProvider, ModelReply, ModelRequest};
use tracing::{debug, info};

/// Topic used when the configured list is empty, whatever the goal said.
pub const EMPTY_PLAN_TOPIC: &str =
    "No specific workflow logic required as no tools were planned.";

/// Synthesizes the operational topic and assembles the artifact verbatim
/// from its inputs. Tool correctness was the resolver's responsibility;
/// nothing is re-validated here.
pub async fn finalize(
    goal: &str,
    agent_name: String,
    description: String,
    tools: Vec<ConfiguredTool>,
    registry: &ToolRegistry,
    provider: &dyn ModelProvider,
) -> Result<ConfigurationArtifact, SessionError> {
    let topic = if tools.is_empty() {
        debug!("No tools configured; using the fixed topic");
        EMPTY_PLAN_TOPIC.to_string()
    } else {
        synthesize_topic(goal, &tools, registry, provider).await?
    };

    info!(agent_name = agent_name.as_str(), tools = tools.len(), "Artifact assembled");
    Ok(ConfigurationArtifact {
        agent_name,
        description,
        topic,
        tools,
    })
}

async fn synthesize_topic(
    goal: &str,
    tools: &[ConfiguredTool],
    registry: &ToolRegistry,
    provider: &dyn ModelProvider,
) -> Result<String, SessionError> {
    let listing = tools
        .iter()
        .map(|tool| match registry.get(&tool.tool_name) {
            Some(schema) => schema.listing_line(),
            None => format!("- {}", tool.tool_name),
        })
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        r#"Based on the user's goal and the chosen tools, write a concise, natural language description of how these tools should work together to achieve the goal. This description will be the agent's core operational logic or "topic".

Focus on the sequence and dependencies between the tools. If a tool has parameters, mention how they might be derived or what information the user needs to provide for them.

User's Goal: "{goal}"
Chosen Tools and their descriptions/parameters:
{listing}"#
    );

    let reply = provider
        .chat(ModelRequest {
            messages: vec![ChatMessage::new(MessageRole::User, prompt)],
            tools: Vec::new(),
        })
        .await
        .map_err(SessionError::Model)?;

    match reply {
        ModelReply::Text(text) => Ok(text.trim().to_string()),
        ModelReply::ToolCall(_) => Err(SessionError::InvalidModelReply(
            "topic synthesis expected a plain text reply".into(),
        )),
    }
}
