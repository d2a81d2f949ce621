use crate::application::builtin::FINALIZE_TOOL;
use crate::application::registry::ToolRegistry;
use crate::domain::types::{ChatMessage, MessageRole};
use crate::infrastructure::model::{ModelError, ModelProvider, ModelReply, ModelRequest};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("planner expected a plain text reply, got a tool call")]
    UnexpectedToolCall,
    #[error("model planned only unknown tools: {}", .proposed.join(", "))]
    UnknownTools { proposed: Vec<String> },
}

/// Maps a goal onto an ordered list of registered tool names.
///
/// The model's stated order is preserved verbatim: it encodes the intended
/// execution sequence. Unknown names are dropped as long as at least one
/// valid name remains; a reply made up entirely of unknown tools is a
/// planning failure the caller must handle, never silently substituted.
pub async fn plan(
    goal: &str,
    registry: &ToolRegistry,
    provider: &dyn ModelProvider,
) -> Result<Vec<String>, PlanError> {
    let prompt = planning_prompt(goal, registry);
    debug!("Submitting planning prompt");

    let reply = provider
        .chat(ModelRequest {
            messages: vec![ChatMessage::new(MessageRole::User, prompt)],
            tools: Vec::new(),
        })
        .await?;

    let raw = match reply {
        ModelReply::Text(text) => text,
        ModelReply::ToolCall(_) => return Err(PlanError::UnexpectedToolCall),
    };

    let plan = parse_plan(&raw, registry)?;
    info!(tools = plan.len(), "Plan generated");
    Ok(plan)
}

fn planning_prompt(goal: &str, registry: &ToolRegistry) -> String {
    let listing = registry
        .names()
        .filter(|name| *name != FINALIZE_TOOL)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"Based on the user's goal, identify the necessary tools in the correct order of execution.
Only use tools from the provided list. If no tool is suitable, respond with "None".
Present the list of tool names as a simple, comma-separated string (e.g., "tool1, tool2").

Goal: "{goal}"
Available Tools: {listing}"#
    )
}

fn parse_plan(raw: &str, registry: &ToolRegistry) -> Result<Vec<String>, PlanError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(Vec::new());
    }

    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for token in trimmed.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match registry.get(token) {
            Some(schema) if schema.name != FINALIZE_TOOL => valid.push(schema.name.clone()),
            // The terminal tool is never plannable.
            Some(_) => debug!(token, "Dropping terminal tool from plan"),
            None => invalid.push(token.to_string()),
        }
    }

    if !invalid.is_empty() {
        warn!(unknown = invalid.join(", "), "Model proposed unknown tools");
        if valid.is_empty() {
            return Err(PlanError::UnknownTools { proposed: invalid });
        }
    }

    Ok(valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::builtin;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct ScriptedProvider {
        replies: Arc<Mutex<Vec<ModelReply>>>,
        requests: Arc<Mutex<Vec<ModelRequest>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<ModelReply>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies)),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn text(reply: &str) -> Self {
            Self::new(vec![ModelReply::Text(reply.to_string())])
        }

        async fn requests(&self) -> Vec<ModelRequest> {
            self.requests.lock().await.clone()
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn chat(&self, request: ModelRequest) -> Result<ModelReply, ModelError> {
            self.requests.lock().await.push(request);
            let mut replies = self.replies.lock().await;
            Ok(replies.remove(0))
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::from_declarations(&builtin::declarations())
    }

    #[tokio::test]
    async fn preserves_model_token_order() {
        let provider = ScriptedProvider::text("email_tool, calculator_tool");
        let plan = plan("send an email and then calculate 2+2", &registry(), &provider)
            .await
            .expect("plan succeeds");
        assert_eq!(plan, vec!["email_tool", "calculator_tool"]);
    }

    #[tokio::test]
    async fn none_reply_yields_empty_plan() {
        for reply in ["none", "None", "  NONE \n"] {
            let provider = ScriptedProvider::text(reply);
            let plan = plan("just chat", &registry(), &provider)
                .await
                .expect("plan succeeds");
            assert!(plan.is_empty(), "reply {reply:?} should yield an empty plan");
        }
    }

    #[tokio::test]
    async fn all_unknown_tools_is_a_planning_error() {
        let provider = ScriptedProvider::text("alpha_tool, beta_tool");
        let error = plan("do things", &registry(), &provider)
            .await
            .expect_err("must fail");
        match error {
            PlanError::UnknownTools { proposed } => {
                assert_eq!(proposed, vec!["alpha_tool", "beta_tool"]);
            }
            other => panic!("expected UnknownTools, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mixed_validity_keeps_valid_names_in_position() {
        let provider = ScriptedProvider::text("email_tool, ghost_tool, calculator_tool");
        let plan = plan("mixed", &registry(), &provider).await.expect("plan succeeds");
        assert_eq!(plan, vec!["email_tool", "calculator_tool"]);
    }

    #[tokio::test]
    async fn matching_is_case_insensitive_and_canonicalizing() {
        let provider = ScriptedProvider::text("Email_Tool");
        let plan = plan("send mail", &registry(), &provider).await.expect("plan succeeds");
        assert_eq!(plan, vec!["email_tool"]);
    }

    #[tokio::test]
    async fn terminal_tool_never_appears_in_listing_or_plan() {
        let provider = ScriptedProvider::text("finalize_configuration, email_tool");
        let reg = registry();
        let plan = plan("finish up", &reg, &provider).await.expect("plan succeeds");
        assert_eq!(plan, vec!["email_tool"]);

        let requests = provider.requests().await;
        assert!(!requests[0].messages[0].content.contains(FINALIZE_TOOL));
    }

    #[tokio::test]
    async fn tool_call_reply_is_rejected() {
        let provider = ScriptedProvider::new(vec![ModelReply::ToolCall(
            crate::infrastructure::model::ToolCallRequest {
                name: "email_tool".into(),
                arguments: Default::default(),
            },
        )]);
        let error = plan("goal", &registry(), &provider).await.expect_err("must fail");
        assert!(matches!(error, PlanError::UnexpectedToolCall));
    }
}
