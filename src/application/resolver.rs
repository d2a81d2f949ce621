use crate::domain::artifact::ConfiguredTool;
use crate::domain::schema::{ParamSpec, ParamType, ToolSchema};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Parameter holding externally sourced content; a schema declaring it is
/// configured through side-channel acquisition instead of model arguments.
pub const FILE_CONTENT_PARAM: &str = "file_content";
pub const FILE_NAME_PARAM: &str = "file_name";
pub const ENCODING_PARAM: &str = "encoding";
const ENCODING_BASE64: &str = "base64";

/// Synchronous "ask the user for a value" capability. The CLI backs it
/// with stdin; tests script the answers.
pub trait PromptSource: Send + Sync {
    fn prompt(&self, message: &str) -> io::Result<String>;
}

/// Failure scoped to configuring one tool; the session decides whether to
/// skip the tool or abort the plan.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("prompt source failed: {0}")]
    Prompt(#[from] io::Error),
    #[error("file not found at {path:?}")]
    FileNotFound { path: PathBuf },
    #[error("failed to read {path:?}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no value provided for required parameter '{parameter}' of tool '{tool}'")]
    MissingRequired { tool: String, parameter: String },
}

pub struct ParameterResolver<'a> {
    prompts: &'a dyn PromptSource,
}

impl<'a> ParameterResolver<'a> {
    pub fn new(prompts: &'a dyn PromptSource) -> Self {
        Self { prompts }
    }

    /// Produces one fully configured tool, or fails without partial output.
    ///
    /// Policy order: zero-parameter tools auto-configure with no dialogue;
    /// a schema declaring `file_content` goes through side-channel
    /// acquisition; model-supplied values are kept as-is; every remaining
    /// missing parameter is solicited one at a time.
    pub fn resolve(
        &self,
        schema: &ToolSchema,
        supplied: Option<Map<String, Value>>,
    ) -> Result<ConfiguredTool, ResolveError> {
        if schema.parameters.is_empty() {
            debug!(tool = %schema.name, "Auto-configured zero-parameter tool");
            return Ok(ConfiguredTool::new(schema.name.clone(), Map::new()));
        }

        let mut parameters = supplied.unwrap_or_default();

        if schema.parameter(FILE_CONTENT_PARAM).is_some() {
            self.acquire_file(schema, &mut parameters)?;
        }

        for spec in &schema.parameters {
            if parameters.contains_key(&spec.name) {
                continue;
            }
            if let Some(value) = self.solicit(schema, spec)? {
                parameters.insert(spec.name.clone(), value);
            }
        }

        info!(tool = %schema.name, parameters = parameters.len(), "Tool configured");
        Ok(ConfiguredTool::new(schema.name.clone(), parameters))
    }

    /// Reads a user-named local file and embeds its bytes as Base64 text,
    /// so any byte sequence survives the round-trip into the artifact.
    fn acquire_file(
        &self,
        schema: &ToolSchema,
        parameters: &mut Map<String, Value>,
    ) -> Result<(), ResolveError> {
        let display_name = parameters
            .get(FILE_NAME_PARAM)
            .and_then(Value::as_str)
            .unwrap_or("document.txt")
            .to_string();

        let answer = self
            .prompts
            .prompt(&format!("Provide the local file path for '{display_name}': "))?;
        let path = PathBuf::from(answer.trim().trim_matches(|c| c == '\'' || c == '"'));

        if !path.exists() {
            warn!(tool = %schema.name, path = %path.display(), "Side-channel file missing");
            return Err(ResolveError::FileNotFound { path });
        }
        let bytes = fs::read(&path).map_err(|source| ResolveError::FileRead {
            path: path.clone(),
            source,
        })?;

        let base_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&display_name)
            .to_string();

        parameters.insert(FILE_NAME_PARAM.into(), Value::String(base_name));
        parameters.insert(FILE_CONTENT_PARAM.into(), Value::String(BASE64.encode(&bytes)));
        parameters.insert(ENCODING_PARAM.into(), Value::String(ENCODING_BASE64.into()));
        info!(tool = %schema.name, bytes = bytes.len(), "Embedded local file into configuration");
        Ok(())
    }

    /// Asks the user for one parameter value. An empty answer omits an
    /// optional parameter; a required one gets a single re-prompt before
    /// the tool's configuration fails.
    fn solicit(&self, schema: &ToolSchema, spec: &ParamSpec) -> Result<Option<Value>, ResolveError> {
        let hint = if spec.optional { " (press Enter to skip)" } else { "" };
        let answer = self.prompts.prompt(&format!(
            "Value for `{}` parameter of `{}`{hint}: ",
            spec.name, schema.name
        ))?;
        let answer = answer.trim().to_string();

        if !answer.is_empty() {
            return Ok(Some(coerce(spec.kind, &answer)));
        }
        if spec.optional {
            return Ok(None);
        }

        let retry = self.prompts.prompt(&format!(
            "`{}` is required for `{}`. Please provide a value: ",
            spec.name, schema.name
        ))?;
        let retry = retry.trim().to_string();
        if retry.is_empty() {
            return Err(ResolveError::MissingRequired {
                tool: schema.name.clone(),
                parameter: spec.name.clone(),
            });
        }
        Ok(Some(coerce(spec.kind, &retry)))
    }
}

/// Answers arrive as text; typed parameters are coerced when they parse
/// and kept as strings otherwise.
fn coerce(kind: ParamType, raw: &str) -> Value {
    match kind {
        ParamType::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        ParamType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" => Value::Bool(true),
            "false" | "no" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        ParamType::String | ParamType::Unknown => Value::String(raw.to_string()),
    }
}
