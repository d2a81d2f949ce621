use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One fully configured tool: resolved parameter values keyed by
/// parameter name. Appended to a session's configured list only once
/// every required parameter is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredTool {
    pub tool_name: String,
    pub parameters: Map<String, Value>,
}

impl ConfiguredTool {
    pub fn new(tool_name: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
        }
    }
}

/// Terminal output of a build session. The JSON shape is the durable
/// contract consumed downstream; immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationArtifact {
    pub agent_name: String,
    pub description: String,
    pub topic: String,
    pub tools: Vec<ConfiguredTool>,
}

impl ConfigurationArtifact {
    /// Conventional output file name, e.g. `Invoice Helper` ->
    /// `invoice_helper_config.json`.
    pub fn file_name(&self) -> String {
        format!("{}_config.json", self.agent_name.replace(' ', "_").to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn artifact_serializes_with_stable_field_names() {
        let mut parameters = Map::new();
        parameters.insert("expression".into(), json!("2+2"));
        let artifact = ConfigurationArtifact {
            agent_name: "Math Helper".into(),
            description: "Does sums".into(),
            topic: "Use the calculator.".into(),
            tools: vec![ConfiguredTool::new("calculator_tool", parameters)],
        };

        let value = serde_json::to_value(&artifact).expect("serializes");
        assert_eq!(value["agent_name"], "Math Helper");
        assert_eq!(value["tools"][0]["tool_name"], "calculator_tool");
        assert_eq!(value["tools"][0]["parameters"]["expression"], "2+2");
    }

    #[test]
    fn file_name_lowercases_and_underscores() {
        let artifact = ConfigurationArtifact {
            agent_name: "Invoice Helper".into(),
            description: String::new(),
            topic: String::new(),
            tools: Vec::new(),
        };
        assert_eq!(artifact.file_name(), "invoice_helper_config.json");
    }
}
