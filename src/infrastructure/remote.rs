use crate::application::registry::{RegistryError, SchemaSource, ToolMetadataRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ToolsMetadataResponse {
    #[serde(default)]
    tools: Vec<ToolMetadataRecord>,
}

/// Fetches tool metadata from a definitions server. Transport faults are
/// `Unavailable`; a response that does not decode is `Schema`.
pub struct HttpSchemaSource {
    http: Client,
    base_url: String,
}

impl HttpSchemaSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RegistryError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| RegistryError::Unavailable(Box::new(source)))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

#[async_trait]
impl SchemaSource for HttpSchemaSource {
    async fn fetch_all(&self) -> Result<Vec<ToolMetadataRecord>, RegistryError> {
        let url = self.endpoint("/get-tools-metadata");
        info!(url = %url, "Fetching tool metadata");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| RegistryError::Unavailable(Box::new(source)))?;

        let body = response
            .text()
            .await
            .map_err(|source| RegistryError::Unavailable(Box::new(source)))?;

        let parsed: ToolsMetadataResponse = serde_json::from_str(&body)
            .map_err(|source| RegistryError::Schema(source.to_string()))?;
        debug!(tools = parsed.tools.len(), "Tool metadata decoded");
        Ok(parsed.tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_paths_correctly() {
        let source = HttpSchemaSource::new("http://localhost:8001/", Duration::from_secs(5))
            .expect("client builds");
        assert_eq!(
            source.endpoint("/get-tools-metadata"),
            "http://localhost:8001/get-tools-metadata"
        );
    }

    #[test]
    fn malformed_body_is_a_schema_error() {
        let parsed = serde_json::from_str::<ToolsMetadataResponse>("{\"tools\": \"oops\"}")
            .map_err(|source| RegistryError::Schema(source.to_string()));
        assert!(matches!(parsed, Err(RegistryError::Schema(_))));
    }

    #[test]
    fn missing_tools_field_decodes_as_empty() {
        let parsed: ToolsMetadataResponse = serde_json::from_str("{}").expect("decodes");
        assert!(parsed.tools.is_empty());
    }
}
