use crate::domain::schema::{ParamSpec, ParamType, ToolSchema, ToolDeclaration};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool metadata source unreachable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("tool metadata response malformed: {0}")]
    Schema(String),
}

/// Wire shape of one remotely served tool record.
#[derive(Debug, Deserialize)]
pub struct ToolMetadataRecord {
    pub tool_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParamRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ParamRecord {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

/// The remote tool-metadata boundary: one fetch returns every record.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<ToolMetadataRecord>, RegistryError>;
}

/// Read-only mapping from tool name to schema, in insertion order.
///
/// Built once per session and shared behind an `Arc`; a reload is a fresh
/// registry swapped in whole, never an in-place mutation, so in-flight
/// sessions keep a consistent snapshot.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    schemas: Vec<ToolSchema>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn from_declarations(declarations: &[ToolDeclaration]) -> Self {
        Self::from_schemas(declarations.iter().map(ToolSchema::from_declaration).collect())
    }

    pub fn from_schemas(schemas: Vec<ToolSchema>) -> Self {
        let index = schemas
            .iter()
            .enumerate()
            .map(|(position, schema)| (schema.name.to_lowercase(), position))
            .collect();
        Self { schemas, index }
    }

    /// Populates the registry from a remote source. An empty record list
    /// is a valid, empty registry; transport and decoding faults surface
    /// as distinct errors.
    pub async fn fetch(source: &dyn SchemaSource) -> Result<Self, RegistryError> {
        let records = source.fetch_all().await?;
        info!(tools = records.len(), "Fetched tool metadata");
        Ok(Self::from_schemas(
            records.iter().map(record_to_schema).collect(),
        ))
    }

    pub fn get(&self, name: &str) -> Option<&ToolSchema> {
        self.index
            .get(&name.to_lowercase())
            .map(|&position| &self.schemas[position])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(|schema| schema.name.as_str())
    }

    pub fn schemas(&self) -> &[ToolSchema] {
        &self.schemas
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Comma-joined tool names in insertion order; grounding prompts built
    /// from the same snapshot are reproducible within a session.
    pub fn prompt_listing(&self) -> String {
        self.names().collect::<Vec<_>>().join(", ")
    }
}

fn record_to_schema(record: &ToolMetadataRecord) -> ToolSchema {
    let description = record
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            debug!(tool = %record.tool_name, "Record lacks a description; generating one");
            format!("A tool for {}.", record.tool_name.replace(['_', '-'], " "))
        });

    ToolSchema {
        name: record.tool_name.clone(),
        description,
        parameters: record
            .parameters
            .iter()
            .map(|param| ParamSpec {
                name: param.name.clone(),
                kind: param
                    .kind
                    .as_deref()
                    .map(ParamType::from_wire)
                    .unwrap_or(ParamType::Unknown),
                optional: param.optional,
            })
            .collect(),
    }
}
