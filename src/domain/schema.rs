//! Tool schemas and their derivation from declared tool interfaces.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Unknown,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Unknown => "unknown",
        }
    }

    /// Maps a wire-level type label onto a semantic type. Anything
    /// unrecognized degrades to `Unknown` rather than erroring.
    pub fn from_wire(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "str" | "string" => ParamType::String,
            "int" | "integer" | "float" | "number" => ParamType::Number,
            "bool" | "boolean" => ParamType::Boolean,
            _ => ParamType::Unknown,
        }
    }
}

/// A declared type annotation on a tool parameter. An optional wrapper
/// marks the parameter as omittable while the schema keeps the inner type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeAnnotation {
    Str,
    Number,
    Bool,
    Optional(Box<TypeAnnotation>),
}

impl TypeAnnotation {
    pub fn optional(inner: TypeAnnotation) -> Self {
        TypeAnnotation::Optional(Box::new(inner))
    }

    fn resolve(&self) -> (ParamType, bool) {
        match self {
            TypeAnnotation::Str => (ParamType::String, false),
            TypeAnnotation::Number => (ParamType::Number, false),
            TypeAnnotation::Bool => (ParamType::Boolean, false),
            TypeAnnotation::Optional(inner) => {
                let (kind, _) = inner.resolve();
                (kind, true)
            }
        }
    }
}

/// Raw declaration of a single tool parameter, before extraction.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub annotation: Option<TypeAnnotation>,
    pub has_default: bool,
}

impl ParamDecl {
    pub fn new(name: impl Into<String>, annotation: TypeAnnotation) -> Self {
        Self {
            name: name.into(),
            annotation: Some(annotation),
            has_default: false,
        }
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

/// Raw declaration of a callable tool: a name, a documentation string,
/// and a typed parameter list. The registry turns these into schemas.
#[derive(Debug, Clone)]
pub struct ToolDeclaration {
    pub name: String,
    pub doc: Option<String>,
    pub params: Vec<ParamDecl>,
}

impl ToolDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            params: Vec::new(),
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    pub optional: bool,
}

impl ParamSpec {
    fn from_decl(decl: &ParamDecl) -> Self {
        let (kind, wrapped_optional) = match &decl.annotation {
            Some(annotation) => annotation.resolve(),
            None => (ParamType::Unknown, false),
        };
        Self {
            name: decl.name.clone(),
            kind,
            optional: wrapped_optional || decl.has_default,
        }
    }
}

/// Canonical description of a tool: unique name, human description, and
/// the ordered parameter list. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

impl ToolSchema {
    /// Pure metadata derivation: the description is the first non-empty
    /// line of the doc string, falling back to a generated sentence.
    pub fn from_declaration(decl: &ToolDeclaration) -> Self {
        let description = decl
            .doc
            .as_deref()
            .and_then(first_doc_line)
            .unwrap_or_else(|| fallback_description(&decl.name));

        Self {
            name: decl.name.clone(),
            description,
            parameters: decl.params.iter().map(ParamSpec::from_decl).collect(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &ParamSpec> {
        self.parameters.iter().filter(|p| !p.optional)
    }

    /// One listing line for grounding prompts, e.g.
    /// `- email_tool (Send an email.) Parameters: [recipient:string]`.
    pub fn listing_line(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| format!("{}:{}", p.name, p.kind.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "- {} ({}) Parameters: [{params}]",
            self.name, self.description
        )
    }
}

fn first_doc_line(doc: &str) -> Option<String> {
    doc.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn fallback_description(name: &str) -> String {
    format!("A tool for {}.", name.replace(['_', '-'], " "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_is_first_doc_line() {
        let decl = ToolDeclaration::new("email_tool")
            .with_doc("Send an email to a specified recipient.\nExample: email_tool(..)")
            .with_param(ParamDecl::new("recipient", TypeAnnotation::Str));

        let schema = ToolSchema::from_declaration(&decl);
        assert_eq!(schema.description, "Send an email to a specified recipient.");
    }

    #[test]
    fn missing_doc_generates_fallback_description() {
        let schema = ToolSchema::from_declaration(&ToolDeclaration::new("user_context_tool"));
        assert_eq!(schema.description, "A tool for user context tool.");
    }

    #[test]
    fn blank_doc_generates_fallback_description() {
        let schema =
            ToolSchema::from_declaration(&ToolDeclaration::new("deeplink-tool").with_doc("  \n "));
        assert_eq!(schema.description, "A tool for deeplink tool.");
    }

    #[test]
    fn optional_wrapper_collapses_to_inner_type() {
        let decl = ToolDeclaration::new("external_rest")
            .with_param(ParamDecl::new("url", TypeAnnotation::Str))
            .with_param(
                ParamDecl::new("auth_token", TypeAnnotation::optional(TypeAnnotation::Str))
                    .with_default(),
            );

        let schema = ToolSchema::from_declaration(&decl);
        let token = schema.parameter("auth_token").expect("declared");
        assert_eq!(token.kind, ParamType::String);
        assert!(token.optional);
        assert!(!schema.parameter("url").expect("declared").optional);
    }

    #[test]
    fn default_value_marks_optional_without_wrapper() {
        let decl = ToolDeclaration::new("email_tool")
            .with_param(ParamDecl::new("subject", TypeAnnotation::Str).with_default());

        let schema = ToolSchema::from_declaration(&decl);
        assert!(schema.parameter("subject").expect("declared").optional);
    }

    #[test]
    fn unannotated_parameter_degrades_to_unknown() {
        let decl = ToolDeclaration::new("mystery").with_param(ParamDecl {
            name: "blob".into(),
            annotation: None,
            has_default: false,
        });
        let schema = ToolSchema::from_declaration(&decl);
        assert_eq!(schema.parameter("blob").expect("declared").kind, ParamType::Unknown);
    }

    #[test]
    fn wire_labels_map_onto_semantic_types() {
        assert_eq!(ParamType::from_wire("str"), ParamType::String);
        assert_eq!(ParamType::from_wire(" Int "), ParamType::Number);
        assert_eq!(ParamType::from_wire("bool"), ParamType::Boolean);
        assert_eq!(ParamType::from_wire("bytes"), ParamType::Unknown);
    }

    #[test]
    fn listing_line_includes_parameters() {
        let decl = ToolDeclaration::new("deeplink_tool")
            .with_doc("Create a deeplink.")
            .with_param(ParamDecl::new("resource_type", TypeAnnotation::Str))
            .with_param(ParamDecl::new("resource_id", TypeAnnotation::Str));

        let schema = ToolSchema::from_declaration(&decl);
        assert_eq!(
            schema.listing_line(),
            "- deeplink_tool (Create a deeplink.) Parameters: [resource_type:string, resource_id:string]"
        );
    }
}
