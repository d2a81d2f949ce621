//! The closed set of tool blueprints the builder knows at startup.
//!
//! Tools are metadata-only here: the builder configures them for a target
//! agent, it never runs their business logic.

use crate::domain::schema::{ParamDecl, ToolDeclaration, TypeAnnotation};

/// Terminal tool: requesting it ends an open-ended session and triggers
/// artifact assembly. Never part of a plan.
pub const FINALIZE_TOOL: &str = "finalize_configuration";

pub fn declarations() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration::new("business_object")
            .with_doc("Access a business object within the Fusion OpenAPI spec using a given link name.")
            .with_param(ParamDecl::new("link_name", TypeAnnotation::Str)),
        ToolDeclaration::new("external_rest")
            .with_doc("Connect to an external REST API. An authentication token is optional.")
            .with_param(ParamDecl::new("url", TypeAnnotation::Str))
            .with_param(
                ParamDecl::new("auth_token", TypeAnnotation::optional(TypeAnnotation::Str))
                    .with_default(),
            ),
        ToolDeclaration::new("document_tool")
            .with_doc("Upload a document for grounding or Q&A.\nThe builder asks the user for a local file path to obtain the content.")
            .with_param(ParamDecl::new("file_name", TypeAnnotation::Str))
            .with_param(ParamDecl::new("file_content", TypeAnnotation::Str).with_default()),
        ToolDeclaration::new("deeplink_tool")
            .with_doc("Create a Fusion deeplink for a specific resource type and ID.")
            .with_param(ParamDecl::new("resource_type", TypeAnnotation::Str))
            .with_param(ParamDecl::new("resource_id", TypeAnnotation::Str)),
        ToolDeclaration::new("calculator_tool")
            .with_doc("Perform a basic math calculation. Example: '(100 + 50) / 2'")
            .with_param(ParamDecl::new("expression", TypeAnnotation::Str)),
        ToolDeclaration::new("email_tool")
            .with_doc("Send an email to a specified recipient with optional subject and body.")
            .with_param(ParamDecl::new("recipient", TypeAnnotation::Str))
            .with_param(ParamDecl::new("subject", TypeAnnotation::Str).with_default())
            .with_param(ParamDecl::new("body", TypeAnnotation::Str).with_default()),
        ToolDeclaration::new("user_context_tool")
            .with_doc("Get information about the current user, such as ID, role, and department."),
        ToolDeclaration::new("topic_creator")
            .with_doc("Create a new discussion topic for the agent.")
            .with_param(ParamDecl::new("topic_name", TypeAnnotation::Str))
            .with_param(ParamDecl::new("description", TypeAnnotation::Str)),
        ToolDeclaration::new("list_uploaded_documents")
            .with_doc("List all documents that have been previously uploaded."),
        ToolDeclaration::new(FINALIZE_TOOL)
            .with_doc("Generate the final configuration for the new agent.\nCall only when the user has finished adding tools.")
            .with_param(ParamDecl::new("agent_name", TypeAnnotation::Str))
            .with_param(ParamDecl::new("description", TypeAnnotation::Str)),
    ]
}
