//! Tool descriptors, argument validation and the `add-note` tool.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::providers::notes::NoteStore;

/// Name of the note-adding tool.
pub const ADD_NOTE: &str = "add-note";

/// A tool definition for `listTools`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

impl ToolDefinition {
    /// Field names listed under the schema's `required` key.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    /// Checks that `arguments` is an object carrying every required field as
    /// a non-empty string.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidArgument`] naming the first problem.
    pub fn validate(&self, arguments: &Value) -> Result<(), ProviderError> {
        let Some(args) = arguments.as_object().filter(|a| !a.is_empty()) else {
            return Err(ProviderError::InvalidArgument("Missing arguments".to_string()));
        };

        let missing: Vec<&str> = self
            .required_fields()
            .filter(|field| {
                !args
                    .get(*field)
                    .and_then(Value::as_str)
                    .is_some_and(|s| !s.is_empty())
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::InvalidArgument(format!(
                "Missing {}",
                missing.join(" or ")
            )))
        }
    }
}

/// Content item in a tool call response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// What a tool invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    /// Content returned to the caller.
    pub content: Vec<ToolContent>,
    /// Whether the set of listable resources changed.
    pub resources_changed: bool,
}

/// Every tool this server offers.
#[must_use]
pub fn definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        name: ADD_NOTE.to_string(),
        description: "Add a new note".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "content": {"type": "string"},
            },
            "required": ["name", "content"],
        }),
    }]
}

/// Validates and runs the named tool against `notes`.
///
/// # Errors
///
/// Returns [`ProviderError::InvalidArgument`] for an unknown tool or
/// arguments that do not satisfy its schema.
pub fn invoke(
    notes: &mut NoteStore,
    name: &str,
    arguments: &Value,
) -> Result<ToolOutcome, ProviderError> {
    let definition = definitions()
        .into_iter()
        .find(|d| d.name == name)
        .ok_or_else(|| ProviderError::InvalidArgument(format!("Unknown tool: {name}")))?;

    definition.validate(arguments)?;

    match definition.name.as_str() {
        ADD_NOTE => Ok(add_note(notes, arguments)),
        other => Err(ProviderError::InvalidArgument(format!("Unknown tool: {other}"))),
    }
}

fn add_note(notes: &mut NoteStore, arguments: &Value) -> ToolOutcome {
    // validate() guarantees both fields are non-empty strings
    let name = arguments["name"].as_str().unwrap_or_default();
    let content = arguments["content"].as_str().unwrap_or_default();

    notes.set(name, content);

    ToolOutcome {
        content: vec![ToolContent::Text {
            text: format!("Added note '{name}' with content: {content}"),
        }],
        resources_changed: true,
    }
}
