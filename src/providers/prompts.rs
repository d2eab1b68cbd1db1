//! Prompt descriptors and the `summarize-notes` template.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::ProviderError;
use crate::providers::notes::NoteStore;
use crate::providers::tools::ToolContent;

/// Name of the note summary prompt.
pub const SUMMARIZE_NOTES: &str = "summarize-notes";

/// A prompt definition for `listPrompts`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptDefinition {
    /// Unique prompt name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Arguments the prompt accepts.
    pub arguments: Vec<PromptArgument>,
}

/// One argument of a prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the caller must supply it.
    pub required: bool,
}

/// A rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    /// Speaker role, always `user` here.
    pub role: String,
    /// Message body.
    pub content: ToolContent,
}

/// The result of `getPrompt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptResult {
    /// Human-readable description of the rendered prompt.
    pub description: String,
    /// Rendered messages.
    pub messages: Vec<PromptMessage>,
}

/// Every prompt this server offers.
#[must_use]
pub fn definitions() -> Vec<PromptDefinition> {
    vec![PromptDefinition {
        name: SUMMARIZE_NOTES.to_string(),
        description: "Creates a summary of all notes".to_string(),
        arguments: vec![PromptArgument {
            name: "style".to_string(),
            description: "Style of the summary (brief/detailed)".to_string(),
            required: false,
        }],
    }]
}

/// Renders the named prompt against the current notes.
///
/// # Errors
///
/// Returns [`ProviderError::NotFound`] for an unknown prompt.
pub fn render(
    notes: &NoteStore,
    name: &str,
    arguments: &HashMap<String, String>,
) -> Result<PromptResult, ProviderError> {
    if name != SUMMARIZE_NOTES {
        return Err(ProviderError::NotFound(format!("Unknown prompt: {name}")));
    }

    let style = arguments.get("style").map_or("brief", String::as_str);
    let detail = if style == "detailed" {
        " Give extensive details."
    } else {
        ""
    };

    let listing = notes
        .iter()
        .map(|(name, content)| format!("- {name}: {content}"))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(PromptResult {
        description: "Summarize the current notes".to_string(),
        messages: vec![PromptMessage {
            role: "user".to_string(),
            content: ToolContent::Text {
                text: format!("Here are the current notes to summarize:{detail}\n\n{listing}"),
            },
        }],
    })
}
