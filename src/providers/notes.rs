//! In-memory note store.
//!
//! Notes live for the lifetime of the process; a write to an existing name
//! replaces its content in place, so listing order is first-insertion order.

use indexmap::IndexMap;

use crate::error::ProviderError;
use crate::providers::resources::{build_uri, Resource, ResourceContents, ResourceUri, TEXT_PLAIN};

/// URI scheme of note resources.
pub const SCHEME: &str = "note";

/// Host component of every note URI.
pub const HOST: &str = "internal";

/// Name and content of the note seeded into an empty store on request.
pub const EXAMPLE_NOTE: (&str, &str) = ("example", "This is an example note.");

/// Notes keyed by name.
#[derive(Debug, Clone, Default)]
pub struct NoteStore {
    notes: IndexMap<String, String>,
}

impl NoteStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the content stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.notes.get(name).map(String::as_str)
    }

    /// Stores `content` under `name`, replacing any previous content.
    pub fn set(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.notes.insert(name.into(), content.into());
    }

    /// Note names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.notes.keys().map(String::as_str)
    }

    /// `(name, content)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.notes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of stored notes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Whether the store holds no notes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// One resource per note.
    #[must_use]
    pub fn resources(&self) -> Vec<Resource> {
        self.keys()
            .map(|name| Resource {
                uri: uri_for(name),
                name: format!("Note: {name}"),
                description: format!("A simple note named {name}"),
                mime_type: TEXT_PLAIN.to_string(),
            })
            .collect()
    }

    /// Resolves a `note://` URI to the note's content.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] if no note has that name.
    pub fn read(&self, uri: &ResourceUri) -> Result<ResourceContents, ProviderError> {
        let name = uri.path_name()?;
        let text = self
            .get(&name)
            .ok_or_else(|| ProviderError::NotFound(format!("Note not found: {name}")))?;

        Ok(ResourceContents {
            uri: uri.raw.clone(),
            mime_type: TEXT_PLAIN.to_string(),
            text: text.to_string(),
        })
    }
}

/// The URI under which a note is listed.
#[must_use]
pub fn uri_for(name: &str) -> String {
    build_uri(SCHEME, HOST, &[name])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins_and_order_is_stable() {
        let mut store = NoteStore::new();
        store.set("b", "one");
        store.set("a", "two");
        store.set("b", "three");

        assert_eq!(store.get("b"), Some("three"));
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn resources_describe_each_note() {
        let mut store = NoteStore::new();
        store.set("todo", "milk");

        let resources = store.resources();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].uri, "note://internal/todo");
        assert_eq!(resources[0].name, "Note: todo");
        assert_eq!(resources[0].description, "A simple note named todo");
        assert_eq!(resources[0].mime_type, "text/plain");
    }

    #[test]
    fn read_resolves_listed_uri() {
        let mut store = NoteStore::new();
        store.set("my note", "hello");

        let uri = ResourceUri::parse(&uri_for("my note")).unwrap();
        assert_eq!(store.read(&uri).unwrap().text, "hello");
    }

    #[test]
    fn read_missing_note_fails() {
        let store = NoteStore::new();
        let uri = ResourceUri::parse("note://internal/ghost").unwrap();
        let err = store.read(&uri).unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert_eq!(err.to_string(), "Note not found: ghost");
    }
}
