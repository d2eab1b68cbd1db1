//! Resource, tool and prompt providers.
//!
//! The dispatcher only sees the three narrow traits below. [`Workspace`] is
//! the one implementation shipped with the server: an in-memory note store,
//! optionally joined by a directory of files and a MySQL database.
//!
//! | Scheme | Source |
//! |--------|--------|
//! | `note://internal/<name>` | [`notes::NoteStore`] |
//! | `file://local/<name>` | [`files::FileSource`] |
//! | `mysql://<host>/<db>/<table>` | [`database::DatabaseSource`] |

pub mod database;
pub mod files;
pub mod notes;
pub mod prompts;
pub mod resources;
pub mod tools;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::ProviderError;

pub use database::DatabaseSource;
pub use files::FileSource;
pub use notes::NoteStore;
pub use prompts::{PromptDefinition, PromptResult};
pub use resources::{Resource, ResourceContents, ResourceUri};
pub use tools::{ToolContent, ToolDefinition, ToolOutcome};

/// Lists and reads URI-addressed resources.
#[async_trait]
pub trait ResourceProvider: Send {
    /// Every resource currently available, computed from live state.
    async fn list_resources(&mut self) -> Vec<Resource>;

    /// Reads one resource.
    ///
    /// # Errors
    ///
    /// [`ProviderError::NotFound`] for an unknown resource,
    /// [`ProviderError::Unsupported`] for a scheme nobody serves.
    async fn read_resource(&mut self, uri: &str) -> Result<ResourceContents, ProviderError>;
}

/// Describes and invokes tools.
pub trait ToolProvider {
    /// Every tool on offer.
    fn list_tools(&self) -> Vec<ToolDefinition>;

    /// Runs a tool.
    ///
    /// # Errors
    ///
    /// [`ProviderError::InvalidArgument`] for an unknown tool or arguments
    /// missing a required field.
    fn call_tool(&mut self, name: &str, arguments: &Value) -> Result<ToolOutcome, ProviderError>;
}

/// Describes and renders prompt templates.
pub trait PromptProvider {
    /// Every prompt on offer.
    fn list_prompts(&self) -> Vec<PromptDefinition>;

    /// Renders a prompt against current state.
    ///
    /// # Errors
    ///
    /// [`ProviderError::NotFound`] for an unknown prompt.
    fn get_prompt(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
    ) -> Result<PromptResult, ProviderError>;
}

/// Everything the dispatcher needs from its collaborators.
pub trait Providers: ResourceProvider + ToolProvider + PromptProvider {}

impl<T: ResourceProvider + ToolProvider + PromptProvider> Providers for T {}

/// The server's owned state.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    notes: NoteStore,
    files: Option<FileSource>,
    database: Option<DatabaseSource>,
    seed_example_note: bool,
}

impl Workspace {
    /// A workspace serving notes only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the workspace described by `config`.
    ///
    /// # Panics
    ///
    /// If a database is configured this must run inside a Tokio runtime; see
    /// [`DatabaseSource::new`].
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut workspace = Self::new().with_example_note(config.resources.seed_example_note);
        if let Some(dir) = &config.resources.files_dir {
            workspace = workspace.with_files(FileSource::new(dir));
        }
        if let Some(db) = &config.database {
            workspace = workspace.with_database(DatabaseSource::new(db));
        }
        workspace
    }

    /// Adds a directory of file resources.
    #[must_use]
    pub fn with_files(mut self, files: FileSource) -> Self {
        self.files = Some(files);
        self
    }

    /// Adds database table resources.
    #[must_use]
    pub fn with_database(mut self, database: DatabaseSource) -> Self {
        self.database = Some(database);
        self
    }

    /// Seeds the example note on the first listing of an empty store.
    #[must_use]
    pub const fn with_example_note(mut self, seed: bool) -> Self {
        self.seed_example_note = seed;
        self
    }

    /// The note store.
    #[must_use]
    pub const fn notes(&self) -> &NoteStore {
        &self.notes
    }

    /// The note store, mutably.
    pub fn notes_mut(&mut self) -> &mut NoteStore {
        &mut self.notes
    }
}

#[async_trait]
impl ResourceProvider for Workspace {
    async fn list_resources(&mut self) -> Vec<Resource> {
        if self.seed_example_note && self.notes.is_empty() {
            let (name, content) = notes::EXAMPLE_NOTE;
            debug!(name, "Seeding example note");
            self.notes.set(name, content);
        }
        // Only seed once, even if the store is later observed empty again
        self.seed_example_note = false;

        let mut resources = self.notes.resources();
        if let Some(files) = &self.files {
            resources.extend(files.resources().await);
        }
        if let Some(database) = &self.database {
            resources.extend(database.resources().await);
        }
        resources
    }

    async fn read_resource(&mut self, uri: &str) -> Result<ResourceContents, ProviderError> {
        let uri = ResourceUri::parse(uri)?;
        let unsupported =
            || ProviderError::Unsupported(format!("Unsupported URI scheme: {}", uri.scheme));

        match uri.scheme.as_str() {
            notes::SCHEME => self.notes.read(&uri),
            files::SCHEME => match &self.files {
                Some(files) => files.read(&uri).await,
                None => Err(unsupported()),
            },
            database::SCHEME => match &self.database {
                Some(database) => database.read(&uri).await,
                None => Err(unsupported()),
            },
            _ => Err(unsupported()),
        }
    }
}

impl ToolProvider for Workspace {
    fn list_tools(&self) -> Vec<ToolDefinition> {
        tools::definitions()
    }

    fn call_tool(&mut self, name: &str, arguments: &Value) -> Result<ToolOutcome, ProviderError> {
        tools::invoke(&mut self.notes, name, arguments)
    }
}

impl PromptProvider for Workspace {
    fn list_prompts(&self) -> Vec<PromptDefinition> {
        prompts::definitions()
    }

    fn get_prompt(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
    ) -> Result<PromptResult, ProviderError> {
        prompts::render(&self.notes, name, arguments)
    }
}
