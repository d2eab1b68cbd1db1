//! File resources: every regular file in one directory.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::providers::resources::{build_uri, Resource, ResourceContents, ResourceUri, TEXT_PLAIN};

/// URI scheme of file resources.
pub const SCHEME: &str = "file";

/// Host component of every file URI.
pub const HOST: &str = "local";

/// Lists and reads the files of a single directory (not recursive).
#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    /// Creates a source over `dir`. The directory need not exist yet.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory being served.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// One resource per readable regular file, sorted by name.
    ///
    /// A missing or unreadable directory yields an empty list.
    pub async fn resources(&self) -> Vec<Resource> {
        let names = match self.file_names().await {
            Ok(names) => names,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "Resource directory does not exist");
                return Vec::new();
            }
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to list resource directory");
                return Vec::new();
            }
        };

        names
            .into_iter()
            .map(|name| Resource {
                uri: build_uri(SCHEME, HOST, &[&name]),
                description: format!("A file resource named {name}"),
                name: format!("File: {name}"),
                mime_type: TEXT_PLAIN.to_string(),
            })
            .collect()
    }

    /// Reads a `file://local/<name>` URI as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] if `name` is not a plain file name
    /// of a regular file in the directory, or [`ProviderError::Io`] if the
    /// file cannot be read as text.
    pub async fn read(&self, uri: &ResourceUri) -> Result<ResourceContents, ProviderError> {
        let name = uri.path_name()?;
        let not_found = || ProviderError::NotFound(format!("File not found: {name}"));

        if !is_plain_file_name(&name) {
            return Err(not_found());
        }

        let path = self.dir.join(&name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(not_found()),
        }

        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ProviderError::Io {
                context: format!("Failed to read file {name}"),
                source,
            })?;

        Ok(ResourceContents {
            uri: uri.raw.clone(),
            mime_type: TEXT_PLAIN.to_string(),
            text,
        })
    }

    async fn file_names(&self) -> io::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            // Follows symlinks, like a plain "is this a file" check would
            let is_file = tokio::fs::metadata(entry.path())
                .await
                .is_ok_and(|m| m.is_file());
            if !is_file {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => debug!(name = ?raw, "Skipping non-UTF-8 file name"),
            }
        }

        names.sort();
        Ok(names)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}
