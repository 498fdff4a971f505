//! JSON-file tag repository.
//!
//! # Responsibility
//! - Keep each namespace as one JSON array file, the key-value layout the
//!   web client uses for its local storage.
//!
//! # Invariants
//! - A missing file reads as an empty collection.
//! - Writes go to a sibling temp file first and are renamed into place, so a
//!   crash never leaves a truncated collection behind.
//! - Namespaces are restricted to `[A-Za-z0-9._-]` and may not start with a
//!   dot, so they cannot escape the base directory.

use crate::model::tag::Tag;
use crate::repo::tag_repo::{
    normalize_namespace, NamespaceSummary, RepoError, RepoResult, TagRepository,
};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File-per-namespace repository.
#[derive(Debug, Clone)]
pub struct JsonFileTagRepository {
    path: PathBuf,
    temp_path: PathBuf,
}

impl JsonFileTagRepository {
    /// Binds `namespace` under `base_dir`. The directory is created lazily
    /// on first write.
    pub fn new(base_dir: impl AsRef<Path>, namespace: impl Into<String>) -> RepoResult<Self> {
        let namespace = normalize_namespace(namespace.into())?;
        if !is_file_safe(&namespace) {
            return Err(RepoError::InvalidNamespace(namespace));
        }

        let base_dir = base_dir.as_ref();
        Ok(Self {
            path: base_dir.join(format!("{namespace}.json")),
            temp_path: base_dir.join(format!("{namespace}.json.tmp")),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lists the namespaces under `base_dir` holding at least one tag,
    /// ordered by name.
    ///
    /// A missing directory lists nothing. Temp files and names that could
    /// not have been written by this repository are ignored.
    pub fn list_namespaces(base_dir: impl AsRef<Path>) -> RepoResult<Vec<NamespaceSummary>> {
        let entries = match fs::read_dir(base_dir.as_ref()) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut namespaces = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(namespace) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(".json"))
                .filter(|name| !name.is_empty() && is_file_safe(name))
            else {
                continue;
            };

            let tags: Vec<Tag> = serde_json::from_slice(&fs::read(entry.path())?)?;
            if tags.is_empty() {
                continue;
            }
            namespaces.push(NamespaceSummary {
                namespace: namespace.to_string(),
                tag_count: tags.len(),
            });
        }

        namespaces.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        Ok(namespaces)
    }
}

impl TagRepository for JsonFileTagRepository {
    fn load_tags(&self) -> RepoResult<Vec<Tag>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn replace_tags(&mut self, tags: &[Tag]) -> RepoResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let payload = serde_json::to_vec(tags)?;
        fs::write(&self.temp_path, payload)?;
        fs::rename(&self.temp_path, &self.path)?;
        Ok(())
    }
}

fn is_file_safe(namespace: &str) -> bool {
    !namespace.starts_with('.')
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
