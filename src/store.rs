//! Key-value storage for retrieved artifacts.
//!
//! Artifacts are JSON documents keyed by [`ArtifactKey`]. The file-backed store lays them
//! out as `<dir>/pulls.json`, `<dir>/<number>/commits.json` and so on, so a fetched snapshot
//! can be inspected or edited by hand. A missing or unreadable artifact is reported as
//! absence by [`ArtifactStore::get`], never as an error.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKey {
    Pulls,
    ReleaseCommits,
    FirstCommit(u64),
    ReviewComments(u64),
    Reviews(u64),
}

impl ArtifactKey {
    /// Location of the artifact relative to the store root.
    pub fn relative_path(&self) -> PathBuf {
        match self {
            ArtifactKey::Pulls => PathBuf::from("pulls.json"),
            ArtifactKey::ReleaseCommits => PathBuf::from("release-commits.json"),
            ArtifactKey::FirstCommit(number) => Path::new(&number.to_string()).join("commits.json"),
            ArtifactKey::ReviewComments(number) => {
                Path::new(&number.to_string()).join("review-comments.json")
            }
            ArtifactKey::Reviews(number) => Path::new(&number.to_string()).join("reviews.json"),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relative_path().display())
    }
}

pub trait ArtifactStore: Send + Sync {
    /// Returns the raw artifact, or `None` if it was never stored.
    fn read(&self, key: &ArtifactKey) -> Result<Option<String>>;

    fn write(&self, key: &ArtifactKey, contents: &str) -> Result<()>;

    /// Loads and decodes an artifact. Missing, unreadable and malformed artifacts all
    /// come back as `None`.
    fn get<T>(&self, key: &ArtifactKey) -> Option<T>
    where
        T: DeserializeOwned,
        Self: Sized,
    {
        let contents = match self.read(key) {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                tracing::debug!(%key, "Artifact not found");
                return None;
            }
            Err(e) => {
                tracing::warn!(%key, "Failed to read artifact: {:#}", e);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(%key, "Ignoring malformed artifact: {}", e);
                None
            }
        }
    }

    fn put<T>(&self, key: &ArtifactKey, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
        Self: Sized,
    {
        let contents = serde_json::to_string_pretty(value)
            .with_context(|| format!("failed to encode artifact {key}"))?;
        self.write(key, &contents)
    }
}

/// Stores artifacts as JSON files under a root directory.
#[derive(Clone, Debug)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &ArtifactKey) -> PathBuf {
        self.dir.join(key.relative_path())
    }
}

impl ArtifactStore for FileArtifactStore {
    fn read(&self, key: &ArtifactKey) -> Result<Option<String>> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn write(&self, key: &ArtifactKey, contents: &str) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Keeps artifacts in process memory.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<HashMap<ArtifactKey, String>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().map(|a| a.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn read(&self, key: &ArtifactKey) -> Result<Option<String>> {
        let artifacts = self
            .artifacts
            .read()
            .map_err(|_| anyhow::anyhow!("artifact store lock poisoned"))?;
        Ok(artifacts.get(key).cloned())
    }

    fn write(&self, key: &ArtifactKey, contents: &str) -> Result<()> {
        let mut artifacts = self
            .artifacts
            .write()
            .map_err(|_| anyhow::anyhow!("artifact store lock poisoned"))?;
        artifacts.insert(*key, contents.to_string());
        Ok(())
    }
}
