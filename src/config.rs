//! Application configuration and environment variable parsing.
//!
//! This module handles loading configuration settings from the environment (e.g., .env file).
//! It defines the `AppConfig` struct which governs where artifacts are stored, which branch
//! counts as "released", and how hard the acquisition layer may hit the GitHub API.

use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    /// The owner of the repository (e.g., "facebook").
    pub owner: String,
    /// The name of the repository (e.g., "react").
    pub repo: String,
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoId {
    type Err = anyhow::Error;

    /// Parses an `owner/repo` pair.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.len() != 2 {
            bail!("expected repository in owner/repo form, got '{s}'");
        }

        let owner = parts[0].trim();
        let repo = parts[1].trim();
        if owner.is_empty() || repo.is_empty() {
            return Err(anyhow!("repository owner and name must not be empty: '{s}'"));
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Optional GitHub Personal Access Token for higher rate limits and private repositories.
    pub github_token: Option<String>,

    /// Repository to analyze, in "owner/repo" form. Can be overridden on the command line.
    #[serde(default, deserialize_with = "deserialize_repository")]
    pub github_repository: Option<RepoId>,

    /// Root directory of the on-disk artifact store.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Branch whose commit history is treated as "what shipped".
    #[serde(default = "default_release_branch")]
    pub release_branch: String,

    /// Hard limit on the number of paginated requests to make to the GitHub API per listing.
    #[serde(default = "default_max_pages")]
    pub max_github_api_pages: u32,

    /// Maximum number of pull requests whose artifacts are fetched concurrently.
    #[serde(default = "default_concurrency_limit")]
    pub fetch_concurrency_limit: usize,
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("json")
}

fn default_release_branch() -> String {
    "release".to_string()
}

fn default_max_pages() -> u32 {
    50
}

fn default_concurrency_limit() -> usize {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            github_repository: None,
            artifact_dir: default_artifact_dir(),
            release_branch: default_release_branch(),
            max_github_api_pages: default_max_pages(),
            fetch_concurrency_limit: default_concurrency_limit(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Returns the configured repository or an error explaining how to provide one.
    pub fn repository(&self) -> anyhow::Result<&RepoId> {
        self.github_repository.as_ref().ok_or_else(|| {
            anyhow!("no repository given; pass --repo owner/repo or set GITHUB_REPOSITORY")
        })
    }
}

fn deserialize_repository<'de, D>(deserializer: D) -> Result<Option<RepoId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    match s {
        Some(s) if !s.trim().is_empty() => s.parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
