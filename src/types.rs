//! Normalized records exchanged between the acquisition layer and the metrics core.
//!
//! These are the shapes persisted in the artifact store. Upstream API payloads are
//! translated into them by [`crate::github`]; nothing downstream depends on GitHub's
//! own JSON layout. Timestamps are kept as the strings that were recorded so that
//! malformed or missing values can be tolerated by [`crate::timestamp::normalize`].

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::timestamp;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PRState {
    #[default]
    Open,
    Closed,
}

impl fmt::Display for PRState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PRState::Open => f.write_str("open"),
            PRState::Closed => f.write_str("closed"),
        }
    }
}

/// A pull request as recorded by the acquisition layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: PRState,
    /// Target branch name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub base_ref: String,
    /// Name of the repository the head branch lives in.
    #[serde(default)]
    pub head_repo_name: Option<String>,
    #[serde(default)]
    pub author_login: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub merged_at: Option<String>,
    /// Present only once merged.
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
}

/// Reads a JSON `null` the same way as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.merged_at.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
    #[serde(default)]
    pub authored_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Picks the earliest review comment by instant. Comments with unparsable timestamps
/// only win when nothing else is available.
pub fn earliest_review_comment(comments: &[ReviewComment]) -> Option<&ReviewComment> {
    comments
        .iter()
        .min_by_key(|c| match timestamp::normalize(c.created_at.as_deref()) {
            Some(at) => (false, Some(at)),
            None => (true, None),
        })
}

/// A per-PR artifact as it may appear on disk: a single record, `null`, or the list
/// a paginated request returned.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Recorded<T> {
    Many(Vec<T>),
    One(Option<T>),
}

impl<T> Recorded<T> {
    /// The single record, or the first element of a list.
    pub fn into_first(self) -> Option<T> {
        match self {
            Recorded::Many(items) => items.into_iter().next(),
            Recorded::One(item) => item,
        }
    }
}

impl Recorded<ReviewComment> {
    /// The single record, or the earliest comment of a list.
    pub fn into_earliest(self) -> Option<ReviewComment> {
        match self {
            Recorded::Many(comments) => earliest_review_comment(&comments).cloned(),
            Recorded::One(comment) => comment,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub reviewer: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

/// Commit sha to authored date for the full history of one branch, captured at a
/// point in time. The snapshot is not refreshed, so rebases or force pushes after
/// the fetch are not reflected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseCommitIndex(HashMap<String, String>);

impl ReleaseCommitIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sha: impl Into<String>, authored_at: impl Into<String>) {
        self.0.insert(sha.into(), authored_at.into());
    }

    pub fn contains(&self, sha: &str) -> bool {
        self.0.contains_key(sha)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(created_at: Option<&str>) -> ReviewComment {
        ReviewComment {
            created_at: created_at.map(str::to_string),
        }
    }

    #[test]
    fn test_earliest_review_comment() {
        let comments = vec![
            comment(Some("2024-01-05T10:00:00Z")),
            comment(None),
            comment(Some("2024-01-03T09:30:00Z")),
            comment(Some("garbage")),
        ];

        let first = earliest_review_comment(&comments).unwrap();
        assert_eq!(first.created_at.as_deref(), Some("2024-01-03T09:30:00Z"));
    }

    #[test]
    fn test_earliest_review_comment_empty() {
        assert!(earliest_review_comment(&[]).is_none());

        let only_bad = vec![comment(Some("garbage"))];
        assert_eq!(earliest_review_comment(&only_bad), Some(&only_bad[0]));
    }

    #[test]
    fn test_pull_request_tolerates_sparse_json() {
        let pr: PullRequest = serde_json::from_str(r#"{"number": 42}"#).unwrap();
        assert_eq!(pr.number, 42);
        assert_eq!(pr.state, PRState::Open);
        assert!(pr.merged_at.is_none());
        assert!(!pr.is_merged());
    }

    #[test]
    fn test_pull_request_null_fields_fall_back_to_defaults() {
        let pr: PullRequest = serde_json::from_str(
            r#"{"number": 2, "state": null, "base_ref": null, "title": null, "url": null}"#,
        )
        .unwrap();
        assert_eq!(pr.number, 2);
        assert_eq!(pr.state, PRState::Open);
        assert_eq!(pr.base_ref, "");
        assert_eq!(pr.title, "");
        assert_eq!(pr.url, "");
    }

    #[test]
    fn test_recorded_commit_shapes() {
        let single: Recorded<CommitRef> =
            serde_json::from_str(r#"{"sha": "c1", "authored_at": "2024-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(single.into_first().map(|c| c.sha), Some("c1".to_string()));

        let list: Recorded<CommitRef> =
            serde_json::from_str(r#"[{"sha": "c1"}, {"sha": "c2"}]"#).unwrap();
        assert_eq!(list.into_first().map(|c| c.sha), Some("c1".to_string()));

        let empty: Recorded<CommitRef> = serde_json::from_str("[]").unwrap();
        assert_eq!(empty.into_first(), None);

        let null: Recorded<CommitRef> = serde_json::from_str("null").unwrap();
        assert_eq!(null.into_first(), None);

        assert!(serde_json::from_str::<Recorded<CommitRef>>(r#"{"authored_at": 5}"#).is_err());
    }

    #[test]
    fn test_recorded_review_comment_earliest() {
        let list: Recorded<ReviewComment> = serde_json::from_str(
            r#"[{"created_at": "2024-01-04T00:00:00Z"}, {"created_at": "2024-01-03T00:00:00Z"}]"#,
        )
        .unwrap();
        assert_eq!(
            list.into_earliest().and_then(|c| c.created_at).as_deref(),
            Some("2024-01-03T00:00:00Z")
        );
    }

    #[test]
    fn test_release_index_json_shape() {
        let index: ReleaseCommitIndex =
            serde_json::from_str(r#"{"abc123": "2024-02-01T00:00:00Z", "def456": "nope"}"#)
                .unwrap();

        assert_eq!(index.len(), 2);
        assert!(index.contains("abc123"));
        assert!(index.contains("def456"));
        assert!(!index.contains("zzz"));
    }
}
