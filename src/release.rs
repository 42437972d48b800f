//! Decides whether a pull request's changes reached the release branch.

use chrono::{DateTime, Utc};

use crate::store::{ArtifactKey, ArtifactStore};
use crate::timestamp;
use crate::types::{CommitRef, PullRequest, Recorded, ReleaseCommitIndex};

/// True iff the pull request has a merge commit and that commit is in the release
/// branch snapshot.
pub fn is_released(pr: &PullRequest, index: &ReleaseCommitIndex) -> bool {
    pr.merge_commit_sha
        .as_deref()
        .is_some_and(|sha| index.contains(sha))
}

/// Best-effort lookup of when `target_sha` landed on `release_branch`.
///
/// Walks the pull requests targeting the release branch in list order and returns the
/// merge time of the first one whose recorded first commit is `target_sha`. This is an
/// approximation: the first-commit artifact is only the landing commit when it was
/// captured as a single-item page, and list order is pagination order rather than time
/// order, so an earlier release pull request may shadow the one that actually shipped
/// the change.
pub fn find_release_date<S: ArtifactStore>(
    pulls: &[PullRequest],
    release_branch: &str,
    target_sha: &str,
    store: &S,
) -> Option<DateTime<Utc>> {
    let release_pr = pulls
        .iter()
        .filter(|pr| pr.base_ref == release_branch)
        .find(|pr| {
            store
                .get::<Recorded<CommitRef>>(&ArtifactKey::FirstCommit(pr.number))
                .and_then(Recorded::into_first)
                .is_some_and(|commit| commit.sha == target_sha)
        })?;

    tracing::debug!(
        number = release_pr.number,
        target_sha,
        "Matched release pull request"
    );
    timestamp::normalize(release_pr.merged_at.as_deref())
}
