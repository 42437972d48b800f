use crate::config::AppConfig;
use crate::github::GitHubClient;
use crate::store::{ArtifactKey, ArtifactStore};
use crate::types::{PullRequest, ReleaseCommitIndex};
use anyhow::Result;
use futures::stream::{self, StreamExt};

/// Fetches pull requests and every per-PR artifact, then the release branch history,
/// writing all of it to `store`.
///
/// A failure on one pull request is logged and skipped so the rest of the batch still
/// lands in the store.
pub async fn fetch_all<S: ArtifactStore>(
    client: &GitHubClient,
    config: &AppConfig,
    store: &S,
) -> Result<()> {
    let pulls = fetch_pulls(client, store).await?;

    stream::iter(&pulls)
        .for_each_concurrent(Some(config.fetch_concurrency_limit.max(1)), |pr| async move {
            if let Err(e) = fetch_pull_artifacts(client, store, pr.number).await {
                tracing::warn!(number = pr.number, "Failed to fetch artifacts: {:#}", e);
            }
        })
        .await;

    fetch_release_commits(client, store, &config.release_branch).await?;

    tracing::info!(repo = %client.repo_id(), pulls = pulls.len(), "Finished fetching artifacts");
    Ok(())
}

pub async fn fetch_pulls<S: ArtifactStore>(
    client: &GitHubClient,
    store: &S,
) -> Result<Vec<PullRequest>> {
    tracing::info!(repo = %client.repo_id(), "Fetching pull requests");
    let pulls = client.fetch_pull_requests().await?;
    store.put(&ArtifactKey::Pulls, &pulls)?;
    tracing::info!(count = pulls.len(), "Stored pull requests");
    Ok(pulls)
}

/// Fetches the first commit, first review comment and reviews of one pull request.
/// An absent commit or comment is stored as JSON `null`.
pub async fn fetch_pull_artifacts<S: ArtifactStore>(
    client: &GitHubClient,
    store: &S,
    number: u64,
) -> Result<()> {
    tracing::debug!(number, "Fetching first commit");
    let first_commit = client.fetch_first_commit(number).await?;
    store.put(&ArtifactKey::FirstCommit(number), &first_commit)?;

    tracing::debug!(number, "Fetching review comments");
    let first_comment = client.fetch_first_review_comment(number).await?;
    store.put(&ArtifactKey::ReviewComments(number), &first_comment)?;

    tracing::debug!(number, "Fetching reviews");
    let reviews = client.fetch_reviews(number).await?;
    store.put(&ArtifactKey::Reviews(number), &reviews)?;

    Ok(())
}

pub async fn fetch_release_commits<S: ArtifactStore>(
    client: &GitHubClient,
    store: &S,
    branch: &str,
) -> Result<ReleaseCommitIndex> {
    tracing::info!(branch, "Fetching release branch history");
    let index = client.fetch_branch_commits(branch).await?;
    store.put(&ArtifactKey::ReleaseCommits, &index)?;
    tracing::info!(branch, commits = index.len(), "Stored release commits");
    Ok(index)
}
