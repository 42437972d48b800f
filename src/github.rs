//! GitHub acquisition client.
//!
//! Wraps octocrab and translates every upstream payload into the normalized records in
//! [`crate::types`] before handing it back. Callers never see GitHub's JSON layout.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use octocrab::models::pulls::PullRequest as GitHubPullRequest;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, RepoId};
use crate::types::{
    earliest_review_comment, CommitRef, PRState, PullRequest, ReleaseCommitIndex, Review,
    ReviewComment,
};

/// Number of page requests kept in flight when walking a paginated listing.
const PAGE_CONCURRENCY_LIMIT: usize = 8;

const PER_PAGE: u8 = 100;

#[derive(Debug, Deserialize)]
struct RawCommit {
    sha: String,
    commit: RawCommitDetail,
}

#[derive(Debug, Deserialize)]
struct RawCommitDetail {
    author: Option<RawGitActor>,
}

#[derive(Debug, Deserialize)]
struct RawGitActor {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReviewComment {
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    user: Option<RawUser>,
    state: Option<String>,
    submitted_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Serialize)]
struct PageParams<'a> {
    per_page: u8,
    page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

impl From<RawCommit> for CommitRef {
    fn from(raw: RawCommit) -> Self {
        CommitRef {
            sha: raw.sha,
            authored_at: raw.commit.author.and_then(|a| a.date),
        }
    }
}

#[derive(Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
    repo_id: RepoId,
    max_pages: u32,
}

impl GitHubClient {
    pub fn new(config: &AppConfig, repo_id: RepoId) -> Result<Self> {
        let mut builder = Octocrab::builder();
        if let Some(token) = &config.github_token {
            builder = builder.personal_token(token.clone());
        }

        // Sanitize inputs to prevent path traversal or unintended endpoint access
        let repo_id = RepoId {
            owner: repo_id.owner.trim().replace("..", ""),
            repo: repo_id.repo.trim().replace("..", ""),
        };

        Ok(Self {
            octocrab: builder.build()?,
            repo_id,
            max_pages: config.max_github_api_pages.max(1),
        })
    }

    pub fn repo_id(&self) -> &RepoId {
        &self.repo_id
    }

    /// Retrieves every pull request of the repository, in API pagination order.
    pub async fn fetch_pull_requests(&self) -> Result<Vec<PullRequest>> {
        let mut prs = Vec::new();
        let mut hit_page_limit = true;

        let mut page_stream = stream::iter(1..=self.max_pages)
            .map(|page_num| {
                let octocrab = self.octocrab.clone();
                let owner = self.repo_id.owner.clone();
                let repo = self.repo_id.repo.clone();
                async move {
                    octocrab
                        .pulls(owner, repo)
                        .list()
                        .state(octocrab::params::State::All)
                        .per_page(PER_PAGE)
                        .page(page_num)
                        .send()
                        .await
                }
            })
            .buffered(PAGE_CONCURRENCY_LIMIT);

        while let Some(result) = page_stream.next().await {
            let page = result.with_context(|| format!("failed to list pulls of {}", self.repo_id))?;
            if page.items.is_empty() {
                hit_page_limit = false;
                break;
            }

            tracing::debug!(repo = %self.repo_id, count = page.items.len(), "Fetched pull request page");
            prs.extend(page.items.iter().map(translate_pull_request));
        }

        if hit_page_limit {
            tracing::warn!(
                "Hit max_github_api_pages ({}) for repo {} while listing pulls. Data may be incomplete.",
                self.max_pages,
                self.repo_id
            );
        }

        Ok(prs)
    }

    /// Retrieves the first commit of a pull request as a single-item page.
    pub async fn fetch_first_commit(&self, number: u64) -> Result<Option<CommitRef>> {
        let route = format!(
            "/repos/{}/{}/pulls/{number}/commits",
            self.repo_id.owner, self.repo_id.repo
        );
        let commits: Vec<RawCommit> = self.get_page(&route, 1, 1, None).await?;
        Ok(commits.into_iter().next().map(CommitRef::from))
    }

    /// Retrieves the earliest review comment found on the first page of comments.
    pub async fn fetch_first_review_comment(&self, number: u64) -> Result<Option<ReviewComment>> {
        let route = format!(
            "/repos/{}/{}/pulls/{number}/comments",
            self.repo_id.owner, self.repo_id.repo
        );
        let raw: Vec<RawReviewComment> = self.get_page(&route, PER_PAGE, 1, None).await?;
        let comments: Vec<ReviewComment> = raw
            .into_iter()
            .map(|c| ReviewComment {
                created_at: c.created_at,
            })
            .collect();
        Ok(earliest_review_comment(&comments).cloned())
    }

    pub async fn fetch_reviews(&self, number: u64) -> Result<Vec<Review>> {
        let route = format!(
            "/repos/{}/{}/pulls/{number}/reviews",
            self.repo_id.owner, self.repo_id.repo
        );
        let raw: Vec<RawReview> = self.get_page(&route, PER_PAGE, 1, None).await?;
        Ok(raw
            .into_iter()
            .map(|r| Review {
                reviewer: r.user.map(|u| u.login),
                state: r.state,
                submitted_at: r.submitted_at,
            })
            .collect())
    }

    /// Retrieves the full history of `branch` as a sha to authored date index.
    /// Commits without an author date are left out.
    pub async fn fetch_branch_commits(&self, branch: &str) -> Result<ReleaseCommitIndex> {
        let route = format!("/repos/{}/{}/commits", self.repo_id.owner, self.repo_id.repo);
        let mut index = ReleaseCommitIndex::new();
        let mut hit_page_limit = true;

        let mut page_stream = stream::iter(1..=self.max_pages)
            .map(|page_num| {
                let route = route.clone();
                async move {
                    self.get_page::<RawCommit>(&route, PER_PAGE, page_num, Some(branch))
                        .await
                }
            })
            .buffered(PAGE_CONCURRENCY_LIMIT);

        while let Some(result) = page_stream.next().await {
            let commits = result?;
            if commits.is_empty() {
                hit_page_limit = false;
                break;
            }

            tracing::debug!(branch, count = commits.len(), "Fetched release commit page");
            for commit in commits {
                let commit = CommitRef::from(commit);
                if let Some(date) = commit.authored_at {
                    index.insert(commit.sha, date);
                }
            }
        }

        if hit_page_limit {
            tracing::warn!(
                "Hit max_github_api_pages ({}) for branch {} of {}. Release index may be incomplete.",
                self.max_pages,
                branch,
                self.repo_id
            );
        }

        Ok(index)
    }

    async fn get_page<T>(
        &self,
        route: &str,
        per_page: u8,
        page: u32,
        sha: Option<&str>,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let params = PageParams {
            per_page,
            page,
            sha,
        };
        self.octocrab
            .get(route, Some(&params))
            .await
            .with_context(|| format!("GitHub request to {route} (page {page}) failed"))
    }
}

/// Converts octocrab's pull request model into our internal record.
fn translate_pull_request(pr: &GitHubPullRequest) -> PullRequest {
    let state = match pr.state {
        Some(octocrab::models::IssueState::Closed) => PRState::Closed,
        _ => PRState::Open,
    };

    PullRequest {
        number: pr.number,
        state,
        base_ref: pr.base.ref_field.clone(),
        head_repo_name: pr.head.repo.as_ref().map(|r| r.name.clone()),
        author_login: pr.user.as_ref().map(|u| u.login.clone()),
        title: pr.title.clone().unwrap_or_default(),
        url: pr
            .html_url
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_default(),
        created_at: pr.created_at.map(|at| at.to_rfc3339()),
        merged_at: pr.merged_at.map(|at| at.to_rfc3339()),
        merge_commit_sha: pr.merge_commit_sha.clone(),
    }
}
