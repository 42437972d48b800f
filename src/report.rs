//! Report assembly.
//!
//! Loads a fetched snapshot from the artifact store, runs each pull request through the
//! timeline and metrics reduction, and renders the rows as TSV or JSON. Every pull
//! request is independent; missing artifacts only blank out the affected columns.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Serialize, Serializer};
use std::io::Write;

use crate::metrics::{compute_metrics, Metrics, Timeline};
use crate::release::is_released;
use crate::store::{ArtifactKey, ArtifactStore};
use crate::timestamp;
use crate::types::{CommitRef, PullRequest, Recorded, ReleaseCommitIndex, ReviewComment};

const HEADER: [&str; 18] = [
    "repo",
    "number",
    "target_branch",
    "state",
    "is_released",
    "author",
    "title",
    "html_url",
    "first_commited_at",
    "pr_created_at",
    "first_review_commented_at",
    "merged_at",
    "released_at",
    "coding time",
    "pickup time",
    "review time",
    "deploy time",
    "total time",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Tsv,
    Json,
}

/// One output row: identity fields, the timeline and its metrics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportRow {
    pub repo: Option<String>,
    pub number: u64,
    pub target_branch: String,
    pub state: String,
    pub is_released: bool,
    pub author: Option<String>,
    pub title: String,
    pub url: String,
    #[serde(serialize_with = "serialize_instant")]
    pub first_committed_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_instant")]
    pub pr_created_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_instant")]
    pub first_review_commented_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_instant")]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_instant")]
    pub released_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub metrics: Metrics,
}

fn serialize_instant<S>(at: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match at {
        Some(at) => serializer.serialize_some(&timestamp::display(at)),
        None => serializer.serialize_none(),
    }
}

impl ReportRow {
    pub fn new(pr: &PullRequest, timeline: &Timeline, metrics: Metrics, is_released: bool) -> Self {
        Self {
            repo: pr.head_repo_name.clone(),
            number: pr.number,
            target_branch: pr.base_ref.clone(),
            state: pr.state.to_string(),
            is_released,
            author: pr.author_login.clone(),
            title: pr.title.clone(),
            url: pr.url.clone(),
            first_committed_at: timeline.first_committed_at,
            pr_created_at: timeline.pr_created_at,
            first_review_commented_at: timeline.first_review_commented_at,
            merged_at: timeline.merged_at,
            released_at: timeline.released_at,
            metrics,
        }
    }

    fn tsv_cells(&self) -> Vec<String> {
        let instant = |at: &Option<DateTime<Utc>>| at.as_ref().map(timestamp::display).unwrap_or_default();
        let days = |d: Option<f64>| d.map(|d| d.to_string()).unwrap_or_default();

        vec![
            self.repo.clone().unwrap_or_default(),
            self.number.to_string(),
            self.target_branch.clone(),
            self.state.clone(),
            self.is_released.to_string(),
            self.author.clone().unwrap_or_default(),
            single_line(&self.title),
            self.url.clone(),
            instant(&self.first_committed_at),
            instant(&self.pr_created_at),
            instant(&self.first_review_commented_at),
            instant(&self.merged_at),
            instant(&self.released_at),
            days(self.metrics.coding_time),
            days(self.metrics.pickup_time),
            days(self.metrics.review_time),
            days(self.metrics.deploy_time),
            days(self.metrics.total_time),
        ]
    }
}

fn single_line(s: &str) -> String {
    s.replace(['\t', '\r', '\n'], " ")
}

/// Builds the row for one pull request from whatever artifacts the store holds for it.
pub fn build_row<S: ArtifactStore>(
    pr: &PullRequest,
    store: &S,
    release_index: &ReleaseCommitIndex,
) -> ReportRow {
    let first_commit = load_first_commit(store, pr.number);
    let first_comment = store
        .get::<Recorded<ReviewComment>>(&ArtifactKey::ReviewComments(pr.number))
        .and_then(Recorded::into_earliest);

    let timeline = Timeline::assemble(pr, first_commit.as_ref(), first_comment.as_ref());
    let metrics = compute_metrics(&timeline);

    ReportRow::new(pr, &timeline, metrics, is_released(pr, release_index))
}

/// Loads the recorded first commit, stored either as one record or as a
/// single-item page.
pub fn load_first_commit<S: ArtifactStore>(store: &S, number: u64) -> Option<CommitRef> {
    store
        .get::<Recorded<CommitRef>>(&ArtifactKey::FirstCommit(number))
        .and_then(Recorded::into_first)
}

/// Loads the stored pull request list. A missing list is an error, and so is a file
/// that is not a JSON array. Individual records that fail to decode are skipped.
pub fn load_pulls<S: ArtifactStore>(store: &S) -> Result<Vec<PullRequest>> {
    let Some(contents) = store.read(&ArtifactKey::Pulls)? else {
        bail!("no pull requests in the artifact store; run `fetch` first");
    };

    let records: Vec<serde_json::Value> = serde_json::from_str(&contents)
        .with_context(|| format!("{} is malformed", ArtifactKey::Pulls))?;

    let total = records.len();
    let pulls: Vec<PullRequest> = records
        .into_iter()
        .enumerate()
        .filter_map(|(position, record)| {
            let number = record.get("number").cloned();
            match serde_json::from_value(record) {
                Ok(pr) => Some(pr),
                Err(e) => {
                    tracing::warn!(position, ?number, "Skipping malformed pull request: {}", e);
                    None
                }
            }
        })
        .collect();

    if pulls.len() < total {
        tracing::warn!(skipped = total - pulls.len(), total, "Some pull requests could not be read");
    }
    Ok(pulls)
}

/// Builds one row per stored pull request, in stored order.
pub fn build_report<S: ArtifactStore>(store: &S) -> Result<Vec<ReportRow>> {
    let pulls = load_pulls(store)?;

    let release_index: ReleaseCommitIndex = store.get(&ArtifactKey::ReleaseCommits).unwrap_or_else(|| {
        tracing::warn!("No release commits recorded; every pull request will be reported as unreleased");
        ReleaseCommitIndex::new()
    });

    tracing::info!(
        pulls = pulls.len(),
        merged = pulls.iter().filter(|pr| pr.is_merged()).count(),
        release_commits = release_index.len(),
        "Building report"
    );

    Ok(pulls
        .iter()
        .map(|pr| build_row(pr, store, &release_index))
        .collect())
}

pub fn write_tsv<W: Write>(rows: &[ReportRow], mut out: W) -> Result<()> {
    writeln!(out, "{}", HEADER.join("\t")).context("failed to write report header")?;
    for row in rows {
        writeln!(out, "{}", row.tsv_cells().join("\t"))
            .with_context(|| format!("failed to write row for #{}", row.number))?;
    }
    Ok(())
}

pub fn write_json<W: Write>(rows: &[ReportRow], mut out: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, rows).context("failed to write JSON report")?;
    writeln!(out).context("failed to write JSON report")?;
    Ok(())
}

pub fn write_report<W: Write>(rows: &[ReportRow], format: OutputFormat, out: W) -> Result<()> {
    match format {
        OutputFormat::Tsv => write_tsv(rows, out),
        OutputFormat::Json => write_json(rows, out),
    }
}
