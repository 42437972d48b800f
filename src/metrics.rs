use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::timestamp::normalize;
use crate::types::{CommitRef, PullRequest, ReviewComment};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// The lifecycle events of a single pull request. Any event may be missing, and
/// present events are not assumed to be in causal order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Timeline {
    pub first_committed_at: Option<DateTime<Utc>>,
    pub pr_created_at: Option<DateTime<Utc>>,
    pub first_review_commented_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
}

impl Timeline {
    /// Builds the timeline from a pull request and whichever artifacts were recorded for it.
    pub fn assemble(
        pr: &PullRequest,
        first_commit: Option<&CommitRef>,
        first_review_comment: Option<&ReviewComment>,
    ) -> Self {
        Self {
            first_committed_at: normalize(first_commit.and_then(|c| c.authored_at.as_deref())),
            pr_created_at: normalize(pr.created_at.as_deref()),
            first_review_commented_at: normalize(
                first_review_comment.and_then(|c| c.created_at.as_deref()),
            ),
            merged_at: normalize(pr.merged_at.as_deref()),
            released_at: None,
        }
    }

    /// The earliest of the events that can start a pull request's cycle.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        [
            self.first_committed_at,
            self.pr_created_at,
            self.first_review_commented_at,
        ]
        .into_iter()
        .flatten()
        .min()
    }
}

/// Cycle durations in fractional days. All present values are non-negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Metrics {
    /// First commit to pull request creation.
    pub coding_time: Option<f64>,
    /// Pull request creation to first review comment.
    pub pickup_time: Option<f64>,
    /// First review comment to merge.
    pub review_time: Option<f64>,
    /// Merge to release. Not computed yet; always `None`.
    pub deploy_time: Option<f64>,
    /// Earliest start event to merge.
    pub total_time: Option<f64>,
}

/// Reduces a timeline to its duration metrics.
///
/// A metric is `None` whenever one of its endpoints is missing. Durations are reported
/// as magnitudes, so events recorded out of order (clock skew, backdated commits) still
/// produce a non-negative value.
pub fn compute_metrics(timeline: &Timeline) -> Metrics {
    Metrics {
        coding_time: days_between(timeline.first_committed_at, timeline.pr_created_at),
        pickup_time: days_between(timeline.pr_created_at, timeline.first_review_commented_at),
        review_time: days_between(timeline.first_review_commented_at, timeline.merged_at),
        deploy_time: None,
        total_time: days_between(timeline.started_at(), timeline.merged_at),
    }
}

/// Absolute difference in fractional days, or `None` unless both ends are present.
fn days_between(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Option<f64> {
    let elapsed = to? - from?;
    let seconds = match elapsed.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => elapsed.num_seconds() as f64,
    };
    Some((seconds / SECONDS_PER_DAY).abs())
}
