//! Pull request cycle-time metrics.
//!
//! Acquisition ([`github`], [`fetcher`]) records pull requests and their first commit,
//! first review comment and the release branch history into an [`store::ArtifactStore`].
//! The pure core ([`timestamp`], [`release`], [`metrics`]) turns those records into
//! per-PR timelines and durations, and [`report`] renders them.

pub mod config;
pub mod fetcher;
pub mod github;
pub mod metrics;
pub mod release;
pub mod report;
pub mod store;
pub mod timestamp;
pub mod types;
