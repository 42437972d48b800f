use prcycle::metrics::{compute_metrics, Timeline};
use prcycle::release::{find_release_date, is_released};
use prcycle::report::{build_report, write_report, OutputFormat};
use prcycle::store::{ArtifactKey, ArtifactStore, FileArtifactStore, MemoryArtifactStore};
use prcycle::timestamp::normalize;
use prcycle::types::{PullRequest, ReleaseCommitIndex};

fn write(store: &impl ArtifactStore, key: ArtifactKey, json: &str) {
    store.write(&key, json).expect("failed to write artifact");
}

/// Populates a store with the snapshot a `fetch` run would leave behind.
fn seed_snapshot(store: &impl ArtifactStore) {
    write(
        store,
        ArtifactKey::Pulls,
        r#"[
            {
                "number": 1,
                "state": "closed",
                "base_ref": "main",
                "head_repo_name": "widgets",
                "author_login": "alice",
                "title": "Add widgets",
                "url": "https://github.com/acme/widgets/pull/1",
                "created_at": "2024-01-02T00:00:00Z",
                "merged_at": "2024-01-05T00:00:00Z",
                "merge_commit_sha": "abc123"
            },
            {
                "number": 2,
                "state": "open",
                "base_ref": "main",
                "head_repo_name": "widgets",
                "author_login": "bob",
                "title": "Draft work",
                "url": "https://github.com/acme/widgets/pull/2",
                "created_at": "2024-01-03T00:00:00Z",
                "merged_at": null,
                "merge_commit_sha": null
            },
            {
                "number": 3,
                "state": "closed",
                "base_ref": "release",
                "title": "Release",
                "created_at": "2024-01-06T00:00:00Z",
                "merged_at": "2024-01-07T00:00:00Z",
                "merge_commit_sha": "rel999"
            }
        ]"#,
    );
    write(
        store,
        ArtifactKey::FirstCommit(1),
        r#"{"sha": "c1", "authored_at": "2024-01-01T00:00:00Z"}"#,
    );
    write(
        store,
        ArtifactKey::ReviewComments(1),
        r#"{"created_at": "2024-01-04T00:00:00Z"}"#,
    );
    write(
        store,
        ArtifactKey::FirstCommit(2),
        r#"{"sha": "c2", "authored_at": "not a timestamp"}"#,
    );
    write(
        store,
        ArtifactKey::FirstCommit(3),
        r#"{"sha": "abc123", "authored_at": "2024-01-05T00:00:00Z"}"#,
    );
    write(
        store,
        ArtifactKey::ReleaseCommits,
        r#"{"abc123": "2024-02-01T00:00:00Z", "rel999": "2024-01-07T00:00:00Z"}"#,
    );
}

#[test]
fn test_report_from_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileArtifactStore::new(dir.path());
    seed_snapshot(&store);

    let rows = build_report(&store).expect("report should build");
    assert_eq!(rows.len(), 3);

    let merged = &rows[0];
    assert_eq!(merged.number, 1);
    assert!(merged.is_released);
    assert_eq!(merged.metrics.coding_time, Some(1.0));
    assert_eq!(merged.metrics.pickup_time, Some(2.0));
    assert_eq!(merged.metrics.review_time, Some(1.0));
    assert_eq!(merged.metrics.deploy_time, None);
    assert_eq!(merged.metrics.total_time, Some(4.0));

    // Malformed commit date and no review comment: only absence, never a failure.
    let open = &rows[1];
    assert!(!open.is_released);
    assert_eq!(open.first_committed_at, None);
    assert_eq!(open.metrics.coding_time, None);
    assert_eq!(open.metrics.pickup_time, None);
    assert_eq!(open.metrics.total_time, None);

    let release = &rows[2];
    assert!(release.is_released);
    assert_eq!(release.metrics.total_time, Some(2.0));
}

#[test]
fn test_report_without_release_index() {
    let store = MemoryArtifactStore::new();
    seed_snapshot(&store);
    write(&store, ArtifactKey::ReleaseCommits, "corrupted");

    let rows = build_report(&store).unwrap();
    assert!(rows.iter().all(|row| !row.is_released));
}

#[test]
fn test_tsv_report_contract() {
    // The column order is consumed by spreadsheets built on the previous tool's output.
    let store = MemoryArtifactStore::new();
    seed_snapshot(&store);
    let rows = build_report(&store).unwrap();

    let mut out = Vec::new();
    write_report(&rows, OutputFormat::Tsv, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();

    assert_eq!(
        lines.next().unwrap(),
        "repo\tnumber\ttarget_branch\tstate\tis_released\tauthor\ttitle\thtml_url\t\
         first_commited_at\tpr_created_at\tfirst_review_commented_at\tmerged_at\treleased_at\t\
         coding time\tpickup time\treview time\tdeploy time\ttotal time"
    );
    assert_eq!(
        lines.next().unwrap(),
        "widgets\t1\tmain\tclosed\ttrue\talice\tAdd widgets\thttps://github.com/acme/widgets/pull/1\t\
         2024-01-01 00:00\t2024-01-02 00:00\t2024-01-04 00:00\t2024-01-05 00:00\t\t\
         1\t2\t1\t\t4"
    );
    assert_eq!(lines.count(), 2);
}

#[test]
fn test_release_fallback_against_snapshot() {
    let store = MemoryArtifactStore::new();
    seed_snapshot(&store);
    let pulls: Vec<PullRequest> = store.get(&ArtifactKey::Pulls).unwrap();

    assert_eq!(
        find_release_date(&pulls, "release", "abc123", &store),
        normalize(Some("2024-01-07T00:00:00Z"))
    );
    assert_eq!(find_release_date(&pulls, "release", "c1", &store), None);
    assert_eq!(find_release_date(&pulls, "production", "abc123", &store), None);
}

#[test]
fn test_scenarios() {
    // Coding time only.
    let timeline = Timeline {
        first_committed_at: normalize(Some("2024-01-01T00:00:00Z")),
        pr_created_at: normalize(Some("2024-01-03T00:00:00Z")),
        ..Default::default()
    };
    let metrics = compute_metrics(&timeline);
    assert_eq!(metrics.coding_time, Some(2.0));
    assert_eq!(metrics.pickup_time, None);
    assert_eq!(metrics.review_time, None);
    assert_eq!(metrics.total_time, None);

    // Review comment one day before creation.
    let timeline = Timeline {
        pr_created_at: normalize(Some("2024-01-03T00:00:00Z")),
        first_review_commented_at: normalize(Some("2024-01-02T00:00:00Z")),
        ..Default::default()
    };
    assert_eq!(compute_metrics(&timeline).pickup_time, Some(1.0));

    // Release membership.
    let mut index = ReleaseCommitIndex::new();
    index.insert("abc123", "2024-02-01T00:00:00Z");
    let merged = PullRequest {
        number: 1,
        merge_commit_sha: Some("abc123".to_string()),
        ..Default::default()
    };
    let unmerged = PullRequest {
        number: 2,
        ..Default::default()
    };
    assert!(is_released(&merged, &index));
    assert!(!is_released(&unmerged, &index));
}
